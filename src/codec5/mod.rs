#![allow(clippy::type_complexity, clippy::new_ret_no_self)]
//! MQTT v5 Protocol codec

use bytestring::ByteString;

#[macro_use]
mod error;
#[macro_use]
mod proto;
mod codec;
mod connection;
mod context;
mod encode;
mod packet;
mod parse;

pub use self::codec::{Codec, FixedHeader};
pub use self::connection::{Connection, Transport};
pub use self::context::{ConnectionConfig, ConnectionContext, TopicAliasMapping};
pub use self::error::{DecodeError, ParseError};
pub use self::packet::*;
pub use self::parse::decode_variable_length;
pub use self::proto::{PayloadFormatIndicator, QoS};

/// Max possible packet size
pub(crate) const MAX_PACKET_SIZE: u32 = 0xF_FF_FF_FF;

pub type ByteStr = ByteString;
pub type UserProperty = (ByteStr, ByteStr);
pub type UserProperties = Vec<UserProperty>;
