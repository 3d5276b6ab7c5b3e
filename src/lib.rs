//! Decode path of an MQTT v5 client codec.
//!
//! The centre of the crate is the PUBLISH decoder in [`codec5`]: it parses the
//! fixed header flags, the variable header, the property table and the payload,
//! resolves topic aliases against per-connection state and disconnects the
//! connection with a precise reason code on the first violation.

pub mod codec5;
pub mod handle_list;
pub mod topic;

pub use self::handle_list::{Handle, HandleList};
pub use self::topic::{Topic, TopicError};
