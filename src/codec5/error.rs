use derive_more::Display;
use std::{io, str::Utf8Error};

use super::packet::DisconnectReasonCode;

/// Errors of the primitive decoders and the framing layer
#[derive(Debug, Display)]
pub enum ParseError {
    InvalidLength,
    MalformedPacket,
    /// Singular property appeared twice in a property table
    DuplicateProperty,
    MaxSizeExceeded,
    /// QoS 1 and 2 PUBLISH packets need a packet identifier
    PacketIdRequired,
    #[display(fmt = "io error: {}", _0)]
    Io(io::Error),
    #[display(fmt = "utf8 error: {}", _0)]
    Utf8Error(Utf8Error),
}

impl std::error::Error for ParseError {}

impl PartialEq for ParseError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParseError::InvalidLength, ParseError::InvalidLength) => true,
            (ParseError::MalformedPacket, ParseError::MalformedPacket) => true,
            (ParseError::DuplicateProperty, ParseError::DuplicateProperty) => true,
            (ParseError::MaxSizeExceeded, ParseError::MaxSizeExceeded) => true,
            (ParseError::PacketIdRequired, ParseError::PacketIdRequired) => true,
            (ParseError::Utf8Error(a), ParseError::Utf8Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        ParseError::Io(err)
    }
}

impl From<Utf8Error> for ParseError {
    fn from(err: Utf8Error) -> Self {
        ParseError::Utf8Error(err)
    }
}

/// Connection-fatal violation found while decoding a packet.
///
/// Every kind maps to the DISCONNECT reason code the peer receives. The string is
/// sent as the DISCONNECT reason string.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[display(fmt = "malformed packet: {}", _0)]
    MalformedPacket(&'static str),
    #[display(fmt = "protocol error: {}", _0)]
    ProtocolError(&'static str),
    #[display(fmt = "topic name invalid: {}", _0)]
    TopicNameInvalid(&'static str),
    #[display(fmt = "topic alias invalid: {}", _0)]
    TopicAliasInvalid(&'static str),
    #[display(fmt = "payload format invalid: {}", _0)]
    PayloadFormatInvalid(&'static str),
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    pub(crate) const REMAINING_LENGTH_TOO_SHORT: DecodeError =
        DecodeError::MalformedPacket("remaining length too short");
    pub(crate) const MALFORMED_PROPERTY_LENGTH: DecodeError =
        DecodeError::MalformedPacket("malformed property length");
    pub(crate) const MALFORMED_PROPERTY_ID: DecodeError =
        DecodeError::MalformedPacket("malformed property identifier");
    pub(crate) const DUPLICATE_PROPERTY: DecodeError =
        DecodeError::ProtocolError("property included more than once");

    pub fn reason_code(&self) -> DisconnectReasonCode {
        match self {
            DecodeError::MalformedPacket(_) => DisconnectReasonCode::MalformedPacket,
            DecodeError::ProtocolError(_) => DisconnectReasonCode::ProtocolError,
            DecodeError::TopicNameInvalid(_) => DisconnectReasonCode::TopicNameInvalid,
            DecodeError::TopicAliasInvalid(_) => DisconnectReasonCode::TopicAliasInvalid,
            DecodeError::PayloadFormatInvalid(_) => DisconnectReasonCode::PayloadFormatInvalid,
        }
    }

    /// Diagnostic sent as the DISCONNECT reason string
    pub fn message(&self) -> &'static str {
        match self {
            DecodeError::MalformedPacket(msg)
            | DecodeError::ProtocolError(msg)
            | DecodeError::TopicNameInvalid(msg)
            | DecodeError::TopicAliasInvalid(msg)
            | DecodeError::PayloadFormatInvalid(msg) => msg,
        }
    }

    /// Maps a primitive decoder failure inside a property handler.
    ///
    /// A repeated singular property is a protocol error, anything else is reported
    /// as `malformed`.
    pub(crate) fn from_property(err: ParseError, malformed: DecodeError) -> DecodeError {
        match err {
            ParseError::DuplicateProperty => DecodeError::DUPLICATE_PROPERTY,
            _ => malformed,
        }
    }
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($e);
        }
    };
}
