use bytes::{Buf, Bytes};
use std::convert::TryInto;

use super::{
    codec::FixedHeader,
    error::ParseError,
    parse::{read_property_table, Parse, Property},
    ByteStr, UserProperties, UserProperty,
};

mod publish;

pub use publish::*;

/// DISCONNECT message
#[derive(Debug, PartialEq, Clone)]
pub struct Disconnect {
    pub reason_code: DisconnectReasonCode,
    pub session_expiry_interval_secs: Option<u32>,
    pub server_reference: Option<ByteStr>,
    pub reason_string: Option<ByteStr>,
    pub user_properties: UserProperties,
}

impl Default for Disconnect {
    fn default() -> Self {
        Self {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            session_expiry_interval_secs: None,
            server_reference: None,
            reason_string: None,
            user_properties: Vec::new(),
        }
    }
}

impl Disconnect {
    /// DISCONNECT carrying a reason code and a diagnostic reason string
    pub fn with_reason(reason_code: DisconnectReasonCode, reason: &'static str) -> Self {
        Self {
            reason_code,
            reason_string: Some(ByteStr::from_static(reason)),
            ..Disconnect::default()
        }
    }

    pub(crate) fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        if !src.has_remaining() {
            return Ok(Disconnect::default());
        }

        let reason_code = src.get_u8().try_into()?;
        let mut disconnect = Disconnect {
            reason_code,
            ..Disconnect::default()
        };
        if src.has_remaining() {
            read_property_table(src, |id, src| match id {
                Some(PropertyId::SessionExpiryInterval) => {
                    disconnect.session_expiry_interval_secs.read_value(src)
                }
                Some(PropertyId::ReasonString) => disconnect.reason_string.read_value(src),
                Some(PropertyId::ServerReference) => disconnect.server_reference.read_value(src),
                Some(PropertyId::UserProperty) => {
                    disconnect.user_properties.push(UserProperty::parse(src)?);
                    Ok(())
                }
                _ => Err(ParseError::MalformedPacket),
            })?;
        }
        ensure!(!src.has_remaining(), ParseError::InvalidLength);
        Ok(disconnect)
    }
}

#[derive(Debug, PartialEq, Clone)]
/// MQTT Control Packets seen by the decode path
pub enum Packet {
    /// Publish message
    Publish(Publish),
    /// Disconnection is advertised
    Disconnect(Disconnect),
    /// Packet types without a decoder in this crate, handed over as received
    Other(FixedHeader, Bytes),
}

pub(crate) mod packet_type {
    pub const PUBLISH: u8 = 0b0011;
    pub const DISCONNECT: u8 = 0b1110;
}

prim_enum! {
    /// Property identifiers of MQTT v5 property tables
    pub enum PropertyId {
        PayloadFormatIndicator = 0x01,
        MessageExpiryInterval = 0x02,
        ContentType = 0x03,
        ResponseTopic = 0x08,
        CorrelationData = 0x09,
        SubscriptionIdentifier = 0x0B,
        SessionExpiryInterval = 0x11,
        AssignedClientIdentifier = 0x12,
        ServerKeepAlive = 0x13,
        AuthenticationMethod = 0x15,
        AuthenticationData = 0x16,
        RequestProblemInformation = 0x17,
        WillDelayInterval = 0x18,
        RequestResponseInformation = 0x19,
        ResponseInformation = 0x1A,
        ServerReference = 0x1C,
        ReasonString = 0x1F,
        ReceiveMaximum = 0x21,
        TopicAliasMaximum = 0x22,
        TopicAlias = 0x23,
        MaximumQoS = 0x24,
        RetainAvailable = 0x25,
        UserProperty = 0x26,
        MaximumPacketSize = 0x27,
        WildcardSubscriptionAvailable = 0x28,
        SubscriptionIdentifierAvailable = 0x29,
        SharedSubscriptionAvailable = 0x2A
    }
}

impl PropertyId {
    /// Looks up a property identifier decoded as a variable byte integer
    pub fn from_identifier(id: u32) -> Option<PropertyId> {
        let id: u8 = id.try_into().ok()?;
        id.try_into().ok()
    }
}

prim_enum! {
    /// DISCONNECT reason codes
    pub enum DisconnectReasonCode {
        NormalDisconnection = 0,
        DisconnectWithWillMessage = 4,
        UnspecifiedError = 128,
        MalformedPacket = 129,
        ProtocolError = 130,
        ImplementationSpecificError = 131,
        NotAuthorized = 135,
        ServerBusy = 137,
        ServerShuttingDown = 139,
        BadAuthenticationMethod = 140,
        KeepAliveTimeout = 141,
        SessionTakenOver = 142,
        TopicFilterInvalid = 143,
        TopicNameInvalid = 144,
        ReceiveMaximumExceeded = 147,
        TopicAliasInvalid = 148,
        PacketTooLarge = 149,
        MessageRateTooHigh = 150,
        QuotaExceeded = 151,
        AdministrativeAction = 152,
        PayloadFormatInvalid = 153,
        RetainNotSupported = 154,
        QosNotSupported = 155,
        UseAnotherServer = 156,
        ServerMoved = 157,
        SharedSubscriptionNotSupported = 158,
        ConnectionRateExceeded = 159,
        MaximumConnectTime = 160,
        SubscriptionIdentifiersNotSupported = 161,
        WildcardSubscriptionsNotSupported = 162
    }
}
