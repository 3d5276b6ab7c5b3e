use bytes::{BufMut, Bytes, BytesMut};
use std::num::NonZeroU16;

use super::error::ParseError;
use super::packet::*;
use super::proto::PayloadFormatIndicator;
use super::{ByteStr, UserProperties, UserProperty};
use crate::topic::Topic;

/// Largest value of a variable byte integer
pub(crate) const MAX_VARIABLE_LENGTH: u32 = 268_435_455;

/// Packet body encoder bounded by the peer's maximum packet size.
///
/// `encoded_size` may leave out optional properties to stay within `limit`,
/// `encode` is then called with the size it reported.
pub(crate) trait EncodeLtd {
    fn encoded_size(&self, limit: u32) -> usize;
    fn encode(&self, buf: &mut BytesMut, size: u32) -> Result<(), ParseError>;
}

pub(crate) trait Encode {
    fn encoded_size(&self) -> usize;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError>;
}

impl EncodeLtd for Packet {
    fn encoded_size(&self, limit: u32) -> usize {
        match self {
            Packet::Publish(publish) => publish.encoded_size(limit),
            Packet::Disconnect(disconnect) => disconnect.encoded_size(limit),
            Packet::Other(_, payload) => payload.len(),
        }
    }

    fn encode(&self, buf: &mut BytesMut, size: u32) -> Result<(), ParseError> {
        let first_byte = match self {
            Packet::Publish(publish) => {
                packet_type::PUBLISH << 4
                    | u8::from(publish.qos) << 1
                    | (publish.dup as u8) << 3
                    | publish.retain as u8
            }
            Packet::Disconnect(_) => packet_type::DISCONNECT << 4,
            Packet::Other(header, _) => header.first_byte,
        };
        buf.put_u8(first_byte);
        write_variable_length(size, buf);

        match self {
            Packet::Publish(publish) => publish.encode(buf, size),
            Packet::Disconnect(disconnect) => disconnect.encode(buf, size),
            Packet::Other(_, payload) => {
                buf.extend_from_slice(payload);
                Ok(())
            }
        }
    }
}

/// Diagnostic properties of a DISCONNECT that fit into a byte budget
struct Diagnostics {
    user_properties: usize,
    reason_string: bool,
    len: usize,
}

impl Disconnect {
    const REASON_CODE_LEN: usize = 1;

    fn fixed_properties_len(&self) -> usize {
        encoded_property_size(&self.session_expiry_interval_secs)
            + encoded_property_size(&self.server_reference)
    }

    /// User properties are kept in order up to the first one that does not fit,
    /// the reason string is added last if there is room left.
    fn diagnostics(&self, budget: usize) -> Diagnostics {
        let mut diag = Diagnostics {
            user_properties: 0,
            reason_string: false,
            len: 0,
        };
        for prop in self.user_properties.iter() {
            let prop_len = 1 + prop.encoded_size();
            if diag.len + prop_len > budget {
                break;
            }
            diag.len += prop_len;
            diag.user_properties += 1;
        }
        let reason_len = encoded_property_size(&self.reason_string);
        if reason_len > 0 && diag.len + reason_len <= budget {
            diag.len += reason_len;
            diag.reason_string = true;
        }
        diag
    }
}

impl EncodeLtd for Disconnect {
    fn encoded_size(&self, limit: u32) -> usize {
        let fixed_len = self.fixed_properties_len();
        // reserve the longest property length prefix
        let budget = (limit as usize).saturating_sub(Self::REASON_CODE_LEN + 4 + fixed_len);
        let prop_len = fixed_len + self.diagnostics(budget).len;
        Self::REASON_CODE_LEN + var_int_len(prop_len) as usize + prop_len
    }

    fn encode(&self, buf: &mut BytesMut, size: u32) -> Result<(), ParseError> {
        let prop_len = var_int_len_from_size(size - Self::REASON_CODE_LEN as u32);
        let budget = (prop_len as usize).saturating_sub(self.fixed_properties_len());
        let diag = self.diagnostics(budget);

        buf.put_u8(self.reason_code.into());
        write_variable_length(prop_len, buf);
        encode_property(
            &self.session_expiry_interval_secs,
            PropertyId::SessionExpiryInterval,
            buf,
        )?;
        encode_property(&self.server_reference, PropertyId::ServerReference, buf)?;
        for prop in self.user_properties.iter().take(diag.user_properties) {
            buf.put_u8(PropertyId::UserProperty.into());
            prop.encode(buf)?;
        }
        if diag.reason_string {
            encode_property(&self.reason_string, PropertyId::ReasonString, buf)?;
        }
        Ok(())
    }
}

/// Size of a property including its identifier, `0` if absent
pub(crate) fn encoded_property_size<T: Encode>(v: &Option<T>) -> usize {
    v.as_ref().map_or(0, |v| 1 + v.encoded_size())
}

pub(crate) fn encode_property<T: Encode>(
    v: &Option<T>,
    id: PropertyId,
    buf: &mut BytesMut,
) -> Result<(), ParseError> {
    match v {
        Some(v) => {
            buf.put_u8(id.into());
            v.encode(buf)
        }
        None => Ok(()),
    }
}

/// Number of bytes `val` takes as a variable byte integer
pub(crate) fn var_int_len(val: usize) -> u32 {
    match val {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Recovers `len` from `var_int_len(len) + len`
pub(crate) fn var_int_len_from_size(val: u32) -> u32 {
    let over_size = var_int_len(val as usize);
    let res = val - over_size + 1;
    val - var_int_len(res as usize)
}

/// Writes `len` as a variable byte integer.
///
/// `len` must not exceed `MAX_VARIABLE_LENGTH`.
pub(crate) fn write_variable_length(mut len: u32, dst: &mut BytesMut) {
    debug_assert!(len <= MAX_VARIABLE_LENGTH);
    loop {
        let byte = (len & 0b0111_1111) as u8;
        len >>= 7;
        if len == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | 0b1000_0000);
    }
}

impl Encode for PayloadFormatIndicator {
    fn encoded_size(&self) -> usize {
        1
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        buf.put_u8((*self).into());
        Ok(())
    }
}

impl Encode for u16 {
    fn encoded_size(&self) -> usize {
        2
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        buf.put_u16(*self);
        Ok(())
    }
}

impl Encode for NonZeroU16 {
    fn encoded_size(&self) -> usize {
        2
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        buf.put_u16(self.get());
        Ok(())
    }
}

impl Encode for u32 {
    fn encoded_size(&self) -> usize {
        4
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        buf.put_u32(*self);
        Ok(())
    }
}

/// Binary data with a two byte length prefix
impl Encode for Bytes {
    fn encoded_size(&self) -> usize {
        2 + self.len()
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        ensure!(self.len() <= u16::MAX as usize, ParseError::InvalidLength);
        buf.put_u16(self.len() as u16);
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl Encode for ByteStr {
    fn encoded_size(&self) -> usize {
        self.get_ref().encoded_size()
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        self.get_ref().encode(buf)
    }
}

impl Encode for Topic {
    fn encoded_size(&self) -> usize {
        2 + self.len()
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        // topic length is checked on construction
        buf.put_u16(self.len() as u16);
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Encode for UserProperty {
    fn encoded_size(&self) -> usize {
        self.0.encoded_size() + self.1.encoded_size()
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        self.0.encode(buf)?;
        self.1.encode(buf)
    }
}

impl Encode for UserProperties {
    fn encoded_size(&self) -> usize {
        self.iter().map(|prop| 1 + prop.encoded_size()).sum()
    }
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        for prop in self.iter() {
            buf.put_u8(PropertyId::UserProperty.into());
            prop.encode(buf)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec5::codec::FixedHeader;
    use crate::codec5::MAX_PACKET_SIZE;

    #[test]
    fn test_encode_variable_length() {
        let mut v = BytesMut::new();

        write_variable_length(123, &mut v);
        assert_eq!(v, [123].as_ref());

        v.clear();

        write_variable_length(129, &mut v);
        assert_eq!(v, b"\x81\x01".as_ref());

        v.clear();

        write_variable_length(16_383, &mut v);
        assert_eq!(v, b"\xff\x7f".as_ref());

        v.clear();

        write_variable_length(2_097_151, &mut v);
        assert_eq!(v, b"\xff\xff\x7f".as_ref());

        v.clear();

        write_variable_length(268_435_455, &mut v);
        assert_eq!(v, b"\xff\xff\xff\x7f".as_ref());
    }

    #[test]
    fn test_var_int_len_from_size() {
        assert_eq!(var_int_len_from_size(1), 0);
        assert_eq!(var_int_len_from_size(128), 127);
        assert_eq!(var_int_len_from_size(130), 128);
    }

    fn assert_encode_packet(packet: &Packet, expected: &[u8]) {
        let mut v = BytesMut::with_capacity(1024);
        packet
            .encode(&mut v, packet.encoded_size(1024) as u32)
            .unwrap();
        assert_eq!(expected.len(), v.len());
        assert_eq!(&expected[..], &v[..]);
    }

    #[test]
    fn test_encode_disconnect_packets() {
        assert_encode_packet(
            &Packet::Disconnect(Disconnect {
                reason_code: DisconnectReasonCode::NormalDisconnection,
                session_expiry_interval_secs: None,
                server_reference: None,
                reason_string: None,
                user_properties: vec![],
            }),
            b"\xe0\x02\x00\x00",
        );

        assert_encode_packet(
            &Packet::Disconnect(Disconnect::with_reason(
                DisconnectReasonCode::ProtocolError,
                "dup",
            )),
            b"\xe0\x08\x82\x06\x1f\x00\x03dup",
        );

        assert_encode_packet(
            &Packet::Disconnect(Disconnect {
                reason_code: DisconnectReasonCode::ServerMoved,
                session_expiry_interval_secs: Some(10),
                server_reference: None,
                reason_string: None,
                user_properties: vec![(ByteStr::from_static("k"), ByteStr::from_static("v"))],
            }),
            b"\xe0\x0e\x9d\x0c\x11\x00\x00\x00\x0a\x26\x00\x01k\x00\x01v",
        );
    }

    #[test]
    fn test_disconnect_limit_drops_reason() {
        let disconnect = Disconnect::with_reason(
            DisconnectReasonCode::MalformedPacket,
            "a rather long diagnostic",
        );
        // reason code + property length only
        assert_eq!(disconnect.encoded_size(6), 2);
        assert_eq!(disconnect.encoded_size(MAX_PACKET_SIZE), 2 + 3 + 24);
    }

    #[test]
    fn test_disconnect_limit_keeps_property_order() {
        let disconnect = Disconnect {
            reason_code: DisconnectReasonCode::MalformedPacket,
            reason_string: Some(ByteStr::from_static("r")),
            user_properties: vec![
                (ByteStr::from_static("k"), ByteStr::from_static("v")),
                (ByteStr::from_static("long key"), ByteStr::from_static("long value")),
                (ByteStr::from_static("a"), ByteStr::from_static("b")),
            ],
            ..Disconnect::default()
        };
        let packet = Packet::Disconnect(disconnect);

        // the second user property does not fit, the ones after it are skipped too
        let mut v = BytesMut::new();
        let size = packet.encoded_size(16);
        assert_eq!(size, 13);
        packet.encode(&mut v, size as u32).unwrap();
        assert_eq!(
            &v[..],
            &b"\xe0\x0d\x81\x0b\x26\x00\x01k\x00\x01v\x1f\x00\x01r"[..]
        );
    }

    #[test]
    fn test_encode_other_packets() {
        assert_encode_packet(
            &Packet::Other(
                FixedHeader {
                    first_byte: 0xc0,
                    remaining_length: 0,
                },
                Bytes::new(),
            ),
            b"\xc0\x00",
        );
    }
}
