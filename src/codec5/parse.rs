use super::{
    error::{DecodeError, ParseError},
    packet::PropertyId,
    proto::PayloadFormatIndicator,
    ByteStr, UserProperty,
};
use crate::topic::Topic;
use bytes::{Buf, Bytes};
use bytestring::ByteString;
use std::convert::{TryFrom, TryInto};

pub(crate) trait Property {
    fn read_value(&mut self, src: &mut Bytes) -> Result<(), ParseError>;
}

impl<T: Parse> Property for Option<T> {
    fn read_value(&mut self, src: &mut Bytes) -> Result<(), ParseError> {
        // property is set twice while not allowed
        ensure!(self.is_none(), ParseError::DuplicateProperty);
        *self = Some(T::parse(src)?);
        Ok(())
    }
}

impl<T: Parse> Property for Vec<T> {
    fn read_value(&mut self, src: &mut Bytes) -> Result<(), ParseError> {
        self.push(T::parse(src)?);
        Ok(())
    }
}

pub(crate) trait Parse: Sized {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError>;
}

impl Parse for u16 {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        ensure!(src.remaining() >= 2, ParseError::InvalidLength);
        Ok(src.get_u16())
    }
}

impl Parse for u32 {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        ensure!(src.remaining() >= 4, ParseError::InvalidLength);
        Ok(src.get_u32())
    }
}

impl Parse for PayloadFormatIndicator {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        ensure!(src.has_remaining(), ParseError::InvalidLength);
        src.get_u8().try_into()
    }
}

impl Parse for Bytes {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        let len = u16::parse(src)? as usize;
        ensure!(src.remaining() >= len, ParseError::InvalidLength);
        Ok(src.split_to(len))
    }
}

impl Parse for ByteStr {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        let bytes = Bytes::parse(src)?;
        let s = ByteString::try_from(bytes)?;
        ensure!(!s.contains('\u{0}'), ParseError::MalformedPacket);
        Ok(s)
    }
}

impl Parse for Topic {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        let bytes = Bytes::parse(src)?;
        Topic::try_from(bytes).map_err(|_| ParseError::MalformedPacket)
    }
}

impl Parse for UserProperty {
    fn parse(src: &mut Bytes) -> Result<Self, ParseError> {
        let key = ByteStr::parse(src)?;
        let val = ByteStr::parse(src)?;
        Ok((key, val))
    }
}

/// Decodes a variable byte integer at the start of `src`.
///
/// Returns the value and the number of bytes it occupies, or `None` if `src`
/// ends before the integer does.
pub fn decode_variable_length(src: &[u8]) -> Result<Option<(u32, usize)>, ParseError> {
    let mut cur = src;
    match decode_variable_length_cursor(&mut cur) {
        Ok(len) => Ok(Some((len, src.len() - cur.len()))),
        Err(ParseError::MalformedPacket) => Ok(None),
        Err(e) => Err(e),
    }
}

#[allow(clippy::cast_lossless)] // safe: allow cast through `as` because it is type-safe
pub fn decode_variable_length_cursor<B: Buf>(src: &mut B) -> Result<u32, ParseError> {
    let mut shift: u32 = 0;
    let mut len: u32 = 0;
    loop {
        ensure!(src.has_remaining(), ParseError::MalformedPacket);
        let val = src.get_u8();
        len += ((val & 0b0111_1111u8) as u32) << shift;
        if val & 0b1000_0000 == 0 {
            return Ok(len);
        } else {
            ensure!(shift < 21, ParseError::InvalidLength);
            shift += 7;
        }
    }
}

/// Failures raised by the property table loop itself, as opposed to the
/// per-property handlers.
pub(crate) trait PropertyTableError: Sized {
    const MALFORMED_LENGTH: Self;
    const TOO_SHORT: Self;
    const MALFORMED_ID: Self;
}

impl PropertyTableError for ParseError {
    const MALFORMED_LENGTH: Self = ParseError::MalformedPacket;
    const TOO_SHORT: Self = ParseError::InvalidLength;
    const MALFORMED_ID: Self = ParseError::MalformedPacket;
}

impl PropertyTableError for DecodeError {
    const MALFORMED_LENGTH: Self = DecodeError::MALFORMED_PROPERTY_LENGTH;
    const TOO_SHORT: Self = DecodeError::REMAINING_LENGTH_TOO_SHORT;
    const MALFORMED_ID: Self = DecodeError::MALFORMED_PROPERTY_ID;
}

/// Reads a length-delimited property table from `src`.
///
/// `read` is called with every property identifier (`None` for identifiers
/// unknown to MQTT v5) and must consume the property value. Handlers read from
/// the packet rather than from a view clipped to the table, so the bytes they
/// consume have to add up to the declared table length exactly.
pub(crate) fn read_property_table<E, F>(src: &mut Bytes, mut read: F) -> Result<(), E>
where
    E: PropertyTableError,
    F: FnMut(Option<PropertyId>, &mut Bytes) -> Result<(), E>,
{
    let prop_len = decode_variable_length_cursor(src).map_err(|_| E::MALFORMED_LENGTH)? as usize;
    ensure!(src.remaining() >= prop_len, E::TOO_SHORT);

    let start = src.remaining();
    let mut consumed = 0;
    while consumed < prop_len {
        let id = decode_variable_length_cursor(src).map_err(|_| E::MALFORMED_ID)?;
        read(PropertyId::from_identifier(id), src)?;
        consumed = start - src.remaining();
    }
    ensure!(consumed == prop_len, E::MALFORMED_LENGTH);
    Ok(())
}
