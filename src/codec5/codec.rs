use bytes::{Buf, Bytes, BytesMut};
use ntex_codec::{Decoder, Encoder};

use super::encode::EncodeLtd;
use super::error::ParseError;
use super::packet::Packet;
use super::parse::decode_variable_length;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Mqtt v5 framing codec.
///
/// Decodes complete frames (fixed header plus remaining bytes) and encodes
/// outgoing packets.
pub struct Codec {
    state: DecodeState,
    max_size: u32,
    max_packet_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecodeState {
    FrameHeader,
    Frame(FixedHeader),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedHeader {
    /// Fixed Header byte
    pub first_byte: u8,
    /// the number of bytes remaining within the current packet,
    /// including data in the variable header and the payload.
    pub remaining_length: u32,
}

impl FixedHeader {
    /// Control packet type, the high nibble of the first byte
    pub fn packet_type(&self) -> u8 {
        self.first_byte >> 4
    }

    /// Packet type specific flags, the low nibble of the first byte
    pub fn flags(&self) -> u8 {
        self.first_byte & 0b0000_1111
    }
}

impl Codec {
    /// Create `Codec` instance
    pub fn new() -> Self {
        Codec {
            state: DecodeState::FrameHeader,
            max_size: 0,
            max_packet_size: 0,
        }
    }

    /// Set max inbound frame size.
    ///
    /// If max size is set to `0`, size is unlimited.
    /// By default max size is set to `0`
    pub fn max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Set max outbound packet size.
    ///
    /// Optional properties of outbound packets are dropped to fit the limit.
    /// `0` means the protocol maximum.
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    fn encode_limit(&self) -> u32 {
        if self.max_packet_size == 0 {
            super::MAX_PACKET_SIZE
        } else {
            self.max_packet_size
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Codec {
    type Item = (FixedHeader, Bytes);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, ParseError> {
        loop {
            match self.state {
                DecodeState::FrameHeader => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    let src_slice = src.as_ref();
                    let first_byte = src_slice[0];
                    match decode_variable_length(&src_slice[1..])? {
                        Some((remaining_length, consumed)) => {
                            // check max message size
                            if self.max_size != 0 && self.max_size < remaining_length {
                                return Err(ParseError::MaxSizeExceeded);
                            }
                            src.advance(consumed + 1);
                            self.state = DecodeState::Frame(FixedHeader {
                                first_byte,
                                remaining_length,
                            });
                            let remaining_length = remaining_length as usize;
                            if src.len() < remaining_length {
                                // extend receiving buffer to fit the whole frame
                                src.reserve(remaining_length);
                                return Ok(None);
                            }
                        }
                        None => {
                            return Ok(None);
                        }
                    }
                }
                DecodeState::Frame(fixed) => {
                    if src.len() < fixed.remaining_length as usize {
                        return Ok(None);
                    }
                    let packet_buf = src.split_to(fixed.remaining_length as usize).freeze();
                    self.state = DecodeState::FrameHeader;
                    src.reserve(2);

                    log::trace!(
                        "decoded frame: type {:#06b}, {} bytes",
                        fixed.packet_type(),
                        fixed.remaining_length
                    );
                    return Ok(Some((fixed, packet_buf)));
                }
            }
        }
    }
}

impl Encoder for Codec {
    type Item = Packet;
    type Error = ParseError;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), ParseError> {
        let limit = self.encode_limit();
        let content_size = item.encoded_size(limit);
        if content_size > limit as usize {
            return Err(ParseError::MaxSizeExceeded);
        }
        dst.reserve(content_size + 5);
        item.encode(dst, content_size as u32)?; // safe: content_size <= limit
        Ok(())
    }
}
