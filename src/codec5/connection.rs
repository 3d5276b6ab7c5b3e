use bytes::{Bytes, BytesMut};
use ntex_codec::{Decoder, Encoder};

use super::codec::Codec;
use super::context::{ConnectionConfig, ConnectionContext};
use super::error::ParseError;
use super::packet::{decode_publish, packet_type, Disconnect, DisconnectReasonCode, Packet};

/// Outbound side of a connection
pub trait Transport {
    /// Sends an encoded packet
    fn send(&mut self, frame: Bytes);

    /// Closes the underlying channel
    fn close(&mut self);
}

/// Client side of an MQTT v5 connection.
///
/// Owns the framing codec and the per-connection decoder state. Any protocol
/// violation found while decoding sends a DISCONNECT with the matching reason
/// code and closes the transport.
pub struct Connection<T> {
    transport: T,
    codec: Codec,
    context: ConnectionContext,
    closed: bool,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, config: &ConnectionConfig) -> Self {
        Connection {
            transport,
            codec: Codec::new()
                .max_size(config.max_size)
                .max_packet_size(config.max_packet_size),
            context: ConnectionContext::new(config),
            closed: false,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ConnectionContext {
        &mut self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Decodes the next packet buffered in `src`.
    ///
    /// Returns `None` if `src` holds no complete frame or if the connection is
    /// closed, check `is_closed` to tell them apart.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Packet> {
        if self.closed {
            return None;
        }

        let (header, mut frame) = match self.codec.decode(src) {
            Ok(Some(item)) => item,
            Ok(None) => return None,
            Err(ParseError::MaxSizeExceeded) => {
                self.disconnect(DisconnectReasonCode::PacketTooLarge, "packet too large");
                return None;
            }
            Err(_) => {
                self.disconnect(
                    DisconnectReasonCode::MalformedPacket,
                    "malformed remaining length",
                );
                return None;
            }
        };

        match header.packet_type() {
            packet_type::PUBLISH => {
                decode_publish(header.flags(), frame, self).map(Packet::Publish)
            }
            packet_type::DISCONNECT => match Disconnect::parse(&mut frame) {
                Ok(disconnect) => {
                    log::debug!("peer disconnected: {:?}", disconnect.reason_code);
                    self.shutdown();
                    Some(Packet::Disconnect(disconnect))
                }
                Err(err) => {
                    log::trace!("malformed DISCONNECT: {}", err);
                    self.disconnect(
                        DisconnectReasonCode::MalformedPacket,
                        "malformed DISCONNECT",
                    );
                    None
                }
            },
            _ => Some(Packet::Other(header, frame)),
        }
    }

    /// Sends DISCONNECT with `reason_code` and `reason` as reason string, then
    /// closes the transport and forgets the topic aliases.
    pub fn disconnect(&mut self, reason_code: DisconnectReasonCode, reason: &'static str) {
        if self.closed {
            log::warn!("connection is already closed, dropping {:?}", reason_code);
            return;
        }
        log::debug!("disconnecting: {:?}, {}", reason_code, reason);

        let mut buf = BytesMut::new();
        let packet = Packet::Disconnect(Disconnect::with_reason(reason_code, reason));
        match self.codec.encode(packet, &mut buf) {
            Ok(()) => self.transport.send(buf.freeze()),
            Err(err) => log::error!("cannot encode DISCONNECT: {}", err),
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.transport.close();
        self.closed = true;
        self.context.reset();
    }
}
