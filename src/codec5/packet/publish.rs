use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::convert::TryFrom;
use std::num::{NonZeroU16, NonZeroU32};

use crate::codec5::{
    connection::{Connection, Transport},
    context::ConnectionContext,
    encode::{
        encode_property, encoded_property_size, var_int_len, write_variable_length, Encode,
        EncodeLtd, MAX_VARIABLE_LENGTH,
    },
    error::{DecodeError, ParseError},
    packet::PropertyId,
    parse::{decode_variable_length_cursor, read_property_table, Parse, Property},
    proto::{PayloadFormatIndicator, QoS},
    ByteStr, UserProperties,
};
use crate::topic::Topic;

/// topic name length (2) + property length (min 1)
const MIN_REMAINING_LENGTH: usize = 3;
const TOPIC_ALIAS_EXCEEDED: DecodeError =
    DecodeError::TopicAliasInvalid("topic alias must not exceed topic alias maximum");

#[derive(Debug, PartialEq, Clone)]
/// Decoded PUBLISH message
pub struct Publish {
    /// this might be re-delivery of an earlier attempt to send the Packet.
    pub dup: bool,
    pub retain: bool,
    /// the level of assurance for delivery of an Application Message.
    pub qos: QoS,
    /// the information channel to which payload data is published.
    ///
    /// Always set, either sent in the packet or resolved through a topic alias.
    pub topic: Topic,
    /// only present in PUBLISH Packets where the QoS level is 1 or 2.
    pub packet_id: Option<u16>,
    /// `None` if the packet carried no payload bytes
    pub payload: Option<Bytes>,
    /// the packet registered `properties.topic_alias` for `topic`
    pub is_new_topic_alias: bool,
    pub properties: PublishProperties,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct PublishProperties {
    /// `None` means the message does not expire
    pub message_expiry_interval: Option<u32>,
    pub payload_format_indicator: Option<PayloadFormatIndicator>,
    pub content_type: Option<ByteStr>,
    pub response_topic: Option<Topic>,
    pub correlation_data: Option<Bytes>,
    pub user_properties: UserProperties,
    pub topic_alias: Option<NonZeroU16>,
    /// in the order they appear in the packet, duplicates included
    pub subscription_ids: Vec<NonZeroU32>,
}

/// Decodes a PUBLISH frame received on `conn`.
///
/// `flags` is the low nibble of the fixed header, `src` the remaining bytes of
/// the frame. On the first violation the connection is disconnected with the
/// matching reason code and `None` is returned.
pub fn decode_publish<T: Transport>(
    flags: u8,
    src: Bytes,
    conn: &mut Connection<T>,
) -> Option<Publish> {
    match Publish::parse(src, flags, conn.context_mut()) {
        Ok(publish) => Some(publish),
        Err(err) => {
            conn.disconnect(err.reason_code(), err.message());
            None
        }
    }
}

fn parse_flags(flags: u8) -> Result<(bool, QoS, bool), DecodeError> {
    let dup = flags & 0b1000 != 0;
    let retain = flags & 0b0001 != 0;
    let qos = QoS::try_from((flags & 0b0110) >> 1)
        .map_err(|_| DecodeError::MalformedPacket("wrong QoS"))?;
    ensure!(
        !(dup && qos == QoS::AtMostOnce),
        DecodeError::ProtocolError("DUP flag must be 0 if QoS is 0")
    );
    Ok((dup, qos, retain))
}

fn property_err(malformed: DecodeError) -> impl FnOnce(ParseError) -> DecodeError {
    move |err| DecodeError::from_property(err, malformed)
}

impl Publish {
    /// Decodes a PUBLISH frame against the state of `ctx`.
    ///
    /// Topic aliases are registered in and resolved from the context's topic alias
    /// mapping. Nothing is sent on failure, see `decode_publish` for that.
    pub fn parse(
        mut src: Bytes,
        flags: u8,
        ctx: &mut ConnectionContext,
    ) -> Result<Publish, DecodeError> {
        let (dup, qos, retain) = parse_flags(flags)?;
        ensure!(
            src.remaining() >= MIN_REMAINING_LENGTH,
            DecodeError::REMAINING_LENGTH_TOO_SHORT
        );

        let topic = Bytes::parse(&mut src)
            .map_err(|_| DecodeError::TopicNameInvalid("malformed topic"))?;
        let topic = if topic.is_empty() {
            None
        } else {
            Some(
                Topic::try_from(topic)
                    .map_err(|_| DecodeError::TopicNameInvalid("malformed topic"))?,
            )
        };

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(u16::parse(&mut src).map_err(|_| DecodeError::REMAINING_LENGTH_TOO_SHORT)?)
        };

        let mut properties = PublishProperties::parse(&mut src)?;
        if !ctx.use_direct_buffer_for_correlation_data() {
            if let Some(data) = properties.correlation_data.as_mut() {
                *data = Bytes::copy_from_slice(data);
            }
        }
        let (topic, is_new_topic_alias) =
            resolve_topic_alias(topic, properties.topic_alias, ctx)?;

        let payload = if src.has_remaining() {
            let payload = if ctx.use_direct_buffer_for_payload() {
                src
            } else {
                Bytes::copy_from_slice(&src)
            };
            if properties.payload_format_indicator == Some(PayloadFormatIndicator::Utf8)
                && ctx.validate_payload_format()
            {
                ensure!(
                    std::str::from_utf8(&payload).is_ok(),
                    DecodeError::PayloadFormatInvalid("payload is not valid UTF-8")
                );
            }
            Some(payload)
        } else {
            None
        };

        log::trace!(
            "decoded PUBLISH: topic {:?}, {:?}, packet id {:?}, {} payload bytes",
            topic.as_str(),
            qos,
            packet_id,
            payload.as_ref().map_or(0, Bytes::len)
        );

        Ok(Publish {
            dup,
            retain,
            qos,
            topic,
            packet_id,
            payload,
            is_new_topic_alias,
            properties,
        })
    }

    /// Topic as written on the wire, `None` for alias-only packets
    fn wire_topic(&self) -> Option<&Topic> {
        if self.properties.topic_alias.is_some() && !self.is_new_topic_alias {
            None
        } else {
            Some(&self.topic)
        }
    }
}

/// Applies a topic alias to the topic parsed from the variable header.
///
/// Returns the topic of the message and whether a new mapping was registered.
fn resolve_topic_alias(
    topic: Option<Topic>,
    alias: Option<NonZeroU16>,
    ctx: &mut ConnectionContext,
) -> Result<(Topic, bool), DecodeError> {
    let alias = match alias {
        Some(alias) => alias,
        None => {
            return topic.map(|topic| (topic, false)).ok_or(DecodeError::TopicAliasInvalid(
                "topic alias must be present if topic name is zero length",
            ))
        }
    };

    let mapping = match ctx.topic_alias_mapping_mut() {
        Some(mapping) if mapping.contains(alias) => mapping,
        _ => return Err(TOPIC_ALIAS_EXCEEDED),
    };

    match topic {
        Some(topic) => {
            ensure!(mapping.set(alias, topic.clone()), TOPIC_ALIAS_EXCEEDED);
            Ok((topic, true))
        }
        None => mapping
            .get(alias)
            .cloned()
            .map(|topic| (topic, false))
            .ok_or(DecodeError::TopicAliasInvalid("topic alias has no mapping")),
    }
}

impl PublishProperties {
    fn parse(src: &mut Bytes) -> Result<PublishProperties, DecodeError> {
        let mut props = PublishProperties::default();

        read_property_table(src, |id, src| match id {
            Some(PropertyId::MessageExpiryInterval) => props
                .message_expiry_interval
                .read_value(src)
                .map_err(property_err(DecodeError::MalformedPacket(
                    "malformed message expiry interval",
                ))),
            Some(PropertyId::PayloadFormatIndicator) => props
                .payload_format_indicator
                .read_value(src)
                .map_err(property_err(DecodeError::MalformedPacket(
                    "wrong payload format indicator",
                ))),
            Some(PropertyId::ContentType) => props.content_type.read_value(src).map_err(
                property_err(DecodeError::MalformedPacket("malformed content type")),
            ),
            Some(PropertyId::ResponseTopic) => props.response_topic.read_value(src).map_err(
                property_err(DecodeError::TopicNameInvalid("malformed response topic")),
            ),
            Some(PropertyId::CorrelationData) => props
                .correlation_data
                .read_value(src)
                .map_err(property_err(DecodeError::MalformedPacket(
                    "malformed correlation data",
                ))),
            Some(PropertyId::UserProperty) => props.user_properties.read_value(src).map_err(
                property_err(DecodeError::MalformedPacket("malformed user property")),
            ),
            Some(PropertyId::TopicAlias) => {
                ensure!(props.topic_alias.is_none(), DecodeError::DUPLICATE_PROPERTY);
                let alias = u16::parse(src)
                    .map_err(|_| DecodeError::MalformedPacket("malformed topic alias"))?;
                props.topic_alias = Some(
                    NonZeroU16::new(alias)
                        .ok_or(DecodeError::TopicAliasInvalid("topic alias must not be 0"))?,
                );
                Ok(())
            }
            Some(PropertyId::SubscriptionIdentifier) => {
                let id = decode_variable_length_cursor(src).map_err(|_| {
                    DecodeError::MalformedPacket("malformed subscription identifier")
                })?;
                props.subscription_ids.push(NonZeroU32::new(id).ok_or(
                    DecodeError::ProtocolError("subscription identifier must not be 0"),
                )?);
                Ok(())
            }
            _ => Err(DecodeError::ProtocolError("wrong property for PUBLISH")),
        })?;

        Ok(props)
    }

    fn encoded_size(&self) -> usize {
        let subscription_ids_len: usize = self
            .subscription_ids
            .iter()
            .map(|id| 1 + var_int_len(id.get() as usize) as usize)
            .sum();

        encoded_property_size(&self.payload_format_indicator)
            + encoded_property_size(&self.message_expiry_interval)
            + encoded_property_size(&self.topic_alias)
            + encoded_property_size(&self.content_type)
            + encoded_property_size(&self.response_topic)
            + encoded_property_size(&self.correlation_data)
            + self.user_properties.encoded_size()
            + subscription_ids_len
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ParseError> {
        encode_property(
            &self.payload_format_indicator,
            PropertyId::PayloadFormatIndicator,
            buf,
        )?;
        encode_property(
            &self.message_expiry_interval,
            PropertyId::MessageExpiryInterval,
            buf,
        )?;
        encode_property(&self.topic_alias, PropertyId::TopicAlias, buf)?;
        encode_property(&self.content_type, PropertyId::ContentType, buf)?;
        encode_property(&self.response_topic, PropertyId::ResponseTopic, buf)?;
        encode_property(&self.correlation_data, PropertyId::CorrelationData, buf)?;
        self.user_properties.encode(buf)?;
        for id in self.subscription_ids.iter() {
            ensure!(id.get() <= MAX_VARIABLE_LENGTH, ParseError::InvalidLength);
            buf.put_u8(PropertyId::SubscriptionIdentifier.into());
            write_variable_length(id.get(), buf);
        }
        Ok(())
    }
}

impl EncodeLtd for Publish {
    fn encoded_size(&self, _limit: u32) -> usize {
        let topic_len = 2 + self.wire_topic().map_or(0, |topic| topic.len());
        let packet_id_len = if self.qos == QoS::AtMostOnce { 0 } else { 2 };
        let prop_len = self.properties.encoded_size();
        let payload_len = self.payload.as_ref().map_or(0, Bytes::len);
        topic_len + packet_id_len + var_int_len(prop_len) as usize + prop_len + payload_len
    }

    fn encode(&self, buf: &mut BytesMut, _size: u32) -> Result<(), ParseError> {
        match self.wire_topic() {
            Some(topic) => topic.encode(buf)?,
            None => buf.put_u16(0),
        }
        if self.qos != QoS::AtMostOnce {
            let packet_id = self.packet_id.ok_or(ParseError::PacketIdRequired)?;
            packet_id.encode(buf)?;
        }
        let prop_len = self.properties.encoded_size();
        ensure!(prop_len <= MAX_VARIABLE_LENGTH as usize, ParseError::InvalidLength);
        write_variable_length(prop_len as u32, buf);
        self.properties.encode(buf)?;
        if let Some(payload) = self.payload.as_ref() {
            buf.extend_from_slice(payload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec5::context::ConnectionConfig;
    use crate::codec5::packet::Packet;

    const QOS0: u8 = 0b0000;
    const QOS1: u8 = 0b0010;
    const QOS2: u8 = 0b0100;
    const DUP: u8 = 0b1000;
    const RETAIN: u8 = 0b0001;

    fn ctx(topic_alias_maximum: u16) -> ConnectionContext {
        let config = ConnectionConfig::default().topic_alias_maximum(topic_alias_maximum);
        ConnectionContext::new(&config)
    }

    fn alias(v: u16) -> NonZeroU16 {
        NonZeroU16::new(v).unwrap()
    }

    fn topic(s: &'static str) -> Topic {
        Topic::from_static(s).unwrap()
    }

    fn parse(flags: u8, src: &[u8], ctx: &mut ConnectionContext) -> Result<Publish, DecodeError> {
        Publish::parse(Bytes::copy_from_slice(src), flags, ctx)
    }

    /// QoS 0 frame with topic "a", the given property table and payload
    fn frame_with_props(props: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut frame = b"\x00\x01a".to_vec();
        assert!(props.len() < 128);
        frame.push(props.len() as u8);
        frame.extend_from_slice(props);
        frame.extend_from_slice(payload);
        frame
    }

    fn singular_properties() -> Vec<&'static [u8]> {
        vec![
            &b"\x02\x00\x00\x00\x0a"[..],
            &b"\x01\x01"[..],
            &b"\x03\x00\x01x"[..],
            &b"\x08\x00\x01r"[..],
            &b"\x09\x00\x01\xff"[..],
            &b"\x23\x00\x01"[..],
        ]
    }

    #[test]
    fn test_decode_qos0_publish() {
        let publish = parse(QOS0, b"\x00\x03a/b\x00hi", &mut ctx(0)).unwrap();
        assert_eq!(
            publish,
            Publish {
                dup: false,
                retain: false,
                qos: QoS::AtMostOnce,
                topic: topic("a/b"),
                packet_id: None,
                payload: Some(Bytes::from_static(b"hi")),
                is_new_topic_alias: false,
                properties: PublishProperties::default(),
            }
        );
    }

    #[test]
    fn test_decode_flags() {
        let publish = parse(QOS2 | DUP | RETAIN, b"\x00\x05topic\x43\x21\x00data", &mut ctx(0))
            .unwrap();
        assert!(publish.dup);
        assert!(publish.retain);
        assert_eq!(publish.qos, QoS::ExactlyOnce);
        assert_eq!(publish.packet_id, Some(0x4321));
        assert_eq!(publish.payload, Some(Bytes::from_static(b"data")));

        for qos in &[QOS1, QOS2] {
            let publish = parse(qos | DUP, b"\x00\x01a\x00\x01\x00", &mut ctx(0)).unwrap();
            assert!(publish.dup);
        }

        assert_eq!(
            parse(QOS0 | DUP, b"\x00\x01a\x00", &mut ctx(0)),
            Err(DecodeError::ProtocolError("DUP flag must be 0 if QoS is 0"))
        );
    }

    #[test]
    fn test_wrong_qos_checked_first() {
        for flags in &[0b0110, 0b0111, 0b1110, 0b1111] {
            assert_eq!(
                parse(*flags, b"", &mut ctx(0)),
                Err(DecodeError::MalformedPacket("wrong QoS"))
            );
        }
    }

    #[test]
    fn test_variable_header_errors() {
        assert_eq!(
            parse(QOS0, b"\x00\x01", &mut ctx(0)),
            Err(DecodeError::REMAINING_LENGTH_TOO_SHORT)
        );
        assert_eq!(
            parse(QOS0, b"\x00\x09ab\x00", &mut ctx(0)),
            Err(DecodeError::TopicNameInvalid("malformed topic"))
        );
        assert_eq!(
            parse(QOS0, b"\x00\x03a/+\x00", &mut ctx(0)),
            Err(DecodeError::TopicNameInvalid("malformed topic"))
        );
        assert_eq!(
            parse(QOS0, b"\x00\x02\xc3\x28\x00", &mut ctx(0)),
            Err(DecodeError::TopicNameInvalid("malformed topic"))
        );
        assert_eq!(
            parse(QOS1, b"\x00\x01a", &mut ctx(0)),
            Err(DecodeError::REMAINING_LENGTH_TOO_SHORT)
        );

        // packet identifier 0 is passed on as received
        let publish = parse(QOS1, b"\x00\x01a\x00\x00\x00", &mut ctx(0)).unwrap();
        assert_eq!(publish.packet_id, Some(0));
        assert_eq!(publish.qos, QoS::AtLeastOnce);
    }

    #[test]
    fn test_decode_all_properties() {
        let props: &[u8] = b"\x02\x00\x00\x00\x00\
\x01\x01\
\x03\x00\x04text\
\x08\x00\x05reply\
\x09\x00\x02\x01\x02\
\x26\x00\x01k\x00\x01v\
\x0b\x05\
\x26\x00\x01k\x00\x01w\
\x0b\x81\x01\
\x0b\x05";
        let frame = frame_with_props(props, b"payload");
        let publish = parse(QOS0, &frame, &mut ctx(0)).unwrap();

        assert_eq!(
            publish.properties,
            PublishProperties {
                message_expiry_interval: Some(0),
                payload_format_indicator: Some(PayloadFormatIndicator::Utf8),
                content_type: Some(ByteStr::from_static("text")),
                response_topic: Some(topic("reply")),
                correlation_data: Some(Bytes::from_static(b"\x01\x02")),
                user_properties: vec![
                    (ByteStr::from_static("k"), ByteStr::from_static("v")),
                    (ByteStr::from_static("k"), ByteStr::from_static("w")),
                ],
                topic_alias: None,
                subscription_ids: vec![
                    NonZeroU32::new(5).unwrap(),
                    NonZeroU32::new(129).unwrap(),
                    NonZeroU32::new(5).unwrap(),
                ],
            }
        );
        assert_eq!(publish.payload, Some(Bytes::from_static(b"payload")));

        let publish = parse(QOS0, &frame_with_props(b"", b""), &mut ctx(0)).unwrap();
        assert_eq!(publish.properties.message_expiry_interval, None);
        assert_eq!(publish.payload, None);
    }

    #[test]
    fn test_singular_property_twice() {
        for prop in singular_properties() {
            let mut props = prop.to_vec();
            props.extend_from_slice(prop);
            assert_eq!(
                parse(QOS0, &frame_with_props(&props, b""), &mut ctx(5)),
                Err(DecodeError::DUPLICATE_PROPERTY),
                "property {:#04x}",
                prop[0]
            );
        }
    }

    #[test]
    fn test_property_length_mismatch() {
        let mut props = singular_properties();
        props.push(b"\x26\x00\x01k\x00\x01v");
        props.push(b"\x0b\x05");

        for prop in props {
            // declared length ends inside the property
            let mut frame = b"\x00\x01a".to_vec();
            frame.push(prop.len() as u8 - 1);
            frame.extend_from_slice(prop);
            match parse(QOS0, &frame, &mut ctx(5)) {
                Err(DecodeError::MalformedPacket(_)) => (),
                res => panic!("property {:#04x}: {:?}", prop[0], res),
            }

            // declared length runs past the frame
            let mut frame = b"\x00\x01a".to_vec();
            frame.push(prop.len() as u8 + 1);
            frame.extend_from_slice(prop);
            match parse(QOS0, &frame, &mut ctx(5)) {
                Err(DecodeError::MalformedPacket(_)) => (),
                res => panic!("property {:#04x}: {:?}", prop[0], res),
            }
        }

        assert_eq!(
            parse(QOS0, b"\x00\x01a\x80", &mut ctx(0)),
            Err(DecodeError::MALFORMED_PROPERTY_LENGTH)
        );
    }

    #[test]
    fn test_property_value_errors() {
        let cases: Vec<(&[u8], DecodeError)> = vec![
            (
                &b"\x01\x02"[..],
                DecodeError::MalformedPacket("wrong payload format indicator"),
            ),
            (
                &b"\x08\x00\x03a/#"[..],
                DecodeError::TopicNameInvalid("malformed response topic"),
            ),
            (
                &b"\x0b\x00"[..],
                DecodeError::ProtocolError("subscription identifier must not be 0"),
            ),
            (
                &b"\x11\x00\x00\x00\x01"[..],
                DecodeError::ProtocolError("wrong property for PUBLISH"),
            ),
            (
                &b"\x04\x00"[..],
                DecodeError::ProtocolError("wrong property for PUBLISH"),
            ),
        ];
        for (props, err) in cases {
            assert_eq!(parse(QOS0, &frame_with_props(props, b""), &mut ctx(0)), Err(err));
        }
    }

    #[test]
    fn test_topic_alias_zero() {
        for max in &[0, 1, 10] {
            assert_eq!(
                parse(QOS0, &frame_with_props(b"\x23\x00\x00", b""), &mut ctx(*max)),
                Err(DecodeError::TopicAliasInvalid("topic alias must not be 0"))
            );
        }
    }

    #[test]
    fn test_topic_alias_round_trip() {
        let mut ctx = ctx(10);

        let publish = parse(QOS1, b"\x00\x02t1\x00\x05\x03\x23\x00\x01", &mut ctx).unwrap();
        assert_eq!(publish.topic, topic("t1"));
        assert_eq!(publish.packet_id, Some(5));
        assert_eq!(publish.properties.topic_alias, Some(alias(1)));
        assert!(publish.is_new_topic_alias);
        assert_eq!(publish.payload, None);
        assert_eq!(
            ctx.topic_alias_mapping().unwrap().get(alias(1)),
            Some(&topic("t1"))
        );

        let publish = parse(QOS1, b"\x00\x00\x00\x06\x03\x23\x00\x01", &mut ctx).unwrap();
        assert_eq!(publish.topic, topic("t1"));
        assert_eq!(publish.packet_id, Some(6));
        assert!(!publish.is_new_topic_alias);

        // redefine
        let publish = parse(QOS0, b"\x00\x02t2\x03\x23\x00\x01", &mut ctx).unwrap();
        assert!(publish.is_new_topic_alias);
        let publish = parse(QOS0, b"\x00\x00\x03\x23\x00\x01", &mut ctx).unwrap();
        assert_eq!(publish.topic, topic("t2"));
    }

    #[test]
    fn test_topic_alias_errors() {
        assert_eq!(
            parse(QOS0, b"\x00\x00\x03\x23\x00\x02", &mut ctx(2)),
            Err(DecodeError::TopicAliasInvalid("topic alias has no mapping"))
        );
        assert_eq!(
            parse(QOS0, b"\x00\x01a\x03\x23\x00\x03", &mut ctx(2)),
            Err(DecodeError::TopicAliasInvalid(
                "topic alias must not exceed topic alias maximum"
            ))
        );
        assert_eq!(
            parse(QOS0, b"\x00\x01a\x03\x23\x00\x01", &mut ctx(0)),
            Err(DecodeError::TopicAliasInvalid(
                "topic alias must not exceed topic alias maximum"
            ))
        );
        assert_eq!(
            parse(QOS0, b"\x00\x00\x00", &mut ctx(2)),
            Err(DecodeError::TopicAliasInvalid(
                "topic alias must be present if topic name is zero length"
            ))
        );
    }

    #[test]
    fn test_payload_format_validation() {
        let frame = frame_with_props(b"\x01\x01", b"ok \xff\xfe");
        let mut validating = ConnectionContext::new(
            &ConnectionConfig::default().validate_payload_format(true),
        );

        assert_eq!(
            parse(QOS0, &frame, &mut validating),
            Err(DecodeError::PayloadFormatInvalid("payload is not valid UTF-8"))
        );
        let publish = parse(QOS0, &frame, &mut ctx(0)).unwrap();
        assert_eq!(publish.payload, Some(Bytes::from_static(b"ok \xff\xfe")));

        // only payloads flagged as UTF-8 are checked
        let frame = frame_with_props(b"\x01\x00", b"\xff");
        assert!(parse(QOS0, &frame, &mut validating).is_ok());
        let frame = frame_with_props(b"", b"\xff");
        assert!(parse(QOS0, &frame, &mut validating).is_ok());
        let frame = frame_with_props(b"\x01\x01", "h\u{e9}".as_bytes());
        assert!(parse(QOS0, &frame, &mut validating).is_ok());
    }

    #[test]
    fn test_payload_buffer_policy() {
        let frame = Bytes::from(frame_with_props(b"", b"payload"));
        let payload_ptr = frame[frame.len() - 7..].as_ptr();

        let mut direct = ConnectionContext::new(
            &ConnectionConfig::default().use_direct_buffer_for_payload(true),
        );
        let publish = Publish::parse(frame.clone(), QOS0, &mut direct).unwrap();
        assert_eq!(publish.payload.as_ref().unwrap().as_ptr(), payload_ptr);

        let publish = Publish::parse(frame, QOS0, &mut ctx(0)).unwrap();
        let payload = publish.payload.unwrap();
        assert_eq!(payload, Bytes::from_static(b"payload"));
        assert_ne!(payload.as_ptr(), payload_ptr);
    }

    #[test]
    fn test_correlation_data_buffer_policy() {
        let frame = Bytes::from(frame_with_props(b"\x09\x00\x03cid", b"hi"));
        let data_ptr = frame[7..10].as_ptr();
        assert_eq!(&frame[7..10], b"cid");

        let mut direct = ConnectionContext::new(
            &ConnectionConfig::default().use_direct_buffer_for_correlation_data(true),
        );
        let publish = Publish::parse(frame.clone(), QOS0, &mut direct).unwrap();
        let data = publish.properties.correlation_data.unwrap();
        assert_eq!(data.as_ptr(), data_ptr);
        // payload keeps its own policy
        assert_ne!(publish.payload.unwrap().as_ptr(), frame[10..].as_ptr());

        let publish = Publish::parse(frame.clone(), QOS0, &mut ctx(0)).unwrap();
        let data = publish.properties.correlation_data.unwrap();
        assert_eq!(data, Bytes::from_static(b"cid"));
        assert_ne!(data.as_ptr(), data_ptr);
        assert_ne!(publish.payload.unwrap().as_ptr(), frame[10..].as_ptr());
    }

    #[test]
    fn test_encode_publish() {
        let mut publish = Publish {
            dup: false,
            retain: true,
            qos: QoS::AtLeastOnce,
            topic: topic("t1"),
            packet_id: Some(7),
            payload: Some(Bytes::from_static(b"hi")),
            is_new_topic_alias: true,
            properties: PublishProperties {
                topic_alias: Some(alias(1)),
                subscription_ids: vec![NonZeroU32::new(300).unwrap()],
                ..PublishProperties::default()
            },
        };

        let mut buf = BytesMut::new();
        let packet = Packet::Publish(publish.clone());
        packet
            .encode(&mut buf, packet.encoded_size(1024) as u32)
            .unwrap();
        assert_eq!(
            buf.as_ref(),
            &b"\x33\x0f\x00\x02t1\x00\x07\x06\x23\x00\x01\x0b\xac\x02hi"[..]
        );

        // alias-only publish is written without topic
        publish.is_new_topic_alias = false;
        buf.clear();
        let packet = Packet::Publish(publish.clone());
        packet
            .encode(&mut buf, packet.encoded_size(1024) as u32)
            .unwrap();
        assert_eq!(
            buf.as_ref(),
            &b"\x33\x0d\x00\x00\x00\x07\x06\x23\x00\x01\x0b\xac\x02hi"[..]
        );

        publish.packet_id = None;
        let packet = Packet::Publish(publish);
        assert_eq!(
            packet.encode(&mut buf, packet.encoded_size(1024) as u32),
            Err(ParseError::PacketIdRequired)
        );
    }
}
