use std::num::NonZeroU16;

use crate::topic::Topic;

/// Per-connection decoder settings
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub(crate) topic_alias_maximum: u16,
    pub(crate) validate_payload_format: bool,
    pub(crate) use_direct_buffer_for_payload: bool,
    pub(crate) use_direct_buffer_for_correlation_data: bool,
    pub(crate) max_size: u32,
    pub(crate) max_packet_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            topic_alias_maximum: 0,
            validate_payload_format: false,
            use_direct_buffer_for_payload: false,
            use_direct_buffer_for_correlation_data: false,
            max_size: 0,
            max_packet_size: 0,
        }
    }
}

impl ConnectionConfig {
    /// Topic alias maximum negotiated for the server-to-client direction.
    ///
    /// `0` disables topic aliases, any alias received is then invalid.
    pub fn topic_alias_maximum(mut self, max: u16) -> Self {
        self.topic_alias_maximum = max;
        self
    }

    /// Check payloads flagged as UTF-8 by the payload format indicator
    pub fn validate_payload_format(mut self, val: bool) -> Self {
        self.validate_payload_format = val;
        self
    }

    /// Hand out payloads as slices of the received frame instead of copying them
    /// into their own allocation.
    ///
    /// Slices keep the whole frame buffer alive for as long as the payload lives.
    pub fn use_direct_buffer_for_payload(mut self, val: bool) -> Self {
        self.use_direct_buffer_for_payload = val;
        self
    }

    /// Same as `use_direct_buffer_for_payload` for the correlation data property
    pub fn use_direct_buffer_for_correlation_data(mut self, val: bool) -> Self {
        self.use_direct_buffer_for_correlation_data = val;
        self
    }

    /// Set max inbound packet size, `0` is unlimited
    pub fn max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Maximum Packet Size announced by the server.
    ///
    /// Outgoing packets drop optional properties to stay within it. `0` means
    /// the protocol maximum.
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }
}

/// Topic alias table for inbound PUBLISH packets.
///
/// Slot `alias - 1` holds the topic last registered for `alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicAliasMapping {
    topics: Vec<Option<Topic>>,
}

impl TopicAliasMapping {
    pub fn new(topic_alias_maximum: u16) -> Self {
        TopicAliasMapping {
            topics: vec![None; topic_alias_maximum as usize],
        }
    }

    /// Topic alias maximum
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// `true` if `alias` lies within the topic alias maximum
    pub fn contains(&self, alias: NonZeroU16) -> bool {
        usize::from(alias.get()) <= self.topics.len()
    }

    pub fn get(&self, alias: NonZeroU16) -> Option<&Topic> {
        self.topics
            .get(usize::from(alias.get()) - 1)
            .and_then(Option::as_ref)
    }

    /// Registers `topic` for `alias`, replacing a previous mapping.
    ///
    /// Returns `false` if `alias` exceeds the topic alias maximum.
    pub fn set(&mut self, alias: NonZeroU16, topic: Topic) -> bool {
        match self.topics.get_mut(usize::from(alias.get()) - 1) {
            Some(slot) => {
                *slot = Some(topic);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for slot in self.topics.iter_mut() {
            *slot = None;
        }
    }
}

/// Mutable per-connection state used by the PUBLISH decoder
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionContext {
    topic_alias_mapping: Option<TopicAliasMapping>,
    validate_payload_format: bool,
    use_direct_buffer_for_payload: bool,
    use_direct_buffer_for_correlation_data: bool,
}

impl ConnectionContext {
    pub fn new(config: &ConnectionConfig) -> Self {
        let topic_alias_mapping = if config.topic_alias_maximum == 0 {
            None
        } else {
            Some(TopicAliasMapping::new(config.topic_alias_maximum))
        };
        ConnectionContext {
            topic_alias_mapping,
            validate_payload_format: config.validate_payload_format,
            use_direct_buffer_for_payload: config.use_direct_buffer_for_payload,
            use_direct_buffer_for_correlation_data: config.use_direct_buffer_for_correlation_data,
        }
    }

    pub fn topic_alias_mapping(&self) -> Option<&TopicAliasMapping> {
        self.topic_alias_mapping.as_ref()
    }

    pub fn topic_alias_mapping_mut(&mut self) -> Option<&mut TopicAliasMapping> {
        self.topic_alias_mapping.as_mut()
    }

    pub fn validate_payload_format(&self) -> bool {
        self.validate_payload_format
    }

    pub fn use_direct_buffer_for_payload(&self) -> bool {
        self.use_direct_buffer_for_payload
    }

    pub fn use_direct_buffer_for_correlation_data(&self) -> bool {
        self.use_direct_buffer_for_correlation_data
    }

    /// Forgets all topic aliases, the table keeps its size
    pub(crate) fn reset(&mut self) {
        if let Some(mapping) = self.topic_alias_mapping.as_mut() {
            mapping.clear();
        }
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        ConnectionContext::new(&ConnectionConfig::default())
    }
}
