use bytes::Bytes;
use bytestring::ByteString;
use derive_more::Display;
use std::convert::TryFrom;
use std::{fmt, ops::Deref};

/// Max encoded length of a topic name
const MAX_TOPIC_LEN: usize = u16::MAX as usize;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    #[display(fmt = "topic name must not be empty")]
    Empty,
    #[display(fmt = "topic name is too long")]
    TooLong,
    #[display(fmt = "topic name is not valid UTF-8")]
    InvalidUtf8,
    #[display(fmt = "topic name must not contain wildcard characters")]
    Wildcard,
    #[display(fmt = "topic name must not contain the null character")]
    NullCharacter,
}

impl std::error::Error for TopicError {}

/// Validated topic name.
///
/// Backed by a reference counted buffer, so clones handed out of the topic alias
/// mapping share the received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic(ByteString);

impl Topic {
    /// Levels of the topic, split on `/`. Empty levels are allowed.
    pub fn levels(&self) -> std::str::Split<'_, char> {
        self.0.split('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> ByteString {
        self.0
    }

    fn validate(s: &str) -> Result<(), TopicError> {
        if s.is_empty() {
            return Err(TopicError::Empty);
        }
        if s.len() > MAX_TOPIC_LEN {
            return Err(TopicError::TooLong);
        }
        for c in s.chars() {
            match c {
                '+' | '#' => return Err(TopicError::Wildcard),
                '\u{0}' => return Err(TopicError::NullCharacter),
                _ => {}
            }
        }
        Ok(())
    }

    /// Builds a topic from a static string, checking the topic name rules.
    pub fn from_static(s: &'static str) -> Result<Self, TopicError> {
        Topic::validate(s)?;
        Ok(Topic(ByteString::from_static(s)))
    }
}

impl TryFrom<Bytes> for Topic {
    type Error = TopicError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let s = ByteString::try_from(bytes).map_err(|_| TopicError::InvalidUtf8)?;
        Topic::try_from(s)
    }
}

impl TryFrom<ByteString> for Topic {
    type Error = TopicError;

    fn try_from(s: ByteString) -> Result<Self, Self::Error> {
        Topic::validate(&s)?;
        Ok(Topic(s))
    }
}

impl TryFrom<&str> for Topic {
    type Error = TopicError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Topic::validate(s)?;
        Ok(Topic(ByteString::from(s.to_owned())))
    }
}

impl Deref for Topic {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
