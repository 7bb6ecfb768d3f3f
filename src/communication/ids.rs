//! Identity of endpoints, messages and pending uploads.

use crate::communication::CommunicationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// A participant in the message exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Result<Self, CommunicationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommunicationError::InvalidEndpointId);
        }
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EndpointId {
    type Error = CommunicationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointId> for String {
    fn from(value: EndpointId) -> Self {
        value.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a single message. [`MessageId::NONE`] stands for "no message".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Ulid);

impl MessageId {
    pub const NONE: MessageId = MessageId(Ulid(0));

    /// A fresh id. Its timestamp part keeps it distinct from [`MessageId::NONE`].
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Ticket for a file that is waiting to be pulled by a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(Ulid);

impl UploadToken {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for UploadToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
