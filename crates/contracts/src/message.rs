//! Message - producer input and carrier output
//!
//! Raw messages handed to the daemon and the carrier messages it dispatches.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute marking a carrier message as the fold of several raw messages
pub const ATTRIBUTE_AGGREGATE: &str = "producer.aggregate";

/// Attribute describing how an aggregate body is encoded
pub const ATTRIBUTE_ENCODING: &str = "encoding";

/// Message attributes (insertion order irrelevant)
pub type Attributes = HashMap<String, serde_json::Value>;

/// A batch of carrier messages ready for the sink
pub type Batch = Vec<Message>;

/// Outbound message
///
/// Immutable once handed to the daemon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// String-keyed attributes
    #[serde(default)]
    pub attributes: Attributes,

    /// Opaque payload (zero-copy)
    pub body: Bytes,
}

impl Message {
    /// Create a message without attributes
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            attributes: Attributes::new(),
            body: body.into(),
        }
    }

    /// Add an attribute, builder style
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Whether this carrier message is the fold of several raw messages
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.attributes.get(ATTRIBUTE_AGGREGATE),
            Some(serde_json::Value::Bool(true))
        )
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
