//! JSON folding capability
//!
//! An aggregate body is a JSON array of `{ "attributes": {...}, "body": "..." }`
//! entries in arrival order.

use contracts::{
    AggregateFolder, Attributes, FoldError, Message, ATTRIBUTE_ENCODING,
};
use serde::{Deserialize, Serialize};

/// Encoding attribute value stamped onto JSON aggregates
pub const ENCODING_JSON: &str = "application/json";

#[derive(Serialize)]
struct EntryRef<'a> {
    attributes: &'a Attributes,
    body: &'a str,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    attributes: Attributes,
    body: String,
}

/// Default folding capability
///
/// Requires UTF-8 payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAggregateFolder;

impl AggregateFolder for JsonAggregateFolder {
    fn fold(&self, messages: &[Message], attributes: &Attributes) -> Result<Message, FoldError> {
        if messages.is_empty() {
            return Err(FoldError::Empty);
        }

        let entries = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| {
                let body = std::str::from_utf8(&msg.body).map_err(|e| FoldError::Encode {
                    message: format!("body of message {idx} is not valid utf-8"),
                    source: Some(Box::new(e)),
                })?;
                Ok(EntryRef {
                    attributes: &msg.attributes,
                    body,
                })
            })
            .collect::<Result<Vec<_>, FoldError>>()?;

        let body = serde_json::to_vec(&entries).map_err(|e| FoldError::Encode {
            message: format!("json error: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut attributes = attributes.clone();
        attributes.insert(ATTRIBUTE_ENCODING.to_string(), ENCODING_JSON.into());

        Ok(Message {
            attributes,
            body: body.into(),
        })
    }
}

/// Reverse a JSON aggregate into its raw messages
///
/// A message that is not an aggregate is returned as-is.
///
/// # Errors
/// Returns [`FoldError::Decode`] if the body is not a JSON aggregate.
pub fn unpack_aggregate(message: &Message) -> Result<Vec<Message>, FoldError> {
    if !message.is_aggregate() {
        return Ok(vec![message.clone()]);
    }

    let entries: Vec<Entry> = serde_json::from_slice(&message.body).map_err(|e| FoldError::Decode {
        message: format!("json error: {e}"),
        source: Some(Box::new(e)),
    })?;

    Ok(entries
        .into_iter()
        .map(|entry| Message {
            attributes: entry.attributes,
            body: entry.body.into(),
        })
        .collect())
}
