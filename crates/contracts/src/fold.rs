//! AggregateFolder trait - turns N raw messages into one carrier message

use crate::{Attributes, FoldError, Message};

/// Folding capability
///
/// `attributes` already contains the aggregate marker and the daemon's static
/// message attributes; implementations stamp them onto the returned message.
pub trait AggregateFolder: Send + Sync {
    /// Fold `messages` (in arrival order) into one carrier message
    ///
    /// # Errors
    /// Returns [`FoldError`] if the aggregate cannot be encoded.
    fn fold(&self, messages: &[Message], attributes: &Attributes) -> Result<Message, FoldError>;
}

impl<F> AggregateFolder for F
where
    F: Fn(&[Message], &Attributes) -> Result<Message, FoldError> + Send + Sync,
{
    fn fold(&self, messages: &[Message], attributes: &Attributes) -> Result<Message, FoldError> {
        self(messages, attributes)
    }
}
