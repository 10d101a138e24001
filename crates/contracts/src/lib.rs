//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the producer daemon
//! workspace: the message model, daemon settings, the sink / folding / metrics
//! capabilities and the error taxonomy.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Message Model
//! - A [`Message`] is an opaque payload plus string-keyed attributes
//! - A carrier message is either a raw message or an aggregate, marked with
//!   [`ATTRIBUTE_AGGREGATE`]

mod config;
mod error;
mod fold;
mod message;
mod metric;
mod settings;
mod sink;

pub use config::*;
pub use error::*;
pub use fold::*;
pub use message::*;
pub use metric::*;
pub use settings::*;
pub use sink::*;
