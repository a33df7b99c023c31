//! # sift-core — The Record
//!
//! The canonical log record shape and the rules for turning one raw
//! backend hit into a validated [`Record`]. Everything here is a pure
//! function of its input: no I/O, no shared state, no clocks.

pub mod error;
pub mod hydrate;
pub mod record;

pub use error::HydrationError;
pub use hydrate::{hydrate, hydrate_batch, HydratedBatch, HydrationPolicy};
pub use record::Record;
