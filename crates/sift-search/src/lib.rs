//! # sift-search — The Gateway
//!
//! Translates high-level retrieval intents into backend search/aggregation
//! requests, runs them to exhaustion with one of two pagination strategies,
//! and hydrates raw responses into validated records.
//!
//! Control flow: caller intent → [`query`]/[`agg`] spec builders →
//! [`backend::SearchBackend`] → raw response → hydration or the
//! [`agg::walk`] tree walker → domain-typed result.
//!
//! All builders and walkers are pure; the only ordered state is the
//! per-call pagination state machine in [`page`] and [`scroll`], scoped
//! to its own invocation. No retries, no caching, no locks.

pub mod agg;
pub mod backend;
pub mod error;
pub mod page;
pub mod query;
pub mod scroll;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::QueryError;
pub use service::{LogStore, StoreConfig};
