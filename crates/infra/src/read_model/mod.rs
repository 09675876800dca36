//! Disposable read-model storage.
//!
//! Read models are queryable state derived from the event streams. They can
//! be deleted and rebuilt at any time; events are the source of truth.

pub mod store;

pub use store::{InMemoryReadStore, ReadStore};
