//! Bounded, snapshot-persisted collection of generation jobs.

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use store::{JobStore, DEFAULT_CAPACITY};
