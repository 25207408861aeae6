//! Blob storage for source media the generation service fetches by URL.
//!
//! Local files are uploaded to an S3-compatible bucket (Cloudflare R2) and
//! exposed through time-limited presigned GET URLs.

pub mod config;
pub mod storage;

pub use config::R2Config;
pub use storage::{object_key, BlobStorage, R2Storage, StorageError};
