//! Domain types and local media processing for the lipsync generation server.
//!
//! No HTTP or storage backends live here; those are in the sibling crates.

pub mod aiff;
pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod normalize;
pub mod paths;
pub mod sweep;
pub mod types;
pub mod validation;
