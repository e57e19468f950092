//! Media file probing.
//!
//! Metadata comes from the ffprobe CLI. The encoder uses it to validate a
//! source before dispatch and to learn the duration for progress reporting
//! and size-targeted bitrates.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use types::*;
