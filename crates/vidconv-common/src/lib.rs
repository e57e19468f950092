//! vidconv-common: shared types and utilities.
//!
//! - **Typed IDs**: UUID wrappers for conversion jobs and batch sessions
//! - **Path Utilities**: video extension checks, output naming, same-file detection
//!
//! # Examples
//!
//! ```
//! use vidconv_common::{JobId, paths::is_video_file};
//! use std::path::Path;
//!
//! let job_id = JobId::new();
//! assert!(is_video_file(Path::new("clip.mov")));
//! # let _ = job_id;
//! ```

pub mod ids;
pub mod paths;

pub use ids::*;
