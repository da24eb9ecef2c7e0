//! Media file probing.
//!
//! Only the ffprobe CLI backend is supported; it is invoked through
//! [`crate::ToolCommand`] and its JSON output is mapped onto
//! [`MediaDescription`].

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe, FFPROBE_ARGS};
pub use types::*;

#[cfg(test)]
pub(crate) use types::fixtures;
