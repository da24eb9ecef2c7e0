//! Media delivery.
//!
//! - **Direct**: original bytes with HTTP range support ([`direct::serve`])
//! - **Live**: transmux or transcode through a single-flight ffmpeg
//!   session piped to the response ([`LiveSessionManager`])

pub mod direct;
mod live;

pub use direct::{content_type_for, parse_range_header};
pub use live::{LiveSessionManager, LiveStream, SessionInfo};
