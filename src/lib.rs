//! Subtitle overlay engine: reads SRT files and works out which captions
//! should be on screen for a given playback position.

pub mod error;
pub mod parser;
pub mod resolver;
pub mod sanitiser;
pub mod session;
pub mod srt;

pub use crate::error::{ParseAnomaly, SessionError, TimestampError};
pub use crate::parser::{parse_timestamp, Parser};
pub use crate::resolver::{active_text, scan_start};
pub use crate::sanitiser::sanitise;
pub use crate::session::{RenderSink, Session, SessionConfig, TimeSource};
pub use crate::srt::{SubtitleRecord, SubtitleTrack};
