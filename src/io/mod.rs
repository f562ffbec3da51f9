// src/io/mod.rs
//
// Input side of a capture session: byte sources, line framing and read pacing.

pub mod pacing;
pub mod serial;
pub mod source;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use pacing::PacingPolicy;
pub use source::{ByteSource, ReadOutcome, ReaderSource, ScriptEnd, ScriptedSource};

/// Get current timestamp in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEndReason {
    /// Target record count reached
    Complete,
    /// Source reported end of stream or the device went away
    Disconnected,
    /// Source read failed
    Error,
    /// Stop requested by the host
    Stopped,
}

impl fmt::Display for StreamEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StreamEndReason::Complete => "complete",
            StreamEndReason::Disconnected => "disconnected",
            StreamEndReason::Error => "error",
            StreamEndReason::Stopped => "stopped",
        };
        f.write_str(reason)
    }
}
