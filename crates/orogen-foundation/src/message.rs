//! Message severity levels for host-facing diagnostics.

use serde::{Deserialize, Serialize};

/// Severity of a message delivered through the message sink.
///
/// Levels mirror the classes of output a generation run can produce, from
/// informational script chatter up to the error that aborted the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageLevel {
    /// Ordinary informational output from the script or engine.
    Message,
    /// Advisory output the host may want to de-emphasize.
    Notice,
    /// A recoverable problem; generation continues.
    Warning,
    /// The error that aborted the current generation run.
    Error,
}

impl MessageLevel {
    /// Human-readable label used by the default output sink.
    pub fn label(self) -> &'static str {
        match self {
            MessageLevel::Message => "message",
            MessageLevel::Notice => "notice",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }
}
