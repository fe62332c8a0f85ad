//! Source location tracking for error reporting.
//!
//! Every instruction and every rendering step carries the script position it
//! originated from, so any failure surfaced to the host can be attributed to
//! a line and column even when it fires deep inside a generation run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A line/column position in the compiled script's source text.
///
/// Locations are attached by the compiler front end and flow through
/// instructions into rendering steps unchanged. Positions are 1-based;
/// a line of `-1` marks a location outside any script line (engine-internal
/// operations, host-driven calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    /// 1-based source line, or -1 for no line.
    pub line: i32,
    /// 1-based source column, or -1 for no column.
    pub column: i32,
}

impl CodeLocation {
    /// Location for operations that do not originate from script text.
    pub const UNKNOWN: CodeLocation = CodeLocation {
        line: -1,
        column: -1,
    };

    /// Create a location from 1-based line and column.
    pub fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }

    /// Whether this location points at actual script text.
    pub fn is_known(&self) -> bool {
        self.line >= 0
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "line {}, column {}", self.line, self.column)
        } else {
            write!(f, "unknown location")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_known() {
        assert_eq!(CodeLocation::new(12, 3).to_string(), "line 12, column 3");
    }

    #[test]
    fn test_display_unknown() {
        assert_eq!(CodeLocation::UNKNOWN.to_string(), "unknown location");
        assert!(!CodeLocation::UNKNOWN.is_known());
    }
}
