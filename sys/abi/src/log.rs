// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Log level filtering shared by the master and worker log sinks.

use serde::{Deserialize, Serialize};

/// Severity of a log record. Ordered so that `a >= b` means "`a` is at least
/// as severe as `b`" and should pass a filter set to `b`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub const DEFAULT: Self = Self::Info;

    /// Parses a wire-format level byte, falling back to `Info` for any value
    /// outside the known range rather than rejecting the message: a garbled
    /// log-level request should not stop the rest of dispatch.
    pub const fn from_wire(byte: u8) -> Self {
        match byte {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Info,
        }
    }

    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    /// `true` if a record at `self` passes a filter set to `filter`.
    pub const fn passes(self, filter: Self) -> bool {
        self as u8 >= filter as u8
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_severity() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Trace);
    }

    #[test]
    fn passes_filter() {
        assert!(LogLevel::Error.passes(LogLevel::Warn));
        assert!(!LogLevel::Debug.passes(LogLevel::Warn));
        assert!(LogLevel::Warn.passes(LogLevel::Warn));
    }

    #[test]
    fn unknown_wire_byte_defaults_to_info() {
        assert_eq!(LogLevel::from_wire(0xff), LogLevel::Info);
    }
}
