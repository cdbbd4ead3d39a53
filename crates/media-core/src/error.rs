use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::machine::LoadStatus;

/// Why an asset failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Resource absent, or the server answered with a non-asset fallback page.
    NotFound,
    /// Bytes present but undecodable.
    InvalidFormat,
    /// No success or failure signal within the load budget.
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::NotFound,
        ErrorKind::InvalidFormat,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];

    /// Whether the fallback UI should offer a retry action.
    pub fn allows_retry(self) -> bool {
        matches!(self, Self::Timeout | Self::Unknown)
    }

    /// Text shown in place of the asset.
    pub fn message(self) -> &'static str {
        match self {
            Self::NotFound => "Image unavailable",
            Self::InvalidFormat => "This file format is not supported",
            Self::Timeout => "Loading took too long",
            Self::Unknown => "Failed to load",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidFormat => "invalid_format",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not Found"),
            Self::InvalidFormat => write!(f, "Invalid Format"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// An event that is not valid in the machine's current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {event} while {from}")]
pub struct TransitionError {
    pub from: LoadStatus,
    pub event: &'static str,
}
