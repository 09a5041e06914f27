//! Traffic classes used to bias admission scheduling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Traffic class of a submitted I/O operation.
///
/// Interactive operations are latency-sensitive foreground work; compaction
/// operations are background work that must still make progress under
/// sustained interactive load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IoClass {
    /// Latency-sensitive, user-facing operations.
    Interactive = 0,
    /// Background compaction operations.
    Compaction = 1,
}

impl IoClass {
    /// Returns the index for array access (0-1).
    #[inline]
    pub fn as_index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for IoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoClass::Interactive => write!(f, "Interactive"),
            IoClass::Compaction => write!(f, "Compaction"),
        }
    }
}
