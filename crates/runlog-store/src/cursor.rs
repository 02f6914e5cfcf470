//! Read positions into a run's log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position marker into a run's log.
///
/// A cursor counts the records a consumer has already seen; a read with
/// cursor `c` returns everything after the first `c.consumed()` records.
/// Both backends share this convention, so [`Cursor::BEGINNING`] always
/// means "from the start".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    /// Nothing consumed yet.
    pub const BEGINNING: Cursor = Cursor(0);

    /// Cursor after `consumed` records.
    pub const fn new(consumed: u64) -> Self {
        Cursor(consumed)
    }

    /// Cursor for a consumer that has seen the record at zero-based
    /// `position` and everything before it.
    pub const fn after(position: u64) -> Self {
        Cursor(position + 1)
    }

    /// Number of records already consumed.
    pub const fn consumed(self) -> u64 {
        self.0
    }

    /// Cursor moved past `count` more records.
    pub const fn advance(self, count: u64) -> Self {
        Cursor(self.0 + count)
    }

    /// Returns `true` if nothing has been consumed.
    pub const fn is_beginning(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Cursor {
    fn from(consumed: u64) -> Self {
        Cursor(consumed)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
