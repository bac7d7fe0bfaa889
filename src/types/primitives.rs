use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically non-decreasing election epoch.
///
/// Terms act as logical clocks and are used to detect stale leaders and
/// candidates. A server adopts any higher term it observes, in requests
/// and responses alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term {
    value: u32,
}

impl Term {
    pub const ZERO: Term = Term { value: 0 };

    pub const fn new(value: u32) -> Term {
        Term { value }
    }

    pub const fn get(self) -> u32 {
        self.value
    }

    pub const fn next(self) -> Term {
        Term {
            value: self.value.saturating_add(1),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.value)
    }
}

impl From<u32> for Term {
    fn from(value: u32) -> Self {
        Term { value }
    }
}

/// 1-based log index.
///
/// Index 0 addresses the sentinel entry, which exists from first
/// initialization onward and is always considered committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogIndex {
    value: u32,
}

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex { value: 0 };

    pub const fn new(value: u32) -> LogIndex {
        LogIndex { value }
    }

    pub const fn get(self) -> u32 {
        self.value
    }

    pub const fn next(self) -> LogIndex {
        LogIndex {
            value: self.value.saturating_add(1),
        }
    }

    pub const fn prev(self) -> Option<LogIndex> {
        if self.value == 0 {
            None
        } else {
            Some(LogIndex {
                value: self.value - 1,
            })
        }
    }

    pub const fn advanced_by(self, n: u32) -> LogIndex {
        LogIndex {
            value: self.value.saturating_add(n),
        }
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.value)
    }
}

impl From<u32> for LogIndex {
    fn from(value: u32) -> Self {
        LogIndex { value }
    }
}

/// Bus node identifier. Unicast identifiers are in 1..=127; 0 means
/// "no node" and is only used by the sentinel entry and unset votes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId {
    value: u8,
}

impl NodeId {
    pub const fn new(value: u8) -> NodeId {
        NodeId { value }
    }

    pub const fn get(self) -> u8 {
        self.value
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.value)
    }
}

impl From<u8> for NodeId {
    fn from(value: u8) -> Self {
        NodeId { value }
    }
}

/// 128-bit hardware unique identifier carried by allocation entries.
pub type UniqueId = [u8; 16];
