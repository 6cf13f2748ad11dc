//! Page replacement policies

use core::fmt;

/// Which resident page to evict when the frame pool is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Evict the page resident longest (arrival order)
    Fifo,
    /// Evict the page unused longest (access order)
    Lru,
}

impl ReplacementPolicy {
    /// Parse a policy name, case-insensitively
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FIFO" => Some(Self::Fifo),
            "LRU" => Some(Self::Lru),
            _ => None,
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
            Self::Lru => write!(f, "LRU"),
        }
    }
}
