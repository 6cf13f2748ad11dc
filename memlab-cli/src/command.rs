//! Line-oriented command parsing
//!
//! One line, whitespace-separated, parses to one [`Command`]. Sizes and ids
//! are decimal; addresses accept decimal or `0x`-prefixed hex. Command and
//! allocator names are case-sensitive; policy names are not.

use thiserror::Error;

use memlab_cache::LevelId;
use memlab_heap::Placement;
use memlab_vm::ReplacementPolicy;

/// Allocator discipline as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    First,
    Best,
    Worst,
    Buddy,
}

impl AllocatorKind {
    /// Parse an allocator name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "buddy" => Some(Self::Buddy),
            _ => Placement::from_name(name).map(|placement| match placement {
                Placement::FirstFit => Self::First,
                Placement::BestFit => Self::Best,
                Placement::WorstFit => Self::Worst,
            }),
        }
    }

    /// The command-line name of the discipline
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Best => "best",
            Self::Worst => "worst",
            Self::Buddy => "buddy",
        }
    }
}

/// One parsed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init { size: usize },
    SetAllocator(AllocatorKind),
    SetPolicy(ReplacementPolicy),
    ConfigCache {
        level: LevelId,
        size: usize,
        block_size: usize,
        associativity: usize,
    },
    Malloc { size: usize },
    Free { id: u32 },
    Read { addr: u64 },
    Write { addr: u64 },
    Dump,
    Stats,
    Help,
    Exit,
}

/// Command rejected before reaching any subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command {0:?}; try help")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("size must be positive")]
    ZeroSize,
    #[error("unknown allocator {0:?}; expected first, best, worst or buddy")]
    UnknownAllocator(String),
    #[error("unknown policy {0:?}; expected FIFO or LRU")]
    UnknownPolicy(String),
    #[error("unknown cache level {0:?}; expected L1, L2 or L3")]
    UnknownLevel(String),
}

/// Parse one non-empty command line
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let cmd = tokens.next().unwrap_or("");

    let command = match cmd {
        "init" => Command::Init {
            size: parse_size(tokens.next().ok_or(ParseError::Usage("init <size>"))?)?,
        },
        "set" => {
            let sub = tokens.next().ok_or(ParseError::Usage(
                "set allocator <type> | set policy <FIFO|LRU>",
            ))?;
            match sub {
                "allocator" => {
                    let name = tokens
                        .next()
                        .ok_or(ParseError::Usage("set allocator <first|best|worst|buddy>"))?;
                    let kind = AllocatorKind::from_name(name)
                        .ok_or_else(|| ParseError::UnknownAllocator(name.to_string()))?;
                    Command::SetAllocator(kind)
                }
                "policy" => {
                    let name = tokens
                        .next()
                        .ok_or(ParseError::Usage("set policy <FIFO|LRU>"))?;
                    let policy = ReplacementPolicy::from_name(name)
                        .ok_or_else(|| ParseError::UnknownPolicy(name.to_string()))?;
                    Command::SetPolicy(policy)
                }
                other => return Err(ParseError::UnknownCommand(format!("set {}", other))),
            }
        }
        "config" => {
            const USAGE: &str = "config cache <L1|L2|L3> <size> <block> <assoc>";
            match tokens.next() {
                Some("cache") => {}
                _ => return Err(ParseError::Usage(USAGE)),
            }
            let name = tokens.next().ok_or(ParseError::Usage(USAGE))?;
            let level = LevelId::from_name(name)
                .ok_or_else(|| ParseError::UnknownLevel(name.to_string()))?;
            let size = parse_size(tokens.next().ok_or(ParseError::Usage(USAGE))?)?;
            let block_size = parse_size(tokens.next().ok_or(ParseError::Usage(USAGE))?)?;
            let associativity = parse_size(tokens.next().ok_or(ParseError::Usage(USAGE))?)?;
            Command::ConfigCache {
                level,
                size,
                block_size,
                associativity,
            }
        }
        "malloc" => Command::Malloc {
            size: parse_size(tokens.next().ok_or(ParseError::Usage("malloc <size>"))?)?,
        },
        "free" => {
            let token = tokens.next().ok_or(ParseError::Usage("free <id>"))?;
            let id = token
                .parse()
                .map_err(|_| ParseError::InvalidNumber(token.to_string()))?;
            Command::Free { id }
        }
        // The original simulator accepted `access` as a synonym for `read`.
        "read" | "access" => Command::Read {
            addr: parse_addr(tokens.next().ok_or(ParseError::Usage("read <addr>"))?)?,
        },
        "write" => Command::Write {
            addr: parse_addr(tokens.next().ok_or(ParseError::Usage("write <addr>"))?)?,
        },
        "dump" => Command::Dump,
        "stats" => Command::Stats,
        "help" => Command::Help,
        "exit" => Command::Exit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    Ok(command)
}

/// Parse a positive decimal byte count
fn parse_size(token: &str) -> Result<usize, ParseError> {
    let size: usize = token
        .parse()
        .map_err(|_| ParseError::InvalidNumber(token.to_string()))?;
    if size == 0 {
        return Err(ParseError::ZeroSize);
    }
    Ok(size)
}

/// Parse an address, decimal or `0x`-prefixed hex
fn parse_addr(token: &str) -> Result<u64, ParseError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| ParseError::InvalidAddress(token.to_string()))
}
