//! Map configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// How a key collection is turned into a trie path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Order-sensitive. Duplicates are significant; unordered input is rejected.
    #[default]
    Position,
    /// Order-insensitive. Duplicates collapse; unordered input is accepted.
    Value,
}

/// When empty trie nodes are reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Empty nodes are kept forever.
    Never,
    /// Prune the emptied branch on every successful remove.
    #[default]
    OnDelete,
    /// Sweep the whole tree on a timer. The map itself only exposes the
    /// sweep; [`SharedMap`](crate::SharedMap) drives the timer.
    Periodically(Duration),
    /// Sweep the whole tree once every `n` successful removes.
    EveryDelete(u32),
}

/// Configuration for a [`CompositeMap`](crate::CompositeMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub mode: KeyMode,
    pub cleanup: CleanupPolicy,
}

impl Config {
    pub fn by_position() -> Self {
        Self {
            mode: KeyMode::Position,
            ..Self::default()
        }
    }

    pub fn by_value() -> Self {
        Self {
            mode: KeyMode::Value,
            ..Self::default()
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Reject policies with a zero interval or a zero delete count.
    pub fn validate(&self) -> Result<()> {
        match self.cleanup {
            CleanupPolicy::Periodically(interval) if interval.is_zero() => Err(
                Error::InvalidConfig("sweep interval must be non-zero".into()),
            ),
            CleanupPolicy::EveryDelete(0) => Err(Error::InvalidConfig(
                "delete count between sweeps must be non-zero".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl FromStr for KeyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "position" => Ok(KeyMode::Position),
            "value" => Ok(KeyMode::Value),
            other => Err(Error::InvalidConfig(format!("unknown key mode '{other}'"))),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Position => f.write_str("position"),
            KeyMode::Value => f.write_str("value"),
        }
    }
}

/// Parses `never`, `on-delete`, `every-delete:N` and `periodically:T`.
///
/// `T` is a whole number of milliseconds, optionally suffixed with `ms`, `us`
/// or `ns` (`periodically:250`, `periodically:500us`).
impl FromStr for CleanupPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s, None),
        };

        let missing = || {
            Error::InvalidConfig(format!("cleanup policy '{name}' needs a numeric argument"))
        };

        let policy = match (name, arg) {
            ("never", None) => CleanupPolicy::Never,
            ("on-delete", None) => CleanupPolicy::OnDelete,
            ("every-delete", a) => {
                let a = a.ok_or_else(missing)?;
                let n = a.parse::<u32>().map_err(|e| {
                    Error::InvalidConfig(format!("bad delete count '{a}': {e}"))
                })?;
                CleanupPolicy::EveryDelete(n)
            }
            ("periodically", a) => {
                CleanupPolicy::Periodically(parse_interval(a.ok_or_else(missing)?)?)
            }
            _ => return Err(Error::InvalidConfig(format!("unknown cleanup policy '{s}'"))),
        };
        Ok(policy)
    }
}

fn parse_interval(s: &str) -> Result<Duration> {
    let (digits, nanos_per_unit) = if let Some(d) = s.strip_suffix("ns") {
        (d, 1u128)
    } else if let Some(d) = s.strip_suffix("us") {
        (d, 1_000)
    } else if let Some(d) = s.strip_suffix("ms") {
        (d, 1_000_000)
    } else {
        (s, 1_000_000)
    };

    let out_of_range = || Error::InvalidConfig(format!("interval '{s}' out of range"));
    let count = digits
        .trim()
        .parse::<u128>()
        .map_err(|e| Error::InvalidConfig(format!("bad interval '{s}': {e}")))?;
    let nanos = count.checked_mul(nanos_per_unit).ok_or_else(out_of_range)?;
    let secs = u64::try_from(nanos / 1_000_000_000).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPolicy::Never => f.write_str("never"),
            CleanupPolicy::OnDelete => f.write_str("on-delete"),
            // Coarsest unit that represents the interval exactly.
            CleanupPolicy::Periodically(d) => match d.subsec_nanos() {
                n if n % 1_000_000 == 0 => write!(f, "periodically:{}", d.as_millis()),
                n if n % 1_000 == 0 => write!(f, "periodically:{}us", d.as_micros()),
                _ => write!(f, "periodically:{}ns", d.as_nanos()),
            },
            CleanupPolicy::EveryDelete(n) => write!(f, "every-delete:{n}"),
        }
    }
}
