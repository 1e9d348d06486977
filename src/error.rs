//! Error types.

use thiserror::Error;

/// Errors surfaced by the map.
///
/// Missing keys are never errors; lookups report them as `None`/`false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key collection cannot be used in the map's mode.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The periodic sweeper thread could not be started.
    #[error("failed to start sweeper thread: {0}")]
    SweeperSpawn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
