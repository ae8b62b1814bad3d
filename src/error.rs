/// Error types shared across the crate.
///
/// Nothing in the game core can fail from external causes; these cover
/// navigation contract violations, bad stage files, and the score store.

use std::path::PathBuf;

use thiserror::Error;

/// Navigation contract violation raised by the stage controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("stage {0} is not registered")]
    OutOfRange(u32),
    #[error("stage {0} has not been reached yet")]
    NotReached(u32),
}

/// Problems found while building the stage registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("stage list is empty")]
    Empty,
    #[error("stage id must be >= 1 (got {0})")]
    InvalidId(u32),
    #[error("duplicate stage id {0}")]
    DuplicateId(u32),
    #[error("stage {id}: unknown kind {kind:?}")]
    UnknownKind { id: u32, kind: String },
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stage file parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures writing or reading the local score file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("score file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems that are worth reporting (the loader falls back
/// to defaults for all of them).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config.toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid birth date {0:?}, expected YYYY-MM-DD")]
    BirthDate(String),
}
