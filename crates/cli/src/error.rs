//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No configuration file was found.
    #[error("config not found at {path}. Create it with an [account] owner")]
    ConfigNotFound { path: PathBuf },

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The requested plugin is not installed on the account.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// An operation was rejected by the account.
    ///
    /// Carries the stable kind so scripts can branch on it.
    #[error("{kind}: {source}")]
    Rejected {
        kind: runtime::ErrorKind,
        #[source]
        source: runtime::Error,
    },

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// Failed to render output.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<runtime::Error> for Error {
    fn from(source: runtime::Error) -> Self {
        Error::Rejected {
            kind: source.kind(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
