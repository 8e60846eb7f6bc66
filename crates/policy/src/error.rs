//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A manifest's wiring does not resolve against the installed dependencies.
    ///
    /// This is a module-authoring defect and should fail installation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A textual identifier could not be parsed.
    #[error("failed to parse {what}: {input}")]
    Parse { what: &'static str, input: String },
}

pub type Result<T> = std::result::Result<T, Error>;
