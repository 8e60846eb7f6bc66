use policy::{Address, DenyReason, Selector};
use serde::Serialize;
use thiserror::Error;

use crate::SinkError;

/// Errors reported by the account to the caller of an operation.
///
/// Every failure leaves ledger state as it was before the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The engine refused the call.
    #[error("call denied: {0}")]
    Denied(DenyReason),

    /// A plugin's wiring or install configuration is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no enabled subscription from {payer} to {payee}")]
    NotEnabled { payee: Address, payer: Address },

    #[error("collection too soon: now {now}, next eligible at {next_eligible}")]
    TooSoon { now: i64, next_eligible: i64 },

    #[error("amount mismatch: subscription is for {expected}, requested {provided}")]
    AmountMismatch { expected: u64, provided: u64 },

    #[error("counter for {owner} is at its maximum")]
    Overflow { owner: Address },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("plugin not installed: {0}")]
    PluginNotFound(String),

    #[error("cannot uninstall {plugin}: {dependent} depends on it")]
    DependencyInUse { plugin: String, dependent: String },

    #[error("{plugin} does not implement {selector}")]
    UnsupportedCall { plugin: String, selector: Selector },

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Policy(policy::Error),
}

impl From<policy::Error> for Error {
    fn from(err: policy::Error) -> Self {
        match err {
            policy::Error::Configuration(message) => Error::Configuration(message),
            other => Error::Policy(other),
        }
    }
}

/// Stable classification of an [`Error`], for structured reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    NoSuchOperation,
    Unauthorized,
    HookRejected,
    NotEnabled,
    TooSoon,
    AmountMismatch,
    Overflow,
    Sink,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::NoSuchOperation => "no_such_operation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::HookRejected => "hook_rejected",
            ErrorKind::NotEnabled => "not_enabled",
            ErrorKind::TooSoon => "too_soon",
            ErrorKind::AmountMismatch => "amount_mismatch",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Sink => "sink",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Denied(DenyReason::NoSuchOperation) => ErrorKind::NoSuchOperation,
            Error::Denied(DenyReason::Unauthorized) => ErrorKind::Unauthorized,
            Error::Denied(DenyReason::HookRejected) => ErrorKind::HookRejected,
            Error::Configuration(_)
            | Error::PluginNotFound(_)
            | Error::DependencyInUse { .. }
            | Error::UnsupportedCall { .. } => ErrorKind::Configuration,
            Error::NotEnabled { .. } => ErrorKind::NotEnabled,
            Error::TooSoon { .. } => ErrorKind::TooSoon,
            Error::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::Sink(_) => ErrorKind::Sink,
            Error::Storage(_) | Error::Policy(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
