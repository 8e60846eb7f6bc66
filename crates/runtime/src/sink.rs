//! Account execution sinks: where fund movements requested by plugins go.

use std::cell::RefCell;
use std::rc::Rc;

use policy::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Account;

/// A fund movement the account is asked to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    /// Opaque data forwarded with the transfer.
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// The sink refused or failed to perform a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("execution failed: {0}")]
pub struct SinkError(pub String);

/// The account's execution boundary.
///
/// Implementations receive the account itself so they may call back into
/// it; any such call runs through the same authorization and ledger checks
/// as a fresh call.
pub trait ExecutionSink {
    fn execute(&self, account: &Account, transfer: &Transfer) -> Result<(), SinkError>;
}

impl<S: ExecutionSink + ?Sized> ExecutionSink for Rc<S> {
    fn execute(&self, account: &Account, transfer: &Transfer) -> Result<(), SinkError> {
        (**self).execute(account, transfer)
    }
}

/// Accepts every transfer and writes it to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ExecutionSink for LoggingSink {
    fn execute(&self, account: &Account, transfer: &Transfer) -> Result<(), SinkError> {
        tracing::info!(
            account = %account.address(),
            from = %transfer.from,
            to = %transfer.to,
            amount = transfer.amount,
            "transfer executed"
        );
        Ok(())
    }
}

/// Keeps every transfer it accepts. Useful for testing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    transfers: RefCell<Vec<Transfer>>,
    reject_with: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every transfer with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            transfers: RefCell::default(),
            reject_with: Some(reason.into()),
        }
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.borrow().clone()
    }
}

impl ExecutionSink for RecordingSink {
    fn execute(&self, _account: &Account, transfer: &Transfer) -> Result<(), SinkError> {
        if let Some(reason) = &self.reject_with {
            return Err(SinkError(reason.clone()));
        }
        self.transfers.borrow_mut().push(transfer.clone());
        Ok(())
    }
}
