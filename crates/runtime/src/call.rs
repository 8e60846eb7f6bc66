//! Calls delivered to the account and what they produce.

use policy::{Address, CallPath, Selector};
use serde::{Deserialize, Serialize};
use storage::Subscription;

pub const SUBSCRIBE_SIGNATURE: &str = "subscribe(address,uint256)";
pub const COLLECT_SIGNATURE: &str = "collect(address,uint256)";
pub const INCREMENT_SIGNATURE: &str = "increment()";
pub const TRANSFER_OWNERSHIP_SIGNATURE: &str = "transferOwnership(address)";

/// An operation invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    /// Authorize `payee` to pull `amount` from the caller every period.
    Subscribe { payee: Address, amount: u64 },
    /// Pull `amount` from `payer` into the caller.
    Collect { payer: Address, amount: u64 },
    /// Add one to the caller's counter.
    Increment,
    /// Hand the account to `new_owner`.
    TransferOwnership { new_owner: Address },
}

impl Call {
    pub fn signature(&self) -> &'static str {
        match self {
            Call::Subscribe { .. } => SUBSCRIBE_SIGNATURE,
            Call::Collect { .. } => COLLECT_SIGNATURE,
            Call::Increment => INCREMENT_SIGNATURE,
            Call::TransferOwnership { .. } => TRANSFER_OWNERSHIP_SIGNATURE,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::from_signature(self.signature())
    }
}

/// A call together with the authenticated caller and the path it came in on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub caller: Address,
    pub path: CallPath,
    pub call: Call,
}

impl Request {
    pub fn user_operation(caller: Address, call: Call) -> Self {
        Self {
            caller,
            path: CallPath::UserOperation,
            call,
        }
    }

    pub fn runtime(caller: Address, call: Call) -> Self {
        Self {
            caller,
            path: CallPath::Runtime,
            call,
        }
    }
}

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Subscribed(Subscription),
    Collected {
        payee: Address,
        payer: Address,
        amount: u64,
        at: i64,
    },
    Incremented { owner: Address, value: u64 },
    OwnershipTransferred { previous: Address, owner: Address },
}
