//! Ledger record types.

use policy::Address;
use serde::{Deserialize, Serialize};

/// Recurring-payment authorization from `payer` to `payee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub payee: Address,
    pub payer: Address,
    pub amount: u64,
    /// Epoch seconds of the last successful collection; 0 if never collected.
    pub last_collection: i64,
    pub enabled: bool,
}

impl Subscription {
    /// A fresh record as written by `subscribe`.
    pub fn new(payee: Address, payer: Address, amount: u64) -> Self {
        Self {
            payee,
            payer,
            amount,
            last_collection: 0,
            enabled: true,
        }
    }

    /// The value an absent record reads as.
    pub fn absent(payee: Address, payer: Address) -> Self {
        Self {
            payee,
            payer,
            amount: 0,
            last_collection: 0,
            enabled: false,
        }
    }
}
