//! Event types for the audit log.

use chrono::{DateTime, Utc};
use policy::{Address, CallPath, DenyReason, Selector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A plugin was installed on the account.
    PluginInstalled { name: String, version: String },
    /// A plugin was removed from the account.
    PluginUninstalled { name: String },
    /// The engine allowed a call.
    Authorized {
        module: String,
        selector: Selector,
        caller: Address,
        path: CallPath,
    },
    /// The engine refused a call.
    Denied {
        selector: Selector,
        caller: Address,
        path: CallPath,
        reason: DenyReason,
    },
    /// A subscription record was created or replaced.
    Subscribed {
        payee: Address,
        payer: Address,
        amount: u64,
    },
    /// A payee collected a payment.
    Collected {
        payee: Address,
        payer: Address,
        amount: u64,
        at: i64,
    },
    /// A counter was incremented.
    Incremented { owner: Address, value: u64 },
    /// Account ownership moved to a new identity.
    OwnershipTransferred { previous: Address, owner: Address },
}

impl EventKind {
    /// Short name stored alongside the payload, used for filtering.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PluginInstalled { .. } => "plugin_installed",
            EventKind::PluginUninstalled { .. } => "plugin_uninstalled",
            EventKind::Authorized { .. } => "authorized",
            EventKind::Denied { .. } => "denied",
            EventKind::Subscribed { .. } => "subscribed",
            EventKind::Collected { .. } => "collected",
            EventKind::Incremented { .. } => "incremented",
            EventKind::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    /// An event stamped at `timestamp`, the account's notion of now.
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind,
        }
    }
}
