//! Plugin trait.

use policy::{Address, CallPath, CapabilityProvider, FunctionId, Manifest};
use serde::{Deserialize, Serialize};
use storage::{EventKind, LedgerStore};

use crate::{Account, Call, Outcome, Result, SinkError, Transfer};

/// Static description of a plugin build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
}

/// What a plugin body sees while it runs.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    account: &'a Account,
    caller: &'a Address,
    path: CallPath,
    now: i64,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(account: &'a Account, caller: &'a Address, path: CallPath, now: i64) -> Self {
        Self {
            account,
            caller,
            path,
            now,
        }
    }

    pub fn account(&self) -> &'a Account {
        self.account
    }

    /// The authenticated identity the engine authorized.
    pub fn caller(&self) -> &'a Address {
        self.caller
    }

    pub fn path(&self) -> CallPath {
        self.path
    }

    /// Current time in epoch seconds, read once per call.
    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn store(&self) -> &'a LedgerStore {
        self.account.store()
    }

    /// Append to the account's audit log.
    pub fn record(&self, kind: EventKind) -> Result<()> {
        self.account.record(kind)
    }

    /// Hand a transfer to the account's execution sink.
    ///
    /// Callers must finish their ledger writes first: the sink may re-enter
    /// the account.
    pub fn execute(&self, transfer: &Transfer) -> std::result::Result<(), SinkError> {
        self.account.execute_transfer(transfer)
    }
}

/// A module installable on an account.
///
/// A plugin provides capability functions to its own wiring and to the
/// wiring of plugins that depend on it. Checks read the account's ledger
/// through the context, never state cached in the plugin.
pub trait Plugin {
    fn metadata(&self) -> PluginMetadata;

    /// The plugin's manifest. Must return the same value on every call.
    fn manifest(&self) -> Manifest;

    fn exposes(&self, _function: FunctionId) -> bool {
        false
    }

    /// Evaluate an exposed capability function for `caller`.
    fn is_authorized(
        &self,
        _ctx: &ExecutionContext<'_>,
        _function: FunctionId,
        _caller: &Address,
    ) -> Result<bool> {
        Ok(false)
    }

    fn on_install(&self, _ctx: &ExecutionContext<'_>, _config: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_uninstall(&self, _ctx: &ExecutionContext<'_>, _config: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Run an authorized call. Only invoked after the engine allowed it.
    fn execute(&self, ctx: &ExecutionContext<'_>, call: &Call) -> Result<Outcome>;
}

/// A plugin bound to the account state its capability checks read.
pub(crate) struct BoundProvider<'a> {
    interface: &'a str,
    plugin: &'a dyn Plugin,
    ctx: ExecutionContext<'a>,
}

impl<'a> BoundProvider<'a> {
    pub(crate) fn new(interface: &'a str, plugin: &'a dyn Plugin, ctx: ExecutionContext<'a>) -> Self {
        Self {
            interface,
            plugin,
            ctx,
        }
    }
}

impl CapabilityProvider for BoundProvider<'_> {
    fn interface(&self) -> &str {
        self.interface
    }

    fn exposes(&self, function: FunctionId) -> bool {
        self.plugin.exposes(function)
    }

    /// A check that cannot read the ledger fails closed.
    fn is_authorized(&self, function: FunctionId, caller: &Address) -> bool {
        match self.plugin.is_authorized(&self.ctx, function, caller) {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!(
                    interface = self.interface,
                    %function,
                    caller = %caller,
                    error = %e,
                    "capability check failed"
                );
                false
            }
        }
    }
}
