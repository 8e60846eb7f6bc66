//! Single-owner plugin: the account's owner check, shared with dependents.

use policy::{Address, FunctionId, FunctionReference, Gate, Manifest};
use storage::EventKind;

use crate::plugin::{ExecutionContext, Plugin, PluginMetadata};
use crate::{Call, Error, Outcome, Result, TRANSFER_OWNERSHIP_SIGNATURE};

pub const SINGLE_OWNER_INTERFACE: &str = "single-owner";

/// Passes when the caller is the account's current owner.
pub const IS_OWNER: FunctionId = FunctionId(0);

/// Records one owner per account and validates callers against it.
///
/// The owner lives in the ledger, so a rolled-back transfer also rolls back
/// who the owner check accepts. If no owner is recorded at install time, the
/// install config (the owner's address as UTF-8) seeds it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleOwnerPlugin;

impl SingleOwnerPlugin {
    pub fn new() -> Self {
        Self
    }

    fn recorded_owner(&self, ctx: &ExecutionContext<'_>) -> Result<Option<Address>> {
        Ok(ctx.store().owner(ctx.account().address())?)
    }

    fn transfer_ownership(&self, ctx: &ExecutionContext<'_>, new_owner: &Address) -> Result<Outcome> {
        let previous = self
            .recorded_owner(ctx)?
            .ok_or_else(|| Error::Configuration("single-owner: no owner recorded".into()))?;
        let store = ctx.store();
        store.atomically(|| {
            store.set_owner(ctx.account().address(), new_owner)?;
            ctx.record(EventKind::OwnershipTransferred {
                previous: previous.clone(),
                owner: new_owner.clone(),
            })
        })?;

        tracing::info!(
            account = %ctx.account().address(),
            previous = %previous,
            owner = %new_owner,
            "ownership transferred"
        );
        Ok(Outcome::OwnershipTransferred {
            previous,
            owner: new_owner.clone(),
        })
    }
}

impl Plugin for SingleOwnerPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: SINGLE_OWNER_INTERFACE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "plugboard".to_string(),
        }
    }

    fn manifest(&self) -> Manifest {
        let owner = Gate::validated_by(FunctionReference::Own { function: IS_OWNER });
        Manifest::new(SINGLE_OWNER_INTERFACE).operation(
            TRANSFER_OWNERSHIP_SIGNATURE,
            owner.clone(),
            owner,
        )
    }

    fn exposes(&self, function: FunctionId) -> bool {
        function == IS_OWNER
    }

    fn is_authorized(
        &self,
        ctx: &ExecutionContext<'_>,
        function: FunctionId,
        caller: &Address,
    ) -> Result<bool> {
        if function != IS_OWNER {
            return Ok(false);
        }
        Ok(self.recorded_owner(ctx)?.as_ref() == Some(caller))
    }

    fn on_install(&self, ctx: &ExecutionContext<'_>, config: &[u8]) -> Result<()> {
        let account = ctx.account().address();
        let owner = match ctx.store().owner(account)? {
            Some(owner) => owner,
            None => {
                let text = std::str::from_utf8(config).map_err(|_| {
                    Error::Configuration("single-owner: install config is not UTF-8".into())
                })?;
                let owner = Address::new(text).map_err(|_| {
                    Error::Configuration("single-owner: install config must name the owner".into())
                })?;
                ctx.store().set_owner(account, &owner)?;
                owner
            }
        };
        tracing::debug!(account = %account, owner = %owner, "single-owner installed");
        Ok(())
    }

    fn on_uninstall(&self, ctx: &ExecutionContext<'_>, _config: &[u8]) -> Result<()> {
        ctx.store().clear_owner(ctx.account().address())?;
        Ok(())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>, call: &Call) -> Result<Outcome> {
        match call {
            Call::TransferOwnership { new_owner } => self.transfer_ownership(ctx, new_owner),
            other => Err(Error::UnsupportedCall {
                plugin: SINGLE_OWNER_INTERFACE.to_string(),
                selector: other.selector(),
            }),
        }
    }
}
