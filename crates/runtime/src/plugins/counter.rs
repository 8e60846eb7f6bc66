//! Per-caller counter, gated on the account owner.

use policy::{FunctionReference, Gate, Manifest};
use storage::EventKind;

use super::owner::{IS_OWNER, SINGLE_OWNER_INTERFACE};
use crate::plugin::{ExecutionContext, Plugin, PluginMetadata};
use crate::{Call, Error, INCREMENT_SIGNATURE, Outcome, Result};

pub const COUNTER_PLUGIN: &str = "counter";

#[derive(Debug, Default, Clone, Copy)]
pub struct CounterPlugin;

impl CounterPlugin {
    fn increment(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome> {
        let owner = ctx.caller();
        let store = ctx.store();

        let value = store.atomically(|| {
            let next = store
                .counter(owner)?
                .checked_add(1)
                .ok_or_else(|| Error::Overflow {
                    owner: owner.clone(),
                })?;
            store.set_counter(owner, next)?;
            ctx.record(EventKind::Incremented {
                owner: owner.clone(),
                value: next,
            })?;
            Ok::<_, Error>(next)
        })?;

        tracing::info!(owner = %owner, value, "counter incremented");
        Ok(Outcome::Incremented {
            owner: owner.clone(),
            value,
        })
    }
}

impl Plugin for CounterPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: COUNTER_PLUGIN.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "plugboard".to_string(),
        }
    }

    fn manifest(&self) -> Manifest {
        let owner = Gate::validated_by(FunctionReference::Dependency {
            index: 0,
            function: IS_OWNER,
        });
        Manifest::new(COUNTER_PLUGIN)
            .depends_on(SINGLE_OWNER_INTERFACE)
            .operation(INCREMENT_SIGNATURE, owner.clone(), owner)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>, call: &Call) -> Result<Outcome> {
        match call {
            Call::Increment => self.increment(ctx),
            other => Err(Error::UnsupportedCall {
                plugin: COUNTER_PLUGIN.to_string(),
                selector: other.selector(),
            }),
        }
    }
}
