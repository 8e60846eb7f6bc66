//! Recurring payments: a payer authorizes a fixed amount, a payee pulls it
//! at most once per period.

use policy::{Address, FunctionReference, Gate, Manifest};
use storage::{EventKind, Subscription};

use super::owner::{IS_OWNER, SINGLE_OWNER_INTERFACE};
use crate::plugin::{ExecutionContext, Plugin, PluginMetadata};
use crate::{COLLECT_SIGNATURE, Call, Error, Outcome, Result, SUBSCRIBE_SIGNATURE, Transfer};

pub const SUBSCRIPTION_PLUGIN: &str = "subscription";

/// Four weeks.
pub const DEFAULT_PERIOD_SECS: u64 = 28 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionPlugin {
    period: i64,
}

impl Default for SubscriptionPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionPlugin {
    pub fn new() -> Self {
        Self::with_period(DEFAULT_PERIOD_SECS)
    }

    /// Use a collection period of `seconds` instead of the default.
    pub fn with_period(seconds: u64) -> Self {
        Self {
            period: i64::try_from(seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn period(&self) -> i64 {
        self.period
    }

    fn subscribe(&self, ctx: &ExecutionContext<'_>, payee: &Address, amount: u64) -> Result<Outcome> {
        let payer = ctx.caller();
        let record = Subscription::new(payee.clone(), payer.clone(), amount);
        let store = ctx.store();

        store.atomically(|| {
            store.put_subscription(&record)?;
            ctx.record(EventKind::Subscribed {
                payee: payee.clone(),
                payer: payer.clone(),
                amount,
            })
        })?;

        tracing::info!(payee = %payee, payer = %payer, amount, "subscription set");
        Ok(Outcome::Subscribed(record))
    }

    fn collect(&self, ctx: &ExecutionContext<'_>, payer: &Address, amount: u64) -> Result<Outcome> {
        let payee = ctx.caller();
        let now = ctx.now();
        let store = ctx.store();

        let record = store
            .subscription(payee, payer)?
            .unwrap_or_else(|| Subscription::absent(payee.clone(), payer.clone()));

        if !record.enabled {
            return Err(Error::NotEnabled {
                payee: payee.clone(),
                payer: payer.clone(),
            });
        }
        if now.saturating_sub(record.last_collection) < self.period {
            return Err(Error::TooSoon {
                now,
                next_eligible: record.last_collection.saturating_add(self.period),
            });
        }
        if amount != record.amount {
            return Err(Error::AmountMismatch {
                expected: record.amount,
                provided: amount,
            });
        }

        // The timestamp must be written before the sink runs: the sink may
        // re-enter collect, and that call has to see this collection.
        store.atomically(|| {
            store.set_last_collection(payee, payer, now)?;
            ctx.record(EventKind::Collected {
                payee: payee.clone(),
                payer: payer.clone(),
                amount,
                at: now,
            })?;
            ctx.execute(&Transfer {
                from: payer.clone(),
                to: payee.clone(),
                amount,
                payload: Vec::new(),
            })?;
            Ok::<_, Error>(())
        })?;

        tracing::info!(payee = %payee, payer = %payer, amount, at = now, "payment collected");
        Ok(Outcome::Collected {
            payee: payee.clone(),
            payer: payer.clone(),
            amount,
            at: now,
        })
    }
}

impl Plugin for SubscriptionPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: SUBSCRIPTION_PLUGIN.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "plugboard".to_string(),
        }
    }

    /// `subscribe` is only reachable as a user operation signed by the owner;
    /// direct runtime calls hit the always-deny hook. `collect` is a runtime
    /// call open to any payee; user operations are closed.
    fn manifest(&self) -> Manifest {
        let owner = FunctionReference::Dependency {
            index: 0,
            function: IS_OWNER,
        };
        Manifest::new(SUBSCRIPTION_PLUGIN)
            .depends_on(SINGLE_OWNER_INTERFACE)
            .operation(
                SUBSCRIBE_SIGNATURE,
                Gate::validated_by(owner),
                Gate::validated_by(owner).with_hook(FunctionReference::AlwaysDeny),
            )
            .operation(
                COLLECT_SIGNATURE,
                Gate::closed(),
                Gate::validated_by(FunctionReference::AlwaysAllow),
            )
    }

    fn execute(&self, ctx: &ExecutionContext<'_>, call: &Call) -> Result<Outcome> {
        match call {
            Call::Subscribe { payee, amount } => self.subscribe(ctx, payee, *amount),
            Call::Collect { payer, amount } => self.collect(ctx, payer, *amount),
            other => Err(Error::UnsupportedCall {
                plugin: SUBSCRIPTION_PLUGIN.to_string(),
                selector: other.selector(),
            }),
        }
    }
}
