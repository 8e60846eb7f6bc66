//! Built-in plugins.

mod counter;
mod owner;
mod subscription;

pub use counter::{COUNTER_PLUGIN, CounterPlugin};
pub use owner::{IS_OWNER, SINGLE_OWNER_INTERFACE, SingleOwnerPlugin};
pub use subscription::{DEFAULT_PERIOD_SECS, SUBSCRIPTION_PLUGIN, SubscriptionPlugin};
