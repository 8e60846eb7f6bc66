//! plugboard runtime: a programmable account that runs plugin operations
//! behind declarative authorization wiring.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Account**: the host. It installs plugins, binds their dependency
//!   ordinals to other installed plugins, and routes every call through
//!   [`policy::authorize`] before the plugin body runs.
//! - **Plugin**: a module with a manifest and operation bodies. Built-ins are
//!   [`SingleOwnerPlugin`], [`SubscriptionPlugin`] and [`CounterPlugin`].
//! - **ExecutionSink**: where plugins send fund movements. A sink may call
//!   back into the account.
//! - **Clock**: the time source for period checks.
//!
//! # Example
//!
//! ```
//! use policy::Address;
//! use runtime::{
//!     Account, Call, CounterPlugin, ManualClock, RecordingSink, Request, SingleOwnerPlugin,
//! };
//! use storage::LedgerStore;
//!
//! # fn example() -> runtime::Result<()> {
//! let alice = Address::new("alice").unwrap();
//! let mut account = Account::new(
//!     Address::new("account").unwrap(),
//!     LedgerStore::in_memory()?,
//!     ManualClock::at(0),
//!     RecordingSink::new(),
//! );
//! account.install(SingleOwnerPlugin::new(), &[], b"alice")?;
//! account.install(CounterPlugin, &["single-owner"], &[])?;
//!
//! account.dispatch(&Request::runtime(alice.clone(), Call::Increment))?;
//! assert_eq!(account.count(&alice)?, 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod account;
mod call;
mod clock;
mod error;
mod plugin;
pub mod plugins;
mod sink;

pub use account::Account;
pub use call::{
    COLLECT_SIGNATURE, Call, INCREMENT_SIGNATURE, Outcome, Request, SUBSCRIBE_SIGNATURE,
    TRANSFER_OWNERSHIP_SIGNATURE,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, ErrorKind, Result};
pub use plugin::{ExecutionContext, Plugin, PluginMetadata};
pub use plugins::{CounterPlugin, SingleOwnerPlugin, SubscriptionPlugin};
pub use sink::{ExecutionSink, LoggingSink, RecordingSink, SinkError, Transfer};
