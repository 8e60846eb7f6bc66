//! SQLite-backed ledger storage for plugboard accounts.
//!
//! This crate persists the state plugins mutate and the audit trail of every
//! authorization decision the account makes.
//!
//! # Overview
//!
//! The storage layer serves two purposes:
//!
//! 1. **Ledgers**: keyed records owned by plugins, such as subscription records keyed
//!    by (payee, payer) and counters keyed by owner. Only the owning plugin
//!    writes them; the store itself enforces no business rules.
//!
//! 2. **Audit Trail**: an append-only log of installs, allowed and denied
//!    calls, and ledger mutations, enabling "who changed this and why?"
//!    queries from the CLI.
//!
//! # Core Concepts
//!
//! ## LedgerStore
//!
//! The [`LedgerStore`] wraps a SQLite connection. Every method takes `&self`,
//! and [`LedgerStore::atomically`] wraps a closure in a savepoint so an
//! operation either commits all of its writes or none of them.
//!
//! ## Subscription
//!
//! A [`Subscription`] is the recurring-payment record: amount, last
//! collection time and an enabled flag.
//!
//! ## Event
//!
//! An [`Event`] is one audit-log entry; its [`EventKind`] says what happened.
//!
//! # Example
//!
//! ```no_run
//! use policy::Address;
//! use storage::{LedgerStore, Subscription};
//!
//! let store = LedgerStore::open("ledger.db")?;
//! let payee = Address::new("streaming-service").unwrap();
//! let payer = Address::new("alice").unwrap();
//!
//! store.put_subscription(&Subscription::new(payee.clone(), payer.clone(), 100))?;
//! let record = store.subscription(&payee, &payer)?;
//! assert_eq!(record.map(|r| r.amount), Some(100));
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod ledger;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use ledger::Subscription;
pub use store::LedgerStore;
