//! SQLite ledger store implementation.

use crate::{Error, Event, Result, Subscription};
use policy::Address;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// SQLite-backed store for ledger records and the audit log.
///
/// All methods take `&self` so a call that re-enters the account while
/// another call is in flight reads the same connection and therefore sees
/// writes that are not yet released.
pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                payee TEXT NOT NULL,
                payer TEXT NOT NULL,
                amount BLOB NOT NULL,
                last_collection INTEGER NOT NULL,
                enabled INTEGER NOT NULL,
                PRIMARY KEY (payee, payer)
            );
            CREATE TABLE IF NOT EXISTS counters (
                owner TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS owners (
                account TEXT PRIMARY KEY,
                owner TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS plugins (
                account TEXT NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                PRIMARY KEY (account, name)
            );
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind);
            "#,
        )?;
        Ok(())
    }

    /// Run `f` inside a savepoint; roll its writes back if it fails.
    ///
    /// Savepoints nest, so a re-entrant call may open its own.
    pub fn atomically<T, E>(&self, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>,
    {
        self.conn.execute_batch("SAVEPOINT ledger").map_err(Error::from)?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch("RELEASE ledger").map_err(Error::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK TO ledger; RELEASE ledger") {
                    tracing::error!(error = %rollback, "failed to roll back ledger savepoint");
                }
                Err(err)
            }
        }
    }

    /// Load the subscription record at (payee, payer), if one was ever written.
    pub fn subscription(&self, payee: &Address, payer: &Address) -> Result<Option<Subscription>> {
        let row = self
            .conn
            .query_row(
                "SELECT amount, last_collection, enabled FROM subscriptions
                 WHERE payee = ?1 AND payer = ?2",
                params![payee.as_str(), payer.as_str()],
                |row| {
                    let amount: Vec<u8> = row.get(0)?;
                    let last_collection: i64 = row.get(1)?;
                    let enabled: bool = row.get(2)?;
                    Ok((amount, last_collection, enabled))
                },
            )
            .optional()?;

        row.map(|(amount, last_collection, enabled)| {
            Ok(Subscription {
                payee: payee.clone(),
                payer: payer.clone(),
                amount: decode_u64(&amount)?,
                last_collection,
                enabled,
            })
        })
        .transpose()
    }

    /// Insert or fully replace a subscription record.
    pub fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO subscriptions (payee, payer, amount, last_collection, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                subscription.payee.as_str(),
                subscription.payer.as_str(),
                subscription.amount.to_be_bytes().as_slice(),
                subscription.last_collection,
                subscription.enabled,
            ],
        )?;
        Ok(())
    }

    /// Advance the last-collection timestamp of an existing record.
    pub fn set_last_collection(&self, payee: &Address, payer: &Address, at: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE subscriptions SET last_collection = ?3 WHERE payee = ?1 AND payer = ?2",
            params![payee.as_str(), payer.as_str(), at],
        )?;
        if updated != 1 {
            return Err(Error::Corrupt(format!(
                "no subscription from {payer} to {payee}"
            )));
        }
        Ok(())
    }

    /// Current counter value for `owner`; 0 if never incremented.
    pub fn counter(&self, owner: &Address) -> Result<u64> {
        let value: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT value FROM counters WHERE owner = ?1",
                [owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        value.map_or(Ok(0), |bytes| decode_u64(&bytes))
    }

    pub fn set_counter(&self, owner: &Address, value: u64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO counters (owner, value) VALUES (?1, ?2)",
            params![owner.as_str(), value.to_be_bytes().as_slice()],
        )?;
        Ok(())
    }

    /// Recorded owner of `account`, if any.
    pub fn owner(&self, account: &Address) -> Result<Option<Address>> {
        let owner: Option<String> = self
            .conn
            .query_row(
                "SELECT owner FROM owners WHERE account = ?1",
                [account.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        owner
            .map(|owner| Address::new(owner).map_err(|e| Error::Corrupt(e.to_string())))
            .transpose()
    }

    pub fn set_owner(&self, account: &Address, owner: &Address) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO owners (account, owner) VALUES (?1, ?2)",
            params![account.as_str(), owner.as_str()],
        )?;
        Ok(())
    }

    pub fn clear_owner(&self, account: &Address) -> Result<()> {
        self.conn
            .execute("DELETE FROM owners WHERE account = ?1", [account.as_str()])?;
        Ok(())
    }

    /// Version of `name` last installed on `account`, if it is installed.
    pub fn installed_version(&self, account: &Address, name: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT version FROM plugins WHERE account = ?1 AND name = ?2",
                params![account.as_str(), name],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_installed(&self, account: &Address, name: &str, version: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO plugins (account, name, version) VALUES (?1, ?2, ?3)",
            params![account.as_str(), name, version],
        )?;
        Ok(())
    }

    pub fn clear_installed(&self, account: &Address, name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM plugins WHERE account = ?1 AND name = ?2",
            params![account.as_str(), name],
        )?;
        Ok(())
    }

    /// Append an event to the audit log.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.id.to_string(),
                event.timestamp.to_rfc3339(),
                event.kind.name(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load audit events in insertion order, optionally filtered by kind name.
    pub fn load_events(&self, kind: Option<&str>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, data FROM events
             WHERE ?1 IS NULL OR kind = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map([kind], |row| {
            let id: String = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let data: String = row.get(2)?;
            Ok((id, timestamp, data))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, data) = row?;
            events.push(Event {
                id: id
                    .parse()
                    .map_err(|_| Error::Corrupt(format!("event id '{id}'")))?,
                timestamp: timestamp
                    .parse()
                    .map_err(|_| Error::Corrupt(format!("event timestamp '{timestamp}'")))?,
                kind: serde_json::from_str(&data)?,
            });
        }
        Ok(events)
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Corrupt(format!("expected 8-byte integer, got {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;
    use chrono::{DateTime, Utc};

    fn addr(name: &str) -> Address {
        Address::new(name).unwrap()
    }

    #[test]
    fn test_missing_subscription_is_none() {
        let store = LedgerStore::in_memory().unwrap();
        assert!(store.subscription(&addr("payee"), &addr("payer")).unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_whole_record() {
        let store = LedgerStore::in_memory().unwrap();
        let (payee, payer) = (addr("payee"), addr("payer"));

        store.put_subscription(&Subscription::new(payee.clone(), payer.clone(), 100)).unwrap();
        store.set_last_collection(&payee, &payer, 500).unwrap();
        store.put_subscription(&Subscription::new(payee.clone(), payer.clone(), 40)).unwrap();

        let record = store.subscription(&payee, &payer).unwrap().unwrap();
        assert_eq!(record.amount, 40);
        assert_eq!(record.last_collection, 0);
        assert!(record.enabled);
    }

    #[test]
    fn test_keys_are_directional() {
        let store = LedgerStore::in_memory().unwrap();
        store.put_subscription(&Subscription::new(addr("a"), addr("b"), 1)).unwrap();
        assert!(store.subscription(&addr("b"), &addr("a")).unwrap().is_none());
    }

    #[test]
    fn test_set_last_collection_requires_record() {
        let store = LedgerStore::in_memory().unwrap();
        assert!(store.set_last_collection(&addr("a"), &addr("b"), 1).is_err());
    }

    #[test]
    fn test_counter_holds_full_range() {
        let store = LedgerStore::in_memory().unwrap();
        let owner = addr("alice");
        assert_eq!(store.counter(&owner).unwrap(), 0);
        store.set_counter(&owner, u64::MAX).unwrap();
        assert_eq!(store.counter(&owner).unwrap(), u64::MAX);
    }

    #[test]
    fn test_owner_round_trip() {
        let store = LedgerStore::in_memory().unwrap();
        let account = addr("account");
        assert_eq!(store.owner(&account).unwrap(), None);
        store.set_owner(&account, &addr("alice")).unwrap();
        assert_eq!(store.owner(&account).unwrap(), Some(addr("alice")));
        store.clear_owner(&account).unwrap();
        assert_eq!(store.owner(&account).unwrap(), None);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let store = LedgerStore::in_memory().unwrap();
        let owner = addr("alice");
        store.set_counter(&owner, 1).unwrap();

        let result: Result<()> = store.atomically(|| {
            store.set_counter(&owner, 2)?;
            assert_eq!(store.counter(&owner)?, 2);
            Err(Error::Corrupt("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.counter(&owner).unwrap(), 1);
    }

    #[test]
    fn test_atomically_nests() {
        let store = LedgerStore::in_memory().unwrap();
        let owner = addr("alice");

        let result: Result<()> = store.atomically(|| {
            store.set_counter(&owner, 1)?;
            let inner: Result<()> = store.atomically(|| {
                store.set_counter(&owner, 2)?;
                Err(Error::Corrupt("inner".into()))
            });
            assert!(inner.is_err());
            assert_eq!(store.counter(&owner)?, 1);
            Ok(())
        });
        result.unwrap();
        assert_eq!(store.counter(&owner).unwrap(), 1);
    }

    #[test]
    fn test_events_filter_by_kind() {
        let store = LedgerStore::in_memory().unwrap();
        store
            .append(&Event::new(
                EventKind::PluginInstalled {
                    name: "counter".into(),
                    version: "0.1.0".into(),
                },
                Utc::now(),
            ))
            .unwrap();
        store
            .append(&Event::new(
                EventKind::Incremented {
                    owner: addr("alice"),
                    value: 1,
                },
                Utc::now(),
            ))
            .unwrap();

        assert_eq!(store.load_events(None).unwrap().len(), 2);
        let incremented = store.load_events(Some("incremented")).unwrap();
        assert_eq!(incremented.len(), 1);
        assert_eq!(
            incremented[0].kind,
            EventKind::Incremented {
                owner: addr("alice"),
                value: 1
            }
        );
    }

    #[test]
    fn test_installed_plugins_are_tracked_per_account() {
        let store = LedgerStore::in_memory().unwrap();
        let account = addr("account");
        assert_eq!(store.installed_version(&account, "counter").unwrap(), None);

        store.set_installed(&account, "counter", "0.1.0").unwrap();
        assert_eq!(
            store.installed_version(&account, "counter").unwrap().as_deref(),
            Some("0.1.0")
        );
        assert_eq!(store.installed_version(&addr("other"), "counter").unwrap(), None);

        store.clear_installed(&account, "counter").unwrap();
        assert_eq!(store.installed_version(&account, "counter").unwrap(), None);
    }

    #[test]
    fn test_event_timestamp_round_trips() {
        let store = LedgerStore::in_memory().unwrap();
        let at = DateTime::from_timestamp(5_000, 0).unwrap();
        store
            .append(&Event::new(
                EventKind::PluginUninstalled {
                    name: "counter".into(),
                },
                at,
            ))
            .unwrap();
        assert_eq!(store.load_events(None).unwrap()[0].timestamp, at);
    }

    #[test]
    fn test_open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let store = LedgerStore::open(&path).unwrap();
            store.set_counter(&addr("alice"), 7).unwrap();
        }
        let store = LedgerStore::open(&path).unwrap();
        assert_eq!(store.counter(&addr("alice")).unwrap(), 7);
    }
}
