//! End-to-end behaviour of the subscription plugin through the account.

use std::cell::RefCell;
use std::rc::Rc;

use policy::Address;
use proptest::prelude::*;
use runtime::{
    Account, Call, ErrorKind, ExecutionSink, ManualClock, Outcome, RecordingSink, Request,
    SingleOwnerPlugin, SinkError, SubscriptionPlugin, Transfer,
};
use runtime::plugins::DEFAULT_PERIOD_SECS;
use storage::LedgerStore;

const PERIOD: i64 = 1_000;

fn addr(name: &str) -> Address {
    Address::new(name).unwrap()
}

fn payer() -> Address {
    addr("payer")
}

fn payee() -> Address {
    addr("payee")
}

fn account_with<S: ExecutionSink + 'static>(period: i64, clock: Rc<ManualClock>, sink: S) -> Account {
    let mut account = Account::new(
        addr("account"),
        LedgerStore::in_memory().unwrap(),
        clock,
        sink,
    );
    account.install(SingleOwnerPlugin::new(), &[], b"payer").unwrap();
    account
        .install(
            SubscriptionPlugin::with_period(period as u64),
            &["single-owner"],
            &[],
        )
        .unwrap();
    account
}

struct Fixture {
    account: Account,
    clock: Rc<ManualClock>,
    sink: Rc<RecordingSink>,
}

fn fixture(period: i64) -> Fixture {
    let clock = Rc::new(ManualClock::at(0));
    let sink = Rc::new(RecordingSink::new());
    let account = account_with(period, Rc::clone(&clock), Rc::clone(&sink));
    Fixture {
        account,
        clock,
        sink,
    }
}

fn subscribe(amount: u64) -> Request {
    Request::user_operation(
        payer(),
        Call::Subscribe {
            payee: payee(),
            amount,
        },
    )
}

fn collect(amount: u64) -> Request {
    Request::runtime(
        payee(),
        Call::Collect {
            payer: payer(),
            amount,
        },
    )
}

#[test]
fn test_subscribe_writes_fresh_record() {
    let f = fixture(PERIOD);
    let outcome = f.account.dispatch(&subscribe(100)).unwrap();

    let record = f.account.subscription(&payee(), &payer()).unwrap();
    assert_eq!(outcome, Outcome::Subscribed(record.clone()));
    assert_eq!(record.amount, 100);
    assert_eq!(record.last_collection, 0);
    assert!(record.enabled);
}

#[test]
fn test_subscribe_twice_is_idempotent() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    let first = f.account.subscription(&payee(), &payer()).unwrap();
    f.account.dispatch(&subscribe(100)).unwrap();
    assert_eq!(f.account.subscription(&payee(), &payer()).unwrap(), first);
}

#[test]
fn test_subscribe_last_write_wins() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.account.dispatch(&subscribe(70)).unwrap();
    assert_eq!(f.account.subscription(&payee(), &payer()).unwrap().amount, 70);
}

#[test]
fn test_subscribe_runtime_path_hits_deny_hook() {
    let f = fixture(PERIOD);
    let request = Request::runtime(
        payer(),
        Call::Subscribe {
            payee: payee(),
            amount: 100,
        },
    );
    let err = f.account.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HookRejected);
    assert!(!f.account.subscription(&payee(), &payer()).unwrap().enabled);
}

#[test]
fn test_subscribe_requires_owner() {
    let f = fixture(PERIOD);
    let request = Request::user_operation(
        addr("mallory"),
        Call::Subscribe {
            payee: payee(),
            amount: 100,
        },
    );
    let err = f.account.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn test_collect_as_user_operation_is_closed() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.clock.set(PERIOD);

    for caller in [payee(), payer()] {
        let request = Request::user_operation(
            caller,
            Call::Collect {
                payer: payer(),
                amount: 100,
            },
        );
        let err = f.account.dispatch(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
    assert!(f.sink.transfers().is_empty());
}

#[test]
fn test_collect_without_subscription_is_not_enabled() {
    let f = fixture(PERIOD);
    f.clock.set(PERIOD * 10);
    let err = f.account.dispatch(&collect(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEnabled);
}

#[test]
fn test_collect_is_keyed_by_caller() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.clock.set(PERIOD);

    let request = Request::runtime(
        addr("stranger"),
        Call::Collect {
            payer: payer(),
            amount: 100,
        },
    );
    let err = f.account.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEnabled);
}

#[test]
fn test_resubscribe_resets_eligibility() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.clock.set(PERIOD);
    f.account.dispatch(&collect(100)).unwrap();

    f.clock.set(PERIOD + 1);
    assert_eq!(
        f.account.dispatch(&collect(100)).unwrap_err().kind(),
        ErrorKind::TooSoon
    );

    f.account.dispatch(&subscribe(100)).unwrap();
    f.account.dispatch(&subscribe(100)).unwrap();
    f.account.dispatch(&collect(100)).unwrap();
    assert_eq!(f.sink.transfers().len(), 2);
}

#[test]
fn test_period_gate_boundary() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();

    let t = 5_000;
    f.clock.set(t);
    f.account.dispatch(&collect(100)).unwrap();

    f.clock.set(t + PERIOD - 1);
    let err = f.account.dispatch(&collect(100)).unwrap_err();
    assert!(matches!(
        err,
        runtime::Error::TooSoon { now, next_eligible } if now == t + PERIOD - 1 && next_eligible == t + PERIOD
    ));

    f.clock.set(t + PERIOD);
    let outcome = f.account.dispatch(&collect(100)).unwrap();
    assert_eq!(
        outcome,
        Outcome::Collected {
            payee: payee(),
            payer: payer(),
            amount: 100,
            at: t + PERIOD,
        }
    );
    assert_eq!(
        f.account.subscription(&payee(), &payer()).unwrap().last_collection,
        t + PERIOD
    );
}

#[test]
fn test_exact_amount_edges() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.clock.set(PERIOD);

    for amount in [0, 99, 101, u64::MAX] {
        let err = f.account.dispatch(&collect(amount)).unwrap_err();
        assert!(matches!(
            err,
            runtime::Error::AmountMismatch { expected: 100, provided } if provided == amount
        ));
    }
    assert!(f.sink.transfers().is_empty());
    assert_eq!(
        f.account.subscription(&payee(), &payer()).unwrap().last_collection,
        0
    );
}

#[test]
fn test_zero_amount_subscription_collects_zero() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(0)).unwrap();
    f.clock.set(PERIOD);
    assert_eq!(
        f.account.dispatch(&collect(1)).unwrap_err().kind(),
        ErrorKind::AmountMismatch
    );
    f.account.dispatch(&collect(0)).unwrap();
}

proptest! {
    #[test]
    fn prop_any_other_amount_is_rejected(stored in any::<u64>(), requested in any::<u64>()) {
        prop_assume!(stored != requested);
        let f = fixture(PERIOD);
        f.account.dispatch(&subscribe(stored)).unwrap();
        f.clock.set(PERIOD);
        let err = f.account.dispatch(&collect(requested)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::AmountMismatch);
        prop_assert!(f.sink.transfers().is_empty());
    }
}

/// Re-enters `collect` with the same request from inside the transfer.
struct ReentrantSink {
    request: Request,
    transfers: RefCell<Vec<Transfer>>,
    reentrant: RefCell<Vec<ErrorKind>>,
}

impl ExecutionSink for ReentrantSink {
    fn execute(&self, account: &Account, transfer: &Transfer) -> Result<(), SinkError> {
        self.transfers.borrow_mut().push(transfer.clone());
        if self.reentrant.borrow().is_empty() {
            let kind = match account.dispatch(&self.request) {
                Ok(_) => return Err(SinkError("re-entrant collect succeeded".into())),
                Err(err) => err.kind(),
            };
            self.reentrant.borrow_mut().push(kind);
        }
        Ok(())
    }
}

#[test]
fn test_reentrant_collect_sees_advanced_timestamp() {
    let clock = Rc::new(ManualClock::at(0));
    let sink = Rc::new(ReentrantSink {
        request: collect(100),
        transfers: RefCell::default(),
        reentrant: RefCell::default(),
    });
    let account = account_with(PERIOD, Rc::clone(&clock), Rc::clone(&sink));

    account.dispatch(&subscribe(100)).unwrap();
    clock.set(PERIOD);
    account.dispatch(&collect(100)).unwrap();

    assert_eq!(*sink.reentrant.borrow(), vec![ErrorKind::TooSoon]);
    assert_eq!(sink.transfers.borrow().len(), 1);
    assert_eq!(
        account.subscription(&payee(), &payer()).unwrap().last_collection,
        PERIOD
    );
}

#[test]
fn test_sink_failure_leaves_record_unchanged() {
    let clock = Rc::new(ManualClock::at(0));
    let account = account_with(PERIOD, Rc::clone(&clock), RecordingSink::rejecting("insufficient funds"));

    account.dispatch(&subscribe(100)).unwrap();
    clock.set(PERIOD);
    let err = account.dispatch(&collect(100)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sink);
    assert_eq!(
        account.subscription(&payee(), &payer()).unwrap().last_collection,
        0
    );
    assert!(account.events(Some("collected")).unwrap().is_empty());
}

/// Hands ownership to `heir` from inside the transfer, then refuses it.
struct HandoverThenFailSink {
    heir: Address,
    handover: RefCell<Option<Result<(), ErrorKind>>>,
}

impl ExecutionSink for HandoverThenFailSink {
    fn execute(&self, account: &Account, _transfer: &Transfer) -> Result<(), SinkError> {
        let request = Request::user_operation(
            payer(),
            Call::TransferOwnership {
                new_owner: self.heir.clone(),
            },
        );
        let result = account.dispatch(&request).map(|_| ()).map_err(|e| e.kind());
        *self.handover.borrow_mut() = Some(result);
        Err(SinkError("transfer refused".into()))
    }
}

#[test]
fn test_failed_collect_rolls_back_reentrant_ownership_change() {
    let clock = Rc::new(ManualClock::at(0));
    let sink = Rc::new(HandoverThenFailSink {
        heir: addr("mallory"),
        handover: RefCell::default(),
    });
    let account = account_with(PERIOD, Rc::clone(&clock), Rc::clone(&sink));

    account.dispatch(&subscribe(100)).unwrap();
    clock.set(PERIOD);
    let err = account.dispatch(&collect(100)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sink);
    assert_eq!(*sink.handover.borrow(), Some(Ok(())));

    assert_eq!(account.owner().unwrap(), Some(payer()));
    assert!(account.events(Some("ownership_transferred")).unwrap().is_empty());

    let hijack = Request::user_operation(
        addr("mallory"),
        Call::Subscribe {
            payee: payee(),
            amount: 1,
        },
    );
    assert_eq!(
        account.dispatch(&hijack).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    account.dispatch(&subscribe(200)).unwrap();
    assert_eq!(account.subscription(&payee(), &payer()).unwrap().amount, 200);
}

#[test]
fn test_immediate_collection_only_with_zero_period() {
    let f = fixture(0);
    f.account.dispatch(&subscribe(100)).unwrap();
    f.account.dispatch(&collect(100)).unwrap();
    assert_eq!(f.sink.transfers().len(), 1);
}

#[test]
fn test_end_to_end_billing_cycle() {
    let period = DEFAULT_PERIOD_SECS as i64;
    let f = fixture(period);

    f.account.dispatch(&subscribe(100)).unwrap();

    assert_eq!(
        f.account.dispatch(&collect(100)).unwrap_err().kind(),
        ErrorKind::TooSoon
    );

    f.clock.set(period - 1);
    assert_eq!(
        f.account.dispatch(&collect(100)).unwrap_err().kind(),
        ErrorKind::TooSoon
    );

    f.clock.set(period);
    f.account.dispatch(&collect(100)).unwrap();

    f.clock.set(2 * period);
    assert_eq!(
        f.account.dispatch(&collect(50)).unwrap_err().kind(),
        ErrorKind::AmountMismatch
    );

    assert_eq!(
        f.sink.transfers(),
        vec![Transfer {
            from: payer(),
            to: payee(),
            amount: 100,
            payload: Vec::new(),
        }]
    );
}

#[test]
fn test_ownership_change_applies_to_next_call() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();

    f.account
        .dispatch(&Request::user_operation(
            payer(),
            Call::TransferOwnership {
                new_owner: addr("heir"),
            },
        ))
        .unwrap();

    let err = f.account.dispatch(&subscribe(200)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(f.account.subscription(&payee(), &payer()).unwrap().amount, 100);
}

#[test]
fn test_audit_log_records_decisions() {
    let f = fixture(PERIOD);
    f.account.dispatch(&subscribe(100)).unwrap();
    let _ = f.account.dispatch(&collect(100));

    assert_eq!(f.account.events(Some("subscribed")).unwrap().len(), 1);
    assert_eq!(f.account.events(Some("authorized")).unwrap().len(), 2);
    assert!(f.account.events(Some("collected")).unwrap().is_empty());
}
