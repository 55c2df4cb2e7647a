//! Integration tests for declarative transition tables.

use futures_util::FutureExt;
use statekit::core::Blocking;
use statekit::declarative::{DeclarationError, Guard, Rule, TransitionTable};
use statekit::subscriber::History;
use statekit::{sdk, state_enum, AsyncUnaryMachine, Call, Error, StateError, Termination};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

state_enum! {
    enum Door {
        Closed,
        Opened,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum DoorTrigger {
    Open,
    Close,
}

#[derive(Default)]
struct Hinges {
    swings: u32,
}

fn door_table() -> Arc<TransitionTable<Door, DoorTrigger, Hinges, (), String>> {
    TransitionTable::builder()
        .initial(Door::Closed)
        .state(Door::Opened)
        .action(DoorTrigger::Open, |hinges: &mut Hinges, _: ()| {
            hinges.swings += 1;
            Ok(format!("Opened (swing {})", hinges.swings))
        })
        .action(DoorTrigger::Close, |hinges: &mut Hinges, _: ()| {
            hinges.swings += 1;
            Ok(format!("Closed (swing {})", hinges.swings))
        })
        .rule(Rule::new(DoorTrigger::Open).from(Door::Closed).to(Door::Opened))
        .rule(Rule::new(DoorTrigger::Close).from(Door::Opened).to(Door::Closed))
        .idempotent(DoorTrigger::Open, Door::Opened, |hinges: &Hinges| {
            format!("Opened (swing {})", hinges.swings)
        })
        .build()
        .unwrap()
}

#[test]
fn door_open_is_idempotent() {
    let mut door = door_table().machine(Hinges::default());

    assert_eq!(door.fire(DoorTrigger::Open, ()).unwrap(), "Opened (swing 1)");
    assert_eq!(door.fire(DoorTrigger::Open, ()).unwrap(), "Opened (swing 1)");
    assert_eq!(door.fire(DoorTrigger::Open, ()).unwrap(), "Opened (swing 1)");
    assert_eq!(*door.phase(), Door::Opened);
    assert_eq!(door.model().swings, 1);

    assert_eq!(door.fire(DoorTrigger::Close, ()).unwrap(), "Closed (swing 2)");
    let error = door.fire(DoorTrigger::Close, ()).unwrap_err();
    assert!(error.is_invalid_state());
    assert_eq!(*door.phase(), Door::Closed);
}

#[test]
fn shared_table_keeps_models_apart() {
    let table = door_table();
    let mut front = table.machine(Hinges::default());
    let mut back = table.machine(Hinges { swings: 10 });

    front.fire(DoorTrigger::Open, ()).unwrap();
    assert_eq!(back.fire(DoorTrigger::Open, ()).unwrap(), "Opened (swing 11)");

    assert_eq!(front.model().swings, 1);
    assert_eq!(back.model().swings, 11);
    assert_ne!(front.id(), back.id());
}

#[test]
fn declarative_machine_records_history() {
    let history = Arc::new(History::new());
    let mut door = door_table().machine(Hinges::default());
    door.subscribe_shared(history.clone());

    door.fire(DoorTrigger::Open, ()).unwrap();
    door.fire(DoorTrigger::Open, ()).unwrap();
    door.fire(DoorTrigger::Close, ()).unwrap();

    let log = history.snapshot();
    assert_eq!(log.get_path(), vec!["Closed", "Opened", "Closed"]);
    assert_eq!(log.transitions()[0].trigger.as_deref(), Some("Open(())"));
}

#[derive(Debug, Error)]
#[error("negative value {0} rejected")]
struct NegativeValue(i64);

state_enum! {
    enum Store {
        Idle,
        Opened,
        Broken,
        Closed,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum StoreOp {
    Open,
    Extend,
    Recover,
    Close,
}

#[derive(Default)]
struct Numbers {
    values: Vec<i64>,
}

fn store_table() -> Arc<TransitionTable<Store, StoreOp, Numbers, Vec<i64>, usize>> {
    TransitionTable::builder()
        .initial(Store::Idle)
        .state(Store::Opened)
        .state(Store::Closed)
        .fallback_when(Store::Broken, |error| error.is::<NegativeValue>())
        .action(StoreOp::Open, |numbers: &mut Numbers, _: Vec<i64>| {
            Ok(numbers.values.len())
        })
        .action(StoreOp::Extend, |numbers: &mut Numbers, values: Vec<i64>| {
            for value in values {
                if value < 0 {
                    return Err(StateError::failed(NegativeValue(value)));
                }
                numbers.values.push(value);
            }
            Ok(numbers.values.len())
        })
        .action(StoreOp::Recover, |numbers: &mut Numbers, limit: Vec<i64>| {
            if let Some(&limit) = limit.first() {
                numbers.values.retain(|value| *value <= limit);
            }
            Ok(numbers.values.len())
        })
        .action(StoreOp::Close, |numbers: &mut Numbers, _: Vec<i64>| {
            Ok(numbers.values.len())
        })
        .rule(Rule::new(StoreOp::Open).from(Store::Idle).to(Store::Opened))
        .rule(Rule::new(StoreOp::Extend).from(Store::Opened))
        .rule(Rule::new(StoreOp::Recover).from(Store::Broken).to(Store::Opened))
        .rule(
            Rule::new(StoreOp::Close)
                .from(Store::Opened)
                .from(Store::Broken)
                .to(Store::Closed),
        )
        .idempotent(StoreOp::Close, Store::Closed, |numbers: &Numbers| {
            numbers.values.len()
        })
        .build()
        .unwrap()
}

#[test]
fn failing_action_enters_fallback_and_keeps_partial_work() {
    let mut store = store_table().machine(Numbers::default());

    assert_eq!(store.fire(StoreOp::Open, vec![]).unwrap(), 0);
    assert_eq!(store.fire(StoreOp::Extend, vec![1, 2]).unwrap(), 2);

    let error = store.fire(StoreOp::Extend, vec![3, -4, 5]).unwrap_err();
    match &error {
        Error::Handler { state, source } => {
            assert_eq!(state, "Opened");
            assert!(source.is::<NegativeValue>());
        }
        other => panic!("Expected Handler error, got {other:?}"),
    }
    assert_eq!(*store.phase(), Store::Broken);
    assert_eq!(store.model().values, vec![1, 2, 3]);

    // Only recovery and closing are allowed while broken.
    assert!(store.fire(StoreOp::Extend, vec![6]).unwrap_err().is_invalid_state());
    assert_eq!(store.fire(StoreOp::Recover, vec![2]).unwrap(), 2);
    assert_eq!(*store.phase(), Store::Opened);
    assert_eq!(store.model().values, vec![1, 2]);
}

#[test]
fn fallback_filter_skips_other_failures() {
    let table = TransitionTable::builder()
        .initial(Store::Idle)
        .state(Store::Opened)
        .fallback_when(Store::Broken, |error| error.is::<NegativeValue>())
        .action(StoreOp::Open, |_: &mut Numbers, input: Vec<i64>| {
            if input.is_empty() {
                Err(StateError::failed("nothing to open with"))
            } else {
                Ok(input.len())
            }
        })
        .rule(Rule::new(StoreOp::Open).from(Store::Idle).to(Store::Opened))
        .build()
        .unwrap();
    let mut store = table.machine(Numbers::default());

    assert!(matches!(
        store.fire(StoreOp::Open, vec![]),
        Err(Error::Handler { .. })
    ));
    assert_eq!(*store.phase(), Store::Idle);
    assert_eq!(store.fire(StoreOp::Open, vec![1]).unwrap(), 1);
}

#[test]
fn close_is_idempotent_once_closed() {
    let mut store = store_table().machine(Numbers::default());
    store.fire(StoreOp::Open, vec![]).unwrap();
    store.fire(StoreOp::Extend, vec![7, 8, 9]).unwrap();

    assert_eq!(store.fire(StoreOp::Close, vec![]).unwrap(), 3);
    assert_eq!(store.fire(StoreOp::Close, vec![]).unwrap(), 3);
    assert_eq!(*store.phase(), Store::Closed);
    assert!(!store.is_terminal());
    assert!(store.fire(StoreOp::Extend, vec![1]).unwrap_err().is_invalid_state());
}

state_enum! {
    enum OrderState {
        WaitingForOrder,
        WaitingForPayment,
        Processing,
        Shipping,
        Completed,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum OrderTrigger {
    AddItem,
    Submit,
    Pay,
    Ship,
    Deliver,
}

#[derive(Default)]
struct Order {
    items: Vec<u32>,
    paid: u32,
    shipment: Option<u32>,
}

impl Order {
    fn total(&self) -> u32 {
        self.items.iter().sum()
    }
}

fn order_table() -> Arc<TransitionTable<OrderState, OrderTrigger, Order, u32, String>> {
    let empty = Guard::new(|order: &Order| order.items.is_empty());
    let enough = Guard::new(|order: &Order| order.paid >= order.total());

    TransitionTable::builder()
        .initial(OrderState::WaitingForOrder)
        .state(OrderState::WaitingForPayment)
        .state(OrderState::Processing)
        .state(OrderState::Shipping)
        .final_state(OrderState::Completed)
        .action(OrderTrigger::AddItem, |order: &mut Order, price: u32| {
            order.items.push(price);
            Ok(format!("{} items", order.items.len()))
        })
        .action(OrderTrigger::Submit, |order: &mut Order, _: u32| {
            Ok(format!("total {}", order.total()))
        })
        .action(OrderTrigger::Pay, |order: &mut Order, amount: u32| {
            order.paid += amount;
            Ok(format!("paid {} of {}", order.paid, order.total()))
        })
        .action(OrderTrigger::Ship, |order: &mut Order, id: u32| {
            if id == 0 {
                return Err(StateError::invalid("shipment id must not be zero"));
            }
            order.shipment = Some(id);
            Ok(format!("shipment {id}"))
        })
        .action(OrderTrigger::Deliver, |order: &mut Order, id: u32| {
            match order.shipment {
                Some(expected) if expected == id => Ok(format!("delivered {id}")),
                _ => Err(StateError::invalid(format!("unknown shipment {id}"))),
            }
        })
        .rule(Rule::new(OrderTrigger::AddItem).from(OrderState::WaitingForOrder))
        .rule(
            Rule::new(OrderTrigger::Submit)
                .from(OrderState::WaitingForOrder)
                .to(OrderState::WaitingForPayment)
                .when_not(empty),
        )
        .rule(
            Rule::new(OrderTrigger::Pay)
                .from(OrderState::WaitingForPayment)
                .to(OrderState::Processing)
                .when(enough)
                .otherwise(OrderState::WaitingForPayment),
        )
        .rule(
            Rule::new(OrderTrigger::Ship)
                .from(OrderState::Processing)
                .to(OrderState::Shipping),
        )
        .rule(
            Rule::new(OrderTrigger::Deliver)
                .from(OrderState::Shipping)
                .to(OrderState::Completed),
        )
        .build()
        .unwrap()
}

#[test]
fn order_runs_to_completion() {
    let history = Arc::new(History::new());
    let mut order = sdk::Builder::new(order_table().declared(Order::default()))
        .shared_subscriber(history.clone())
        .declarative();

    assert_eq!(order.fire(OrderTrigger::AddItem, 30).unwrap(), "1 items");
    assert_eq!(order.fire(OrderTrigger::AddItem, 20).unwrap(), "2 items");
    assert_eq!(order.fire(OrderTrigger::Submit, 0).unwrap(), "total 50");
    assert_eq!(order.fire(OrderTrigger::Pay, 40).unwrap(), "paid 40 of 50");
    assert_eq!(*order.phase(), OrderState::WaitingForPayment);
    assert_eq!(order.fire(OrderTrigger::Pay, 10).unwrap(), "paid 50 of 50");
    assert_eq!(*order.phase(), OrderState::Processing);

    let error = order.fire(OrderTrigger::Ship, 0).unwrap_err();
    assert!(error.is_invalid_state());
    assert_eq!(*order.phase(), OrderState::Processing);

    assert_eq!(order.fire(OrderTrigger::Ship, 7).unwrap(), "shipment 7");
    assert!(order.fire(OrderTrigger::Deliver, 8).unwrap_err().is_invalid_state());
    assert_eq!(order.fire(OrderTrigger::Deliver, 7).unwrap(), "delivered 7");

    assert!(order.is_terminal());
    assert_eq!(
        order.termination(),
        Some(&Termination::Finished("Completed".to_string()))
    );
    assert!(order.fire(OrderTrigger::AddItem, 1).unwrap_err().is_closed());

    assert_eq!(
        history.snapshot().get_path(),
        vec![
            "WaitingForOrder",
            "WaitingForPayment",
            "WaitingForPayment",
            "Processing",
            "Shipping",
            "Completed",
        ]
    );
}

#[test]
fn failed_guard_keeps_state_and_returns_outcome() {
    let mut order = order_table().machine(Order::default());

    assert_eq!(order.fire(OrderTrigger::Submit, 0).unwrap(), "total 0");
    assert_eq!(*order.phase(), OrderState::WaitingForOrder);
    assert!(!order.is_terminal());
}

#[test]
fn model_change_survives_rejecting_guard() {
    state_enum! {
        enum Checkout {
            Waiting,
            Paid,
        }
    }

    let table = TransitionTable::builder()
        .initial(Checkout::Waiting)
        .state(Checkout::Paid)
        .action("pay", |paid: &mut u32, amount: u32| {
            *paid += amount;
            Ok(format!("paid {paid}"))
        })
        .rule(
            Rule::new("pay")
                .from(Checkout::Waiting)
                .to(Checkout::Paid)
                .when(Guard::new(|paid: &u32| *paid >= 50)),
        )
        .build()
        .unwrap();

    let mut checkout = table.machine(0);
    assert_eq!(checkout.fire("pay", 40).unwrap(), "paid 40");
    assert_eq!(*checkout.phase(), Checkout::Waiting);
    assert_eq!(*checkout.model(), 40);

    assert_eq!(checkout.fire("pay", 10).unwrap(), "paid 50");
    assert_eq!(*checkout.phase(), Checkout::Paid);
}

#[test]
fn undeclared_trigger_is_rejected_without_running_action() {
    let mut order = order_table().machine(Order::default());

    assert!(order.fire(OrderTrigger::Pay, 100).unwrap_err().is_invalid_state());
    assert_eq!(order.model().paid, 0);
}

#[test]
fn combined_guards_pick_the_branch() {
    let high = Guard::new(|n: &u32| *n >= 10);
    let even = Guard::new(|n: &u32| n % 2 == 0);
    let high_and_even = high.clone().and(even.clone());
    let high_or_even = high.or(even);

    for (value, both, either) in [(12, true, true), (11, false, true), (4, false, true), (3, false, false)] {
        assert_eq!(high_and_even.check(&value), both, "and({value})");
        assert_eq!(high_or_even.check(&value), either, "or({value})");
        assert_eq!((!high_and_even.clone()).check(&value), !both);
    }

    state_enum! {
        enum Gate {
            Low,
            High,
        }
    }

    let table = TransitionTable::builder()
        .initial(Gate::Low)
        .state(Gate::High)
        .action("set", |n: &mut u32, value: u32| {
            *n = value;
            Ok(value)
        })
        .rule(
            Rule::new("set")
                .from(Gate::Low)
                .from(Gate::High)
                .to(Gate::High)
                .when(high_and_even)
                .otherwise(Gate::Low),
        )
        .build()
        .unwrap();

    let mut gate = table.machine(0);
    gate.fire("set", 12).unwrap();
    assert_eq!(*gate.phase(), Gate::High);
    gate.fire("set", 11).unwrap();
    assert_eq!(*gate.phase(), Gate::Low);
}

#[test]
fn overlapping_guards_are_ambiguous() {
    let big = Guard::new(|n: &u32| *n > 100);
    let odd = Guard::new(|n: &u32| n % 2 == 1);

    let result = TransitionTable::<Door, &str, u32, (), ()>::builder()
        .initial(Door::Closed)
        .state(Door::Opened)
        .action("push", |_: &mut u32, _: ()| Ok(()))
        .rule(Rule::new("push").from(Door::Closed).to(Door::Opened).when(big))
        .rule(Rule::new("push").from(Door::Closed).when(odd))
        .build();

    assert!(matches!(
        result,
        Err(DeclarationError::AmbiguousRule { ref state, .. }) if state == "Closed"
    ));
}

#[test]
fn complementary_rules_are_accepted() {
    let big = Guard::new(|n: &u32| *n > 100);

    let table = TransitionTable::<Door, &str, u32, u32, u32>::builder()
        .initial(Door::Closed)
        .state(Door::Opened)
        .action("push", |n: &mut u32, amount: u32| {
            *n += amount;
            Ok(*n)
        })
        .rule(Rule::new("push").from(Door::Closed).to(Door::Opened).when(big.clone()))
        .rule(Rule::new("push").from(Door::Closed).when_not(big))
        .build()
        .unwrap();

    let mut door = table.machine(0);
    assert_eq!(door.fire("push", 60).unwrap(), 60);
    assert_eq!(*door.phase(), Door::Closed);
    assert_eq!(door.fire("push", 60).unwrap(), 120);
    assert_eq!(*door.phase(), Door::Opened);
}

#[test]
fn declared_table_runs_on_async_engine() {
    let mut door: AsyncUnaryMachine<_, Call<DoorTrigger, ()>, String> =
        sdk::async_unary(Blocking(door_table().declared(Hinges::default())));

    let opened = door
        .handle(Call::new(DoorTrigger::Open, ()))
        .now_or_never()
        .unwrap()
        .unwrap();
    assert_eq!(opened.as_deref(), Some("Opened (swing 1)"));
    assert_eq!(*door.state().get_ref().phase(), Door::Opened);

    let closed = door
        .handle(Call::new(DoorTrigger::Close, ()))
        .now_or_never()
        .unwrap()
        .unwrap();
    assert_eq!(closed.as_deref(), Some("Closed (swing 2)"));
    assert_eq!(door.state().get_ref().model().swings, 2);
}

state_enum! {
    enum Fetch {
        Idle,
        Loaded,
        Offline,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum FetchOp {
    Load,
    Peek,
}

#[derive(Debug, Default)]
struct Cache {
    pages: Vec<String>,
}

fn fetch_table() -> Arc<TransitionTable<Fetch, FetchOp, Cache, &'static str, usize>> {
    TransitionTable::builder()
        .initial(Fetch::Idle)
        .state(Fetch::Loaded)
        .fallback(Fetch::Offline)
        .async_action(FetchOp::Load, |cache: &mut Cache, page: &'static str| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                if page.is_empty() {
                    return Err(StateError::failed("empty page name"));
                }
                cache.pages.push(page.to_string());
                Ok(cache.pages.len())
            })
        })
        .action(FetchOp::Peek, |cache: &mut Cache, _: &'static str| Ok(cache.pages.len()))
        .rule(Rule::new(FetchOp::Load).from(Fetch::Idle).from(Fetch::Loaded).to(Fetch::Loaded))
        .rule(Rule::new(FetchOp::Peek).from(Fetch::Idle).from(Fetch::Loaded))
        .build()
        .unwrap()
}

#[tokio::test]
async fn suspending_action_runs_on_spawned_machine() {
    let history = Arc::new(History::new());
    let mut fetch = sdk::Builder::new(fetch_table().declared(Cache::default()))
        .shared_subscriber(history.clone())
        .async_declarative();

    let task = tokio::spawn(async move {
        let first = fetch.fire(FetchOp::Load, "home").await?;
        let second = fetch.fire(FetchOp::Load, "about").await?;
        let peeked = fetch.fire(FetchOp::Peek, "").await?;
        Ok::<_, Error>(((first, second, peeked), fetch))
    });
    let (outcomes, fetch) = task.await.unwrap().unwrap();

    assert_eq!(outcomes, (1, 2, 2));
    assert_eq!(*fetch.phase(), Fetch::Loaded);
    assert_eq!(fetch.model().pages, vec!["home", "about"]);
    assert_eq!(history.snapshot().get_path(), vec!["Idle", "Loaded", "Loaded"]);
}

#[tokio::test]
async fn suspending_action_failure_enters_fallback() {
    let mut fetch = fetch_table().async_machine(Cache::default());

    let error = fetch.fire(FetchOp::Load, "").await.unwrap_err();

    assert!(matches!(error, Error::Handler { ref state, .. } if state == "Idle"));
    assert_eq!(*fetch.phase(), Fetch::Offline);
    assert!(fetch.fire(FetchOp::Peek, "").await.unwrap_err().is_invalid_state());
}

#[test]
fn blocking_machine_refuses_suspending_action() {
    let mut fetch = fetch_table().machine(Cache::default());

    assert_eq!(fetch.fire(FetchOp::Peek, "").unwrap(), 0);
    let error = fetch.fire(FetchOp::Load, "home").unwrap_err();

    assert!(error.is_invalid_state());
    assert_eq!(*fetch.phase(), Fetch::Idle);
    assert!(fetch.model().pages.is_empty());
}

#[test]
fn final_state_cannot_be_fallback() {
    let result = TransitionTable::<Door, &str, u32, (), ()>::builder()
        .initial(Door::Closed)
        .final_state(Door::Opened)
        .fallback(Door::Opened)
        .action("push", |_: &mut u32, _: ()| Ok(()))
        .rule(Rule::new("push").from(Door::Closed).to(Door::Opened))
        .build();

    assert!(matches!(
        result,
        Err(DeclarationError::FinalFallback { ref state }) if state == "Opened"
    ));
}
