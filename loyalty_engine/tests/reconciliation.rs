use std::{future::Future, pin::Pin, time::Duration};

use loyalty_common::{OrderNumber, Points};
use loyalty_engine::{
    accrual::{OracleError, ReconciliationWorker},
    db_types::OrderStatusType,
    events::{EventHandlers, EventHooks, EventProducers, OrderAccruedEvent, OrderStuckEvent},
    test_utils::{
        create_test_user,
        eventually,
        fast_worker_config,
        prepare_test_env,
        random_db_path,
        teardown,
        ScriptedOracle,
    },
    AccountManagement,
    AccrualOutcome,
    LedgerApiError,
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

fn number(s: &str) -> OrderNumber {
    s.parse().unwrap()
}

async fn status_of(db: &SqliteDatabase, n: &OrderNumber) -> Option<OrderStatusType> {
    db.fetch_order_by_number(n).await.unwrap().map(|o| o.status)
}

async fn balance_of(db: &SqliteDatabase, user_id: i64) -> Points {
    db.fetch_user_account(user_id).await.unwrap().unwrap().balance
}

#[tokio::test]
async fn rate_limited_order_is_credited_once_it_is_decided() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("12345678903");
    let oracle = ScriptedOracle::new();
    oracle.push_error(&n, OracleError::RateLimited { retry_after: None }).push_processed(&n, Points::from_whole(50));

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, n.as_str()).await.unwrap();

    eventually(WAIT, "order to be processed", || async {
        status_of(&db, &n).await == Some(OrderStatusType::Processed)
    })
    .await;
    assert_eq!(balance_of(&db, user_id).await, Points::from_whole(50));
    assert_eq!(oracle.calls_for(&n), 2);

    // The oracle repeating itself later changes nothing.
    let again = api.apply_accrual(n.as_str(), OrderStatusType::Processed, Some(Points::from_whole(50))).await.unwrap();
    assert!(matches!(again, AccrualOutcome::AlreadyTerminal(_)));
    assert_eq!(balance_of(&db, user_id).await, Points::from_whole(50));

    let stats = handle.shutdown().await;
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.applied, 1);
    teardown(db).await;
}

#[tokio::test]
async fn retry_after_pauses_every_oracle_call() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let (a, b) = (number("12345678903"), number("79927398713"));
    let oracle = ScriptedOracle::new();
    oracle
        .push_error(&a, OracleError::RateLimited { retry_after: Some(Duration::from_secs(1)) })
        .push_processed(&a, Points::from_whole(1));
    oracle.push_processed(&b, Points::from_whole(2));

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, a.as_str()).await.unwrap();
    eventually(WAIT, "first oracle call", || async { oracle.calls() == 1 }).await;
    api.submit_order(user_id, b.as_str()).await.unwrap();

    eventually(WAIT, "both orders to be processed", || async {
        balance_of(&db, user_id).await == Points::from_whole(3)
    })
    .await;
    let times = oracle.call_times();
    assert_eq!(times.len(), 3);
    for later in &times[1..] {
        assert!(*later - times[0] >= Duration::from_secs(1), "The oracle was called during a rate-limit pause");
    }
    handle.shutdown().await;
    teardown(db).await;
}

#[tokio::test]
async fn oracle_progress_is_followed_to_the_end() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("2377225624");
    let oracle = ScriptedOracle::new();
    oracle
        .push_status(&n, OrderStatusType::New)
        .push_status(&n, OrderStatusType::Processing)
        .push_error(&n, OracleError::ServerError(500))
        .push_processed(&n, Points::try_from(100.5).unwrap());

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, n.as_str()).await.unwrap();

    eventually(WAIT, "order to be processed", || async {
        status_of(&db, &n).await == Some(OrderStatusType::Processed)
    })
    .await;
    assert_eq!(balance_of(&db, user_id).await, Points::from_hundredths(10_050));
    assert_eq!(oracle.calls_for(&n), 4);
    let stats = handle.shutdown().await;
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.stuck, 0);
    teardown(db).await;
}

#[tokio::test]
async fn invalid_order_earns_nothing_and_fires_no_accrual_event() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("79927398713");
    let oracle = ScriptedOracle::new();
    oracle.push_status(&n, OrderStatusType::Invalid);

    let (tx, mut rx) = mpsc::channel::<OrderAccruedEvent>(4);
    let mut hooks = EventHooks::default();
    hooks.on_order_accrued(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(4, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), producers.clone(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), producers);
    api.submit_order(user_id, n.as_str()).await.unwrap();
    eventually(WAIT, "order to be invalidated", || async {
        status_of(&db, &n).await == Some(OrderStatusType::Invalid)
    })
    .await;
    assert_eq!(balance_of(&db, user_id).await, Points::ZERO);
    handle.shutdown().await;
    assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    teardown(db).await;
}

#[tokio::test]
async fn endless_garbage_makes_an_order_stuck() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("12345678903");
    let oracle = ScriptedOracle::new().with_fallback(Err(OracleError::Malformed("not json".into())));

    let (tx, mut rx) = mpsc::channel::<OrderStuckEvent>(4);
    let mut hooks = EventHooks::default();
    hooks.on_order_stuck(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(4, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), producers, fast_worker_config(3));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, n.as_str()).await.unwrap();

    let event = tokio::time::timeout(WAIT, rx.recv()).await.expect("No stuck event was published").unwrap();
    assert_eq!(event.number, n);
    assert_eq!(event.attempts, 4);
    assert!(event.last_error.contains("not json"));
    assert_eq!(oracle.calls_for(&n), 4);
    assert_eq!(status_of(&db, &n).await, Some(OrderStatusType::New));
    assert_eq!(balance_of(&db, user_id).await, Points::ZERO);
    let stats = handle.shutdown().await;
    assert_eq!(stats.stuck, 1);
    assert_eq!(stats.requeued, 3);
    assert_eq!(stats.scheduled, 0);
    teardown(db).await;
}

#[tokio::test]
async fn repeated_status_does_not_refill_the_retry_budget() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("12345678903");
    let oracle = ScriptedOracle::new();
    for _ in 0..30 {
        oracle
            .push_error(&n, OracleError::ServerError(500))
            .push_error(&n, OracleError::ServerError(500))
            .push_status(&n, OrderStatusType::New);
    }

    let (tx, mut rx) = mpsc::channel::<OrderStuckEvent>(4);
    let mut hooks = EventHooks::default();
    hooks.on_order_stuck(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(4, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), producers, fast_worker_config(3));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, n.as_str()).await.unwrap();

    // 500, 500, REGISTERED, 500, 500: the fourth failure spends the budget.
    let event = tokio::time::timeout(WAIT, rx.recv()).await.expect("No stuck event was published").unwrap();
    assert_eq!(event.number, n);
    assert_eq!(event.attempts, 4);
    assert_eq!(oracle.calls_for(&n), 5);
    assert_eq!(status_of(&db, &n).await, Some(OrderStatusType::New));
    let stats = handle.shutdown().await;
    assert_eq!(stats.stuck, 1);
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.requeued, 3);
    teardown(db).await;
}

#[tokio::test]
async fn duplicate_queue_entries_credit_once() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let n = number("2377225624");
    let oracle = ScriptedOracle::new()
        .with_fallback(Ok(loyalty_engine::db_types::AccrualDecision::processed(n.clone(), Points::from_whole(25))));

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    api.submit_order(user_id, n.as_str()).await.unwrap();
    handle.queue().enqueue(n.clone()).await.unwrap();

    eventually(WAIT, "both queue entries to be handled", || async { oracle.calls_for(&n) == 2 }).await;
    handle.shutdown().await;
    assert_eq!(balance_of(&db, user_id).await, Points::from_whole(25));
    teardown(db).await;
}

#[tokio::test]
async fn shutdown_drains_queue_and_restart_resumes_pending_orders() {
    let db = prepare_test_env(&random_db_path()).await;
    let user_id = create_test_user(&db, "alice").await.id;
    let numbers = ["12345678903", "79927398713", "2377225624"].map(number);
    let oracle = ScriptedOracle::new();
    for n in &numbers {
        oracle.push_processed(n, Points::from_whole(10));
    }

    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    for n in &numbers {
        api.submit_order(user_id, n.as_str()).await.unwrap();
    }
    handle.shutdown().await;
    for n in &numbers {
        assert_eq!(status_of(&db, n).await, Some(OrderStatusType::Processed), "{n} was not drained");
    }
    assert_eq!(balance_of(&db, user_id).await, Points::from_whole(30));

    // Submissions after shutdown are stored, but cannot be queued.
    let late = number("4561261212345467");
    let err = api.submit_order(user_id, late.as_str()).await.unwrap_err();
    assert_eq!(err, LedgerApiError::QueueClosed(late.clone()));
    assert_eq!(status_of(&db, &late).await, Some(OrderStatusType::New));

    oracle.push_processed(&late, Points::from_whole(7));
    let handle = ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(5));
    let api = OrderFlowApi::new(db.clone(), handle.queue(), EventProducers::default());
    assert_eq!(api.resume_pending_orders().await.unwrap(), 1);
    eventually(WAIT, "resumed order to be processed", || async {
        status_of(&db, &late).await == Some(OrderStatusType::Processed)
    })
    .await;
    assert_eq!(balance_of(&db, user_id).await, Points::from_whole(37));
    handle.shutdown().await;
    teardown(db).await;
}
