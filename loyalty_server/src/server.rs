use std::{fs, path::Path, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{
    accrual::{HttpAccrualOracle, ReconciliationQueue, ReconciliationWorker},
    events::{EventHandlers, EventHooks, EventProducers},
    AccountApi,
    AccountManagement,
    AuthApi,
    AuthManagement,
    LedgerDatabase,
    OrderFlowApi,
    SqliteDatabase,
    WithdrawalApi,
};

use crate::{
    auth::SessionSigner,
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        LoginRoute,
        MyBalanceRoute,
        MyOrdersRoute,
        MyWithdrawalsRoute,
        RegisterRoute,
        SubmitOrderRoute,
        WithdrawRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

/// Opens the ledger, starts the reconciliation worker and serves HTTP until the server is stopped. The worker is
/// drained and stopped after the HTTP server exits.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_dir(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Ledger database ready at {}", config.database_url);

    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let oracle = HttpAccrualOracle::new(&config.accrual_url, config.oracle_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let worker = ReconciliationWorker::start(db.clone(), oracle, producers.clone(), config.worker);
    resume_pending_orders(OrderFlowApi::new(db.clone(), worker.queue(), producers.clone()));

    let srv = create_server_instance(config, db, worker.queue(), producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    let stats = worker.shutdown().await;
    info!(
        "🚀️ Reconciliation worker stopped. {} decisions applied, {} retries, {} stuck orders, {} left pending",
        stats.applied, stats.requeued, stats.stuck, stats.scheduled
    );
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    queue: ReconciliationQueue,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let signer = SessionSigner::new(&config.cookie_secret)?;
    let srv = HttpServer::new(move || {
        let db = db.clone();
        let queue = queue.clone();
        let producers = producers.clone();
        let signer = signer.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("loyalty::access_log"))
            .configure(move |cfg| configure_api(cfg, db, queue, producers, signer))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the ledger APIs and every route on `cfg`.
pub fn configure_api<B>(
    cfg: &mut web::ServiceConfig,
    db: B,
    queue: ReconciliationQueue,
    producers: EventProducers,
    signer: SessionSigner,
) where
    B: LedgerDatabase + AccountManagement + AuthManagement,
{
    let orders_api = OrderFlowApi::new(db.clone(), queue, producers.clone());
    let accounts_api = AccountApi::new(db.clone());
    let auth_api = AuthApi::new(db.clone());
    let withdrawal_api = WithdrawalApi::new(db, producers);
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into());
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(accounts_api))
        .app_data(web::Data::new(auth_api))
        .app_data(web::Data::new(withdrawal_api))
        .app_data(web::Data::new(signer))
        .app_data(json_config)
        .service(health)
        .service(
            web::scope("/api")
                .service(RegisterRoute::<B>::new())
                .service(LoginRoute::<B>::new())
                .service(SubmitOrderRoute::<B>::new())
                .service(MyOrdersRoute::<B>::new())
                .service(MyBalanceRoute::<B>::new())
                .service(WithdrawRoute::<B>::new())
                .service(MyWithdrawalsRoute::<B>::new()),
        );
}

/// SQLite creates a missing database file, but not the directory it lives in.
fn ensure_database_dir(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Queues orders left pending by a previous run. This runs in the background, since a backlog larger than the queue
/// has to wait for the worker to make room.
fn resume_pending_orders(api: OrderFlowApi<SqliteDatabase>) {
    tokio::spawn(async move {
        match api.resume_pending_orders().await {
            Ok(0) => debug!("🚀️ No pending orders to resume"),
            Ok(n) => info!("🚀️ {n} pending orders were queued for reconciliation"),
            Err(e) => error!("🚀️ Could not resume pending orders. {e}"),
        }
    });
}

fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_accrued(|ev| {
            Box::pin(async move {
                let accrual = ev.order.accrual.unwrap_or_default();
                info!("📬️ Order {} credited {accrual} points to user #{}", ev.order.number, ev.order.user_id);
            })
        })
        .on_order_stuck(|ev| {
            Box::pin(async move {
                warn!(
                    "📬️ Order {} is stuck after {} attempts. It stays pending until the next restart. Last error: {}",
                    ev.number, ev.attempts, ev.last_error
                );
            })
        })
        .on_withdrawal(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ User #{} withdrew {} points against {}",
                    ev.withdrawal.user_id, ev.withdrawal.sum, ev.withdrawal.order_number
                );
            })
        });
    hooks
}
