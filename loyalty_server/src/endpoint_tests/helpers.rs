use actix_web::{cookie::Cookie, http::StatusCode, test, test::TestRequest, App};
use loyalty_common::Secret;
use loyalty_engine::{
    accrual::{ReconciliationHandle, ReconciliationWorker},
    events::EventProducers,
    test_utils::{fast_worker_config, prepare_test_env, random_db_path, teardown, ScriptedOracle},
    SqliteDatabase,
};
use serde::de::DeserializeOwned;

use crate::{
    auth::{SessionSigner, SESSION_COOKIE},
    server::configure_api,
};

/// A fresh ledger with a running reconciliation worker backed by a scripted oracle.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub oracle: ScriptedOracle,
    pub signer: SessionSigner,
    worker: ReconciliationHandle,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let oracle = ScriptedOracle::new();
        let worker =
            ReconciliationWorker::start(db.clone(), oracle.clone(), EventProducers::default(), fast_worker_config(3));
        let signer = SessionSigner::new(&Secret::new("endpoint-test-secret".to_string())).unwrap();
        Self { db, oracle, signer, worker }
    }

    /// A session token for `user_id`, as the login endpoint would issue it.
    pub fn session_for(&self, user_id: i64) -> String {
        self.signer.sign(user_id)
    }

    pub async fn send(&self, req: TestRequest) -> Reply {
        let db = self.db.clone();
        let queue = self.worker.queue();
        let signer = self.signer.clone();
        let app = test::init_service(
            App::new().configure(move |cfg| configure_api(cfg, db, queue, EventProducers::default(), signer)),
        )
        .await;
        let res = test::call_service(&app, req.to_request()).await;
        let status = res.status();
        let session = res.response().cookies().find(|c| c.name() == SESSION_COOKIE).map(|c| c.value().to_string());
        let body = test::read_body(res).await;
        Reply { status, session, body: String::from_utf8_lossy(&body).into_owned() }
    }

    pub async fn shutdown(self) {
        self.worker.shutdown().await;
        teardown(self.db).await;
    }
}

#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub session: Option<String>,
    pub body: String,
}

impl Reply {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("Invalid JSON body ({e}): {}", self.body))
    }

    pub fn error(&self) -> String {
        let value: serde_json::Value = self.json();
        value["error"].as_str().unwrap_or_default().to_string()
    }
}

pub fn get(path: &str, session: Option<&str>) -> TestRequest {
    with_session(TestRequest::get().uri(path), session)
}

pub fn post_text(path: &str, body: &str, session: Option<&str>) -> TestRequest {
    let req = TestRequest::post().uri(path).insert_header(("content-type", "text/plain")).set_payload(body.to_string());
    with_session(req, session)
}

pub fn post_json(path: &str, body: serde_json::Value, session: Option<&str>) -> TestRequest {
    with_session(TestRequest::post().uri(path).set_json(body), session)
}

fn with_session(req: TestRequest, session: Option<&str>) -> TestRequest {
    match session {
        Some(token) => req.cookie(Cookie::new(SESSION_COOKIE, token.to_string())),
        None => req,
    }
}
