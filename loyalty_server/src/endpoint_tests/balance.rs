use actix_web::http::StatusCode;
use loyalty_common::Points;
use loyalty_engine::test_utils::{create_test_user, credit_user};
use serde::Deserialize;
use serde_json::json;

use super::helpers::{get, post_json, TestContext};
use crate::data_objects::WithdrawalResponse;

#[derive(Debug, Deserialize)]
struct BalanceReply {
    current: Points,
    withdrawn: Points,
}

#[actix_web::test]
async fn new_users_have_nothing() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    let session = ctx.session_for(alice);

    let reply = ctx.send(get("/api/user/balance", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let balance: BalanceReply = reply.json();
    assert_eq!(balance.current, Points::ZERO);
    assert_eq!(balance.withdrawn, Points::ZERO);

    let reply = ctx.send(get("/api/user/balance/withdrawals", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    ctx.shutdown().await;
}

#[actix_web::test]
async fn withdrawals_cannot_overdraw() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    credit_user(&ctx.db, alice, "12345678903", Points::from_whole(500)).await;
    let session = ctx.session_for(alice);

    let reply = ctx
        .send(post_json("/api/user/balance/withdraw", json!({"order": "2377225624", "sum": 400}), Some(&session)))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let withdrawal: WithdrawalResponse = reply.json();
    assert_eq!(withdrawal.order, "2377225624");
    assert_eq!(withdrawal.sum, Points::from_whole(400));

    let reply = ctx
        .send(post_json("/api/user/balance/withdraw", json!({"order": "79927398713", "sum": 400}), Some(&session)))
        .await;
    assert_eq!(reply.status, StatusCode::PAYMENT_REQUIRED);

    let balance: BalanceReply = ctx.send(get("/api/user/balance", Some(&session))).await.json();
    assert_eq!(balance.current, Points::from_whole(100));
    assert_eq!(balance.withdrawn, Points::from_whole(400));

    let reply = ctx.send(get("/api/user/balance/withdrawals", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let history: Vec<WithdrawalResponse> = reply.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order, "2377225624");
    ctx.shutdown().await;
}

#[actix_web::test]
async fn invalid_withdrawals_are_unprocessable() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    credit_user(&ctx.db, alice, "12345678903", Points::from_whole(500)).await;
    let session = ctx.session_for(alice);

    for body in [
        json!({"order": "2377225625", "sum": 10}),
        json!({"order": "2377225624", "sum": 0}),
        json!({"order": "2377225624", "sum": -5}),
    ] {
        let reply = ctx.send(post_json("/api/user/balance/withdraw", body.clone(), Some(&session))).await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY, "{body}: {}", reply.body);
    }
    let reply = ctx
        .send(post_json("/api/user/balance/withdraw", json!({"order": "2377225624", "sum": "lots"}), Some(&session)))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = ctx.send(post_json("/api/user/balance/withdraw", json!({"order": "2377225624", "sum": 1}), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let balance: BalanceReply = ctx.send(get("/api/user/balance", Some(&session))).await.json();
    assert_eq!(balance.current, Points::from_whole(500));
    assert_eq!(balance.withdrawn, Points::ZERO);
    ctx.shutdown().await;
}
