use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{get, post_json, TestContext};

#[actix_web::test]
async fn register_then_login() {
    let ctx = TestContext::new().await;
    let reply = ctx.send(post_json("/api/user/register", json!({"login": "alice", "password": "s3cret"}), None)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let session = reply.session.expect("Registration should log the user in");
    let user_id = ctx.signer.verify(&session).unwrap();

    let reply = ctx.send(post_json("/api/user/login", json!({"login": "alice", "password": "s3cret"}), None)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let session = reply.session.expect("Login should set a session cookie");
    assert_eq!(ctx.signer.verify(&session).unwrap(), user_id);

    let reply = ctx.send(get("/api/user/balance", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::OK);
    ctx.shutdown().await;
}

#[actix_web::test]
async fn duplicate_logins_conflict() {
    let ctx = TestContext::new().await;
    let creds = json!({"login": "alice", "password": "s3cret"});
    let reply = ctx.send(post_json("/api/user/register", creds.clone(), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = ctx.send(post_json("/api/user/register", creds, None)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.session.is_none());
    ctx.shutdown().await;
}

#[actix_web::test]
async fn malformed_registrations() {
    let ctx = TestContext::new().await;
    let reply = ctx.send(post_json("/api/user/register", json!({"login": "", "password": "x"}), None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = ctx.send(post_json("/api/user/register", json!({"login": "bob"}), None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.error().starts_with("Could not read request body"), "{}", reply.body);
    ctx.shutdown().await;
}

#[actix_web::test]
async fn bad_credentials_are_unauthorized() {
    let ctx = TestContext::new().await;
    let reply = ctx.send(post_json("/api/user/register", json!({"login": "alice", "password": "s3cret"}), None)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = ctx.send(post_json("/api/user/login", json!({"login": "alice", "password": "guess"}), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.session.is_none());
    let reply = ctx.send(post_json("/api/user/login", json!({"login": "mallory", "password": "s3cret"}), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    ctx.shutdown().await;
}

#[actix_web::test]
async fn protected_routes_need_a_valid_session() {
    let ctx = TestContext::new().await;
    let reply = ctx.send(get("/api/user/balance", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.error(), "Authentication Error. No session cookie was provided. Please log in first.");

    let reply = ctx.send(get("/api/user/orders", Some("1.bm90LWEtc2lnbmF0dXJl"))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let reply = ctx.send(get("/api/user/balance/withdrawals", Some("garbage"))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    ctx.shutdown().await;
}

#[actix_web::test]
async fn health_check() {
    let ctx = TestContext::new().await;
    let reply = ctx.send(get("/health", None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    ctx.shutdown().await;
}
