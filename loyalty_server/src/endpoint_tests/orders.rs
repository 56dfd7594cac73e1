use std::time::Duration;

use actix_web::http::StatusCode;
use loyalty_common::{OrderNumber, Points};
use loyalty_engine::{
    db_types::OrderStatusType,
    test_utils::{create_test_user, eventually},
    AccountManagement,
};

use super::helpers::{get, post_text, TestContext};
use crate::data_objects::OrderResponse;

#[actix_web::test]
async fn submission_status_codes() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    let bob = create_test_user(&ctx.db, "bob").await.id;
    let alice_session = ctx.session_for(alice);
    let bob_session = ctx.session_for(bob);

    let reply = ctx.send(post_text("/api/user/orders", "12345678903", Some(&alice_session))).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED, "{}", reply.body);
    let order: OrderResponse = reply.json();
    assert_eq!(order.number, "12345678903");

    let reply = ctx.send(post_text("/api/user/orders", "12345678903\n", Some(&alice_session))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = ctx.send(post_text("/api/user/orders", "12345678903", Some(&bob_session))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    let reply = ctx.send(post_text("/api/user/orders", "12345678901", Some(&bob_session))).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let reply = ctx.send(post_text("/api/user/orders", "12ab", Some(&bob_session))).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let reply = ctx.send(post_text("/api/user/orders", "12345678903", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let orders = ctx.db.fetch_orders_for_user(bob).await.unwrap();
    assert!(orders.is_empty());
    ctx.shutdown().await;
}

#[actix_web::test]
async fn order_list_is_oldest_first() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    let session = ctx.session_for(alice);

    let reply = ctx.send(get("/api/user/orders", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_empty());

    for number in ["79927398713", "2377225624", "12345678903"] {
        let reply = ctx.send(post_text("/api/user/orders", number, Some(&session))).await;
        assert_eq!(reply.status, StatusCode::ACCEPTED);
    }
    let reply = ctx.send(get("/api/user/orders", Some(&session))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let orders: Vec<OrderResponse> = reply.json();
    let numbers = orders.iter().map(|o| o.number.as_str()).collect::<Vec<_>>();
    assert_eq!(numbers, ["79927398713", "2377225624", "12345678903"]);
    assert!(orders.iter().all(|o| o.accrual.is_none()));
    ctx.shutdown().await;
}

#[actix_web::test]
async fn submitted_orders_are_reconciled() {
    let ctx = TestContext::new().await;
    let alice = create_test_user(&ctx.db, "alice").await.id;
    let session = ctx.session_for(alice);
    let number = "12345678903".parse::<OrderNumber>().unwrap();
    ctx.oracle.push_status(&number, OrderStatusType::Processing).push_processed(&number, Points::from_hundredths(72_998));

    let reply = ctx.send(post_text("/api/user/orders", number.as_str(), Some(&session))).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);

    let db = ctx.db.clone();
    eventually(Duration::from_secs(5), "order to be processed", || {
        let db = db.clone();
        let number = number.clone();
        async move {
            let order = db.fetch_order_by_number(&number).await.unwrap();
            order.is_some_and(|o| o.status == OrderStatusType::Processed)
        }
    })
    .await;

    let reply = ctx.send(get("/api/user/orders", Some(&session))).await;
    let orders: Vec<OrderResponse> = reply.json();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatusType::Processed);
    assert_eq!(orders[0].accrual, Some(Points::from_hundredths(72_998)));

    let account = ctx.db.fetch_user_account(alice).await.unwrap().unwrap();
    assert_eq!(account.balance, Points::from_hundredths(72_998));
    ctx.shutdown().await;
}
