//! The single refresh-and-retry wrapped around order submission, and how
//! the refreshed session is shared with the other flows.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use lavande_client::cart::{Cart, CartItem};
use lavande_client::checkout::{CheckoutError, CheckoutFlow, RecipientForm};
use lavande_client::tracking::OrderTracker;
use lavande_core::{Price, ProductId};

use lavande_integration_tests::{TestHarness, fake_jwt, order_json, vnpay_config};

fn checkout_for(harness: &TestHarness) -> CheckoutFlow {
    CheckoutFlow::new(
        harness.api.clone(),
        Arc::clone(&harness.session),
        vnpay_config(),
    )
}

fn tracker_for(harness: &TestHarness) -> OrderTracker {
    OrderTracker::new(harness.api.clone(), Arc::clone(&harness.session))
}

fn demo_cart() -> Cart {
    let mut cart = Cart::new();
    cart.add(CartItem {
        product_id: ProductId::new("p1"),
        title: "Đầm linen".to_string(),
        unit_price: Price::from_vnd(250_000),
        size: "M".to_string(),
        color: None,
        quantity: 1,
    });
    cart
}

fn recipient() -> RecipientForm {
    RecipientForm {
        full_name: "Trần Minh Hạnh".to_string(),
        phone: "0912345678".to_string(),
        address: "12 Nguyễn Huệ, Quận 1".to_string(),
        note: None,
    }
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_the_order_retried_once() {
    let mut harness = TestHarness::new().await;
    harness.sign_in("u5").await;
    let stale_token = fake_jwt("u5");
    let fresh_token = "refreshed.jwt.token";

    let rejected = harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/order")
                .header("authorization", format!("Bearer {stale_token}"));
            then.status(401).json_body(json!({ "message": "jwt expired" }));
        })
        .await;

    let refresh = harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/refresh-token")
                .json_body(json!({ "refreshToken": "refresh-1", "userId": "u5" }));
            then.status(200).json_body(json!({ "accessToken": fresh_token }));
        })
        .await;

    let accepted = harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/order")
                .header("authorization", format!("Bearer {fresh_token}"));
            then.status(200).json_body(json!({ "_id": "ord9" }));
        })
        .await;

    let mut cart = demo_cart();
    let confirmation = checkout_for(&harness)
        .place_cod_order(&mut cart, &recipient())
        .await
        .expect("retry succeeds");
    assert_eq!(confirmation.order_id.expect("id echoed").as_str(), "ord9");
    assert!(cart.is_empty(), "an accepted order empties the cart");

    rejected.assert_async().await;
    refresh.assert_async().await;
    accepted.assert_async().await;

    // The refreshed token is persisted for the next process.
    harness.reload_session().await;
    let credentials = harness.session.credentials().expect("session survives");
    assert_eq!(credentials.token, fresh_token);
    assert_eq!(credentials.user_id.as_str(), "u5");
}

#[tokio::test]
async fn test_rejected_refresh_gives_up_after_one_attempt() {
    let harness = TestHarness::new().await;
    harness.sign_in("u6").await;

    let rejected = harness
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/order");
            then.status(401).json_body(json!({ "message": "jwt expired" }));
        })
        .await;
    let refresh = harness
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/refresh-token");
            then.status(401)
                .json_body(json!({ "message": "refresh expired" }));
        })
        .await;

    let mut cart = demo_cart();
    let err = checkout_for(&harness)
        .place_cod_order(&mut cart, &recipient())
        .await
        .expect_err("session is dead");
    assert!(matches!(err, CheckoutError::SessionExpired));
    assert!(!cart.is_empty(), "a failed order leaves the cart intact");

    // One rejected call, one refresh attempt, no second retry.
    rejected.assert_hits_async(1).await;
    refresh.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_refreshed_session_is_shared_across_flows() {
    let harness = TestHarness::new().await;
    harness.sign_in("u5").await;
    let stale_token = fake_jwt("u5");
    let fresh_token = "refreshed.jwt.token";

    harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/order")
                .header("authorization", format!("Bearer {stale_token}"));
            then.status(401).json_body(json!({ "message": "jwt expired" }));
        })
        .await;
    let refresh = harness
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/refresh-token");
            then.status(200).json_body(json!({ "accessToken": fresh_token }));
        })
        .await;
    harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/order")
                .header("authorization", format!("Bearer {fresh_token}"));
            then.status(200).json_body(json!({ "_id": "ord5" }));
        })
        .await;

    // Checkout eats the expiry and refreshes the shared session.
    let mut cart = demo_cart();
    checkout_for(&harness)
        .place_cod_order(&mut cart, &recipient())
        .await
        .expect("order accepted");

    // History then rides the refreshed token without another exchange.
    let orders = harness
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/order")
                .header("authorization", format!("Bearer {fresh_token}"));
            then.status(200).json_body(json!({
                "metadata": [order_json("ord5", "pending", "2026-08-23T09:00:00Z")]
            }));
        })
        .await;

    let history = tracker_for(&harness).history().await.expect("fresh fetch");
    assert!(!history.stale);
    assert_eq!(history.orders.len(), 1);

    orders.assert_async().await;
    refresh.assert_hits_async(1).await;
}
