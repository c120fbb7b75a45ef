mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{checkout_fixture, order_fixture, TestApp};
use serde_json::Value;
use storefront_checkout::commerce::CompletionData;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn redirect_success_with_missing_checkout_shows_payment_successful() {
    let app = TestApp::new();
    // ck_gone is unknown server-side; the gateway still reported success.
    let response = app
        .router()
        .oneshot(get(
            "/checkout/view?redirect_status=succeeded",
            Some("checkoutId-netherlands=ck_gone"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["screen"], "payment-successful");
}

#[tokio::test]
async fn missing_checkout_without_signal_shows_not_found() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(get(
            "/checkout/view",
            Some("checkoutId-netherlands=ck_gone"),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["screen"], "not-found");
}

#[tokio::test]
async fn live_checkout_renders_the_checkout_screen() {
    let app = TestApp::new();
    app.api.put_checkout(checkout_fixture("ck_123", "netherlands", 2));

    let response = app
        .router()
        .oneshot(get(
            "/checkout/view",
            Some("checkoutId-netherlands=ck_123"),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["screen"], "checkout");
    assert_eq!(body["data"]["processing"], false);
    assert_eq!(body["data"]["checkout"]["id"], "ck_123");
    assert_eq!(body["data"]["checkout"]["lines"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_checkout_renders_the_empty_cart_screen() {
    let app = TestApp::new();
    app.api.put_checkout(checkout_fixture("ck_empty", "netherlands", 0));

    let response = app
        .router()
        .oneshot(get(
            "/checkout/view",
            Some("checkoutId-netherlands=ck_empty"),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["screen"], "empty-cart");
}

#[tokio::test]
async fn post_redirect_recovery_redirects_to_confirmation() {
    let app = TestApp::new();
    app.api.put_checkout(checkout_fixture("ck_55", "netherlands", 1));

    let response = app
        .router()
        .oneshot(get(
            "/checkout/view?checkout=ck_55&processingPayment=true&payment_intent=pi_1&payment_intent_client_secret=sec_1",
            Some("checkoutId-netherlands=ck_55"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.contains("order=ord_1"));
    assert!(!location.contains("checkout="));
    assert!(!location.contains("payment_intent"));

    // Cleanup cookies ride along on the redirect.
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("checkoutId-netherlands=;")));
}

#[tokio::test]
async fn recovery_for_consumed_checkout_shows_payment_successful() {
    let app = TestApp::new();
    // Nothing stored: a prior attempt already consumed the checkout.
    let response = app
        .router()
        .oneshot(get(
            "/checkout/view?checkout=ck_consumed&processingPayment=true&redirect_status=succeeded",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["screen"], "payment-successful");
}

#[tokio::test]
async fn complete_endpoint_runs_the_full_flow() {
    let app = TestApp::new();
    app.api.put_checkout(checkout_fixture("ck_123", "netherlands", 2));
    app.api.script_complete(Ok(CompletionData {
        order: Some(order_fixture("ord_987")),
        errors: vec![],
    }));

    let response = app
        .router()
        .oneshot(post_json(
            "/checkout/complete",
            Some("checkoutId-netherlands=ck_123"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("checkoutId-netherlands=;")));

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["order_id"], "ord_987");
    let redirect = body["data"]["redirect"].as_str().unwrap();
    assert!(redirect.contains("order=ord_987"));
    assert!(!redirect.contains("checkout="));
}

#[tokio::test]
async fn complete_endpoint_without_any_checkout_reports_failure() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json("/checkout/complete", None, serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "failed");
}

#[tokio::test]
async fn first_add_to_cart_creates_checkout_and_cookie() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json(
            "/checkout/lines",
            None,
            serde_json::json!({ "variant_id": "var_9", "quantity": 2 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("identity cookie is set")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("checkoutId-netherlands="));

    let body = body_json(response).await;
    assert_eq!(body["data"]["channel"], "netherlands");
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn url_checkout_is_persisted_under_its_own_channel() {
    let app = TestApp::new();
    app.api.put_checkout(checkout_fixture("ck_de", "germany", 1));

    // Shared link to a German checkout, no cookies at all. The identity
    // cookie must be scoped to the checkout's channel, not the default one.
    let response = app
        .router()
        .oneshot(get("/checkout/view?checkout=ck_de", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("identity cookie is set")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("checkoutId-germany=ck_de"));
}

#[tokio::test]
async fn order_endpoint_reports_loading_until_materialized() {
    let app = TestApp::new();
    app.api.put_order(order_fixture("ord_5"));
    app.api.set_order_absent_for(1);

    let response = app
        .router()
        .oneshot(get("/orders/ord_5", None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["loading"], true);
    assert!(body["data"]["order"].is_null());

    let response = app
        .router()
        .oneshot(get("/orders/ord_5?wait=true", None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["loading"], false);
    assert_eq!(body["data"]["order"]["id"], "ord_5");
}

#[tokio::test]
async fn session_clear_expires_cookies() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json(
            "/session/clear",
            Some("checkoutId-netherlands=ck_1; cartId=ck_2"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("checkoutId-netherlands=;")));
    assert!(cookies.iter().any(|c| c.starts_with("cartId=;")));
}
