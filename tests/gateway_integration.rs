//! Adapter integration tests against an in-process stub gateway.
//!
//! A plain axum server on an ephemeral port stands in for Daraja, the
//! Airtel Open API, and PayPal. The real adapters run their full wire
//! protocol against it: credential exchanges (counted, to pin down token
//! caching), push requests with derived passwords, status queries, refunds,
//! and order capture.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use lipa_backend::error::PaymentError;
use lipa_backend::payments::providers::{
    AirtelConfig, AirtelProvider, MpesaConfig, MpesaProvider, PayPalConfig, PayPalProvider,
};
use lipa_backend::payments::traits::PaymentProvider;
use lipa_backend::payments::types::{PayerIdentifier, ProviderName, TransactionState};

const SHORTCODE: &str = "174379";
const PASSKEY: &str = "test-passkey";

#[derive(Default)]
struct StubCounters {
    mpesa_tokens: AtomicU32,
    airtel_tokens: AtomicU32,
    paypal_tokens: AtomicU32,
}

type Stub = Arc<StubCounters>;

async fn mpesa_token(State(stub): State<Stub>) -> impl IntoResponse {
    let n = stub.mpesa_tokens.fetch_add(1, Ordering::SeqCst) + 1;
    // Daraja sends expires_in as a string.
    Json(json!({ "access_token": format!("mpesa-token-{n}"), "expires_in": "3599" }))
}

async fn mpesa_stkpush(Json(body): Json<Value>) -> impl IntoResponse {
    // The push password must decode to shortcode ‖ passkey ‖ timestamp.
    let password = body["Password"].as_str().unwrap_or_default();
    let timestamp = body["Timestamp"].as_str().unwrap_or_default();
    let decoded = BASE64
        .decode(password)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .unwrap_or_default();
    if decoded != format!("{SHORTCODE}{PASSKEY}{timestamp}") || timestamp.len() != 14 {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "errorMessage": "invalid push password" })),
        );
    }

    match body["Amount"].as_str() {
        Some("13") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errorMessage": "upstream exploded" })),
        ),
        Some("7") => (
            StatusCode::OK,
            Json(json!({
                "MerchantRequestID": "mr-1",
                "CheckoutRequestID": "",
                "ResponseCode": "1",
                "ResponseDescription": "Push rejected",
            })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "MerchantRequestID": "mr-1",
                "CheckoutRequestID": "ws_CO_TEST1",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success",
            })),
        ),
    }
}

async fn mpesa_query(Json(body): Json<Value>) -> impl IntoResponse {
    match body["CheckoutRequestID"].as_str() {
        Some("ws_CO_PENDING") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "errorCode": "500.001.1001",
                "errorMessage": "The transaction is being processed",
            })),
        ),
        Some("ws_CO_CANCELLED") => (
            StatusCode::OK,
            Json(json!({
                "ResponseCode": "0",
                "ResultCode": "1032",
                "ResultDesc": "Request cancelled by user",
            })),
        ),
        Some("ws_CO_EXPIRED") => (
            StatusCode::OK,
            Json(json!({
                "ResponseCode": "0",
                "ResultCode": "1037",
                "ResultDesc": "DS timeout",
            })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "ResponseCode": "0",
                "ResultCode": "0",
                "ResultDesc": "The service request is processed successfully.",
            })),
        ),
    }
}

async fn airtel_token(State(stub): State<Stub>) -> impl IntoResponse {
    let n = stub.airtel_tokens.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "access_token": format!("airtel-token-{n}"), "expires_in": 180 }))
}

async fn airtel_payment(Json(body): Json<Value>) -> impl IntoResponse {
    // Push requires the subscriber msisdn and a transaction id.
    if body["subscriber"]["msisdn"].as_str().unwrap_or_default().is_empty()
        || body["transaction"]["id"].as_str().unwrap_or_default().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": { "success": false, "message": "missing fields" } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "status": { "success": true, "message": "Enqueued" } })),
    )
}

async fn airtel_status(Path(id): Path<String>) -> impl IntoResponse {
    let status = if id.ends_with("fail") { "TF" } else { "TS" };
    Json(json!({ "data": { "transaction": { "id": id, "status": status } } }))
}

async fn airtel_refund(Json(body): Json<Value>) -> impl IntoResponse {
    if body["transaction"]["airtel_money_id"].as_str().unwrap_or_default().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": { "success": false, "message": "missing id" } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "status": { "success": true, "message": "Refunded" } })),
    )
}

async fn paypal_token(State(stub): State<Stub>) -> impl IntoResponse {
    let n = stub.paypal_tokens.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "access_token": format!("paypal-token-{n}"), "expires_in": 32400 }))
}

async fn paypal_create_order(Json(body): Json<Value>) -> impl IntoResponse {
    let value = body["purchase_units"][0]["amount"]["value"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "id": "ORDER-TEST-1",
        "status": "CREATED",
        "links": [
            { "rel": "self", "href": "https://stub/orders/ORDER-TEST-1" },
            { "rel": "approve", "href": format!("https://stub/approve?amount={value}") },
        ],
    }))
}

async fn paypal_capture(Path(id): Path<String>) -> impl IntoResponse {
    Json(json!({
        "id": id,
        "status": "COMPLETED",
        "purchase_units": [{
            "payments": {
                "captures": [{ "amount": { "currency_code": "USD", "value": "10.00" } }],
            },
        }],
    }))
}

async fn spawn_stub() -> (String, Stub) {
    let stub: Stub = Arc::new(StubCounters::default());
    let app = Router::new()
        .route("/oauth/v1/generate", get(mpesa_token))
        .route("/mpesa/stkpush/v1/processrequest", post(mpesa_stkpush))
        .route("/mpesa/stkpushquery/v1/query", post(mpesa_query))
        .route("/auth/oauth2/token", post(airtel_token))
        .route("/merchant/v1/payments", post(airtel_payment))
        .route("/standard/v1/payments/refund", post(airtel_refund))
        .route("/standard/v1/payments/:id", get(airtel_status))
        .route("/v1/oauth2/token", post(paypal_token))
        .route("/v2/checkout/orders", post(paypal_create_order))
        .route("/v2/checkout/orders/:id/capture", post(paypal_capture))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), stub)
}

fn mpesa_provider(base_url: &str) -> MpesaProvider {
    MpesaProvider::new(MpesaConfig {
        consumer_key: "ck".into(),
        consumer_secret: "cs".into(),
        passkey: PASSKEY.into(),
        shortcode: SHORTCODE.into(),
        base_url: base_url.to_string(),
        callback_url: "http://localhost:5000/api/mpesa/callback".into(),
        timeout_secs: 5,
    })
}

fn airtel_provider(base_url: &str) -> AirtelProvider {
    AirtelProvider::new(AirtelConfig {
        client_id: "id".into(),
        client_secret: "secret".into(),
        base_url: base_url.to_string(),
        ..AirtelConfig::default()
    })
}

fn paypal_provider(base_url: &str) -> PayPalProvider {
    PayPalProvider::new(PayPalConfig {
        client_id: "id".into(),
        client_secret: "secret".into(),
        base_url: base_url.to_string(),
        ..PayPalConfig::default()
    })
}

fn phone() -> PayerIdentifier {
    PayerIdentifier::Phone("254712345678".into())
}

#[tokio::test]
async fn mpesa_push_and_status_mapping() {
    let (base_url, stub) = spawn_stub().await;
    let provider = mpesa_provider(&base_url);

    let outcome = provider.initiate(&phone(), dec!(100), "KES").await.unwrap();
    assert_eq!(outcome.transaction.state, TransactionState::Pending);
    assert_eq!(outcome.transaction.reference, "ws_CO_TEST1");
    assert_eq!(outcome.transaction.currency, "KES");

    // Raw vocabulary → canonical states.
    assert_eq!(
        provider.check_status("ws_CO_TEST1").await.unwrap(),
        TransactionState::Succeeded
    );
    assert_eq!(
        provider.check_status("ws_CO_CANCELLED").await.unwrap(),
        TransactionState::Failed
    );
    assert_eq!(
        provider.check_status("ws_CO_EXPIRED").await.unwrap(),
        TransactionState::Expired
    );
    assert_eq!(
        provider.check_status("ws_CO_PENDING").await.unwrap(),
        TransactionState::Pending
    );

    // One token exchange covered the push and all four queries.
    assert_eq!(stub.mpesa_tokens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mpesa_protocol_rejection_is_a_gateway_error() {
    let (base_url, _stub) = spawn_stub().await;
    let provider = mpesa_provider(&base_url);

    let err = provider.initiate(&phone(), dec!(7), "KES").await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Gateway {
            provider: ProviderName::Mpesa,
            ..
        }
    ));
}

#[tokio::test]
async fn mpesa_upstream_5xx_is_a_gateway_error() {
    let (base_url, _stub) = spawn_stub().await;
    let provider = mpesa_provider(&base_url);

    let err = provider.initiate(&phone(), dec!(13), "KES").await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Gateway {
            provider: ProviderName::Mpesa,
            ..
        }
    ));
}

#[tokio::test]
async fn mpesa_unreachable_gateway_is_a_gateway_error() {
    // Nothing listens here.
    let provider = mpesa_provider("http://127.0.0.1:9");
    let err = provider.initiate(&phone(), dec!(5), "KES").await.unwrap_err();
    // The very first call is the token exchange, so the failure surfaces
    // as an authentication error naming the provider.
    assert!(matches!(
        err,
        PaymentError::Authentication {
            provider: ProviderName::Mpesa
        }
    ));
}

#[tokio::test]
async fn airtel_payment_status_and_refund() {
    let (base_url, stub) = spawn_stub().await;
    let provider = airtel_provider(&base_url);

    let outcome = provider.initiate(&phone(), dec!(250), "KES").await.unwrap();
    assert_eq!(outcome.transaction.state, TransactionState::Pending);
    assert!(outcome.transaction.reference.starts_with("TRX-"));

    let state = provider
        .check_status(&outcome.transaction.reference)
        .await
        .unwrap();
    assert_eq!(state, TransactionState::Succeeded);
    assert_eq!(
        provider.check_status("TRX-fail").await.unwrap(),
        TransactionState::Failed
    );

    let refund = provider
        .refund(&outcome.transaction.reference, dec!(250))
        .await
        .unwrap();
    assert_eq!(refund.state, TransactionState::Refunded);

    assert_eq!(stub.airtel_tokens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn paypal_order_create_and_capture() {
    let (base_url, stub) = spawn_stub().await;
    let provider = paypal_provider(&base_url);

    let outcome = provider
        .initiate(&PayerIdentifier::None, dec!(10), "USD")
        .await
        .unwrap();
    assert_eq!(outcome.transaction.state, TransactionState::Initiated);
    assert_eq!(outcome.transaction.reference, "ORDER-TEST-1");
    let approval = outcome.approval_url.unwrap();
    assert!(approval.contains("approve"));
    assert!(approval.contains("amount=10"));

    let captured = provider.capture("ORDER-TEST-1").await.unwrap();
    assert_eq!(captured.state, TransactionState::Succeeded);
    assert_eq!(captured.amount, dec!(10.00));
    assert_eq!(captured.currency, "USD");

    assert_eq!(stub.paypal_tokens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mpesa_refund_is_unsupported() {
    let (base_url, _stub) = spawn_stub().await;
    let provider = mpesa_provider(&base_url);
    let err = provider.refund("ws_CO_TEST1", dec!(10)).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Unsupported {
            provider: ProviderName::Mpesa,
            ..
        }
    ));
}
