//! HTTP request handlers.
//!
//! Thin layer over the dispatcher: validate, dispatch, wrap the result in
//! the `{success: ...}` envelope. Raw adapter failures never reach the
//! wire — 5xx responses carry a generic per-provider message, with detail
//! only in development mode.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::validation;
use crate::api::AppState;
use crate::error::PaymentError;
use crate::payments::poller::PollOutcome;
use crate::payments::types::{
    CardPaymentRequest, CardSummary, MobileConfirmRequest, MobilePaymentRequest, PayerIdentifier,
    ProviderName, Transaction, WalletCaptureRequest, WalletPaymentRequest,
};

/// Wraps `PaymentError` for the wire (orphan rule workaround) and carries
/// the development-mode flag that decides whether 5xx detail is exposed.
pub struct ApiError {
    error: PaymentError,
    expose_detail: bool,
}

impl ApiError {
    pub fn new(error: PaymentError, expose_detail: bool) -> Self {
        Self {
            error,
            expose_detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.error.is_client_error() {
            (StatusCode::BAD_REQUEST, self.error.to_string())
        } else {
            error!(error = %self.error, "payment processing failed");
            let message = match &self.error {
                PaymentError::Authentication { provider }
                | PaymentError::Gateway { provider, .. } => {
                    format!("{provider} payment processing failed")
                }
                _ => "Payment processing failed".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, message)
        };

        let mut body = json!({
            "success": false,
            "error": message,
        });
        if self.expose_detail && status.is_server_error() {
            body["detail"] = json!(self.error.to_string());
        }

        (status, Json(body)).into_response()
    }
}

/// Transaction with the card summary folded in, as the card route
/// returns it.
#[derive(Serialize)]
struct CardTransactionView {
    #[serde(flatten)]
    transaction: Transaction,
    card: CardSummary,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
    }))
}

/// `POST /api/paypal/process`
pub async fn process_paypal_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WalletPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validation::validate_wallet_payment(&req).map_err(|e| state.fail(e))?;
    let outcome = state
        .dispatcher
        .initiate(
            ProviderName::Paypal,
            &PayerIdentifier::None,
            valid.amount,
            &valid.currency,
        )
        .await
        .map_err(|e| state.fail(e))?;

    Ok(Json(json!({
        "success": true,
        "transaction": outcome.transaction,
        "approvalUrl": outcome.approval_url,
    })))
}

/// `POST /api/paypal/capture`
pub async fn capture_paypal_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WalletCaptureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = validation::validate_wallet_capture(&req).map_err(|e| state.fail(e))?;
    let transaction = state
        .dispatcher
        .capture_wallet(&order_id)
        .await
        .map_err(|e| state.fail(e))?;

    Ok(Json(json!({
        "success": true,
        "transaction": transaction,
    })))
}

/// `POST /api/mpesa/initiate`
pub async fn initiate_mpesa_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MobilePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validation::validate_mobile_payment(&req).map_err(|e| state.fail(e))?;
    let outcome = state
        .dispatcher
        .initiate(
            ProviderName::Mpesa,
            &PayerIdentifier::Phone(valid.phone_number),
            valid.amount,
            "KES",
        )
        .await
        .map_err(|e| state.fail(e))?;

    watch_confirmation(&state, ProviderName::Mpesa, &outcome.transaction.reference);

    Ok(Json(json!({
        "success": true,
        "checkoutRequestID": outcome.transaction.reference,
    })))
}

/// `POST /api/airtel/initiate`
pub async fn initiate_airtel_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MobilePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validation::validate_mobile_payment(&req).map_err(|e| state.fail(e))?;
    let outcome = state
        .dispatcher
        .initiate(
            ProviderName::Airtel,
            &PayerIdentifier::Phone(valid.phone_number),
            valid.amount,
            "KES",
        )
        .await
        .map_err(|e| state.fail(e))?;

    watch_confirmation(&state, ProviderName::Airtel, &outcome.transaction.reference);

    Ok(Json(json!({
        "success": true,
        "transaction": outcome.transaction,
    })))
}

/// `POST /api/card/process`
pub async fn process_card_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CardPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validation::validate_card_payment(&req).map_err(|e| state.fail(e))?;
    let outcome = state
        .dispatcher
        .initiate(
            ProviderName::Card,
            &PayerIdentifier::Card(valid.details),
            valid.amount,
            &valid.currency,
        )
        .await
        .map_err(|e| state.fail(e))?;

    let card = outcome.card.ok_or_else(|| {
        // The card adapter always reports a summary on success.
        state.fail(PaymentError::Unsupported {
            provider: ProviderName::Card,
            operation: "card processing",
        })
    })?;

    Ok(Json(json!({
        "success": true,
        "transaction": CardTransactionView {
            transaction: outcome.transaction,
            card,
        },
    })))
}

/// Shared confirmation path for both mobile-money providers
/// (`POST /api/{mpesa,airtel,mobile}/confirm`), keyed by the `provider`
/// field.
pub async fn confirm_mobile_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MobileConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validation::validate_confirmation(&req).map_err(|e| state.fail(e))?;
    let status = state
        .dispatcher
        .confirm_mobile(valid.provider, &valid.reference)
        .await
        .map_err(|e| state.fail(e))?;

    Ok(Json(json!({
        "success": true,
        "status": status,
    })))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}

/// Attaches a confirmation watch to a freshly initiated mobile-money
/// payment and logs its final outcome. The poll loop is the single owner
/// of the schedule; this just observes it.
fn watch_confirmation(state: &Arc<AppState>, provider: ProviderName, reference: &str) {
    let Some(adapter) = state.dispatcher.adapter(provider) else {
        return;
    };
    let watch = state.poller.watch(adapter, reference);
    let reference = reference.to_string();
    tokio::spawn(async move {
        match watch.outcome().await {
            Some(PollOutcome::Succeeded) => {
                info!(%provider, reference, "mobile payment confirmed")
            }
            Some(PollOutcome::Failed) => {
                warn!(%provider, reference, "mobile payment failed")
            }
            Some(PollOutcome::TimedOut) => {
                warn!(%provider, reference, "mobile payment confirmation timed out")
            }
            None => {}
        }
    });
}
