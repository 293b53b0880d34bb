//! HTTP surface: application state, router, and middleware.

pub mod handlers;
pub mod validation;

pub use handlers::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::PaymentError;
use crate::payments::dispatcher::Dispatcher;
use crate::payments::poller::{ConfirmationPoller, PollerConfig};
use crate::payments::providers::{
    AirtelProvider, CardConfig, CardDisabled, MpesaProvider, PayPalProvider, SimulatedCardGateway,
};
use crate::payments::traits::PaymentProvider;

/// Request bodies above this size are rejected.
const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Shared application state.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub poller: ConfirmationPoller,
    pub environment: String,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, environment: impl Into<String>) -> Self {
        Self {
            dispatcher,
            poller: ConfirmationPoller::new(PollerConfig::default()),
            environment: environment.into(),
        }
    }

    /// Wires every adapter with its credentials and HTTP client, then
    /// hands the set to the dispatcher.
    pub fn from_config(config: &Config) -> Self {
        let card: Arc<dyn PaymentProvider> = if config.card.simulation_enabled {
            Arc::new(SimulatedCardGateway::new(CardConfig {
                supported_types: config.card.supported_types.clone(),
                currency: config.card.currency.clone(),
            }))
        } else {
            Arc::new(CardDisabled)
        };

        let dispatcher = Dispatcher::new(
            Arc::new(MpesaProvider::new(config.mpesa.clone())),
            Arc::new(AirtelProvider::new(config.airtel.clone())),
            card,
            Arc::new(PayPalProvider::new(config.paypal.clone())),
        );

        Self::new(dispatcher, config.server.environment.clone())
    }

    /// Detail on 5xx responses is exposed only in development.
    pub fn expose_detail(&self) -> bool {
        self.environment == "development"
    }

    pub fn fail(&self, error: PaymentError) -> ApiError {
        ApiError::new(error, self.expose_detail())
    }
}

/// Builds the full application router.
pub fn router(state: Arc<AppState>, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let api = Router::new()
        .route("/paypal/process", post(handlers::process_paypal_payment))
        .route("/paypal/capture", post(handlers::capture_paypal_payment))
        .route("/mpesa/initiate", post(handlers::initiate_mpesa_payment))
        .route("/mpesa/confirm", post(handlers::confirm_mobile_payment))
        .route("/airtel/initiate", post(handlers::initiate_airtel_payment))
        .route("/airtel/confirm", post(handlers::confirm_mobile_payment))
        .route("/mobile/confirm", post(handlers::confirm_mobile_payment))
        .route("/card/process", post(handlers::process_card_payment));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}
