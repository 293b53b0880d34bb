//! PayPal wallet/redirect adapter.
//!
//! Two-step protocol: `initiate` creates a provider-hosted checkout order
//! and surfaces the approval link; once the payer approves out of band,
//! `capture` finalizes the funds transfer. There is no polling.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::error::PaymentResult;
use crate::payments::providers::{read_json, send};
use crate::payments::token::{AccessToken, TokenExchange, TokenManager};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    InitiateOutcome, PayerIdentifier, ProviderName, Transaction, TransactionState,
};

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// PayPal REST base URL (defaults to the sandbox).
    pub base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: "https://api-m.sandbox.paypal.com".to_string(),
            currency: "USD".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct PayPalTokenExchange {
    client: Client,
    config: PayPalConfig,
}

#[async_trait]
impl TokenExchange for PayPalTokenExchange {
    fn provider(&self) -> ProviderName {
        ProviderName::Paypal
    }

    async fn exchange(&self) -> PaymentResult<AccessToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(deserialize_with = "super::de_expires_in")]
            expires_in: u64,
        }

        let request = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials");

        let response = send(ProviderName::Paypal, request).await?;
        let body: TokenResponse = read_json(ProviderName::Paypal, response).await?;
        Ok(AccessToken::new(
            body.access_token,
            Duration::from_secs(body.expires_in),
        ))
    }
}

/// PayPal payment provider.
pub struct PayPalProvider {
    config: PayPalConfig,
    client: Client,
    tokens: TokenManager<PayPalTokenExchange>,
}

impl PayPalProvider {
    pub fn new(config: PayPalConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        let tokens = TokenManager::new(PayPalTokenExchange {
            client: client.clone(),
            config: config.clone(),
        });
        Self {
            config,
            client,
            tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    links: Vec<OrderLink>,
}

#[derive(Debug, Deserialize)]
struct OrderLink {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    purchase_units: Vec<CapturePurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturePurchaseUnit {
    #[serde(default)]
    payments: Option<CapturePayments>,
}

#[derive(Debug, Deserialize)]
struct CapturePayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    amount: CaptureAmount,
}

#[derive(Debug, Deserialize)]
struct CaptureAmount {
    currency_code: String,
    value: String,
}

/// PayPal order status vocabulary → canonical states.
fn map_order_status(raw: Option<&str>) -> TransactionState {
    match raw {
        Some("COMPLETED") => TransactionState::Succeeded,
        Some("APPROVED") => TransactionState::Pending,
        Some("VOIDED") => TransactionState::Failed,
        // CREATED, SAVED, PAYER_ACTION_REQUIRED: awaiting the payer.
        _ => TransactionState::Initiated,
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Paypal
    }

    async fn initiate(
        &self,
        _payer: &PayerIdentifier,
        amount: Decimal,
        currency: &str,
    ) -> PaymentResult<InitiateOutcome> {
        info!(%amount, currency, "Creating PayPal order");

        let token = self.tokens.bearer().await?;
        let payload = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": currency,
                    "value": amount.to_string(),
                },
            }],
        });

        let request = self
            .client
            .post(format!("{}/v2/checkout/orders", self.config.base_url))
            .bearer_auth(token)
            .json(&payload);
        let response = send(self.name(), request).await?;
        let body: OrderResponse = read_json(self.name(), response).await?;

        info!(order_id = %body.id, "PayPal order created");

        let approval_url = body
            .links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.clone());
        let transaction = Transaction::new(
            self.name(),
            body.id,
            amount,
            currency,
            map_order_status(body.status.as_deref()),
        );
        Ok(InitiateOutcome {
            transaction,
            approval_url,
            card: None,
        })
    }

    async fn capture(&self, order_id: &str) -> PaymentResult<Transaction> {
        info!(order_id, "Capturing PayPal order");

        let token = self.tokens.bearer().await?;
        let request = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.config.base_url, order_id
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({}));
        let response = send(self.name(), request).await?;
        let body: CaptureResponse = read_json(self.name(), response).await?;

        let (amount, currency) = body
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.as_ref())
            .and_then(|payments| payments.captures.first())
            .map(|capture| {
                (
                    capture.amount.value.parse().unwrap_or(Decimal::ZERO),
                    capture.amount.currency_code.clone(),
                )
            })
            .unwrap_or((Decimal::ZERO, self.config.currency.clone()));

        Ok(Transaction::new(
            self.name(),
            body.id,
            amount,
            currency,
            map_order_status(body.status.as_deref()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_mapping() {
        assert_eq!(map_order_status(Some("CREATED")), TransactionState::Initiated);
        assert_eq!(map_order_status(Some("APPROVED")), TransactionState::Pending);
        assert_eq!(map_order_status(Some("COMPLETED")), TransactionState::Succeeded);
        assert_eq!(map_order_status(Some("VOIDED")), TransactionState::Failed);
        assert_eq!(map_order_status(None), TransactionState::Initiated);
    }
}
