//! Airtel Money adapter.
//!
//! Uses the OAuth2 client-credentials grant, then drives the merchant
//! payments API: push to the subscriber's handset, status query by
//! transaction id, and refunds.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{GatewayCause, PaymentError, PaymentResult};
use crate::payments::providers::{prefixed_reference, read_json, send};
use crate::payments::token::{AccessToken, TokenExchange, TokenManager};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    mask_phone, InitiateOutcome, PayerIdentifier, ProviderName, Transaction, TransactionState,
};

#[derive(Debug, Clone)]
pub struct AirtelConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Airtel Open API base URL (defaults to the UAT environment).
    pub base_url: String,
    pub country: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl Default for AirtelConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: "https://openapiuat.airtel.africa".to_string(),
            country: "KE".to_string(),
            currency: "KES".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct AirtelTokenExchange {
    client: Client,
    config: AirtelConfig,
}

#[async_trait]
impl TokenExchange for AirtelTokenExchange {
    fn provider(&self) -> ProviderName {
        ProviderName::Airtel
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
            .post(format!("{}/auth/oauth2/token", self.config.base_url))
            .json(&serde_json::json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "grant_type": "client_credentials",
            }));

        let response = send(ProviderName::Airtel, request).await?;
        let body: TokenResponse = read_json(ProviderName::Airtel, response).await?;
        Ok(AccessToken::new(
            body.access_token,
            Duration::from_secs(body.expires_in),
        ))
    }
}

/// Airtel Money payment provider.
pub struct AirtelProvider {
    config: AirtelConfig,
    client: Client,
    tokens: TokenManager<AirtelTokenExchange>,
}

impl AirtelProvider {
    pub fn new(config: AirtelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        let tokens = TokenManager::new(AirtelTokenExchange {
            client: client.clone(),
            config: config.clone(),
        });
        Self {
            config,
            client,
            tokens,
        }
    }

    fn market_request(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request
            .header("X-Country", &self.config.country)
            .header("X-Currency", &self.config.currency)
            .bearer_auth(token)
    }
}

#[derive(Debug, Deserialize)]
struct AirtelEnvelopeStatus {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtelInitiateResponse {
    #[serde(default)]
    status: Option<AirtelEnvelopeStatus>,
}

#[derive(Debug, Deserialize)]
struct AirtelStatusResponse {
    data: AirtelStatusData,
}

#[derive(Debug, Deserialize)]
struct AirtelStatusData {
    transaction: AirtelTransactionStatus,
}

#[derive(Debug, Deserialize)]
struct AirtelTransactionStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AirtelRefundResponse {
    #[serde(default)]
    status: Option<AirtelEnvelopeStatus>,
}

/// Airtel status vocabulary → canonical states. Anything unrecognized
/// stays PENDING rather than being read as an outcome.
fn map_status(raw: &str) -> TransactionState {
    match raw {
        "TS" => TransactionState::Succeeded,
        "TF" => TransactionState::Failed,
        "TE" => TransactionState::Expired,
        _ => TransactionState::Pending,
    }
}

#[async_trait]
impl PaymentProvider for AirtelProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Airtel
    }

    async fn initiate(
        &self,
        payer: &PayerIdentifier,
        amount: Decimal,
        _currency: &str,
    ) -> PaymentResult<InitiateOutcome> {
        let PayerIdentifier::Phone(phone) = payer else {
            return Err(PaymentError::validation(
                "phoneNumber",
                "Airtel Money payments require a phone number",
            ));
        };

        let transaction_id = prefixed_reference("TRX");
        let reference = prefixed_reference("PAY");

        info!(
            phone = %mask_phone(phone),
            %amount,
            transaction_id = %transaction_id,
            "Initiating Airtel Money payment"
        );

        let token = self.tokens.bearer().await?;
        let payload = serde_json::json!({
            "reference": reference,
            "subscriber": {
                "country": self.config.country,
                "currency": self.config.currency,
                "msisdn": phone,
            },
            "transaction": {
                "amount": amount,
                "country": self.config.country,
                "currency": self.config.currency,
                "id": transaction_id,
            },
        });

        let request = self
            .client
            .post(format!("{}/merchant/v1/payments", self.config.base_url))
            .json(&payload);
        let response = send(self.name(), self.market_request(request, &token)).await?;
        let body: AirtelInitiateResponse = read_json(self.name(), response).await?;

        if let Some(status) = body.status {
            if status.success == Some(false) {
                let reason = status
                    .message
                    .unwrap_or_else(|| "payment push rejected".to_string());
                error!(reason = %reason, "Airtel Money rejected payment");
                return Err(PaymentError::gateway(
                    self.name(),
                    GatewayCause::Protocol(reason),
                ));
            }
        }

        let transaction = Transaction::new(
            self.name(),
            transaction_id,
            amount,
            self.config.currency.clone(),
            TransactionState::Pending,
        );
        Ok(InitiateOutcome::transaction(transaction))
    }

    async fn check_status(&self, reference: &str) -> PaymentResult<TransactionState> {
        let token = self.tokens.bearer().await?;
        let request = self.client.get(format!(
            "{}/standard/v1/payments/{}",
            self.config.base_url, reference
        ));
        let response = send(self.name(), self.market_request(request, &token)).await?;
        let body: AirtelStatusResponse = read_json(self.name(), response).await?;
        Ok(map_status(&body.data.transaction.status))
    }

    async fn refund(&self, reference: &str, amount: Decimal) -> PaymentResult<Transaction> {
        info!(reference = %reference, %amount, "Processing Airtel Money refund");

        let token = self.tokens.bearer().await?;
        let payload = serde_json::json!({
            "transaction": {
                "airtel_money_id": reference,
                "amount": amount,
            },
        });
        let request = self
            .client
            .post(format!(
                "{}/standard/v1/payments/refund",
                self.config.base_url
            ))
            .json(&payload);
        let response = send(self.name(), self.market_request(request, &token)).await?;
        let body: AirtelRefundResponse = read_json(self.name(), response).await?;

        if let Some(status) = body.status {
            if status.success == Some(false) {
                let reason = status
                    .message
                    .unwrap_or_else(|| "refund rejected".to_string());
                return Err(PaymentError::gateway(
                    self.name(),
                    GatewayCause::Protocol(reason),
                ));
            }
        }

        Ok(Transaction::new(
            self.name(),
            reference,
            amount,
            self.config.currency.clone(),
            TransactionState::Refunded,
        ))
    }
}
