//! M-Pesa (Daraja) STK push adapter.
//!
//! Initiates a signed push request to the payer's phone and polls its
//! outcome through the STK query endpoint. The push password is derived
//! from the shortcode, the passkey, and a compact UTC timestamp; it is
//! regenerated for every call and never cached.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{GatewayCause, PaymentError, PaymentResult};
use crate::payments::providers::{read_json, send};
use crate::payments::token::{AccessToken, TokenExchange, TokenManager};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    mask_phone, InitiateOutcome, PayerIdentifier, ProviderName, Transaction, TransactionState,
};

/// Daraja reports an in-flight push with this error code instead of a
/// result payload.
const PROCESSING_ERROR_CODE: &str = "500.001.1001";

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub shortcode: String,
    /// Daraja base URL (defaults to the sandbox).
    pub base_url: String,
    /// Where Daraja posts the payment result callback.
    pub callback_url: String,
    pub timeout_secs: u64,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            passkey: String::new(),
            shortcode: String::new(),
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            callback_url: String::new(),
            timeout_secs: 30,
        }
    }
}

pub struct MpesaTokenExchange {
    client: Client,
    config: MpesaConfig,
}

#[async_trait]
impl TokenExchange for MpesaTokenExchange {
    fn provider(&self) -> ProviderName {
        ProviderName::Mpesa
    }

    async fn exchange(&self) -> PaymentResult<AccessToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(deserialize_with = "super::de_expires_in")]
            expires_in: u64,
        }

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret));

        let response = send(ProviderName::Mpesa, request).await?;
        let body: TokenResponse = read_json(ProviderName::Mpesa, response).await?;
        Ok(AccessToken::new(
            body.access_token,
            Duration::from_secs(body.expires_in),
        ))
    }
}

/// M-Pesa payment provider.
pub struct MpesaProvider {
    config: MpesaConfig,
    client: Client,
    tokens: TokenManager<MpesaTokenExchange>,
}

impl MpesaProvider {
    pub fn new(config: MpesaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        let tokens = TokenManager::new(MpesaTokenExchange {
            client: client.clone(),
            config: config.clone(),
        });
        Self {
            config,
            client,
            tokens,
        }
    }

    /// Timestamp and push password for one request. Regenerated every
    /// call; the password is only valid for its timestamp.
    fn push_credentials(&self) -> (String, String) {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = BASE64.encode(format!(
            "{}{}{}",
            self.config.shortcode, self.config.passkey, timestamp
        ));
        (timestamp, password)
    }
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    response_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StkQueryResponse {
    #[serde(rename = "ResultCode", default)]
    result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    result_desc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DarajaErrorBody {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

#[async_trait]
impl PaymentProvider for MpesaProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Mpesa
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
                "M-Pesa payments require a phone number",
            ));
        };

        info!(phone = %mask_phone(phone), %amount, "Initiating M-Pesa STK push");

        let token = self.tokens.bearer().await?;
        let (timestamp, password) = self.push_credentials();
        let payload = serde_json::json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": phone,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": "Payment System",
            "TransactionDesc": "Payment for services",
        });

        let request = self
            .client
            .post(format!(
                "{}/mpesa/stkpush/v1/processrequest",
                self.config.base_url
            ))
            .bearer_auth(token)
            .json(&payload);

        let response = send(self.name(), request).await?;
        let body: StkPushResponse = read_json(self.name(), response).await?;

        if body.response_code != "0" {
            let reason = body
                .response_description
                .unwrap_or_else(|| "STK push rejected".to_string());
            error!(reason = %reason, "M-Pesa rejected STK push");
            return Err(PaymentError::gateway(
                self.name(),
                GatewayCause::Protocol(reason),
            ));
        }

        info!(reference = %body.checkout_request_id, "M-Pesa STK push accepted");

        let transaction = Transaction::new(
            self.name(),
            body.checkout_request_id,
            amount,
            "KES",
            TransactionState::Pending,
        );
        Ok(InitiateOutcome::transaction(transaction))
    }

    async fn check_status(&self, reference: &str) -> PaymentResult<TransactionState> {
        let token = self.tokens.bearer().await?;
        let (timestamp, password) = self.push_credentials();
        let payload = serde_json::json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "CheckoutRequestID": reference,
        });

        let request = self
            .client
            .post(format!(
                "{}/mpesa/stkpushquery/v1/query",
                self.config.base_url
            ))
            .bearer_auth(token)
            .json(&payload);

        let response = send(self.name(), request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| PaymentError::gateway(self.name(), err))?;

        if !status.is_success() {
            // Daraja answers the query with an error payload while the
            // push is still on the payer's handset.
            if let Ok(err_body) = serde_json::from_str::<DarajaErrorBody>(&body) {
                if err_body.error_code.as_deref() == Some(PROCESSING_ERROR_CODE) {
                    return Ok(TransactionState::Pending);
                }
            }
            return Err(PaymentError::gateway(
                self.name(),
                GatewayCause::Status { status, body },
            ));
        }

        let parsed: StkQueryResponse = serde_json::from_str(&body)
            .map_err(|err| PaymentError::gateway(self.name(), err))?;

        let state = match parsed.result_code.as_deref() {
            None => TransactionState::Pending,
            Some("0") => TransactionState::Succeeded,
            Some("1037") => TransactionState::Expired,
            Some(code) => {
                info!(
                    code,
                    desc = parsed.result_desc.as_deref().unwrap_or(""),
                    "M-Pesa push did not complete"
                );
                TransactionState::Failed
            }
        };
        Ok(state)
    }
}
