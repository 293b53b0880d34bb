//! Payment provider implementations.
//!
//! Concrete implementations of the `PaymentProvider` trait, one per
//! gateway, plus the response plumbing they share.

pub mod airtel;
pub mod card;
pub mod mpesa;
pub mod paypal;

pub use airtel::{AirtelConfig, AirtelProvider};
pub use card::{CardConfig, CardDisabled, SimulatedCardGateway};
pub use mpesa::{MpesaConfig, MpesaProvider};
pub use paypal::{PayPalConfig, PayPalProvider};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{GatewayCause, PaymentError, PaymentResult};
use crate::payments::types::ProviderName;

/// Sends a prepared request, mapping transport failures to `Gateway`.
pub(crate) async fn send(
    provider: ProviderName,
    request: reqwest::RequestBuilder,
) -> PaymentResult<reqwest::Response> {
    request
        .send()
        .await
        .map_err(|err| PaymentError::gateway(provider, err))
}

/// Decodes a gateway response body.
///
/// Non-2xx statuses and undecodable payloads both become `Gateway` errors;
/// a partial response is never interpreted as success.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderName,
    response: reqwest::Response,
) -> PaymentResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| PaymentError::gateway(provider, err))?;

    if !status.is_success() {
        tracing::error!(%provider, %status, "gateway returned error status");
        return Err(PaymentError::gateway(
            provider,
            GatewayCause::Status { status, body },
        ));
    }

    serde_json::from_str(&body).map_err(|err| {
        tracing::error!(%provider, error = %err, "gateway returned malformed payload");
        PaymentError::gateway(provider, err)
    })
}

/// OAuth `expires_in` arrives as a number from some gateways and a string
/// from others (Daraja sends `"3599"`).
pub(crate) fn de_expires_in<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Short unique reference with a provider-style prefix, e.g. `TRX-1a2b3c4d5e6f`.
pub(crate) fn prefixed_reference(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct TokenBody {
        #[serde(deserialize_with = "de_expires_in")]
        expires_in: u64,
    }

    #[test]
    fn expires_in_accepts_string_and_number() {
        let s: TokenBody = serde_json::from_str(r#"{"expires_in":"3599"}"#).unwrap();
        assert_eq!(s.expires_in, 3599);
        let n: TokenBody = serde_json::from_str(r#"{"expires_in":3600}"#).unwrap();
        assert_eq!(n.expires_in, 3600);
        assert!(serde_json::from_str::<TokenBody>(r#"{"expires_in":"soon"}"#).is_err());
    }

    #[test]
    fn prefixed_references_are_unique() {
        let a = prefixed_reference("TRX");
        let b = prefixed_reference("TRX");
        assert!(a.starts_with("TRX-"));
        assert_eq!(a.len(), "TRX-".len() + 12);
        assert_ne!(a, b);
    }
}
