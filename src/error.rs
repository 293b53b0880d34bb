//! Error taxonomy for the payment engine.
//!
//! Adapters translate every provider-specific failure into one of these
//! variants before it crosses their boundary; nothing downstream ever sees a
//! raw gateway error shape.

use crate::payments::types::{InvalidTransition, ProviderName};

/// Result alias used across the payment core.
pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Client-correctable input problem. Carries the first failing field.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// The credential/token exchange with a provider failed.
    #[error("Failed to get {provider} access token")]
    Authentication { provider: ProviderName },

    /// The external gateway could not be reached, answered non-2xx, or
    /// returned a payload we could not interpret.
    #[error("{provider} gateway error: {cause}")]
    Gateway {
        provider: ProviderName,
        cause: GatewayCause,
    },

    /// The selected adapter does not implement the requested operation.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderName,
        operation: &'static str,
    },

    /// A status observation would violate the monotone transaction
    /// state machine.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// Why a gateway call failed.
#[derive(Debug, thiserror::Error)]
pub enum GatewayCause {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: http::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The gateway answered 2xx but reported a protocol-level rejection.
    #[error("{0}")]
    Protocol(String),
}

impl PaymentError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn gateway(provider: ProviderName, cause: impl Into<GatewayCause>) -> Self {
        Self::Gateway {
            provider,
            cause: cause.into(),
        }
    }

    /// True when the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Unsupported { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_displays_message_only() {
        let err = PaymentError::validation("cvc", "CVC must be 3 or 4 digits");
        assert_eq!(err.to_string(), "CVC must be 3 or 4 digits");
        assert!(err.is_client_error());
    }

    #[test]
    fn gateway_errors_are_server_side() {
        let err = PaymentError::gateway(
            ProviderName::Mpesa,
            GatewayCause::Protocol("push rejected".into()),
        );
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "M-Pesa gateway error: push rejected");
    }
}
