use anyhow::{anyhow, Context, Result};
use std::env;

use crate::payments::card::CardType;
use crate::payments::providers::{AirtelConfig, MpesaConfig, PayPalConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mpesa: MpesaConfig,
    pub airtel: AirtelConfig,
    pub paypal: PayPalConfig,
    pub card: CardSettings,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Allowed CORS origin for the browser client.
    pub frontend_origin: String,
    /// Public base URL of this service; provider callbacks are derived
    /// from it.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct CardSettings {
    /// Capability flag: when off, card operations are rejected instead of
    /// simulated.
    pub simulation_enabled: bool,
    pub supported_types: Vec<CardType>,
    pub currency: String,
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} not set"))
}

fn optional_u64(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: optional("HOST", "0.0.0.0"),
            port: optional("PORT", "5000")
                .parse()
                .context("PORT must be a valid number")?,
            environment: optional("ENVIRONMENT", "development"),
            frontend_origin: optional("FRONTEND_URL", "http://localhost:3000"),
            public_base_url: optional("BASE_URL", "http://localhost:5000"),
        };

        let mpesa = MpesaConfig {
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            passkey: required("MPESA_PASSKEY")?,
            shortcode: required("MPESA_SHORTCODE")?,
            base_url: optional("MPESA_BASE_URL", "https://sandbox.safaricom.co.ke"),
            callback_url: format!("{}/api/mpesa/callback", server.public_base_url),
            timeout_secs: optional_u64("MPESA_TIMEOUT_SECS", 30)?,
        };

        let airtel = AirtelConfig {
            client_id: required("AIRTEL_CLIENT_ID")?,
            client_secret: required("AIRTEL_CLIENT_SECRET")?,
            base_url: optional("AIRTEL_BASE_URL", "https://openapiuat.airtel.africa"),
            country: optional("AIRTEL_COUNTRY", "KE"),
            currency: optional("AIRTEL_CURRENCY", "KES"),
            timeout_secs: optional_u64("AIRTEL_TIMEOUT_SECS", 30)?,
        };

        let paypal = PayPalConfig {
            client_id: required("PAYPAL_CLIENT_ID")?,
            client_secret: required("PAYPAL_CLIENT_SECRET")?,
            base_url: optional("PAYPAL_BASE_URL", "https://api-m.sandbox.paypal.com"),
            currency: optional("PAYPAL_CURRENCY", "USD"),
            timeout_secs: optional_u64("PAYPAL_TIMEOUT_SECS", 30)?,
        };

        let supported_types = optional("CARD_SUPPORTED_TYPES", "visa,mastercard")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<CardType>()
                    .map_err(|_| anyhow!("Unknown card type in CARD_SUPPORTED_TYPES: {s}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let card = CardSettings {
            simulation_enabled: optional("CARD_SIMULATION_ENABLED", "true")
                .parse()
                .context("CARD_SIMULATION_ENABLED must be true or false")?,
            supported_types,
            currency: optional("CARD_CURRENCY", "USD"),
        };

        let config = Config {
            server,
            mpesa,
            airtel,
            paypal,
            card,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.server.frontend_origin.trim().is_empty() {
            return Err(anyhow!("FRONTEND_URL cannot be empty"));
        }

        for (name, value) in [
            ("MPESA_CONSUMER_KEY", &self.mpesa.consumer_key),
            ("MPESA_CONSUMER_SECRET", &self.mpesa.consumer_secret),
            ("MPESA_PASSKEY", &self.mpesa.passkey),
            ("MPESA_SHORTCODE", &self.mpesa.shortcode),
            ("AIRTEL_CLIENT_ID", &self.airtel.client_id),
            ("AIRTEL_CLIENT_SECRET", &self.airtel.client_secret),
            ("PAYPAL_CLIENT_ID", &self.paypal.client_id),
            ("PAYPAL_CLIENT_SECRET", &self.paypal.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} cannot be empty"));
            }
        }

        if self.card.supported_types.is_empty() {
            return Err(anyhow!(
                "CARD_SUPPORTED_TYPES must contain at least one card type"
            ));
        }

        Ok(())
    }
}
