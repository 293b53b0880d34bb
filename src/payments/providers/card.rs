//! Card adapter.
//!
//! Validates card details synchronously, then computes a deterministic
//! success response without contacting an external system. This is a
//! simulation boundary: a production deployment must replace
//! [`SimulatedCardGateway`] with a real acquiring-gateway integration, and
//! the `CARD_SIMULATION_ENABLED` flag exists so that swap never touches the
//! dispatcher.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::card::{self, CardType};
use crate::payments::providers::prefixed_reference;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    last4, CardSummary, InitiateOutcome, PayerIdentifier, ProviderName, Transaction,
    TransactionState,
};

#[derive(Debug, Clone)]
pub struct CardConfig {
    pub supported_types: Vec<CardType>,
    pub currency: String,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            supported_types: vec![CardType::Visa, CardType::Mastercard],
            currency: "USD".to_string(),
        }
    }
}

/// Simulated acquirer: full validation, deterministic success.
pub struct SimulatedCardGateway {
    config: CardConfig,
}

impl SimulatedCardGateway {
    pub fn new(config: CardConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PaymentProvider for SimulatedCardGateway {
    fn name(&self) -> ProviderName {
        ProviderName::Card
    }

    async fn initiate(
        &self,
        payer: &PayerIdentifier,
        amount: Decimal,
        currency: &str,
    ) -> PaymentResult<InitiateOutcome> {
        let PayerIdentifier::Card(details) = payer else {
            return Err(PaymentError::validation(
                "cardDetails",
                "Card payments require card details",
            ));
        };

        let number = card::sanitize(&details.number);
        if !card::is_valid_number(&number) {
            return Err(PaymentError::validation(
                "cardDetails.number",
                "Invalid card number",
            ));
        }

        let card_type = card::card_type(&number);
        if !self.config.supported_types.contains(&card_type) {
            return Err(PaymentError::validation(
                "cardDetails.number",
                "Unsupported card type",
            ));
        }

        let valid_expiry = card::parse_expiry(&details.expiry)
            .is_some_and(|(month, year)| card::is_valid_expiry(month, year));
        if !valid_expiry {
            return Err(PaymentError::validation(
                "cardDetails.expiry",
                "Invalid expiry date",
            ));
        }

        if !card::is_valid_cvc(&details.cvc) {
            return Err(PaymentError::validation("cardDetails.cvc", "Invalid CVC"));
        }

        let currency = if currency.is_empty() {
            self.config.currency.clone()
        } else {
            currency.to_string()
        };
        let reference = prefixed_reference("CARD");

        info!(
            reference = %reference,
            card_type = %card_type,
            last4 = %last4(&number),
            %amount,
            "Simulated card charge"
        );

        let transaction = Transaction::new(
            self.name(),
            reference,
            amount,
            currency,
            TransactionState::Succeeded,
        );
        Ok(InitiateOutcome {
            transaction,
            approval_url: None,
            card: Some(CardSummary {
                card_type,
                last4: last4(&number),
            }),
        })
    }

    async fn refund(&self, reference: &str, amount: Decimal) -> PaymentResult<Transaction> {
        let refund_reference = prefixed_reference("REF");
        info!(
            original = %reference,
            refund = %refund_reference,
            %amount,
            "Simulated card refund"
        );
        Ok(Transaction::new(
            self.name(),
            refund_reference,
            amount,
            self.config.currency.clone(),
            TransactionState::Refunded,
        ))
    }
}

/// Stand-in adapter used when the simulation flag is off and no real
/// acquirer is configured: every card operation is rejected.
pub struct CardDisabled;

#[async_trait]
impl PaymentProvider for CardDisabled {
    fn name(&self) -> ProviderName {
        ProviderName::Card
    }

    async fn initiate(
        &self,
        _payer: &PayerIdentifier,
        _amount: Decimal,
        _currency: &str,
    ) -> PaymentResult<InitiateOutcome> {
        Err(PaymentError::Unsupported {
            provider: self.name(),
            operation: "card processing",
        })
    }
}
