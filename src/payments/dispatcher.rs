//! Maps validated requests onto provider adapters.
//!
//! The dispatcher is handed the full adapter set at startup — adapters are
//! constructed once with their credentials and HTTP clients and injected
//! here, never reached through globals. It never retries and never exposes
//! a raw adapter failure; everything leaving this module is already part of
//! the canonical error taxonomy.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    InitiateOutcome, PayerIdentifier, ProviderName, Transaction, TransactionState,
};

pub struct Dispatcher {
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
}

impl Dispatcher {
    /// Builds the dispatch table from explicitly injected adapters.
    pub fn new(
        mpesa: Arc<dyn PaymentProvider>,
        airtel: Arc<dyn PaymentProvider>,
        card: Arc<dyn PaymentProvider>,
        paypal: Arc<dyn PaymentProvider>,
    ) -> Self {
        let mut providers: HashMap<ProviderName, Arc<dyn PaymentProvider>> = HashMap::new();
        providers.insert(ProviderName::Mpesa, mpesa);
        providers.insert(ProviderName::Airtel, airtel);
        providers.insert(ProviderName::Card, card);
        providers.insert(ProviderName::Paypal, paypal);
        Self { providers }
    }

    /// The adapter registered for a provider, for callers that drive it
    /// directly (the confirmation poller).
    pub fn adapter(&self, provider: ProviderName) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&provider).cloned()
    }

    fn require(&self, provider: ProviderName) -> PaymentResult<&Arc<dyn PaymentProvider>> {
        self.providers.get(&provider).ok_or_else(|| {
            PaymentError::validation("provider", "Invalid payment provider")
        })
    }

    /// Routes an initiate request to exactly one adapter.
    pub async fn initiate(
        &self,
        provider: ProviderName,
        payer: &PayerIdentifier,
        amount: Decimal,
        currency: &str,
    ) -> PaymentResult<InitiateOutcome> {
        let adapter = self.require(provider)?;
        let outcome = adapter.initiate(payer, amount, currency).await?;
        info!(
            %provider,
            reference = %outcome.transaction.reference,
            state = %outcome.transaction.state,
            "payment initiated"
        );
        Ok(outcome)
    }

    /// Shared confirmation path for both mobile-money providers, keyed by
    /// the request's `provider` field.
    pub async fn confirm_mobile(
        &self,
        provider: ProviderName,
        reference: &str,
    ) -> PaymentResult<TransactionState> {
        if !provider.is_mobile_money() {
            return Err(PaymentError::validation(
                "provider",
                "Provider must be one of mpesa or airtel",
            ));
        }
        let state = self.require(provider)?.check_status(reference).await?;
        info!(%provider, reference, %state, "payment status checked");
        Ok(state)
    }

    /// Finalizes a wallet order after out-of-band approval.
    pub async fn capture_wallet(&self, order_id: &str) -> PaymentResult<Transaction> {
        self.require(ProviderName::Paypal)?.capture(order_id).await
    }

    /// Routes a refund to the owning adapter.
    pub async fn refund(
        &self,
        provider: ProviderName,
        reference: &str,
        amount: Decimal,
    ) -> PaymentResult<Transaction> {
        self.require(provider)?.refund(reference, amount).await
    }
}
