//! Payment provider trait definition.
//!
//! The common capability set every gateway adapter plugs into. Providers
//! implement the subset they support; unimplemented operations fall through
//! to an `Unsupported` error so the dispatcher can treat every adapter
//! uniformly.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::types::{InitiateOutcome, PayerIdentifier, ProviderName, Transaction, TransactionState};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Starts a payment for the given payer and amount.
    ///
    /// Mobile-money providers return a PENDING transaction carrying the
    /// provider's checkout reference; the wallet provider returns an
    /// INITIATED order plus its approval link; the card adapter reports its
    /// deterministic result directly.
    async fn initiate(
        &self,
        payer: &PayerIdentifier,
        amount: Decimal,
        currency: &str,
    ) -> PaymentResult<InitiateOutcome>;

    /// Queries the provider for the current state of a payment by its
    /// checkout reference, mapping the provider's raw status vocabulary
    /// onto the canonical state enum.
    async fn check_status(&self, reference: &str) -> PaymentResult<TransactionState> {
        let _ = reference;
        Err(PaymentError::Unsupported {
            provider: self.name(),
            operation: "status checks",
        })
    }

    /// Returns funds for a previously successful payment.
    async fn refund(&self, reference: &str, amount: Decimal) -> PaymentResult<Transaction> {
        let _ = (reference, amount);
        Err(PaymentError::Unsupported {
            provider: self.name(),
            operation: "refunds",
        })
    }

    /// Finalizes a two-step wallet order after out-of-band approval.
    async fn capture(&self, order_id: &str) -> PaymentResult<Transaction> {
        let _ = order_id;
        Err(PaymentError::Unsupported {
            provider: self.name(),
            operation: "capture",
        })
    }
}
