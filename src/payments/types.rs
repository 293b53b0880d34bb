//! Payment domain types and wire-level data structures.
//!
//! Common types used across all payment providers for requests, responses,
//! and transaction tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payments::card::CardType;

/// The closed set of supported payment gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Mpesa,
    Airtel,
    Card,
    Paypal,
}

impl ProviderName {
    /// Mobile-money providers use the asynchronous initiate → poll →
    /// confirm protocol.
    pub fn is_mobile_money(&self) -> bool {
        matches!(self, Self::Mpesa | Self::Airtel)
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mpesa => write!(f, "M-Pesa"),
            Self::Airtel => write!(f, "Airtel Money"),
            Self::Card => write!(f, "Card"),
            Self::Paypal => write!(f, "PayPal"),
        }
    }
}

impl std::str::FromStr for ProviderName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mpesa" => Ok(Self::Mpesa),
            "airtel" => Ok(Self::Airtel),
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::Paypal),
            _ => Err(()),
        }
    }
}

/// Canonical transaction states shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Initiated,
    Pending,
    Succeeded,
    Failed,
    Expired,
    Refunded,
}

impl TransactionState {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired | Self::Refunded)
    }

    /// The monotone transition matrix: INITIATED → {PENDING, FAILED};
    /// PENDING → {SUCCEEDED, FAILED, EXPIRED}; SUCCEEDED → {REFUNDED};
    /// everything else is terminal.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Initiated, Pending)
                | (Initiated, Failed)
                | (Pending, Succeeded)
                | (Pending, Failed)
                | (Pending, Expired)
                | (Succeeded, Refunded)
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "INITIATED",
            Self::Pending => "PENDING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

/// Attempted transition rejected by the state machine.
#[derive(Debug, Clone, thiserror::Error)]
#[error("illegal transaction state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TransactionState,
    pub to: TransactionState,
}

/// Unique identifier for a Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payment tracked through one provider.
///
/// Created when an adapter's initiate operation returns; mutated only via
/// [`Transaction::transition`]. Nothing here is persisted — transaction
/// state is lost on process restart, and durability is the responsibility
/// of an external datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    /// Provider-issued reference (checkout request id, order id, ...).
    pub reference: String,
    pub provider: ProviderName,
    pub amount: Decimal,
    pub currency: String,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a transaction in the state the provider reported at
    /// initiation. Creation is not a transition; the monotone matrix
    /// governs [`Transaction::transition`] only.
    pub fn new(
        provider: ProviderName,
        reference: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        state: TransactionState,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            reference: reference.into(),
            provider,
            amount,
            currency: currency.into(),
            state,
            created_at: Utc::now(),
        }
    }

    /// Applies a state transition, enforcing the monotone matrix.
    pub fn transition(&mut self, next: TransactionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Card details as submitted by the payer.
///
/// The card type is never stored; it is recomputed from the number prefix
/// wherever it is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvc: String,
    pub name: String,
}

/// Provider-specific payer identifier.
#[derive(Debug, Clone)]
pub enum PayerIdentifier {
    /// Mobile-money MSISDN, `254XXXXXXXXX`.
    Phone(String),
    /// Card payments carry the full card details.
    Card(CardDetails),
    /// Wallet/redirect payments identify the payer out of band.
    None,
}

/// Detected card type plus masked digits, safe to return to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSummary {
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub last4: String,
}

/// What an adapter hands back from `initiate`.
#[derive(Debug, Clone)]
pub struct InitiateOutcome {
    pub transaction: Transaction,
    /// Provider-hosted approval link, for redirect-based providers.
    pub approval_url: Option<String>,
    /// Present for card payments only.
    pub card: Option<CardSummary>,
}

impl InitiateOutcome {
    pub fn transaction(transaction: Transaction) -> Self {
        Self {
            transaction,
            approval_url: None,
            card: None,
        }
    }
}

// ─── Inbound request DTOs ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobilePaymentRequest {
    pub phone_number: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCaptureRequest {
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentRequest {
    pub card_details: CardDetails,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileConfirmRequest {
    /// Kept as a raw string so an unknown provider fails validation with a
    /// field-level message instead of a deserialization error.
    pub provider: String,
    pub transaction_id: String,
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Normalizes a Kenyan MSISDN to the `254XXXXXXXXX` wire format.
///
/// `0712345678` and `712345678` both normalize to `254712345678`;
/// already-prefixed numbers pass through unchanged.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("254{rest}");
    }
    if digits.starts_with("254") {
        return digits;
    }
    format!("254{digits}")
}

/// Masks an MSISDN for logging, keeping the prefix and last three digits.
pub fn mask_phone(msisdn: &str) -> String {
    if msisdn.len() < 7 {
        return "*".repeat(msisdn.len());
    }
    let (head, rest) = msisdn.split_at(4);
    let (mid, tail) = rest.split_at(rest.len() - 3);
    format!("{head}{}{tail}", "*".repeat(mid.len()))
}

/// Last four digits of a card number, for receipts and logs.
pub fn last4(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.iter().rev().take(4).rev().collect()
}
