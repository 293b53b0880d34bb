//! Request validation.
//!
//! Schema gate in front of the dispatcher: every inbound payload is checked
//! here before any adapter is touched. Violations reject with the first
//! failing field's message; there is no partial processing.

use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::types::{
    normalize_phone, CardDetails, CardPaymentRequest, MobileConfirmRequest, MobilePaymentRequest,
    ProviderName, WalletCaptureRequest, WalletPaymentRequest,
};

const DEFAULT_CURRENCY: &str = "USD";

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^254[0-9]{9}$").expect("phone pattern compiles"));
static CARD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{16}$").expect("card number pattern compiles"));
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/([0-9]{2})$").expect("expiry pattern compiles"));
static CVC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").expect("cvc pattern compiles"));

#[derive(Debug)]
pub struct ValidMobilePayment {
    /// Normalized to `254XXXXXXXXX`.
    pub phone_number: String,
    pub amount: Decimal,
}

#[derive(Debug)]
pub struct ValidWalletPayment {
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug)]
pub struct ValidCardPayment {
    pub details: CardDetails,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug)]
pub struct ValidConfirmation {
    pub provider: ProviderName,
    pub reference: String,
}

fn positive_amount(amount: Decimal) -> PaymentResult<()> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::validation(
            "amount",
            "Amount must be a positive number",
        ));
    }
    Ok(())
}

fn currency_or_default(currency: Option<&str>) -> String {
    match currency {
        Some(c) if !c.trim().is_empty() => c.trim().to_string(),
        _ => DEFAULT_CURRENCY.to_string(),
    }
}

/// Mobile-money initiation: phone in the national format, positive amount.
///
/// The phone number is normalized before the check, so `07XXXXXXXX` and
/// bare `7XXXXXXXX` inputs are accepted and rewritten.
pub fn validate_mobile_payment(req: &MobilePaymentRequest) -> PaymentResult<ValidMobilePayment> {
    let phone_number = normalize_phone(&req.phone_number);
    if !PHONE_RE.is_match(&phone_number) {
        return Err(PaymentError::validation(
            "phoneNumber",
            "Phone number must be in the format 254XXXXXXXXX",
        ));
    }
    positive_amount(req.amount)?;
    Ok(ValidMobilePayment {
        phone_number,
        amount: req.amount,
    })
}

/// Wallet checkout: positive amount; currency defaults when omitted.
pub fn validate_wallet_payment(req: &WalletPaymentRequest) -> PaymentResult<ValidWalletPayment> {
    positive_amount(req.amount)?;
    Ok(ValidWalletPayment {
        amount: req.amount,
        currency: currency_or_default(req.currency.as_deref()),
    })
}

/// Wallet capture: the order id is required.
pub fn validate_wallet_capture(req: &WalletCaptureRequest) -> PaymentResult<String> {
    let order_id = req.order_id.trim();
    if order_id.is_empty() {
        return Err(PaymentError::validation(
            "orderId",
            "Order id is required",
        ));
    }
    Ok(order_id.to_string())
}

/// Card payment: field checks in schema order — number, expiry, CVC,
/// holder name — then the amount.
pub fn validate_card_payment(req: &CardPaymentRequest) -> PaymentResult<ValidCardPayment> {
    let details = &req.card_details;

    if !CARD_NUMBER_RE.is_match(&details.number) {
        return Err(PaymentError::validation(
            "cardDetails.number",
            "Card number must be 16 digits",
        ));
    }
    if !EXPIRY_RE.is_match(&details.expiry) {
        return Err(PaymentError::validation(
            "cardDetails.expiry",
            "Expiry date must be in the format MM/YY",
        ));
    }
    if !CVC_RE.is_match(&details.cvc) {
        return Err(PaymentError::validation(
            "cardDetails.cvc",
            "CVC must be 3 or 4 digits",
        ));
    }
    if details.name.trim().is_empty() {
        return Err(PaymentError::validation(
            "cardDetails.name",
            "Cardholder name is required",
        ));
    }
    positive_amount(req.amount)?;

    Ok(ValidCardPayment {
        details: details.clone(),
        amount: req.amount,
        currency: currency_or_default(req.currency.as_deref()),
    })
}

/// Mobile confirmation: provider restricted to the mobile-money variants,
/// reference required.
pub fn validate_confirmation(req: &MobileConfirmRequest) -> PaymentResult<ValidConfirmation> {
    let provider: ProviderName = req
        .provider
        .parse()
        .ok()
        .filter(ProviderName::is_mobile_money)
        .ok_or_else(|| {
            PaymentError::validation("provider", "Provider must be one of mpesa or airtel")
        })?;

    let reference = req.transaction_id.trim();
    if reference.is_empty() {
        return Err(PaymentError::validation(
            "transactionId",
            "Transaction reference is required",
        ));
    }

    Ok(ValidConfirmation {
        provider,
        reference: reference.to_string(),
    })
}
