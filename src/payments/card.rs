//! Card number, expiry, and CVC validation.
//!
//! Pure functions with no side effects; nothing here contacts a gateway or
//! returns an error — callers get booleans and enums and decide what to do.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Card networks recognized by prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CardType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "visa" => Ok(Self::Visa),
            "mastercard" => Ok(Self::Mastercard),
            "amex" => Ok(Self::Amex),
            "discover" => Ok(Self::Discover),
            _ => Err(()),
        }
    }
}

/// Strips spaces and dashes, leaving the raw digit string.
pub fn sanitize(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Validates a card number: exactly 16 digits passing the Luhn checksum.
///
/// Separators (spaces, dashes) are stripped first. Starting from the
/// rightmost digit, every second digit is doubled, doubled values above 9
/// have 9 subtracted, and the total must be divisible by 10.
pub fn is_valid_number(number: &str) -> bool {
    let cleaned = sanitize(number);
    if cleaned.len() != 16 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    luhn_checksum(&cleaned) % 10 == 0
}

fn luhn_checksum(digits: &str) -> u32 {
    let mut sum = 0;
    for (offset, c) in digits.chars().rev().enumerate() {
        let mut digit = c.to_digit(10).unwrap_or(0);
        if offset % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum
}

/// Detects the card network from the number prefix and length.
///
/// First match wins; numbers matching no pattern are `Unknown`.
pub fn card_type(number: &str) -> CardType {
    let digits = sanitize(number);
    if !digits.chars().all(|c| c.is_ascii_digit()) || digits.is_empty() {
        return CardType::Unknown;
    }
    let len = digits.len();
    let first2: u32 = digits[..2.min(len)].parse().unwrap_or(0);

    if digits.starts_with('4') && matches!(len, 13 | 16 | 19) {
        CardType::Visa
    } else if (51..=55).contains(&first2) && len == 16 {
        CardType::Mastercard
    } else if matches!(first2, 34 | 37) && len == 15 {
        CardType::Amex
    } else if (digits.starts_with("6011") || digits.starts_with("65")) && len == 16 {
        CardType::Discover
    } else {
        CardType::Unknown
    }
}

/// Validates an expiry against the current UTC month.
///
/// `year2` is the two-digit year; the current month is still valid. Two
/// digits is all the wire format carries, so there is no century rollover
/// handling — a 2099 card and a 1999 card look the same here.
pub fn is_valid_expiry(month: u32, year2: u32) -> bool {
    if !(1..=12).contains(&month) {
        return false;
    }
    let now = Utc::now();
    let current_year = (now.year() % 100) as u32;
    let current_month = now.month();

    year2 > current_year || (year2 == current_year && month >= current_month)
}

/// Parses the `MM/YY` wire format into a month/year pair.
pub fn parse_expiry(expiry: &str) -> Option<(u32, u32)> {
    let (month, year) = expiry.split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year: u32 = year.trim().parse().ok()?;
    if year > 99 {
        return None;
    }
    Some((month, year))
}

/// A CVC is exactly 3 or 4 digits.
pub fn is_valid_cvc(cvc: &str) -> bool {
    matches!(cvc.len(), 3 | 4) && cvc.chars().all(|c| c.is_ascii_digit())
}
