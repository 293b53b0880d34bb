//! Multi-provider payment orchestration backend.
//!
//! Accepts payment requests over HTTP, routes each one to the matching
//! gateway adapter (M-Pesa STK push, Airtel Money, a simulated card
//! acquirer, PayPal checkout), and tracks mobile-money payments through
//! the asynchronous initiate → poll → confirm protocol.
//!
//! No transaction state is persisted: durability and idempotent retry
//! across restarts belong to an external datastore and are out of scope
//! here.

pub mod api;
pub mod config;
pub mod error;
pub mod payments;

pub use config::Config;
pub use error::{PaymentError, PaymentResult};
