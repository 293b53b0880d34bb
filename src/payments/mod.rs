//! Payment orchestration core.
//!
//! Provider adapters behind a unified trait, the token lifecycle they
//! depend on, card validation, request dispatch, and the asynchronous
//! confirmation poller.

pub mod card;
pub mod dispatcher;
pub mod poller;
pub mod providers;
pub mod token;
pub mod traits;
pub mod types;

pub use dispatcher::Dispatcher;
pub use poller::{ConfirmationPoller, PollOutcome, PollerConfig};
pub use traits::PaymentProvider;
