//! Relay authorization for multi-owner accounts.
//!
//! The module lets anyone submit a call on behalf of an account once the
//! account's owners signed it. Optionally one owner additionally signs refund
//! terms, and the account pays the submitter for the gas consumed, bounded by
//! per-token conditions the account configured.

pub mod authorizer;
pub mod conditions;
pub mod domain;
pub mod error;
pub mod module;
pub mod refund;
pub mod settlement;

#[cfg(test)]
mod test_utils;

pub use authorizer::{TransactionAuthorizer, NONCES};
pub use conditions::{RefundConditionStore, REFUND_CONDITIONS};
pub use domain::{DomainHasher, RefundAuthorization, RelayedCall};
pub use error::RelayError;
pub use module::{RelayModule, RelayOutcome};
pub use refund::RefundAuthorizer;
pub use settlement::{FeeSettlement, GasAccount};
