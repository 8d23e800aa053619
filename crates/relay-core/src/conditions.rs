//! Per-account, per-token refund conditions.
//!
//! A condition that was never set reads as the default: zero fee, zero gas
//! and no allowlist. Because refunds must be bounded by the condition, an
//! account only pays refunds in tokens it configured.

use crate::RelayError;
use alloy_primitives::Address;
use relay_storage::StorageTransaction;
use relay_types::{RefundCondition, RefundTerms};

/// Storage namespace of refund conditions.
pub const REFUND_CONDITIONS: &str = "refund_conditions";

#[derive(Debug, Default, Clone, Copy)]
pub struct RefundConditionStore;

impl RefundConditionStore {
	pub fn new() -> Self {
		Self
	}

	fn id(account: Address, fee_token: Address) -> String {
		format!("{}:{}", account, fee_token)
	}

	pub async fn load(
		&self,
		tx: &StorageTransaction<'_>,
		account: Address,
		fee_token: Address,
	) -> Result<RefundCondition, RelayError> {
		Ok(tx
			.retrieve::<RefundCondition>(REFUND_CONDITIONS, &Self::id(account, fee_token))
			.await?
			.unwrap_or_default())
	}

	/// Replaces the whole condition of `account` for `fee_token`.
	pub fn store(
		&self,
		tx: &mut StorageTransaction<'_>,
		account: Address,
		fee_token: Address,
		condition: &RefundCondition,
	) -> Result<(), RelayError> {
		tx.stage(REFUND_CONDITIONS, &Self::id(account, fee_token), condition)?;
		Ok(())
	}

	/// Checks `terms` against `condition`: the receiver first, then the
	/// fee and gas bounds.
	pub fn check(&self, condition: &RefundCondition, terms: &RefundTerms) -> Result<(), RelayError> {
		if !condition.accepts_receiver(&terms.receiver) {
			return Err(RelayError::ReceiverRejected(terms.receiver));
		}

		if !condition.bounds(terms) {
			return Err(RelayError::BoundaryViolation {
				max_fee_per_gas: terms.max_fee_per_gas,
				allowed_fee_per_gas: condition.max_fee_per_gas,
				gas_limit: terms.gas_limit,
				allowed_gas_limit: condition.max_gas_limit,
			});
		}

		Ok(())
	}
}
