//! Refund terms and owner-configured refund conditions.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fee token sentinel for refunds paid in the native currency.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// Terms under which a submitter is refunded, signed by one owner.
///
/// The signed message additionally embeds the hash of the call authorized in
/// the same invocation, binding these terms to exactly that call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTerms {
	/// Token the refund is paid in, or [`NATIVE_TOKEN`].
	pub fee_token: Address,
	/// Maximum gas the account pays for.
	pub gas_limit: u64,
	/// Price per gas unit paid to the submitter.
	pub max_fee_per_gas: U256,
	/// Refund receiver. The zero address pays the submitter.
	pub receiver: Address,
}

impl RefundTerms {
	pub fn is_native(&self) -> bool {
		self.fee_token == NATIVE_TOKEN
	}

	/// Upper bound of any payment made under these terms.
	pub fn max_payment(&self) -> U256 {
		U256::from(self.gas_limit).saturating_mul(self.max_fee_per_gas)
	}
}

/// Owner-configured ceiling for refunds of one account in one fee token.
///
/// A missing record is equivalent to the default, all-zero condition, which
/// rejects every refund with a nonzero price or gas limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCondition {
	pub max_fee_per_gas: U256,
	pub max_gas_limit: u64,
	/// Receivers allowed to be refunded. Empty means any receiver.
	pub allowed_receivers: BTreeSet<Address>,
}

impl RefundCondition {
	pub fn new(
		max_fee_per_gas: U256,
		max_gas_limit: u64,
		allowed_receivers: impl IntoIterator<Item = Address>,
	) -> Self {
		Self {
			max_fee_per_gas,
			max_gas_limit,
			allowed_receivers: allowed_receivers.into_iter().collect(),
		}
	}

	pub fn allowed_receiver_count(&self) -> usize {
		self.allowed_receivers.len()
	}

	pub fn enforces_allowlist(&self) -> bool {
		!self.allowed_receivers.is_empty()
	}

	/// Plain membership check: true without an allowlist, otherwise true iff
	/// `receiver` is listed.
	pub fn is_receiver_allowed(&self, receiver: &Address) -> bool {
		!self.enforces_allowlist() || self.allowed_receivers.contains(receiver)
	}

	/// Receiver check applied when settling a refund.
	///
	/// Stricter than [`Self::is_receiver_allowed`]: while an allowlist is
	/// enforced the zero receiver never passes, even if it is listed.
	pub fn accepts_receiver(&self, receiver: &Address) -> bool {
		if !self.enforces_allowlist() {
			return true;
		}
		!receiver.is_zero() && self.allowed_receivers.contains(receiver)
	}

	/// Whether the signed price and gas limit stay within this condition.
	pub fn bounds(&self, terms: &RefundTerms) -> bool {
		terms.max_fee_per_gas <= self.max_fee_per_gas && terms.gas_limit <= self.max_gas_limit
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_condition_rejects_priced_refunds() {
		let condition = RefundCondition::default();
		assert_eq!(condition.allowed_receiver_count(), 0);
		assert!(condition.is_receiver_allowed(&Address::repeat_byte(7)));

		let terms = RefundTerms {
			fee_token: NATIVE_TOKEN,
			gas_limit: 100_000,
			max_fee_per_gas: U256::from(1),
			receiver: Address::ZERO,
		};
		assert!(!condition.bounds(&terms));
		assert!(condition.bounds(&RefundTerms::default()));
	}

	#[test]
	fn test_allowlist_membership() {
		let allowed = Address::repeat_byte(0xaa);
		let other = Address::repeat_byte(0xbb);
		let condition = RefundCondition::new(U256::from(10), 1_000, [allowed]);

		assert_eq!(condition.allowed_receiver_count(), 1);
		assert!(condition.is_receiver_allowed(&allowed));
		assert!(!condition.is_receiver_allowed(&other));
		assert!(condition.accepts_receiver(&allowed));
		assert!(!condition.accepts_receiver(&other));
	}

	#[test]
	fn test_zero_receiver_rejected_while_allowlist_enforced() {
		let condition = RefundCondition::new(U256::from(10), 1_000, [Address::ZERO]);
		assert!(condition.is_receiver_allowed(&Address::ZERO));
		assert!(!condition.accepts_receiver(&Address::ZERO));

		let open = RefundCondition::new(U256::from(10), 1_000, []);
		assert!(open.accepts_receiver(&Address::ZERO));
	}

	#[test]
	fn test_bounds_are_inclusive() {
		let condition = RefundCondition::new(U256::from(10_000_000_000u64), 10_000_000, []);
		let mut terms = RefundTerms {
			fee_token: Address::repeat_byte(1),
			gas_limit: 10_000_000,
			max_fee_per_gas: U256::from(10_000_000_000u64),
			receiver: Address::ZERO,
		};
		assert!(condition.bounds(&terms));

		terms.max_fee_per_gas = U256::from(10_000_000_001u64);
		assert!(!condition.bounds(&terms));

		terms.max_fee_per_gas = U256::from(10_000_000_000u64);
		terms.gas_limit = 10_000_001;
		assert!(!condition.bounds(&terms));
	}

	#[test]
	fn test_max_payment() {
		let terms = RefundTerms {
			fee_token: NATIVE_TOKEN,
			gas_limit: 50_000,
			max_fee_per_gas: U256::from(3),
			receiver: Address::ZERO,
		};
		assert!(terms.is_native());
		assert_eq!(terms.max_payment(), U256::from(150_000));
	}
}
