//! Gas budgeting and refund payout.
//!
//! The gas check runs before anything else in a refunded invocation. The
//! payout charges the gas actually consumed, plus the intrinsic cost of the
//! submission and a fixed settlement overhead, clamped to the signed gas
//! limit and priced at the signed fee per gas.

use crate::RelayError;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use relay_account::AccountInterface;
use relay_types::{abi::IERC20, GasSchedule, Invocation, Operation, RefundTerms};
use tracing::{debug, warn};

/// Gas measured at the start of a refunded invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasAccount {
	pub start_gas: u64,
	pub intrinsic_gas: u64,
}

pub struct FeeSettlement {
	schedule: GasSchedule,
}

impl FeeSettlement {
	pub fn new(schedule: GasSchedule) -> Self {
		Self { schedule }
	}

	pub fn schedule(&self) -> &GasSchedule {
		&self.schedule
	}

	/// Checks the gas supplied to the invocation, counting what the
	/// submission itself already cost, can cover the signed gas limit. Records
	/// the starting gas.
	pub fn begin(
		&self,
		invocation: &Invocation,
		calldata: &[u8],
		terms: &RefundTerms,
	) -> Result<GasAccount, RelayError> {
		let start_gas = invocation.gas_left();
		let intrinsic_gas = self.schedule.intrinsic_gas(calldata);
		let available = start_gas.saturating_add(intrinsic_gas);
		let required = self.schedule.required_gas(terms.gas_limit);
		if available < required {
			return Err(RelayError::BudgetInsufficient {
				required,
				available,
			});
		}

		Ok(GasAccount {
			start_gas,
			intrinsic_gas,
		})
	}

	/// Gas attributable to the invocation so far, including settlement.
	pub fn gas_used(&self, gas: &GasAccount, invocation: &Invocation) -> u64 {
		gas.start_gas
			.saturating_sub(invocation.gas_left())
			.saturating_add(gas.intrinsic_gas)
			.saturating_add(self.schedule.settlement_overhead)
	}

	/// Amount owed to the receiver, in units of the fee token.
	pub fn payment(
		&self,
		gas: &GasAccount,
		invocation: &Invocation,
		terms: &RefundTerms,
	) -> Result<U256, RelayError> {
		let charged = self.gas_used(gas, invocation).min(terms.gas_limit);
		U256::from(charged)
			.checked_mul(terms.max_fee_per_gas)
			.ok_or_else(|| RelayError::PaymentFailed {
				token: terms.fee_token,
				receiver: Self::receiver(invocation, terms),
				amount: U256::MAX,
			})
	}

	/// The signed receiver, or the submitter when none was signed.
	pub fn receiver(invocation: &Invocation, terms: &RefundTerms) -> Address {
		if terms.receiver.is_zero() {
			invocation.submitter
		} else {
			terms.receiver
		}
	}

	/// Pays the refund from `account`.
	///
	/// A payment that does not go through aborts the whole invocation.
	pub async fn settle(
		&self,
		account: &dyn AccountInterface,
		gas: &GasAccount,
		invocation: &Invocation,
		terms: &RefundTerms,
	) -> Result<U256, RelayError> {
		let payment = self.payment(gas, invocation, terms)?;
		if payment.is_zero() {
			return Ok(payment);
		}

		let receiver = Self::receiver(invocation, terms);
		debug!(
			account = %account.address(),
			token = %terms.fee_token,
			%receiver,
			%payment,
			"Paying refund"
		);

		let paid = if terms.is_native() {
			account
				.execute(receiver, payment, &Bytes::new(), Operation::Call)
				.await
		} else {
			let transfer = IERC20::transferCall {
				to: receiver,
				amount: payment,
			};
			account
				.execute(
					terms.fee_token,
					U256::ZERO,
					&Bytes::from(transfer.abi_encode()),
					Operation::Call,
				)
				.await
		}
		.map_err(RelayError::Account)?;

		if !paid {
			warn!(token = %terms.fee_token, %receiver, %payment, "Refund payment failed");
			return Err(RelayError::PaymentFailed {
				token: terms.fee_token,
				receiver,
				amount: payment,
			});
		}

		Ok(payment)
	}
}
