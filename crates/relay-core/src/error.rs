use alloy_primitives::{Address, B256, U256};
use relay_account::AccountError;
use relay_storage::StorageError;
use thiserror::Error;

/// Reasons an invocation is aborted.
///
/// Every error discards all state changes made by the invocation.
#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Signature rejected: {0}")]
	SignatureRejected(AccountError),

	#[error("Insufficient gas: {required} required, {available} available")]
	BudgetInsufficient { required: u64, available: u64 },

	#[error("Execution of call {call_hash} failed")]
	ExecutionFailed { call_hash: B256 },

	#[error("Refund receiver {0} is not allowed")]
	ReceiverRejected(Address),

	#[error(
		"Refund exceeds boundary: fee per gas {max_fee_per_gas} (limit {allowed_fee_per_gas}), gas {gas_limit} (limit {allowed_gas_limit})"
	)]
	BoundaryViolation {
		max_fee_per_gas: U256,
		allowed_fee_per_gas: U256,
		gas_limit: u64,
		allowed_gas_limit: u64,
	},

	#[error("Refund payment of {amount} in {token} to {receiver} failed")]
	PaymentFailed {
		token: Address,
		receiver: Address,
		amount: U256,
	},

	#[error("Nonce of account {0} exhausted")]
	NonceExhausted(Address),

	#[error("Unknown account {0}")]
	UnknownAccount(Address),

	#[error("Account error: {0}")]
	Account(AccountError),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl RelayError {
	/// Maps a verification failure of the account.
	///
	/// Running out of gas while verifying is a host failure, not a rejected
	/// signature.
	pub(crate) fn verification(error: AccountError) -> Self {
		match error {
			AccountError::OutOfGas => RelayError::Account(error),
			other => RelayError::SignatureRejected(other),
		}
	}
}
