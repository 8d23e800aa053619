//! Owner-quorum authorization of relayed calls.

use crate::{DomainHasher, RelayError};
use alloy_primitives::{keccak256, Address, B256};
use relay_account::AccountInterface;
use relay_storage::StorageTransaction;
use relay_types::{Call, SignatureBundle};
use std::sync::Arc;
use tracing::debug;

/// Storage namespace of per-account nonces.
pub const NONCES: &str = "nonces";

/// Consumes a nonce and checks the owner quorum for a call.
pub struct TransactionAuthorizer {
	hasher: Arc<DomainHasher>,
}

impl TransactionAuthorizer {
	pub fn new(hasher: Arc<DomainHasher>) -> Self {
		Self { hasher }
	}

	/// Current nonce of `account` as seen by `tx`.
	pub async fn nonce(
		&self,
		tx: &StorageTransaction<'_>,
		account: Address,
	) -> Result<u64, RelayError> {
		Ok(tx
			.retrieve::<u64>(NONCES, &account.to_string())
			.await?
			.unwrap_or_default())
	}

	/// Hashes `call` at the current nonce, stages the incremented nonce and
	/// verifies the quorum over the hash.
	///
	/// The nonce is consumed before verification, so a signature over the
	/// same message can never be accepted twice within or across
	/// invocations.
	pub async fn authorize(
		&self,
		tx: &mut StorageTransaction<'_>,
		account: &dyn AccountInterface,
		call: &Call,
		signatures: &SignatureBundle,
	) -> Result<B256, RelayError> {
		let nonce = self.nonce(tx, call.account).await?;
		let encoding = self.hasher.encode_call(call, nonce);
		let call_hash = keccak256(&encoding);

		let next = nonce
			.checked_add(1)
			.ok_or(RelayError::NonceExhausted(call.account))?;
		tx.stage(NONCES, &call.account.to_string(), &next)?;

		debug!(
			account = %call.account,
			nonce,
			%call_hash,
			signatures = signatures.len(),
			"Verifying call authorization"
		);

		account
			.verify_quorum(call_hash, &encoding, signatures)
			.await
			.map_err(RelayError::verification)?;

		Ok(call_hash)
	}
}
