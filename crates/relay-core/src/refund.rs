//! Single-owner authorization of refund terms.

use crate::{DomainHasher, RelayError};
use alloy_primitives::{keccak256, B256};
use relay_account::AccountInterface;
use relay_types::{OwnerSignature, RefundTerms};
use std::sync::Arc;
use tracing::debug;

pub struct RefundAuthorizer {
	hasher: Arc<DomainHasher>,
}

impl RefundAuthorizer {
	pub fn new(hasher: Arc<DomainHasher>) -> Self {
		Self { hasher }
	}

	/// Verifies that one owner approved `terms` for the call `call_hash`.
	///
	/// Returns the refund hash that was signed.
	pub async fn authorize(
		&self,
		account: &dyn AccountInterface,
		call_hash: B256,
		terms: &RefundTerms,
		signature: &OwnerSignature,
	) -> Result<B256, RelayError> {
		let encoding = self.hasher.encode_refund(call_hash, terms);
		let refund_hash = keccak256(&encoding);

		debug!(
			account = %account.address(),
			%call_hash,
			%refund_hash,
			signer = %signature.signer,
			"Verifying refund authorization"
		);

		account
			.verify_single(refund_hash, &encoding, signature)
			.await
			.map_err(RelayError::verification)?;

		Ok(refund_hash)
	}
}
