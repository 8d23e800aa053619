//! Owner signatures and signature bundles.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// A signature over a relay message together with the owner claiming it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSignature {
	pub signer: Address,
	/// Signature bytes, 65 bytes `(r, s, v)` for ECDSA owners.
	pub signature: Bytes,
}

impl OwnerSignature {
	pub fn new(signer: Address, signature: impl Into<Bytes>) -> Self {
		Self {
			signer,
			signature: signature.into(),
		}
	}
}

/// Signatures collected from owners for one authorized call.
///
/// [`SignatureBundle::new`] sorts by ascending signer address. A bundle
/// deserialized from a submission keeps the submitted order and is handed
/// to the account as-is; quorum rules are the account's business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBundle(Vec<OwnerSignature>);

impl SignatureBundle {
	/// Creates a bundle, ordering the signatures by signer.
	pub fn new(mut signatures: Vec<OwnerSignature>) -> Self {
		signatures.sort_by(|a, b| a.signer.cmp(&b.signer));
		Self(signatures)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &OwnerSignature> {
		self.0.iter()
	}

	pub fn signers(&self) -> Vec<Address> {
		self.0.iter().map(|s| s.signer).collect()
	}

	/// Concatenated signature bytes, as carried in entry-point calldata.
	pub fn packed(&self) -> Bytes {
		let mut out = Vec::with_capacity(self.0.len() * 65);
		for signature in &self.0 {
			out.extend_from_slice(&signature.signature);
		}
		out.into()
	}
}

impl From<Vec<OwnerSignature>> for SignatureBundle {
	fn from(signatures: Vec<OwnerSignature>) -> Self {
		Self::new(signatures)
	}
}
