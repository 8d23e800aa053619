//! Owner-side signing helpers.
//!
//! Owners sign relay digests directly (no EIP-191 prefix); these helpers
//! turn local keys into the signature types the module consumes.

use crate::AccountError;
use alloy_primitives::B256;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use relay_types::{OwnerSignature, SignatureBundle};

/// Signs `hash` with a single owner key.
pub fn sign_hash(signer: &PrivateKeySigner, hash: &B256) -> Result<OwnerSignature, AccountError> {
	let signature = signer
		.sign_hash_sync(hash)
		.map_err(|e| AccountError::SigningFailed(format!("Failed to sign hash: {}", e)))?;

	Ok(OwnerSignature::new(
		signer.address(),
		signature.as_bytes().to_vec(),
	))
}

/// Signs `hash` with every key and returns the bundle sorted by signer.
pub fn sign_bundle(
	signers: &[PrivateKeySigner],
	hash: &B256,
) -> Result<SignatureBundle, AccountError> {
	let signatures = signers
		.iter()
		.map(|signer| sign_hash(signer, hash))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(SignatureBundle::new(signatures))
}

/// Parses a hex-encoded private key (with or without `0x`).
pub fn parse_signer(private_key_hex: &str) -> Result<PrivateKeySigner, AccountError> {
	private_key_hex
		.parse::<PrivateKeySigner>()
		.map_err(|e| AccountError::SigningFailed(format!("Invalid private key: {}", e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Signature};

	#[test]
	fn test_sign_hash_recovers_signer() {
		let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
		let hash = B256::repeat_byte(0x01);

		let owner_signature = sign_hash(&signer, &hash).unwrap();
		assert_eq!(owner_signature.signer, signer.address());
		assert_eq!(owner_signature.signature.len(), 65);

		let signature = Signature::from_raw(&owner_signature.signature).unwrap();
		let recovered: Address = signature.recover_address_from_prehash(&hash).unwrap();
		assert_eq!(recovered, signer.address());
	}

	#[test]
	fn test_bundle_is_sorted() {
		let signers: Vec<_> = (1u8..=3)
			.map(|i| PrivateKeySigner::from_bytes(&B256::repeat_byte(i)).unwrap())
			.collect();
		let bundle = sign_bundle(&signers, &B256::ZERO).unwrap();

		let listed = bundle.signers();
		let mut sorted = listed.clone();
		sorted.sort();
		assert_eq!(listed, sorted);
	}

	#[test]
	fn test_parse_signer() {
		let key = "0x4242424242424242424242424242424242424242424242424242424242424242";
		let parsed = parse_signer(key).unwrap();
		let expected = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
		assert_eq!(parsed.address(), expected.address());
		assert!(parse_signer("0x1234").is_err());
	}
}
