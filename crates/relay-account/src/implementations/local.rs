//! In-memory multi-owner account.
//!
//! [`LocalLedger`] holds native and token balances for every address and a
//! journal of snapshots; [`LocalAccount`] is a threshold account on top of
//! it, verifying ECDSA owner signatures with Alloy. Together they stand in
//! for a deployed account in tests and local tooling.

use crate::{AccountError, AccountInterface, Checkpoint};
use alloy_primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use relay_types::abi::IERC20;
use relay_types::{GasMeter, Operation, OwnerSignature, SignatureBundle};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Gas charged for every call made through the ledger.
pub const CALL_GAS: u64 = 9_000;
/// Gas charged per calldata byte of a call.
pub const CALLDATA_BYTE_GAS: u64 = 16;
/// Additional gas charged for a token transfer.
pub const TOKEN_TRANSFER_GAS: u64 = 30_000;
/// Gas charged for every recovered signature.
pub const ECRECOVER_GAS: u64 = 3_000;

/// Gas meter backed by an atomic counter.
#[derive(Debug)]
pub struct LocalGasMeter {
	remaining: AtomicU64,
}

impl LocalGasMeter {
	pub fn new(limit: u64) -> Self {
		Self {
			remaining: AtomicU64::new(limit),
		}
	}

	/// Starts a new invocation with `limit` gas.
	pub fn reset(&self, limit: u64) {
		self.remaining.store(limit, Ordering::SeqCst);
	}

	/// Consumes `amount` gas, failing without consuming anything when less
	/// is left.
	pub fn charge(&self, amount: u64) -> Result<(), AccountError> {
		self.remaining
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
				left.checked_sub(amount)
			})
			.map(|_| ())
			.map_err(|_| AccountError::OutOfGas)
	}
}

impl GasMeter for LocalGasMeter {
	fn gas_left(&self) -> u64 {
		self.remaining.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
	native: HashMap<Address, U256>,
	/// Balances by token, then holder.
	tokens: HashMap<Address, HashMap<Address, U256>>,
}

#[derive(Default)]
struct LedgerInner {
	state: LedgerState,
	snapshots: Vec<LedgerState>,
	/// Targets whose every call fails.
	reverting: HashSet<Address>,
}

/// Balances of every address, with snapshot-based journaling.
pub struct LocalLedger {
	inner: Mutex<LedgerInner>,
	gas: Arc<LocalGasMeter>,
}

impl LocalLedger {
	/// Creates an empty ledger whose meter starts with `gas_limit`.
	pub fn new(gas_limit: u64) -> Self {
		Self {
			inner: Mutex::new(LedgerInner::default()),
			gas: Arc::new(LocalGasMeter::new(gas_limit)),
		}
	}

	/// The meter charged for every operation on this ledger.
	pub fn gas(&self) -> Arc<LocalGasMeter> {
		self.gas.clone()
	}

	pub async fn fund(&self, holder: Address, amount: U256) {
		let mut inner = self.inner.lock().await;
		let balance = inner.state.native.entry(holder).or_default();
		*balance = balance.saturating_add(amount);
	}

	/// Makes `token` answer ERC-20 `transfer` calls.
	pub async fn register_token(&self, token: Address) {
		let mut inner = self.inner.lock().await;
		inner.state.tokens.entry(token).or_default();
	}

	pub async fn mint(&self, token: Address, holder: Address, amount: U256) {
		let mut inner = self.inner.lock().await;
		let balance = inner
			.state
			.tokens
			.entry(token)
			.or_default()
			.entry(holder)
			.or_default();
		*balance = balance.saturating_add(amount);
	}

	/// Makes every call to `target` fail.
	pub async fn mark_reverting(&self, target: Address) {
		self.inner.lock().await.reverting.insert(target);
	}

	pub async fn native_balance(&self, holder: Address) -> U256 {
		let inner = self.inner.lock().await;
		inner
			.state
			.native
			.get(&holder)
			.copied()
			.unwrap_or_default()
	}

	pub async fn token_balance(&self, token: Address, holder: Address) -> U256 {
		let inner = self.inner.lock().await;
		inner
			.state
			.tokens
			.get(&token)
			.and_then(|balances| balances.get(&holder))
			.copied()
			.unwrap_or_default()
	}

	pub async fn checkpoint(&self) -> Checkpoint {
		let mut inner = self.inner.lock().await;
		let snapshot = inner.state.clone();
		inner.snapshots.push(snapshot);
		Checkpoint(inner.snapshots.len() - 1)
	}

	pub async fn commit(&self, checkpoint: Checkpoint) -> Result<(), AccountError> {
		let mut inner = self.inner.lock().await;
		if checkpoint.0 >= inner.snapshots.len() {
			return Err(AccountError::UnknownCheckpoint(checkpoint.0));
		}
		inner.snapshots.truncate(checkpoint.0);
		Ok(())
	}

	pub async fn revert(&self, checkpoint: Checkpoint) -> Result<(), AccountError> {
		let mut inner = self.inner.lock().await;
		if checkpoint.0 >= inner.snapshots.len() {
			return Err(AccountError::UnknownCheckpoint(checkpoint.0));
		}
		let snapshot = inner.snapshots[checkpoint.0].clone();
		inner.state = snapshot;
		inner.snapshots.truncate(checkpoint.0);
		Ok(())
	}

	/// Performs a call from `from`.
	///
	/// Plain targets only receive value. Registered tokens additionally
	/// execute ERC-20 `transfer`. Delegate calls have no code to run here
	/// and succeed without effect unless the target reverts.
	pub async fn call(
		&self,
		from: Address,
		to: Address,
		value: U256,
		data: &Bytes,
		operation: Operation,
	) -> Result<bool, AccountError> {
		let calldata_gas = (data.len() as u64).saturating_mul(CALLDATA_BYTE_GAS);
		self.gas.charge(CALL_GAS.saturating_add(calldata_gas))?;

		let mut inner = self.inner.lock().await;
		if inner.reverting.contains(&to) {
			debug!(%to, "Call to reverting target");
			return Ok(false);
		}

		if operation == Operation::DelegateCall {
			return Ok(true);
		}

		let native_balance = inner.state.native.get(&from).copied().unwrap_or_default();
		if native_balance < value {
			debug!(%from, %value, "Insufficient native balance");
			return Ok(false);
		}

		let transfer = if inner.state.tokens.contains_key(&to) && !data.is_empty() {
			let Ok(call) = IERC20::transferCall::abi_decode(data) else {
				return Ok(false);
			};
			self.gas.charge(TOKEN_TRANSFER_GAS)?;

			let held = inner
				.state
				.tokens
				.get(&to)
				.and_then(|balances| balances.get(&from))
				.copied()
				.unwrap_or_default();
			if held < call.amount {
				debug!(token = %to, %from, amount = %call.amount, "Insufficient token balance");
				return Ok(false);
			}
			Some((call.to, call.amount))
		} else {
			None
		};

		if !value.is_zero() {
			inner.state.native.insert(from, native_balance - value);
			let balance = inner.state.native.entry(to).or_default();
			*balance = balance.saturating_add(value);
		}

		if let Some((recipient, amount)) = transfer {
			let balances = inner.state.tokens.entry(to).or_default();
			let held = balances.get(&from).copied().unwrap_or_default();
			balances.insert(from, held - amount);
			let balance = balances.entry(recipient).or_default();
			*balance = balance.saturating_add(amount);
		}

		Ok(true)
	}
}

/// Threshold account whose owners sign with ECDSA keys.
pub struct LocalAccount {
	address: Address,
	owners: BTreeSet<Address>,
	threshold: usize,
	ledger: Arc<LocalLedger>,
}

impl LocalAccount {
	pub fn new(
		address: Address,
		owners: impl IntoIterator<Item = Address>,
		threshold: usize,
		ledger: Arc<LocalLedger>,
	) -> Result<Self, AccountError> {
		let owners: BTreeSet<Address> = owners.into_iter().collect();
		if threshold == 0 || threshold > owners.len() {
			return Err(AccountError::InvalidConfiguration(format!(
				"Threshold {} out of range for {} owners",
				threshold,
				owners.len()
			)));
		}

		Ok(Self {
			address,
			owners,
			threshold,
			ledger,
		})
	}

	pub fn threshold(&self) -> usize {
		self.threshold
	}

	pub fn is_owner(&self, address: &Address) -> bool {
		self.owners.contains(address)
	}

	fn check_encoding(hash: &B256, encoding: &Bytes) -> Result<(), AccountError> {
		if keccak256(encoding) != *hash {
			return Err(AccountError::HashMismatch);
		}
		Ok(())
	}

	/// Checks that `signature` was produced by its claimed signer, an owner.
	fn verify_owner_signature(
		&self,
		hash: &B256,
		signature: &OwnerSignature,
	) -> Result<(), AccountError> {
		self.ledger.gas.charge(ECRECOVER_GAS)?;

		let parsed = Signature::from_raw(&signature.signature)
			.map_err(|e| AccountError::MalformedSignature(e.to_string()))?;
		let recovered = parsed
			.recover_address_from_prehash(hash)
			.map_err(|_| AccountError::InvalidSignature(signature.signer))?;

		if recovered != signature.signer {
			return Err(AccountError::InvalidSignature(signature.signer));
		}
		if !self.owners.contains(&signature.signer) {
			return Err(AccountError::NotOwner(signature.signer));
		}
		Ok(())
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	fn address(&self) -> Address {
		self.address
	}

	async fn verify_quorum(
		&self,
		hash: B256,
		encoding: &Bytes,
		signatures: &SignatureBundle,
	) -> Result<(), AccountError> {
		Self::check_encoding(&hash, encoding)?;

		if signatures.len() < self.threshold {
			return Err(AccountError::InsufficientSignatures {
				threshold: self.threshold,
				provided: signatures.len(),
			});
		}

		let mut last = Address::ZERO;
		for signature in signatures.iter() {
			if signature.signer <= last {
				return Err(AccountError::UnorderedSignatures);
			}
			self.verify_owner_signature(&hash, signature)?;
			last = signature.signer;
		}

		Ok(())
	}

	async fn verify_single(
		&self,
		hash: B256,
		encoding: &Bytes,
		signature: &OwnerSignature,
	) -> Result<(), AccountError> {
		Self::check_encoding(&hash, encoding)?;
		self.verify_owner_signature(&hash, signature)
	}

	async fn execute(
		&self,
		to: Address,
		value: U256,
		data: &Bytes,
		operation: Operation,
	) -> Result<bool, AccountError> {
		self.ledger
			.call(self.address, to, value, data, operation)
			.await
	}

	async fn checkpoint(&self) -> Result<Checkpoint, AccountError> {
		Ok(self.ledger.checkpoint().await)
	}

	async fn commit(&self, checkpoint: Checkpoint) -> Result<(), AccountError> {
		self.ledger.commit(checkpoint).await
	}

	async fn revert(&self, checkpoint: Checkpoint) -> Result<(), AccountError> {
		self.ledger.revert(checkpoint).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::signing::{sign_bundle, sign_hash};
	use alloy_signer_local::PrivateKeySigner;
	use relay_types::SignatureBundle;

	/// Bundle in the order a submitter sent it.
	fn submitted(signatures: Vec<OwnerSignature>) -> SignatureBundle {
		serde_json::from_value(serde_json::to_value(signatures).unwrap()).unwrap()
	}

	fn owners(count: u8) -> Vec<PrivateKeySigner> {
		(1..=count)
			.map(|i| PrivateKeySigner::from_bytes(&B256::repeat_byte(i)).unwrap())
			.collect()
	}

	fn account(signers: &[PrivateKeySigner], threshold: usize) -> (LocalAccount, Arc<LocalLedger>) {
		let ledger = Arc::new(LocalLedger::new(10_000_000));
		let account = LocalAccount::new(
			Address::repeat_byte(0xac),
			signers.iter().map(|s| s.address()),
			threshold,
			ledger.clone(),
		)
		.unwrap();
		(account, ledger)
	}

	fn message(seed: &[u8]) -> (B256, Bytes) {
		let encoding = Bytes::copy_from_slice(seed);
		(keccak256(&encoding), encoding)
	}

	#[test]
	fn test_threshold_must_be_in_range() {
		let ledger = Arc::new(LocalLedger::new(0));
		assert!(LocalAccount::new(Address::ZERO, [Address::repeat_byte(1)], 0, ledger.clone()).is_err());
		assert!(LocalAccount::new(Address::ZERO, [Address::repeat_byte(1)], 2, ledger).is_err());
	}

	#[tokio::test]
	async fn test_quorum_accepts_threshold_of_owners() {
		let signers = owners(3);
		let (account, _) = account(&signers, 2);
		let (hash, encoding) = message(b"call");

		let bundle = sign_bundle(&signers[..2], &hash).unwrap();
		account.verify_quorum(hash, &encoding, &bundle).await.unwrap();
	}

	#[tokio::test]
	async fn test_quorum_rejections() {
		let signers = owners(3);
		let (account, _) = account(&signers, 2);
		let (hash, encoding) = message(b"call");

		let too_few = sign_bundle(&signers[..1], &hash).unwrap();
		assert!(matches!(
			account.verify_quorum(hash, &encoding, &too_few).await,
			Err(AccountError::InsufficientSignatures { threshold: 2, provided: 1 })
		));

		let sorted = sign_bundle(&signers[..2], &hash).unwrap();
		let mut reversed: Vec<_> = sorted.iter().cloned().collect();
		reversed.reverse();
		assert!(matches!(
			account
				.verify_quorum(hash, &encoding, &submitted(reversed))
				.await,
			Err(AccountError::UnorderedSignatures)
		));

		let duplicate = sign_hash(&signers[0], &hash).unwrap();
		assert!(matches!(
			account
				.verify_quorum(
					hash,
					&encoding,
					&submitted(vec![duplicate.clone(), duplicate])
				)
				.await,
			Err(AccountError::UnorderedSignatures)
		));

		let (other_hash, _) = message(b"other");
		let wrong_message = sign_bundle(&signers[..2], &other_hash).unwrap();
		assert!(matches!(
			account.verify_quorum(hash, &encoding, &wrong_message).await,
			Err(AccountError::InvalidSignature(_))
		));

		assert!(matches!(
			account.verify_quorum(other_hash, &encoding, &sorted).await,
			Err(AccountError::HashMismatch)
		));
	}

	#[tokio::test]
	async fn test_single_signature_requires_owner() {
		let signers = owners(2);
		let (account, _) = account(&signers[..1], 1);
		let (hash, encoding) = message(b"refund");

		let owner = sign_hash(&signers[0], &hash).unwrap();
		account.verify_single(hash, &encoding, &owner).await.unwrap();

		let stranger = sign_hash(&signers[1], &hash).unwrap();
		assert!(matches!(
			account.verify_single(hash, &encoding, &stranger).await,
			Err(AccountError::NotOwner(_))
		));

		let malformed = OwnerSignature::new(signers[0].address(), vec![0u8; 10]);
		assert!(matches!(
			account.verify_single(hash, &encoding, &malformed).await,
			Err(AccountError::MalformedSignature(_))
		));
	}

	#[tokio::test]
	async fn test_native_and_token_transfers() {
		let signers = owners(1);
		let (account, ledger) = account(&signers, 1);
		let token = Address::repeat_byte(0x70);
		let receiver = Address::repeat_byte(0x55);

		ledger.fund(account.address(), U256::from(100)).await;
		ledger.register_token(token).await;
		ledger.mint(token, account.address(), U256::from(50)).await;

		assert!(account
			.execute(receiver, U256::from(40), &Bytes::new(), Operation::Call)
			.await
			.unwrap());
		assert_eq!(ledger.native_balance(receiver).await, U256::from(40));
		assert_eq!(ledger.native_balance(account.address()).await, U256::from(60));

		let data: Bytes = IERC20::transferCall {
			to: receiver,
			amount: U256::from(20),
		}
		.abi_encode()
		.into();
		assert!(account
			.execute(token, U256::ZERO, &data, Operation::Call)
			.await
			.unwrap());
		assert_eq!(ledger.token_balance(token, receiver).await, U256::from(20));

		// Overdrafts fail without moving funds.
		assert!(!account
			.execute(receiver, U256::from(61), &Bytes::new(), Operation::Call)
			.await
			.unwrap());
		let overdraft: Bytes = IERC20::transferCall {
			to: receiver,
			amount: U256::from(31),
		}
		.abi_encode()
		.into();
		assert!(!account
			.execute(token, U256::ZERO, &overdraft, Operation::Call)
			.await
			.unwrap());
		assert_eq!(ledger.token_balance(token, account.address()).await, U256::from(30));
	}

	#[tokio::test]
	async fn test_revert_restores_checkpoint() {
		let signers = owners(1);
		let (account, ledger) = account(&signers, 1);
		let receiver = Address::repeat_byte(0x55);
		ledger.fund(account.address(), U256::from(10)).await;

		let checkpoint = account.checkpoint().await.unwrap();
		account
			.execute(receiver, U256::from(10), &Bytes::new(), Operation::Call)
			.await
			.unwrap();
		assert_eq!(ledger.native_balance(receiver).await, U256::from(10));

		account.revert(checkpoint).await.unwrap();
		assert_eq!(ledger.native_balance(receiver).await, U256::ZERO);
		assert_eq!(ledger.native_balance(account.address()).await, U256::from(10));
		assert!(matches!(
			account.commit(checkpoint).await,
			Err(AccountError::UnknownCheckpoint(0))
		));
	}

	#[tokio::test]
	async fn test_reverting_target_and_out_of_gas() {
		let signers = owners(1);
		let (account, ledger) = account(&signers, 1);
		let target = Address::repeat_byte(0x99);
		ledger.mark_reverting(target).await;

		assert!(!account
			.execute(target, U256::ZERO, &Bytes::new(), Operation::DelegateCall)
			.await
			.unwrap());

		ledger.gas().reset(CALL_GAS - 1);
		assert!(matches!(
			account
				.execute(Address::repeat_byte(1), U256::ZERO, &Bytes::new(), Operation::Call)
				.await,
			Err(AccountError::OutOfGas)
		));
		assert_eq!(ledger.gas().gas_left(), CALL_GAS - 1);
	}
}
