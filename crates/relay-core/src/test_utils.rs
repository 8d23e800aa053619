//! Fixtures shared by the module tests.

use crate::RelayModule;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use relay_account::implementations::local::{LocalAccount, LocalLedger};
use relay_account::signing::{sign_bundle, sign_hash};
use relay_account::AccountRegistry;
use relay_storage::{implementations::memory::MemoryStorage, StorageService};
use relay_types::{
	Call, Invocation, OwnerSignature, RefundTerms, RelayEvent, SignatureBundle,
};
use std::sync::Arc;
use tokio::sync::broadcast;

pub(crate) const CHAIN_ID: u64 = 31337;
pub(crate) const OWNER_COUNT: usize = 3;
pub(crate) const THRESHOLD: usize = 2;

/// A 2-of-3 account behind a module on an in-memory ledger.
pub(crate) struct Harness {
	pub module: RelayModule,
	pub ledger: Arc<LocalLedger>,
	/// Owner keys followed by one key that is not an owner.
	pub keys: Vec<PrivateKeySigner>,
	pub account: Address,
	pub target: Address,
	pub token: Address,
	pub relayer: Address,
	pub submitter: Address,
	pub events: broadcast::Receiver<RelayEvent>,
}

impl Harness {
	pub async fn new() -> Self {
		let keys: Vec<_> = (1..=OWNER_COUNT as u8 + 1)
			.map(|i| PrivateKeySigner::from_bytes(&B256::repeat_byte(i)).unwrap())
			.collect();
		let owners = keys[..OWNER_COUNT].iter().map(|key| key.address());

		let account = Address::repeat_byte(0xac);
		let token = Address::repeat_byte(0x70);
		let ledger = Arc::new(LocalLedger::new(0));
		ledger
			.fund(account, U256::from(10).pow(U256::from(20)))
			.await;
		ledger.register_token(token).await;
		ledger
			.mint(token, account, U256::from(10).pow(U256::from(24)))
			.await;

		let mut registry = AccountRegistry::new();
		registry
			.register(Arc::new(
				LocalAccount::new(account, owners, THRESHOLD, ledger.clone()).unwrap(),
			))
			.unwrap();

		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let module = RelayModule::new(CHAIN_ID, Address::repeat_byte(0x4d), storage, registry);
		let events = module.events().subscribe();

		Self {
			module,
			ledger,
			keys,
			account,
			target: Address::repeat_byte(0x7a),
			token,
			relayer: Address::repeat_byte(0x5e),
			submitter: Address::repeat_byte(0x5b),
			events,
		}
	}

	/// An invocation by the submitter with `gas` available.
	pub fn invocation(&self, gas: u64) -> Invocation {
		let meter = self.ledger.gas();
		meter.reset(gas);
		Invocation::new(self.submitter, meter)
	}

	/// Native transfer of `value` from the account to the target.
	pub fn transfer(&self, value: U256) -> Call {
		Call::new(self.account, self.target, Bytes::new()).with_value(value)
	}

	pub fn terms(
		&self,
		fee_token: Address,
		gas_limit: u64,
		max_fee_per_gas: u64,
		receiver: Address,
	) -> RefundTerms {
		RefundTerms {
			fee_token,
			gas_limit,
			max_fee_per_gas: U256::from(max_fee_per_gas),
			receiver,
		}
	}

	/// Quorum signatures over `call` at `nonce`.
	pub fn sign_call(&self, call: &Call, nonce: u64) -> SignatureBundle {
		self.sign_call_with(call, nonce, THRESHOLD)
	}

	/// Signatures of the first `count` owners over `call` at `nonce`.
	pub fn sign_call_with(&self, call: &Call, nonce: u64, count: usize) -> SignatureBundle {
		let hash = self.module.call_hash(call, nonce);
		sign_bundle(&self.keys[..count], &hash).unwrap()
	}

	/// Signature of key `index` over `terms` for `call_hash`.
	pub fn sign_refund(&self, index: usize, call_hash: B256, terms: &RefundTerms) -> OwnerSignature {
		let hash = self.module.refund_hash(call_hash, terms);
		sign_hash(&self.keys[index], &hash).unwrap()
	}

	/// Quorum signatures over `call` plus the first owner's refund approval.
	pub fn sign_refunded(
		&self,
		call: &Call,
		nonce: u64,
		terms: &RefundTerms,
	) -> (SignatureBundle, OwnerSignature) {
		let call_hash = self.module.call_hash(call, nonce);
		(
			self.sign_call(call, nonce),
			self.sign_refund(0, call_hash, terms),
		)
	}
}
