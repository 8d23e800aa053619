//! The relay module.
//!
//! Every entry point is a single invocation that either applies all of its
//! effects or none. Module state (nonces and refund conditions) is staged in
//! a [`StorageTransaction`]; effects on the account are journaled behind an
//! account checkpoint. Both are committed together on success and dropped
//! together on failure. Invocations are serialized by a module-wide lock.

use crate::{
	DomainHasher, FeeSettlement, GasAccount, RefundAuthorizer, RefundConditionStore, RelayError,
	TransactionAuthorizer,
};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use relay_account::{AccountInterface, AccountRegistry, Checkpoint};
use relay_storage::{StorageService, StorageTransaction};
use relay_types::{
	abi::execTransactionWithRefundCall, Call, EventBus, GasSchedule, Invocation, OwnerSignature,
	RefundCondition, RefundTerms, RelayEvent, SignatureBundle,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
	pub call_hash: B256,
	/// Whether the relayed call itself succeeded. Always true for
	/// invocations without refund.
	pub success: bool,
	/// Refund paid, in units of the fee token.
	pub payment: U256,
}

/// Refund part of a refunded invocation.
struct RefundRequest<'a> {
	invocation: &'a Invocation,
	terms: &'a RefundTerms,
	signature: &'a OwnerSignature,
	gas: GasAccount,
}

pub struct RelayModule {
	hasher: Arc<DomainHasher>,
	authorizer: TransactionAuthorizer,
	refunds: RefundAuthorizer,
	conditions: RefundConditionStore,
	settlement: FeeSettlement,
	storage: Arc<StorageService>,
	accounts: AccountRegistry,
	events: EventBus,
	invocation_lock: Mutex<()>,
}

impl RelayModule {
	pub fn new(
		chain_id: u64,
		address: Address,
		storage: Arc<StorageService>,
		accounts: AccountRegistry,
	) -> Self {
		let hasher = Arc::new(DomainHasher::new(chain_id, address));
		Self {
			authorizer: TransactionAuthorizer::new(hasher.clone()),
			refunds: RefundAuthorizer::new(hasher.clone()),
			hasher,
			conditions: RefundConditionStore::new(),
			settlement: FeeSettlement::new(GasSchedule::default()),
			storage,
			accounts,
			events: EventBus::default(),
			invocation_lock: Mutex::new(()),
		}
	}

	pub fn with_gas_schedule(mut self, schedule: GasSchedule) -> Self {
		self.settlement = FeeSettlement::new(schedule);
		self
	}

	pub fn with_event_bus(mut self, events: EventBus) -> Self {
		self.events = events;
		self
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn address(&self) -> Address {
		self.hasher.module()
	}

	pub fn chain_id(&self) -> u64 {
		self.hasher.chain_id()
	}

	pub fn gas_schedule(&self) -> &GasSchedule {
		self.settlement.schedule()
	}

	pub fn domain_separator(&self) -> B256 {
		self.hasher.domain_separator()
	}

	/// Hash owners sign to authorize `call` at `nonce`.
	pub fn call_hash(&self, call: &Call, nonce: u64) -> B256 {
		self.hasher.call_hash(call, nonce)
	}

	/// Hash an owner signs to authorize `terms` for the call `call_hash`.
	pub fn refund_hash(&self, call_hash: B256, terms: &RefundTerms) -> B256 {
		self.hasher.refund_hash(call_hash, terms)
	}

	pub async fn nonce(&self, account: Address) -> Result<u64, RelayError> {
		let tx = self.storage.begin();
		self.authorizer.nonce(&tx, account).await
	}

	pub async fn condition(
		&self,
		account: Address,
		fee_token: Address,
	) -> Result<RefundCondition, RelayError> {
		let tx = self.storage.begin();
		self.conditions.load(&tx, account, fee_token).await
	}

	/// Whether `receiver` is on the allowlist of `account` for `fee_token`.
	pub async fn is_receiver_allowed(
		&self,
		account: Address,
		fee_token: Address,
		receiver: Address,
	) -> Result<bool, RelayError> {
		Ok(self
			.condition(account, fee_token)
			.await?
			.is_receiver_allowed(&receiver))
	}

	fn account(&self, address: &Address) -> Result<Arc<dyn AccountInterface>, RelayError> {
		self.accounts
			.get(address)
			.ok_or(RelayError::UnknownAccount(*address))
	}

	/// Relays `call` once the owner quorum signed it at the account's current
	/// nonce.
	///
	/// A failing call aborts the invocation, leaving the nonce unconsumed.
	#[instrument(skip_all, fields(account = %call.account, to = %call.to))]
	pub async fn submit(
		&self,
		invocation: &Invocation,
		call: &Call,
		signatures: &SignatureBundle,
	) -> Result<RelayOutcome, RelayError> {
		let _guard = self.invocation_lock.lock().await;
		let account = self.account(&call.account)?;
		debug!(submitter = %invocation.submitter, "Relaying call");

		let checkpoint = account.checkpoint().await.map_err(RelayError::Account)?;
		let mut tx = self.storage.begin();
		let result = self
			.execute_call(&mut tx, account.as_ref(), call, signatures)
			.await;
		let result = self.finish(tx, account.as_ref(), checkpoint, result).await;

		self.report(call.account, &result);
		result
	}

	/// Relays `call` and pays its submitter a refund from the account.
	///
	/// The refund is owed even when the call fails. The gas budget is checked
	/// before any signature, and every refund rule must pass before the call
	/// runs.
	#[instrument(skip_all, fields(account = %call.account, to = %call.to, fee_token = %terms.fee_token))]
	pub async fn submit_with_refund(
		&self,
		invocation: &Invocation,
		call: &Call,
		signatures: &SignatureBundle,
		terms: &RefundTerms,
		refund_signature: &OwnerSignature,
	) -> Result<RelayOutcome, RelayError> {
		let _guard = self.invocation_lock.lock().await;

		let calldata = Self::refund_calldata(call, signatures, terms, refund_signature);
		let gas = self.settlement.begin(invocation, &calldata, terms)?;
		let account = self.account(&call.account)?;
		debug!(
			submitter = %invocation.submitter,
			start_gas = gas.start_gas,
			gas_limit = terms.gas_limit,
			"Relaying call with refund"
		);

		let request = RefundRequest {
			invocation,
			terms,
			signature: refund_signature,
			gas,
		};
		let checkpoint = account.checkpoint().await.map_err(RelayError::Account)?;
		let mut tx = self.storage.begin();
		let result = self
			.execute_refunded(&mut tx, account.as_ref(), call, signatures, &request)
			.await;
		let result = self.finish(tx, account.as_ref(), checkpoint, result).await;

		self.report(call.account, &result);
		result
	}

	/// Replaces the refund condition of the calling account for `fee_token`.
	///
	/// The caller is the account itself; no other authorization applies.
	#[instrument(skip_all, fields(account = %caller, fee_token = %fee_token))]
	pub async fn set_condition(
		&self,
		caller: Address,
		fee_token: Address,
		max_fee_per_gas: U256,
		max_gas_limit: u64,
		allowed_receivers: Vec<Address>,
	) -> Result<RefundCondition, RelayError> {
		let _guard = self.invocation_lock.lock().await;

		let condition = RefundCondition::new(max_fee_per_gas, max_gas_limit, allowed_receivers);
		let mut tx = self.storage.begin();
		self.conditions.store(&mut tx, caller, fee_token, &condition)?;
		tx.commit().await?;

		info!(
			%max_fee_per_gas,
			max_gas_limit,
			allowed_receivers = condition.allowed_receiver_count(),
			"Refund condition updated"
		);
		let _ = self.events.publish(RelayEvent::ConditionUpdated {
			account: caller,
			fee_token,
			condition: condition.clone(),
		});

		Ok(condition)
	}

	async fn execute_call(
		&self,
		tx: &mut StorageTransaction<'_>,
		account: &dyn AccountInterface,
		call: &Call,
		signatures: &SignatureBundle,
	) -> Result<RelayOutcome, RelayError> {
		let call_hash = self
			.authorizer
			.authorize(tx, account, call, signatures)
			.await?;

		let success = account
			.execute(call.to, call.value, &call.data, call.operation)
			.await
			.map_err(RelayError::Account)?;
		if !success {
			return Err(RelayError::ExecutionFailed { call_hash });
		}

		Ok(RelayOutcome {
			call_hash,
			success,
			payment: U256::ZERO,
		})
	}

	async fn execute_refunded(
		&self,
		tx: &mut StorageTransaction<'_>,
		account: &dyn AccountInterface,
		call: &Call,
		signatures: &SignatureBundle,
		request: &RefundRequest<'_>,
	) -> Result<RelayOutcome, RelayError> {
		let call_hash = self
			.authorizer
			.authorize(tx, account, call, signatures)
			.await?;
		self.refunds
			.authorize(account, call_hash, request.terms, request.signature)
			.await?;

		let condition = self
			.conditions
			.load(tx, call.account, request.terms.fee_token)
			.await?;
		self.conditions.check(&condition, request.terms)?;

		let success = account
			.execute(call.to, call.value, &call.data, call.operation)
			.await
			.map_err(RelayError::Account)?;
		if !success {
			warn!(%call_hash, "Relayed call failed, refund still owed");
		}

		let payment = self
			.settlement
			.settle(account, &request.gas, request.invocation, request.terms)
			.await?;

		Ok(RelayOutcome {
			call_hash,
			success,
			payment,
		})
	}

	/// Commits both the staged module state and the account journal, or
	/// drops both.
	async fn finish(
		&self,
		tx: StorageTransaction<'_>,
		account: &dyn AccountInterface,
		checkpoint: Checkpoint,
		result: Result<RelayOutcome, RelayError>,
	) -> Result<RelayOutcome, RelayError> {
		match result {
			Ok(outcome) => {
				if let Err(e) = tx.commit().await {
					if let Err(revert) = account.revert(checkpoint).await {
						warn!(error = %revert, "Account revert failed");
					}
					return Err(e.into());
				}
				account
					.commit(checkpoint)
					.await
					.map_err(RelayError::Account)?;
				Ok(outcome)
			}
			Err(e) => {
				tx.discard();
				if let Err(revert) = account.revert(checkpoint).await {
					warn!(error = %revert, "Account revert failed");
				}
				Err(e)
			}
		}
	}

	fn report(&self, account: Address, result: &Result<RelayOutcome, RelayError>) {
		match result {
			Ok(outcome) => {
				info!(
					call_hash = %outcome.call_hash,
					success = outcome.success,
					payment = %outcome.payment,
					"Invocation committed"
				);
				let _ = self.events.publish(RelayEvent::Executed {
					account,
					call_hash: outcome.call_hash,
					success: outcome.success,
					payment: outcome.payment,
				});
			}
			Err(e) => warn!(error = %e, "Invocation reverted"),
		}
	}

	/// Submission calldata used to price the intrinsic cost of a refunded
	/// invocation.
	fn refund_calldata(
		call: &Call,
		signatures: &SignatureBundle,
		terms: &RefundTerms,
		refund_signature: &OwnerSignature,
	) -> Vec<u8> {
		execTransactionWithRefundCall {
			account: call.account,
			to: call.to,
			value: call.value,
			data: call.data.clone(),
			operation: call.operation.as_u8(),
			signatures: signatures.packed(),
			feeToken: terms.fee_token,
			gasLimit: U256::from(terms.gas_limit),
			maxFeePerGas: terms.max_fee_per_gas,
			receiver: terms.receiver,
			refundSignature: refund_signature.signature.clone(),
		}
		.abi_encode()
	}
}
