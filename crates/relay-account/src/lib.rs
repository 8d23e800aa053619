//! Account capability used by the relay module.
//!
//! The multi-owner account owns the funds, the owner set and the signature
//! threshold. The relay module never implements any of that; it talks to
//! the account through [`AccountInterface`], which verifies signatures,
//! performs calls, and journals the side effects of those calls so an
//! aborted invocation can be undone.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use relay_types::{Operation, OwnerSignature, SignatureBundle};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod signing;

pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Insufficient signatures: threshold {threshold}, provided {provided}")]
	InsufficientSignatures { threshold: usize, provided: usize },
	#[error("Signatures must be sorted by ascending signer without duplicates")]
	UnorderedSignatures,
	#[error("Invalid signature for signer {0}")]
	InvalidSignature(Address),
	#[error("Signer {0} is not an owner")]
	NotOwner(Address),
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
	#[error("Message encoding does not match its hash")]
	HashMismatch,
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Out of gas")]
	OutOfGas,
	#[error("Invalid account configuration: {0}")]
	InvalidConfiguration(String),
	#[error("Account {0} already registered")]
	AlreadyRegistered(Address),
	#[error("Unknown checkpoint {0}")]
	UnknownCheckpoint(usize),
}

/// Marker for a point in the account's journal of side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Capability the relay module uses to act on behalf of an account.
///
/// Implementations must treat every call as untrusted: `execute` may run
/// arbitrary code, including code that mutates the account itself.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address of the account.
	fn address(&self) -> Address;

	/// Verifies that `signatures` meet the account's owner quorum for `hash`.
	///
	/// `encoding` is the message `hash` was computed from.
	async fn verify_quorum(
		&self,
		hash: B256,
		encoding: &Bytes,
		signatures: &SignatureBundle,
	) -> Result<(), AccountError>;

	/// Verifies that a single owner signed `hash`.
	async fn verify_single(
		&self,
		hash: B256,
		encoding: &Bytes,
		signature: &OwnerSignature,
	) -> Result<(), AccountError>;

	/// Performs a call from the account.
	///
	/// Returns `Ok(false)` when the call itself failed; errors are reserved
	/// for failures of the host, such as running out of gas.
	async fn execute(
		&self,
		to: Address,
		value: U256,
		data: &Bytes,
		operation: Operation,
	) -> Result<bool, AccountError>;

	/// Opens a checkpoint covering all side effects from now on.
	async fn checkpoint(&self) -> Result<Checkpoint, AccountError>;

	/// Keeps the side effects recorded since `checkpoint`.
	async fn commit(&self, checkpoint: Checkpoint) -> Result<(), AccountError>;

	/// Undoes the side effects recorded since `checkpoint`.
	async fn revert(&self, checkpoint: Checkpoint) -> Result<(), AccountError>;
}

/// Registry of the accounts the module can act for.
#[derive(Default, Clone)]
pub struct AccountRegistry {
	accounts: HashMap<Address, Arc<dyn AccountInterface>>,
}

impl AccountRegistry {
	pub fn new() -> Self {
		Self {
			accounts: HashMap::new(),
		}
	}

	/// Registers an account under its own address.
	pub fn register(&mut self, account: Arc<dyn AccountInterface>) -> Result<(), AccountError> {
		let address = account.address();
		if self.accounts.contains_key(&address) {
			return Err(AccountError::AlreadyRegistered(address));
		}

		self.accounts.insert(address, account);
		Ok(())
	}

	pub fn get(&self, address: &Address) -> Option<Arc<dyn AccountInterface>> {
		self.accounts.get(address).cloned()
	}

	pub fn len(&self) -> usize {
		self.accounts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.accounts.is_empty()
	}
}
