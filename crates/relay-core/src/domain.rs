//! EIP-712 hashing of relay messages.
//!
//! Both messages are hashed under a domain made of the chain id and the
//! module address, so a signature is only valid for one deployment on one
//! chain.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use relay_types::{Call, RefundTerms};

sol! {
	/// Message owners sign to authorize a call.
	struct RelayedCall {
		address account;
		address to;
		uint256 value;
		bytes data;
		uint8 operation;
		uint256 nonce;
	}

	/// Message an owner signs to set refund terms for one authorized call.
	struct RefundAuthorization {
		bytes32 callHash;
		address feeToken;
		uint256 gasLimit;
		uint256 maxFeePerGas;
		address receiver;
	}
}

#[derive(Debug, Clone)]
pub struct DomainHasher {
	chain_id: u64,
	module: Address,
	domain: Eip712Domain,
	separator: B256,
}

impl DomainHasher {
	pub fn new(chain_id: u64, module: Address) -> Self {
		let domain = Eip712Domain::new(None, None, Some(U256::from(chain_id)), Some(module), None);
		let separator = domain.separator();
		Self {
			chain_id,
			module,
			domain,
			separator,
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn module(&self) -> Address {
		self.module
	}

	pub fn domain(&self) -> &Eip712Domain {
		&self.domain
	}

	pub fn domain_separator(&self) -> B256 {
		self.separator
	}

	/// `0x19 0x01 || domainSeparator || hashStruct(message)`
	fn encode<S: SolStruct>(&self, message: &S) -> Bytes {
		let mut out = Vec::with_capacity(66);
		out.extend_from_slice(&[0x19, 0x01]);
		out.extend_from_slice(self.separator.as_slice());
		out.extend_from_slice(message.eip712_hash_struct().as_slice());
		out.into()
	}

	fn call_message(call: &Call, nonce: u64) -> RelayedCall {
		RelayedCall {
			account: call.account,
			to: call.to,
			value: call.value,
			data: call.data.clone(),
			operation: call.operation.as_u8(),
			nonce: U256::from(nonce),
		}
	}

	fn refund_message(call_hash: B256, terms: &RefundTerms) -> RefundAuthorization {
		RefundAuthorization {
			callHash: call_hash,
			feeToken: terms.fee_token,
			gasLimit: U256::from(terms.gas_limit),
			maxFeePerGas: terms.max_fee_per_gas,
			receiver: terms.receiver,
		}
	}

	/// Encoded message authorizing `call` at `nonce`.
	pub fn encode_call(&self, call: &Call, nonce: u64) -> Bytes {
		self.encode(&Self::call_message(call, nonce))
	}

	pub fn call_hash(&self, call: &Call, nonce: u64) -> B256 {
		keccak256(self.encode_call(call, nonce))
	}

	/// Encoded message authorizing `terms` for the call hashed to `call_hash`.
	pub fn encode_refund(&self, call_hash: B256, terms: &RefundTerms) -> Bytes {
		self.encode(&Self::refund_message(call_hash, terms))
	}

	pub fn refund_hash(&self, call_hash: B256, terms: &RefundTerms) -> B256 {
		keccak256(self.encode_refund(call_hash, terms))
	}
}
