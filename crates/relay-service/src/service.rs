//! Read-only relay service built from configuration.
//!
//! Every query answers with JSON so the CLI can print it directly.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use relay_account::AccountRegistry;
use relay_config::RelayConfig;
use relay_core::RelayModule;
use relay_storage::{create_storage, StorageService};
use relay_types::{abi::setRefundConditionCall, Call, RefundTerms};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct RelayService {
	config: RelayConfig,
	module: RelayModule,
}

impl RelayService {
	pub fn from_config(config: RelayConfig) -> Result<Self> {
		let backend = create_storage(&config.storage.backend, &config.storage.config)
			.context("Failed to create storage backend")?;
		let storage = Arc::new(StorageService::new(backend));
		debug!(backend = %config.storage.backend, "Storage backend ready");

		let module = RelayModule::new(
			config.module.chain_id,
			config.module.address,
			storage,
			AccountRegistry::new(),
		)
		.with_gas_schedule(config.gas.clone());

		Ok(Self { config, module })
	}

	pub fn config(&self) -> &RelayConfig {
		&self.config
	}

	pub fn module(&self) -> &RelayModule {
		&self.module
	}

	pub fn domain(&self) -> Value {
		json!({
			"name": self.config.module.name,
			"chain_id": self.module.chain_id(),
			"module": self.module.address(),
			"domain_separator": self.module.domain_separator(),
		})
	}

	/// Call hash at `nonce`, or at the account's current nonce.
	pub async fn call_hash(&self, call: &Call, nonce: Option<u64>) -> Result<Value> {
		let nonce = match nonce {
			Some(nonce) => nonce,
			None => self.module.nonce(call.account).await?,
		};

		Ok(json!({
			"call_hash": self.module.call_hash(call, nonce),
			"nonce": nonce,
		}))
	}

	pub fn refund_hash(&self, call_hash: B256, terms: &RefundTerms) -> Value {
		json!({
			"refund_hash": self.module.refund_hash(call_hash, terms),
			"max_payment": terms.max_payment(),
		})
	}

	pub async fn nonce(&self, account: Address) -> Result<Value> {
		Ok(json!({
			"account": account,
			"nonce": self.module.nonce(account).await?,
		}))
	}

	pub async fn condition(&self, account: Address, fee_token: Address) -> Result<Value> {
		let condition = self.module.condition(account, fee_token).await?;
		Ok(json!({
			"account": account,
			"fee_token": fee_token,
			"condition": condition,
		}))
	}

	pub async fn allowed(
		&self,
		account: Address,
		fee_token: Address,
		receiver: Address,
	) -> Result<Value> {
		Ok(json!({
			"receiver": receiver,
			"allowed": self.module.is_receiver_allowed(account, fee_token, receiver).await?,
		}))
	}

	/// Calldata an account sends to replace its refund condition.
	pub fn encode_condition(
		&self,
		fee_token: Address,
		max_fee_per_gas: U256,
		max_gas_limit: u64,
		allowed_receivers: Vec<Address>,
	) -> Value {
		let calldata = setRefundConditionCall {
			feeToken: fee_token,
			maxFeePerGas: max_fee_per_gas,
			maxGasLimit: U256::from(max_gas_limit),
			allowedReceivers: allowed_receivers,
		}
		.abi_encode();

		json!({
			"to": self.module.address(),
			"data": format!("0x{}", hex::encode(calldata)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_config::ConfigLoader;
	use relay_core::DomainHasher;
	use relay_types::NATIVE_TOKEN;

	fn config(storage: &str) -> RelayConfig {
		let toml = format!(
			r#"
[module]
name = "test-relay"
address = "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d"
chain_id = 5

{storage}
"#
		);
		ConfigLoader::new()
			.with_env_prefix("RELAY_SERVICE_TEST_")
			.parse(&toml)
			.unwrap()
	}

	#[test]
	fn test_domain() {
		let service = RelayService::from_config(config("")).unwrap();
		let domain = service.domain();

		let expected = DomainHasher::new(5, Address::repeat_byte(0x4d)).domain_separator();
		assert_eq!(domain["chain_id"], 5);
		assert_eq!(domain["name"], "test-relay");
		assert_eq!(domain["domain_separator"], json!(expected));
	}

	#[tokio::test]
	async fn test_call_hash_defaults_to_current_nonce() {
		let service = RelayService::from_config(config("")).unwrap();
		let call = Call::new(
			Address::repeat_byte(0xac),
			Address::repeat_byte(0x70),
			Default::default(),
		);

		let current = service.call_hash(&call, None).await.unwrap();
		assert_eq!(current["nonce"], 0);
		assert_eq!(
			current["call_hash"],
			json!(service.module().call_hash(&call, 0))
		);

		let later = service.call_hash(&call, Some(4)).await.unwrap();
		assert_eq!(later["nonce"], 4);
		assert_ne!(later["call_hash"], current["call_hash"]);
	}

	#[tokio::test]
	async fn test_queries_read_persisted_state() {
		let dir = tempfile::tempdir().unwrap();
		let storage = format!(
			"[storage]\nbackend = \"file\"\n[storage.config]\nstorage_path = \"{}\"\n",
			dir.path().display()
		);
		let account = Address::repeat_byte(0xac);
		let receiver = Address::repeat_byte(0xa1);

		let writer = RelayService::from_config(config(&storage)).unwrap();
		writer
			.module()
			.set_condition(account, NATIVE_TOKEN, U256::from(7), 90_000, vec![receiver])
			.await
			.unwrap();

		let reader = RelayService::from_config(config(&storage)).unwrap();
		let condition = reader.condition(account, NATIVE_TOKEN).await.unwrap();
		assert_eq!(condition["condition"]["max_gas_limit"], 90_000);

		let allowed = reader.allowed(account, NATIVE_TOKEN, receiver).await.unwrap();
		assert_eq!(allowed["allowed"], true);
		let other = reader
			.allowed(account, NATIVE_TOKEN, Address::repeat_byte(0xb2))
			.await
			.unwrap();
		assert_eq!(other["allowed"], false);

		let nonce = reader.nonce(account).await.unwrap();
		assert_eq!(nonce["nonce"], 0);
	}

	#[test]
	fn test_encode_condition() {
		let service = RelayService::from_config(config("")).unwrap();
		let encoded = service.encode_condition(
			NATIVE_TOKEN,
			U256::from(10),
			100_000,
			vec![Address::repeat_byte(1)],
		);

		let data = encoded["data"].as_str().unwrap();
		let selector = format!("0x{}", hex::encode(setRefundConditionCall::SELECTOR));
		assert!(data.starts_with(&selector));
		assert_eq!(encoded["to"], json!(Address::repeat_byte(0x4d)));
	}
}
