use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_config::{ConfigLoader, RelayConfig};
use relay_types::{Call, Operation, RefundTerms, NATIVE_TOKEN};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod service;

use service::RelayService;

#[derive(Parser)]
#[command(name = "relay-module")]
#[command(about = "Relay module for multi-owner accounts", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/relay.toml")]
	config: PathBuf,

	/// Overrides `logging.level` from the configuration
	#[arg(long)]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Validate the configuration file
	Validate,
	/// Print the signing domain of the module
	Domain,
	/// Compute the hash owners sign to authorize a call
	CallHash {
		#[arg(long)]
		account: Address,
		#[arg(long)]
		to: Address,
		#[arg(long, default_value = "0")]
		value: U256,
		#[arg(long, default_value = "0x")]
		data: Bytes,
		#[arg(long, default_value = "call")]
		operation: Operation,
		/// Defaults to the account's current nonce
		#[arg(long)]
		nonce: Option<u64>,
	},
	/// Compute the hash an owner signs to authorize refund terms
	RefundHash {
		#[arg(long)]
		call_hash: B256,
		#[arg(long, default_value_t = NATIVE_TOKEN)]
		fee_token: Address,
		#[arg(long)]
		gas_limit: u64,
		#[arg(long)]
		max_fee_per_gas: U256,
		/// Zero pays the submitter
		#[arg(long, default_value_t = Address::ZERO)]
		receiver: Address,
	},
	/// Print the current nonce of an account
	Nonce {
		#[arg(long)]
		account: Address,
	},
	/// Print the refund condition of an account for a fee token
	Condition {
		#[arg(long)]
		account: Address,
		#[arg(long, default_value_t = NATIVE_TOKEN)]
		fee_token: Address,
	},
	/// Check whether a receiver is on an account's allowlist
	Allowed {
		#[arg(long)]
		account: Address,
		#[arg(long, default_value_t = NATIVE_TOKEN)]
		fee_token: Address,
		#[arg(long)]
		receiver: Address,
	},
	/// Encode the call an account makes to replace a refund condition
	EncodeCondition {
		#[arg(long, default_value_t = NATIVE_TOKEN)]
		fee_token: Address,
		#[arg(long)]
		max_fee_per_gas: U256,
		#[arg(long)]
		max_gas_limit: u64,
		#[arg(long, value_delimiter = ',')]
		receivers: Vec<Address>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	setup_tracing(log_level(cli.log_level.as_deref(), &config))?;

	if let Commands::Validate = cli.command {
		info!("Configuration is valid");
		info!("Module name: {}", config.module.name);
		info!("Module address: {}", config.module.address);
		info!("Chain id: {}", config.module.chain_id);
		info!("Storage backend: {}", config.storage.backend);
		return Ok(());
	}

	let service = RelayService::from_config(config).context("Failed to build relay service")?;
	let output = run(&service, cli.command).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

async fn run(service: &RelayService, command: Commands) -> Result<Value> {
	match command {
		Commands::Validate => Ok(serde_json::to_value(service.config().module.clone())?),
		Commands::Domain => Ok(service.domain()),
		Commands::CallHash {
			account,
			to,
			value,
			data,
			operation,
			nonce,
		} => {
			let call = Call::new(account, to, data)
				.with_value(value)
				.with_operation(operation);
			service.call_hash(&call, nonce).await
		}
		Commands::RefundHash {
			call_hash,
			fee_token,
			gas_limit,
			max_fee_per_gas,
			receiver,
		} => {
			let terms = RefundTerms {
				fee_token,
				gas_limit,
				max_fee_per_gas,
				receiver,
			};
			Ok(service.refund_hash(call_hash, &terms))
		}
		Commands::Nonce { account } => service.nonce(account).await,
		Commands::Condition { account, fee_token } => service.condition(account, fee_token).await,
		Commands::Allowed {
			account,
			fee_token,
			receiver,
		} => service.allowed(account, fee_token, receiver).await,
		Commands::EncodeCondition {
			fee_token,
			max_fee_per_gas,
			max_gas_limit,
			receivers,
		} => Ok(service.encode_condition(fee_token, max_fee_per_gas, max_gas_limit, receivers)),
	}
}

/// Filter used when `RUST_LOG` is unset: the command line wins over the
/// configuration, which already folds in `RELAY_LOG_LEVEL`.
fn log_level<'a>(cli: Option<&'a str>, config: &'a RelayConfig) -> &'a str {
	cli.unwrap_or(config.logging.level.as_str())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	Ok(())
}
