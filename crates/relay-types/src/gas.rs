//! Gas metering and the gas schedule used to bound refunds.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source of the remaining gas of the running invocation.
///
/// Implemented by whatever hosts the module; the module only ever reads it.
pub trait GasMeter: Send + Sync {
	/// Gas still available to the invocation.
	fn gas_left(&self) -> u64;
}

/// Context of one entry-point invocation.
#[derive(Clone)]
pub struct Invocation {
	/// Whoever submitted the invocation and pays for its gas. Receives the
	/// refund when the signed terms leave the receiver unset.
	pub submitter: Address,
	/// Meter of the gas supplied by the submitter.
	pub gas: Arc<dyn GasMeter>,
}

impl Invocation {
	pub fn new(submitter: Address, gas: Arc<dyn GasMeter>) -> Self {
		Self { submitter, gas }
	}

	pub fn gas_left(&self) -> u64 {
		self.gas.gas_left()
	}
}

impl fmt::Debug for Invocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Invocation")
			.field("submitter", &self.submitter)
			.field("gas_left", &self.gas.gas_left())
			.finish()
	}
}

/// Constants used when estimating and settling refunded gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSchedule {
	/// Fixed cost of getting an invocation started.
	#[serde(default = "default_base_gas")]
	pub base_gas: u64,
	/// Calldata cost per zero byte.
	#[serde(default = "default_zero_byte_gas")]
	pub zero_byte_gas: u64,
	/// Calldata cost per non-zero byte.
	#[serde(default = "default_non_zero_byte_gas")]
	pub non_zero_byte_gas: u64,
	/// Minimum headroom kept on top of the signed gas limit.
	#[serde(default = "default_call_reserve")]
	pub call_reserve: u64,
	/// Cost of the upfront budget check itself.
	#[serde(default = "default_check_overhead")]
	pub check_overhead: u64,
	/// Gas charged for settling the refund after it has been measured.
	#[serde(default = "default_settlement_overhead")]
	pub settlement_overhead: u64,
}

fn default_base_gas() -> u64 {
	21_000
}

fn default_zero_byte_gas() -> u64 {
	4
}

fn default_non_zero_byte_gas() -> u64 {
	16
}

fn default_call_reserve() -> u64 {
	2_500
}

fn default_check_overhead() -> u64 {
	500
}

fn default_settlement_overhead() -> u64 {
	30_000
}

impl Default for GasSchedule {
	fn default() -> Self {
		Self {
			base_gas: default_base_gas(),
			zero_byte_gas: default_zero_byte_gas(),
			non_zero_byte_gas: default_non_zero_byte_gas(),
			call_reserve: default_call_reserve(),
			check_overhead: default_check_overhead(),
			settlement_overhead: default_settlement_overhead(),
		}
	}
}

impl GasSchedule {
	/// Gas spent on calldata.
	pub fn calldata_gas(&self, calldata: &[u8]) -> u64 {
		calldata.iter().fold(0u64, |acc, byte| {
			let cost = if *byte == 0 {
				self.zero_byte_gas
			} else {
				self.non_zero_byte_gas
			};
			acc.saturating_add(cost)
		})
	}

	/// Gas already incurred before the module gets to run.
	pub fn intrinsic_gas(&self, calldata: &[u8]) -> u64 {
		self.base_gas.saturating_add(self.calldata_gas(calldata))
	}

	/// Total gas an invocation must be given so that `gas_limit` can be spent
	/// on the refunded work.
	///
	/// Only 63/64 of the remaining gas is forwarded to a nested call, so the
	/// limit is scaled accordingly, with `call_reserve` as the floor.
	pub fn required_gas(&self, gas_limit: u64) -> u64 {
		let scaled = (u128::from(gas_limit) * 64 / 63).min(u128::from(u64::MAX)) as u64;
		scaled
			.max(gas_limit.saturating_add(self.call_reserve))
			.saturating_add(self.check_overhead)
	}
}
