//! Call types for the relay module.
//!
//! A call is what an owner quorum authorizes: the account it is performed
//! on behalf of, the target, the native value, the payload and the mode the
//! account uses to perform it.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an [`Operation`] fails.
#[derive(Debug, Error)]
pub enum ParseOperationError {
	#[error("Unknown operation: {0}")]
	Unknown(String),
	#[error("Operation code out of range: {0}")]
	OutOfRange(u8),
}

/// How the account performs a call.
///
/// `DelegateCall` runs the target's code in the account's own context, so it
/// can mutate the account's storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	#[default]
	Call,
	DelegateCall,
}

impl Operation {
	/// Returns the numeric code used in signed messages.
	pub fn as_u8(self) -> u8 {
		match self {
			Operation::Call => 0,
			Operation::DelegateCall => 1,
		}
	}
}

impl TryFrom<u8> for Operation {
	type Error = ParseOperationError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(Operation::Call),
			1 => Ok(Operation::DelegateCall),
			other => Err(ParseOperationError::OutOfRange(other)),
		}
	}
}

impl FromStr for Operation {
	type Err = ParseOperationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"call" | "0" => Ok(Operation::Call),
			"delegatecall" | "delegate_call" | "1" => Ok(Operation::DelegateCall),
			_ => Err(ParseOperationError::Unknown(s.to_string())),
		}
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Call => write!(f, "call"),
			Operation::DelegateCall => write!(f, "delegatecall"),
		}
	}
}

/// A call pre-authorized by the owners of `account`.
///
/// Once hashed together with the account's nonce, the call must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
	/// The multi-owner account the call is performed on behalf of.
	pub account: Address,
	/// Target of the call.
	pub to: Address,
	/// Native value forwarded with the call.
	pub value: U256,
	/// Call payload.
	pub data: Bytes,
	/// How the account performs the call.
	pub operation: Operation,
}

impl Call {
	/// Creates a plain call with no value.
	pub fn new(account: Address, to: Address, data: Bytes) -> Self {
		Self {
			account,
			to,
			value: U256::ZERO,
			data,
			operation: Operation::Call,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_operation(mut self, operation: Operation) -> Self {
		self.operation = operation;
		self
	}
}
