//! Shared types for the relay module.
//!
//! This crate defines the calls owners authorize, the refund terms and
//! conditions that bound submitter compensation, signature bundles, gas
//! metering and the events published when an invocation completes.

pub mod abi;
pub mod call;
pub mod events;
pub mod gas;
pub mod refund;
pub mod signature;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use call::*;
pub use events::*;
pub use gas::*;
pub use refund::*;
pub use signature::*;
