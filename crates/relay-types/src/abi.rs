//! Solidity ABI definitions used by the relay module.
//!
//! The refunded entry point describes the calldata a submitter sends, which
//! is what the upfront gas estimate is based on. `IERC20` is used to pay
//! refunds in tokens.

use alloy_sol_types::sol;

sol! {
	/// Token interface used for refund payouts.
	interface IERC20 {
		function transfer(address to, uint256 amount) external returns (bool);
	}

	/// Relay entry point paying the submitter from the account.
	function execTransactionWithRefund(
		address account,
		address to,
		uint256 value,
		bytes data,
		uint8 operation,
		bytes signatures,
		address feeToken,
		uint256 gasLimit,
		uint256 maxFeePerGas,
		address receiver,
		bytes refundSignature
	) external returns (bool);

	/// Self-service refund condition setter.
	function setRefundCondition(
		address feeToken,
		uint256 maxFeePerGas,
		uint256 maxGasLimit,
		address[] allowedReceivers
	) external;
}
