//! Events published by the relay module.
//!
//! Events are only published for invocations that committed; an aborted
//! invocation leaves no trace here.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::RefundCondition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayEvent {
	/// An authorized call was executed. Published exactly once per
	/// successful entry-point invocation.
	Executed {
		account: Address,
		call_hash: B256,
		/// Whether the call itself succeeded. Always true for submissions
		/// without refund.
		success: bool,
		/// Refund paid to the submitter, zero without refund.
		payment: U256,
	},
	/// An account replaced its refund condition for a fee token.
	ConditionUpdated {
		account: Address,
		fee_token: Address,
		condition: RefundCondition,
	},
}

/// Broadcast channel for relay events.
///
/// Cloning creates a new handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<RelayEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails when nobody is subscribed, which callers usually ignore.
	pub fn publish(&self, event: RelayEvent) -> Result<(), broadcast::error::SendError<RelayEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();

		let event = RelayEvent::Executed {
			account: Address::repeat_byte(1),
			call_hash: B256::repeat_byte(2),
			success: true,
			payment: U256::ZERO,
		};
		bus.clone().publish(event.clone()).unwrap();

		assert_eq!(receiver.recv().await.unwrap(), event);
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::default();
		let result = bus.publish(RelayEvent::ConditionUpdated {
			account: Address::ZERO,
			fee_token: Address::ZERO,
			condition: RefundCondition::default(),
		});
		assert!(result.is_err());
	}
}
