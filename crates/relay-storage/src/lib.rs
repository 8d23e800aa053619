//! Storage module for the relay system.
//!
//! This module provides abstractions for the persistent keyed state of the
//! relay module (account nonces and refund conditions), supporting
//! in-memory and file-based backends. Writes made while serving an
//! invocation go through a [`StorageTransaction`] and only reach the
//! backend when the invocation commits.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod transaction;

pub use transaction::StorageTransaction;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error raised when a backend cannot be built from configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the relay module. It provides basic key-value operations.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Stores every entry of `batch`, or none of them on error.
	async fn set_batch(&self, batch: Vec<(String, Vec<u8>)>) -> Result<(), StorageError>;
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic serialization/deserialization.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Builds the namespaced key used by the backend.
	pub fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value.
	///
	/// The namespace and id are combined to form a unique key.
	/// The data is serialized to JSON before storage.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes = encode(data)?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	///
	/// The namespace and id are combined to form the lookup key.
	/// The retrieved bytes are deserialized from JSON.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Like [`Self::retrieve`], mapping a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Starts a transaction staging writes on top of this service.
	pub fn begin(&self) -> StorageTransaction<'_> {
		StorageTransaction::new(self)
	}

	pub(crate) fn backend(&self) -> &dyn StorageInterface {
		self.backend.as_ref()
	}
}

pub(crate) fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Creates a storage backend by name.
///
/// Supported backends are `memory` and `file`; the configuration table is
/// handed to the backend's own factory.
pub fn create_storage(
	backend: &str,
	config: &toml::Value,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	match backend {
		"memory" => Ok(implementations::memory::create_storage(config)),
		"file" => Ok(implementations::file::create_storage(config)),
		other => Err(StorageError::Configuration(format!(
			"Unknown storage backend: {}",
			other
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Record {
		value: u64,
	}

	#[tokio::test]
	async fn test_typed_store_and_retrieve() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));

		service.store("records", "a", &Record { value: 7 }).await.unwrap();
		let record: Record = service.retrieve("records", "a").await.unwrap();
		assert_eq!(record, Record { value: 7 });

		assert!(matches!(
			service.retrieve::<Record>("records", "b").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(
			service.retrieve_optional::<Record>("records", "b").await.unwrap(),
			None
		);
	}

	#[tokio::test]
	async fn test_malformed_value_is_serialization_error() {
		let backend = MemoryStorage::new();
		backend.set_bytes("records:bad", b"not json".to_vec()).await.unwrap();
		let service = StorageService::new(Box::new(backend));

		assert!(matches!(
			service.retrieve_optional::<Record>("records", "bad").await,
			Err(StorageError::Serialization(_))
		));
	}

	#[test]
	fn test_create_storage_rejects_unknown_backend() {
		let config = toml::Value::Table(Default::default());
		assert!(create_storage("memory", &config).is_ok());
		assert!(matches!(
			create_storage("redis", &config),
			Err(StorageError::Configuration(_))
		));
	}
}
