//! File-based storage backend.
//!
//! All module state lives in one JSON document below the storage directory,
//! keyed by the full storage key. Every write replaces the document through
//! a temp file and a rename, so a committed batch of nonces and refund
//! conditions lands on disk in one step or not at all.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Name of the state document inside the storage directory.
pub const STATE_FILE: &str = "relay-state.json";

type Snapshot = BTreeMap<String, Value>;

/// Snapshot store over a single JSON document.
///
/// Values must be JSON; they are embedded in the document as is.
pub struct FileStorage {
	path: PathBuf,
	/// Serializes read-modify-write cycles of this instance.
	write_lock: Mutex<()>,
}

impl FileStorage {
	/// Opens the store kept in `directory`. Nothing is read until first use.
	pub fn new(directory: impl AsRef<Path>) -> Self {
		Self {
			path: directory.as_ref().join(STATE_FILE),
			write_lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn load(&self) -> Result<Snapshot, StorageError> {
		match fs::read(&self.path).await {
			Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
				StorageError::Serialization(format!("{}: {}", self.path.display(), e))
			}),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::new()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let bytes = serde_json::to_vec_pretty(snapshot)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		let temp_path = self.path.with_extension("json.tmp");
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &self.path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let snapshot = self.load().await?;
		let value = snapshot.get(key).ok_or(StorageError::NotFound)?;
		serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.set_batch(vec![(key.to_string(), value)]).await
	}

	async fn set_batch(&self, batch: Vec<(String, Vec<u8>)>) -> Result<(), StorageError> {
		// Parse everything before touching the document.
		let mut entries = Vec::with_capacity(batch.len());
		for (key, bytes) in batch {
			let value: Value = serde_json::from_slice(&bytes)
				.map_err(|e| StorageError::Serialization(format!("{}: {}", key, e)))?;
			entries.push((key, value));
		}

		let _guard = self.write_lock.lock().await;
		let mut snapshot = self.load().await?;
		let count = entries.len();
		snapshot.extend(entries);
		self.persist(&snapshot).await?;

		debug!(path = %self.path.display(), writes = count, "Persisted state snapshot");
		Ok(())
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: directory holding the state document (default: "./data/relay")
pub fn create_storage(config: &toml::Value) -> Box<dyn StorageInterface> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/relay");

	Box::new(FileStorage::new(storage_path))
}
