//! Staged writes on top of a [`StorageService`].
//!
//! A transaction records every write in memory. Reads see the staged
//! values first and fall back to the backend. Nothing reaches the backend
//! until [`StorageTransaction::commit`], which hands them to the backend as
//! one batch; dropping or discarding the transaction forgets them.

use crate::{decode, encode, StorageError, StorageService};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub struct StorageTransaction<'a> {
	service: &'a StorageService,
	/// Staged values by full key.
	writes: HashMap<String, Vec<u8>>,
}

impl<'a> StorageTransaction<'a> {
	pub(crate) fn new(service: &'a StorageService) -> Self {
		Self {
			service,
			writes: HashMap::new(),
		}
	}

	/// Reads a value, preferring staged writes over the backend.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		let key = StorageService::key(namespace, id);
		match self.writes.get(&key) {
			Some(bytes) => decode(bytes).map(Some),
			None => self.service.retrieve_optional(namespace, id).await,
		}
	}

	/// Stages a value to be written on commit.
	pub fn stage<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes = encode(data)?;
		self.writes.insert(StorageService::key(namespace, id), bytes);
		Ok(())
	}

	/// Number of keys touched by this transaction.
	pub fn staged(&self) -> usize {
		self.writes.len()
	}

	/// Applies all staged writes to the backend in one batch.
	pub async fn commit(self) -> Result<(), StorageError> {
		let count = self.writes.len();
		if count == 0 {
			return Ok(());
		}
		self.service
			.backend()
			.set_batch(self.writes.into_iter().collect())
			.await?;
		debug!(writes = count, "Committed storage transaction");
		Ok(())
	}

	/// Drops all staged writes.
	pub fn discard(self) {
		debug!(writes = self.writes.len(), "Discarded storage transaction");
	}
}
