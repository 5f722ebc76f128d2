//! File-based storage backend.
//!
//! One file per key under a base directory, written atomically via a temp
//! file and rename so a crash mid-write never leaves a torn record.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe path.
	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}

	fn file_name_for(&self, key: &str) -> String {
		format!("{}.json", key.replace(['/', ':'], "_"))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.file_path(key);
		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let file_prefix = self.file_name_for(prefix);
		let file_prefix = file_prefix.trim_end_matches(".json");

		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let name = entry.file_name().to_string_lossy().to_string();
			if let Some(stem) = name.strip_suffix(".json") {
				if stem.starts_with(file_prefix) {
					// File names flatten ':' to '_'; restore the namespace
					// separator so callers see the original key shape.
					let restored =
						format!("{}:{}", &prefix.trim_end_matches(':'), &stem[file_prefix.len()..]);
					keys.push(restored);
				}
			}
		}
		Ok(keys)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn file_round_trip_and_delete() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.set_bytes("markout:abcd", b"{\"x\":1}".to_vec())
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("markout:abcd").await.unwrap(), b"{\"x\":1}");

		storage.delete("markout:abcd").await.unwrap();
		assert!(matches!(
			storage.get_bytes("markout:abcd").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn overwrite_replaces_value() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage.set_bytes("k", b"one".to_vec()).await.unwrap();
		storage.set_bytes("k", b"two".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"two");
	}

	#[tokio::test]
	async fn list_keys_restores_namespace_separator() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage.set_bytes("reports:a", b"1".to_vec()).await.unwrap();
		storage.set_bytes("markout:b", b"2".to_vec()).await.unwrap();

		let keys = storage.list_keys("reports:").await.unwrap();
		assert_eq!(keys, vec!["reports:a".to_string()]);
	}
}
