//! Directory-backed store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/webdaw/
//! ├─ meta.json              {"name": "webdaw", "version": 1}
//! ├─ autosave/<key>.rec
//! └─ projects/<key>.rec
//! ```
//!
//! Keys are hex-encoded so any project name maps to a safe file name.
//! Records are written to a temporary file in the same directory and renamed
//! into place, so a crash mid-write leaves either the old record or the new
//! one, never a torn file.

use crate::{DB_NAME, DB_VERSION, Partition, Store, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "rec";

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseMeta {
    name: String,
    version: u32,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the database under `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = dir.into().join(DB_NAME);
        let opened = root.clone();
        blocking(move || init_database(&opened)).await?;
        log::debug!("opened store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.name())
    }
}

fn init_database(root: &Path) -> Result<(), StoreError> {
    for partition in Partition::ALL {
        fs::create_dir_all(root.join(partition.name()))?;
    }

    let meta_path = root.join("meta.json");
    match fs::read(&meta_path) {
        Ok(contents) => {
            let meta: DatabaseMeta = serde_json::from_slice(&contents)
                .map_err(|e| StoreError::unavailable(format!("corrupt database meta: {e}")))?;
            if meta.version != DB_VERSION {
                return Err(StoreError::Version {
                    found: meta.version,
                    expected: DB_VERSION,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let meta = DatabaseMeta {
                name: DB_NAME.to_string(),
                version: DB_VERSION,
            };
            let contents = serde_json::to_vec_pretty(&meta)
                .map_err(|e| StoreError::unavailable(e.to_string()))?;
            write_atomic(root, &meta_path, &contents)
        }
        Err(e) => Err(e.into()),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::unavailable(format!("storage task failed: {e}")))?
}

fn encode_key(key: &str) -> String {
    hex::encode(key)
}

fn decode_key(stem: &str) -> Option<String> {
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

fn record_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{RECORD_EXTENSION}", encode_key(key)))
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::from(e.error))?;
    Ok(())
}

fn record_keys(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut keys = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        let Some(key) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(decode_key)
        else {
            log::warn!("ignoring unrecognised record {}", path.display());
            continue;
        };
        keys.push((key, path));
    }
    keys.sort();
    Ok(keys)
}

#[async_trait]
impl Store for FileStore {
    async fn write(
        &self,
        partition: Partition,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let dir = self.partition_dir(partition);
        let path = record_path(&dir, key);
        blocking(move || {
            write_atomic(&dir, &path, &bytes)?;
            if partition == Partition::Autosave {
                for (_, other) in record_keys(&dir)? {
                    if other != path {
                        fs::remove_file(&other)?;
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn read(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = record_path(&self.partition_dir(partition), key);
        blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn list(&self, partition: Partition) -> Result<Vec<String>, StoreError> {
        let dir = self.partition_dir(partition);
        blocking(move || Ok(record_keys(&dir)?.into_iter().map(|(key, _)| key).collect())).await
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<(), StoreError> {
        let path = record_path(&self.partition_dir(partition), key);
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AUTOSAVE_KEY;
    use tempfile::tempdir;

    #[test]
    fn test_key_encoding_roundtrip() {
        for key in ["Song", "my/project: v2", "", "ünïcødé"] {
            assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        }
        assert_eq!(encode_key("A/"), "412f");
        assert!(decode_key("abc").is_none());
        assert!(decode_key("zz").is_none());
        // Valid hex that is not UTF-8
        assert!(decode_key("ff").is_none());
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        assert!(store.root().join("meta.json").exists());
        assert!(store.root().join("autosave").is_dir());
        assert!(store.root().join("projects").is_dir());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        {
            let store = FileStore::open(dir.path()).await.expect("open");
            store
                .write(Partition::Projects, "Night Drive", b"{}".to_vec())
                .await
                .expect("write");
        }

        let store = FileStore::open(dir.path()).await.expect("reopen");
        let bytes = store
            .read(Partition::Projects, "Night Drive")
            .await
            .expect("read");
        assert_eq!(bytes.as_deref(), Some(&b"{}"[..]));
        assert_eq!(
            store.list(Partition::Projects).await.expect("list"),
            vec!["Night Drive".to_string()]
        );
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        store
            .write(Partition::Projects, "a", b"first".to_vec())
            .await
            .expect("write");
        store
            .write(Partition::Projects, "a", b"second".to_vec())
            .await
            .expect("write");

        let bytes = store.read(Partition::Projects, "a").await.expect("read");
        assert_eq!(bytes.as_deref(), Some(&b"second"[..]));
        // No temporary files left behind
        let entries = fs::read_dir(store.root().join("projects"))
            .expect("read_dir")
            .count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_autosave_keeps_one_record() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        store
            .write(Partition::Autosave, "old", b"1".to_vec())
            .await
            .expect("write");
        store
            .write(Partition::Autosave, AUTOSAVE_KEY, b"2".to_vec())
            .await
            .expect("write");

        assert_eq!(
            store.list(Partition::Autosave).await.expect("list"),
            vec![AUTOSAVE_KEY.to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        assert!(store.read(Partition::Projects, "nope").await.expect("read").is_none());
        store.delete(Partition::Projects, "nope").await.expect("delete");

        store
            .write(Partition::Projects, "yes", Vec::new())
            .await
            .expect("write");
        store.delete(Partition::Projects, "yes").await.expect("delete");
        assert!(store.list(Partition::Projects).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join(DB_NAME);
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("meta.json"), br#"{"name": "webdaw", "version": 7}"#).expect("write");

        let err = FileStore::open(dir.path()).await.expect_err("version");
        assert!(matches!(
            err,
            StoreError::Version {
                found: 7,
                expected: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");
        fs::write(store.root().join("projects").join("notes.txt"), b"hi").expect("write");
        fs::write(store.root().join("projects").join("xyz.rec"), b"hi").expect("write");

        assert!(store.list(Partition::Projects).await.expect("list").is_empty());
    }
}
