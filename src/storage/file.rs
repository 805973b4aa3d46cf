//! File-backed storage
//!
//! Each key lives in its own file (`<data_dir>/<key>.json`) holding the raw
//! value. Every process pointing at the same directory shares them. A write
//! goes to a uniquely named temp file in the same directory and is renamed
//! over the key file, so concurrent writers are last-writer-wins per key and
//! never clobber each other's other keys.
//!
//! Key names are escaped: ASCII letters, digits, `-` and `_` are kept, every
//! other byte becomes `%XX`.

use crate::storage::backend::StorageBackend;
use crate::storage::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Extension of key files inside the data directory
pub const KEY_FILE_EXTENSION: &str = "json";

/// Key/value storage with one file per key
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `data_dir`, creating the directory if needed
    pub fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Data directory holding the key files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key), KEY_FILE_EXTENSION))
    }

    fn read_file(&self, path: &Path) -> StorageResult<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::Corruption {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.read_file(&self.key_path(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.key_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn snapshot(&self) -> StorageResult<HashMap<String, String>> {
        let mut entries = HashMap::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_key)
            else {
                continue;
            };

            match self.read_file(&path) {
                Ok(Some(value)) => {
                    entries.insert(key, value);
                }
                // Removed between listing and reading
                Ok(None) => {}
                Err(StorageError::Corruption { path, reason }) => {
                    tracing::warn!(path = ?path, reason = %reason, "Skipping unreadable key file");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(entries)
    }

    fn name(&self) -> &str {
        "file"
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => {
                decoded.push(b);
                i += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(decoded).ok()
}
