use std::{
    collections::HashMap,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::Duration;
use serde::{Serialize, de::DeserializeOwned};

use crate::model::{RecordId, WebtoonRecord};

pub const WEBTOONS_KEY: &str = "webtoons";
pub const CHARACTER_KEY: &str = "userCharacter";
pub const LAST_ANALYSIS_KEY: &str = "lastAnalysis";
pub const CUSTOMIZATION_KEY: &str = "userWebtoonCustomization";
pub const USER_ID_KEY: &str = "userId";

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode value for {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("local store lock poisoned")]
    Poisoned,
}

/// Keyed string store holding JSON documents.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), LocalStoreError>;

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError>;

    async fn clear(&self) -> Result<(), LocalStoreError>;
}

impl<S: LocalStore> LocalStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LocalStoreError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), LocalStoreError> {
        (**self).clear().await
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    root: PathBuf,
}

impl FileLocalStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| LocalStoreError::Io {
                path: root.clone(),
                source,
            })?;

        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl LocalStore for FileLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LocalStoreError::Io { path, source }),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LocalStoreError> {
        let path = self.path_for(key);
        let tmp_path = self.root.join(format!(".{key}.json.tmp"));

        tokio::fs::write(&tmp_path, value)
            .await
            .map_err(|source| LocalStoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| LocalStoreError::Io { path, source })
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LocalStoreError::Io { path, source }),
        }
    }

    async fn clear(&self) -> Result<(), LocalStoreError> {
        let io_err = |source| LocalStoreError::Io {
            path: self.root.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|source| LocalStoreError::Io { path, source })?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
}

impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}

/// Read and decode a JSON value. An undecodable value reads as absent.
pub async fn read_json<T, S>(store: &S, key: &str) -> Result<Option<T>, LocalStoreError>
where
    T: DeserializeOwned,
    S: LocalStore,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, err.msg = %e, "discarding undecodable local value");
            Ok(None)
        }
    }
}

pub async fn write_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), LocalStoreError>
where
    T: Serialize,
    S: LocalStore,
{
    let encoded = serde_json::to_string(value).map_err(|source| LocalStoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, encoded).await
}

pub async fn load_records<S: LocalStore>(store: &S) -> Result<Vec<WebtoonRecord>, LocalStoreError> {
    Ok(read_json(store, WEBTOONS_KEY).await?.unwrap_or_default())
}

pub enum LocalInsert {
    Inserted(WebtoonRecord),
    /// An existing entry shares the id or falls inside the dedup window.
    Duplicate(WebtoonRecord),
}

/// Prepend `record`, keeping at most `capacity` entries. A numeric id that
/// is already taken is bumped until it is free.
pub async fn insert_record<S: LocalStore>(
    store: &S,
    mut record: WebtoonRecord,
    window: Duration,
    capacity: usize,
) -> Result<LocalInsert, LocalStoreError> {
    let mut records = load_records(store).await?;

    let duplicate = records
        .iter()
        .find(|existing| within_window(existing, &record, window));
    if let Some(existing) = duplicate {
        return Ok(LocalInsert::Duplicate(existing.clone()));
    }

    let taken = |id: &RecordId| records.iter().any(|existing| existing.id.matches(id));
    match record.id {
        RecordId::Local(mut n) => {
            while taken(&RecordId::Local(n)) {
                n += 1;
            }
            record.id = RecordId::Local(n);
        }
        RecordId::Remote(_) => {
            if let Some(existing) = records.iter().find(|existing| existing.id == record.id) {
                return Ok(LocalInsert::Duplicate(existing.clone()));
            }
        }
    }

    records.insert(0, record.clone());
    records.truncate(capacity);
    write_json(store, WEBTOONS_KEY, &records).await?;

    Ok(LocalInsert::Inserted(record))
}

/// Returns whether anything was removed.
pub async fn remove_record<S: LocalStore>(store: &S, id: &RecordId) -> Result<bool, LocalStoreError> {
    let mut records = load_records(store).await?;
    let before = records.len();
    records.retain(|record| !record.id.matches(id));

    if records.len() == before {
        return Ok(false);
    }
    write_json(store, WEBTOONS_KEY, &records).await?;

    Ok(true)
}

/// Remove `record` and every device entry within `window` of it, the same
/// entries [`merge`](super::merge) hides behind a cloud record. Returns how
/// many went.
pub async fn remove_copies<S: LocalStore>(
    store: &S,
    record: &WebtoonRecord,
    window: Duration,
) -> Result<usize, LocalStoreError> {
    let mut records = load_records(store).await?;
    let before = records.len();
    records.retain(|existing| {
        !existing.id.matches(&record.id) && !within_window(existing, record, window)
    });

    let removed = before - records.len();
    if removed > 0 {
        write_json(store, WEBTOONS_KEY, &records).await?;
    }

    Ok(removed)
}

pub async fn clear_records<S: LocalStore>(store: &S) -> Result<(), LocalStoreError> {
    store.remove(WEBTOONS_KEY).await
}

/// Both records are dated and their timestamps differ by less than `window`.
pub fn within_window(a: &WebtoonRecord, b: &WebtoonRecord, window: Duration) -> bool {
    match (a.timestamp(), b.timestamp()) {
        (Some(a), Some(b)) => (a - b).abs() < window,
        _ => false,
    }
}
