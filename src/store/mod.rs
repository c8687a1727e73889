//! One logical record set over the device store and the cloud store.
//!
//! Writes go to the cloud while a session exists and fall back to a local
//! copy flagged `needsSync`. Reads merge both sides; a local record whose
//! timestamp lies within the dedup window of a cloud record is treated as
//! the same entry and dropped.

pub mod error;
pub mod local;
pub mod remote;

use chrono::{Duration, Utc};
use tokio::sync::watch;

use crate::{
    config,
    model::{NewWebtoon, RecordId, Source, WebtoonRecord},
    session::Session,
};

use self::{
    error::StoreError,
    local::{LocalInsert, LocalStore},
    remote::RemoteStore,
};

pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 60;
pub const DEFAULT_LOCAL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub pushed: usize,
    pub failed: usize,
}

/// Outcome of wiping a user's data. A remote failure does not stop the
/// local wipe and is handed back instead of raised.
#[derive(Debug, Default)]
pub struct ClearReport {
    pub remote_deleted: u64,
    pub remote_error: Option<StoreError>,
}

pub struct RecordStore<L, R> {
    local: L,
    remote: R,
    session: watch::Receiver<Option<Session>>,
    dedup_window: Duration,
    local_capacity: usize,
}

impl<L: LocalStore, R: RemoteStore> RecordStore<L, R> {
    pub fn new(local: L, remote: R, session: watch::Receiver<Option<Session>>) -> Self {
        Self {
            local,
            remote,
            session,
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
            local_capacity: DEFAULT_LOCAL_CAPACITY,
        }
    }

    pub fn from_config(
        config: &config::Client,
        local: L,
        remote: R,
        session: watch::Receiver<Option<Session>>,
    ) -> Self {
        let dedup_window = Duration::try_seconds(config.dedup_window_secs).unwrap_or_else(|| {
            tracing::warn!(
                secs = config.dedup_window_secs,
                "dedup window out of range, using the default"
            );
            Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS)
        });

        Self {
            dedup_window,
            local_capacity: config.local_capacity,
            ..Self::new(local, remote, session)
        }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Persist a new entry. Never fails: when the cloud write is impossible
    /// the entry is kept on the device and flagged for a later [`sync`].
    ///
    /// [`sync`]: RecordStore::sync
    #[tracing::instrument(name = "save webtoon", skip_all)]
    pub async fn save(&self, webtoon: NewWebtoon) -> WebtoonRecord {
        let session = self.current_session();

        let error_reason = match &session {
            Some(session) => match self.remote.create(session, &webtoon).await {
                Ok(mut record) => {
                    record.source = Source::Firebase;
                    record.needs_sync = false;
                    tracing::info!(id = %record.id, "saved to cloud");
                    return record;
                }
                Err(e) => {
                    tracing::warn!(err.msg = %e, "cloud save failed, keeping a local copy");
                    e.to_string()
                }
            },
            None => StoreError::Unauthenticated.to_string(),
        };

        let user_id = session.map(|s| s.user_id);
        let record = webtoon.into_local_record(user_id, Utc::now(), Some(error_reason));

        match local::insert_record(&self.local, record.clone(), self.dedup_window, self.local_capacity)
            .await
        {
            Ok(LocalInsert::Inserted(record)) => record,
            Ok(LocalInsert::Duplicate(existing)) => {
                tracing::info!(id = %existing.id, "an entry from the same minute is already stored");
                existing
            }
            Err(e) => {
                tracing::error!(err.msg = %e, err.details = ?e, "local save failed");
                record
            }
        }
    }

    /// Cloud and device records merged, newest first. Without a session or
    /// when the cloud is unreachable only device records are returned.
    #[tracing::instrument(name = "load webtoons", skip_all)]
    pub async fn load_all(&self) -> Result<Vec<WebtoonRecord>, StoreError> {
        let local_records = local::load_records(&self.local).await?;

        let Some(session) = self.current_session() else {
            return Ok(as_local(local_records));
        };

        let local_records: Vec<WebtoonRecord> = local_records
            .into_iter()
            .filter(|record| {
                record
                    .user_id
                    .as_deref()
                    .is_none_or(|owner| owner == session.user_id)
            })
            .collect();

        match self.remote.list(&session).await {
            Ok(remote_records) => {
                let merged = merge(remote_records, local_records, self.dedup_window);
                tracing::info!(total = merged.len(), "loaded webtoons");
                Ok(merged)
            }
            Err(e) => {
                tracing::warn!(err.msg = %e, "cloud load failed, showing device records only");
                Ok(as_local(local_records))
            }
        }
    }

    /// Delete one entry. The device copy is always removed; a cloud failure
    /// is returned after that. For a cloud entry, device records inside the
    /// dedup window are copies of it and go too.
    #[tracing::instrument(name = "delete webtoon", skip_all, fields(id = %record.id))]
    pub async fn delete(&self, record: &WebtoonRecord) -> Result<(), StoreError> {
        let remote_result = if record.lives_remotely() {
            match self.current_session() {
                Some(session) => self.remote.delete(&session, &record.id).await,
                None => Err(StoreError::Unauthenticated),
            }
        } else {
            Ok(())
        };

        if record.lives_remotely() {
            let removed = local::remove_copies(&self.local, record, self.dedup_window).await?;
            tracing::debug!(removed, "removed device copies");
        } else {
            local::remove_record(&self.local, &record.id).await?;
        }

        if let Err(e) = &remote_result {
            tracing::warn!(err.msg = %e, "cloud delete failed");
        }
        remote_result
    }

    /// Delete by id and drop the entry from `records`. The entry stays in
    /// the list when the cloud still holds it.
    pub async fn delete_in(
        &self,
        records: &mut Vec<WebtoonRecord>,
        id: &RecordId,
    ) -> Result<(), StoreError> {
        let Some(position) = records.iter().position(|record| &record.id == id) else {
            return Err(StoreError::NotFound);
        };

        let result = self.delete(&records[position]).await;
        if matches!(result, Ok(()) | Err(StoreError::NotFound)) {
            records.remove(position);
        }
        result
    }

    /// Push every device record awaiting upload. Individual failures are
    /// logged and counted; they do not stop the batch.
    #[tracing::instrument(name = "sync webtoons", skip_all)]
    pub async fn sync(&self) -> Result<SyncReport, StoreError> {
        let session = self.current_session().ok_or(StoreError::Unauthenticated)?;

        let pending: Vec<WebtoonRecord> = local::load_records(&self.local)
            .await?
            .into_iter()
            .filter(|record| record.needs_sync || record.source == Source::Local)
            .filter(|record| {
                record
                    .user_id
                    .as_deref()
                    .is_none_or(|owner| owner == session.user_id)
            })
            .collect();

        // A copy that was pushed before but could not be removed afterwards
        // is already in the cloud.
        let uploaded_before = match self.remote.list(&session).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(err.msg = %e, "could not list cloud records before sync");
                Vec::new()
            }
        };

        let mut report = SyncReport::default();
        for record in pending {
            if uploaded_before
                .iter()
                .any(|cloud| local::within_window(cloud, &record, self.dedup_window))
            {
                tracing::info!(local_id = %record.id, "already in the cloud, dropping device copy");
                self.forget_synced(&record).await;
                continue;
            }

            match self.remote.create(&session, &record.to_new_webtoon()).await {
                Ok(uploaded) => {
                    tracing::info!(local_id = %record.id, remote_id = %uploaded.id, "synced");
                    self.forget_synced(&record).await;
                    report.pushed += 1;
                }
                Err(e) => {
                    tracing::warn!(local_id = %record.id, err.msg = %e, "sync failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn forget_synced(&self, record: &WebtoonRecord) {
        if let Err(e) = local::remove_record(&self.local, &record.id).await {
            tracing::error!(
                local_id = %record.id,
                err.msg = %e,
                err.details = ?e,
                "pushed record could not be removed from the device"
            );
        }
    }

    /// Wipe the user's cloud records and every device record.
    #[tracing::instrument(name = "clear webtoons", skip_all)]
    pub async fn clear_all(&self) -> Result<ClearReport, StoreError> {
        let mut report = ClearReport::default();

        match self.current_session() {
            Some(session) => match self.remote.clear(&session).await {
                Ok(deleted) => report.remote_deleted = deleted,
                Err(e) => {
                    tracing::warn!(err.msg = %e, "cloud clear failed, clearing device only");
                    report.remote_error = Some(e);
                }
            },
            None => report.remote_error = Some(StoreError::Unauthenticated),
        }

        local::clear_records(&self.local).await?;

        Ok(report)
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        let Some(session) = self.current_session() else {
            return ConnectionStatus::Offline;
        };

        match self.remote.list(&session).await {
            Ok(_) => ConnectionStatus::Online,
            Err(_) => ConnectionStatus::Offline,
        }
    }
}

fn as_local(records: Vec<WebtoonRecord>) -> Vec<WebtoonRecord> {
    records
        .into_iter()
        .map(|mut record| {
            record.source = Source::Local;
            record
        })
        .collect()
}

/// Combine cloud and device records. A device record within `window` of any
/// cloud record is dropped; the cloud copy always wins. Result is sorted by
/// timestamp, newest first, with cloud records ahead on ties.
pub fn merge(
    remote: Vec<WebtoonRecord>,
    local: Vec<WebtoonRecord>,
    window: Duration,
) -> Vec<WebtoonRecord> {
    let mut merged: Vec<WebtoonRecord> = remote
        .into_iter()
        .map(|mut record| {
            record.source = Source::Firebase;
            record.needs_sync = false;
            record
        })
        .collect();
    let remote_count = merged.len();

    for mut record in local {
        let duplicate = merged[..remote_count]
            .iter()
            .any(|cloud| local::within_window(cloud, &record, window));
        if duplicate {
            continue;
        }

        record.source = Source::Local;
        record.needs_sync = true;
        merged.push(record);
    }

    merged.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    merged
}
