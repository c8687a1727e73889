//! Device-side wiring: file-backed local store, HTTP cloud store, session
//! and generation client assembled from configuration.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};

use crate::{
    config,
    diary::DiaryService,
    generation::GenerationClient,
    session::SessionManager,
    stats::{StatsReport, StatsWindow},
    store::{
        RecordStore,
        error::StoreError,
        local::{FileLocalStore, LocalStoreError},
        remote::HttpRemoteStore,
    },
    weekly::{self, WeeklyError, WeeklyStory},
};

pub type DeviceStore = Arc<FileLocalStore>;

pub struct DiaryClient {
    pub session: SessionManager<DeviceStore>,
    pub diary: DiaryService<DeviceStore, HttpRemoteStore, GenerationClient>,
    pub generation: GenerationClient,
    offset: FixedOffset,
}

impl DiaryClient {
    #[tracing::instrument(name = "open diary client", skip_all, fields(dir = %config.local_store_dir.display()))]
    pub async fn open(config: &config::Client) -> Result<Self, LocalStoreError> {
        let local = Arc::new(FileLocalStore::open(&config.local_store_dir).await?);
        let offset = config.utc_offset();

        let session = SessionManager::new(&config.api_base_url, local.clone());
        let records = RecordStore::from_config(
            config,
            local,
            HttpRemoteStore::new(&config.api_base_url),
            session.subscribe(),
        );
        let generation = GenerationClient::new(&config.generation_base_url);
        let diary = DiaryService::new(records, generation.clone(), offset);

        Ok(Self {
            session,
            diary,
            generation,
            offset,
        })
    }

    pub fn records(&self) -> &RecordStore<DeviceStore, HttpRemoteStore> {
        self.diary.store()
    }

    /// Stats over the merged record set, as the device sees it.
    pub async fn stats(&self, window: StatsWindow) -> Result<StatsReport, StoreError> {
        let records = self.records().load_all().await?;

        Ok(StatsReport::build(&records, window, Utc::now(), self.offset))
    }

    pub async fn weekly_story(&self) -> Result<WeeklyStory, WeeklyError> {
        let records = self.records().load_all().await?;

        weekly::compile(&records, &self.generation, self.offset).await
    }
}
