use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    generation::{AnalysisResponse, DiaryAnalyzer, GenerationError, LastAnalysis},
    model::{DisplayCustomization, NewWebtoon, UserCharacter, WebtoonRecord},
    stats::local_date,
    store::{
        RecordStore,
        error::StoreError,
        local::{
            self, CHARACTER_KEY, CUSTOMIZATION_KEY, LAST_ANALYSIS_KEY, LocalStore,
            LocalStoreError,
        },
        remote::RemoteStore,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum DiaryError {
    #[error("diary text is empty")]
    EmptyText,
    #[error("an entry for today already exists")]
    AlreadyWrittenToday,
    #[error("analysis response is missing `{0}`")]
    MalformedResponse(&'static str),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Local(#[from] LocalStoreError),
}

impl DiaryError {
    pub fn user_message(&self) -> String {
        match self {
            DiaryError::EmptyText => "일기를 입력해주세요!".to_string(),
            DiaryError::AlreadyWrittenToday => {
                "오늘은 이미 일기를 작성했어요. 내일 다시 만나요!".to_string()
            }
            DiaryError::MalformedResponse(_) => "분석 결과가 올바르지 않습니다.".to_string(),
            DiaryError::Generation(e) => e.user_message().to_string(),
            DiaryError::Store(e) => e.user_message(),
            DiaryError::Local(_) => "기기에 저장하지 못했습니다.".to_string(),
        }
    }
}

/// Turns diary text into a stored webtoon record, one per calendar day.
pub struct DiaryService<L, R, A> {
    store: RecordStore<L, R>,
    analyzer: A,
    offset: FixedOffset,
}

impl<L, R, A> DiaryService<L, R, A>
where
    L: LocalStore,
    R: RemoteStore,
    A: DiaryAnalyzer,
{
    pub fn new(store: RecordStore<L, R>, analyzer: A, offset: FixedOffset) -> Self {
        Self {
            store,
            analyzer,
            offset,
        }
    }

    pub fn store(&self) -> &RecordStore<L, R> {
        &self.store
    }

    pub async fn write_entry(&self, text: &str) -> Result<WebtoonRecord, DiaryError> {
        self.write_entry_at(text, Utc::now()).await
    }

    #[tracing::instrument(name = "write diary entry", skip(self, text))]
    pub async fn write_entry_at(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<WebtoonRecord, DiaryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DiaryError::EmptyText);
        }

        let today = local_date(now, self.offset);
        let records = self.store.load_all().await?;
        let written_today = records
            .iter()
            .filter_map(WebtoonRecord::timestamp)
            .any(|ts| local_date(ts, self.offset) == today);
        if written_today {
            return Err(DiaryError::AlreadyWrittenToday);
        }

        let character = self.character().await?;
        let user_id = self.store.current_session().map(|s| s.user_id);

        let AnalysisResponse { analysis, story } = self
            .analyzer
            .analyze(text, character.as_ref(), user_id.as_deref())
            .await?;
        let analysis = analysis.ok_or(DiaryError::MalformedResponse("analysis"))?;
        let story = story.ok_or(DiaryError::MalformedResponse("story"))?;

        let panel = story.first_panel().cloned().unwrap_or_default();
        let has_webtoon_image = panel.image_url.is_some();
        let image = panel.image_url.clone().or_else(|| {
            character
                .as_ref()
                .and_then(|c| c.portrait_for(analysis.emotion))
                .map(str::to_string)
        });

        let webtoon = NewWebtoon {
            created_at: Some(now),
            emotion: analysis.emotion,
            image,
            input_text: Some(text.to_string()),
            summary: analysis.summary.clone(),
            scene: panel.scene,
            dialogue: panel.dialogue,
            keywords: analysis.keywords.clone(),
            emotion_intensity: analysis.emotion_intensity,
            has_webtoon_image,
        };

        let record = self.store.save(webtoon).await;

        let last = LastAnalysis {
            analysis,
            story,
            date: now,
        };
        if let Err(e) = local::write_json(self.store.local(), LAST_ANALYSIS_KEY, &last).await {
            tracing::warn!(err.msg = %e, "could not keep last analysis");
        }

        Ok(record)
    }

    pub async fn last_analysis(&self) -> Result<Option<LastAnalysis>, DiaryError> {
        Ok(local::read_json(self.store.local(), LAST_ANALYSIS_KEY).await?)
    }

    pub async fn character(&self) -> Result<Option<UserCharacter>, DiaryError> {
        Ok(local::read_json(self.store.local(), CHARACTER_KEY).await?)
    }

    /// Replaces any previous character wholesale.
    pub async fn set_character(&self, character: &UserCharacter) -> Result<(), DiaryError> {
        Ok(local::write_json(self.store.local(), CHARACTER_KEY, character).await?)
    }

    pub async fn customization(&self) -> Result<DisplayCustomization, DiaryError> {
        Ok(local::read_json(self.store.local(), CUSTOMIZATION_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_customization(
        &self,
        customization: &DisplayCustomization,
    ) -> Result<(), DiaryError> {
        Ok(local::write_json(self.store.local(), CUSTOMIZATION_KEY, customization).await?)
    }
}
