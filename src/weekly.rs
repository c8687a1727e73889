//! A week of entries retold as one story.

use chrono::{Datelike, FixedOffset};

use crate::{
    emotion::Emotion,
    generation::{DailyAnalysis, DailyNarrative, WeeklyNarrative, WeeklyNarrator},
    model::WebtoonRecord,
    store::error::StoreError,
};

pub const WEEK_LENGTH: usize = 7;
pub const DEFAULT_INTENSITY: u8 = 5;

const DAY_NAMES: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];
const CONNECTOR: &str = "그리고...";

#[derive(Debug, thiserror::Error)]
pub enum WeeklyError {
    #[error("a weekly story needs 7 entries, found {0}")]
    InsufficientEntries(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WeeklyError {
    pub fn user_message(&self) -> String {
        match self {
            WeeklyError::InsufficientEntries(found) => {
                format!("일주일치 데이터가 부족합니다. (현재: {found}/{WEEK_LENGTH}일)")
            }
            WeeklyError::Store(e) => e.user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyStory {
    /// Oldest first.
    pub days: Vec<WebtoonRecord>,
    pub narrative: WeeklyNarrative,
    /// Set when the narrator was unreachable and the story was templated.
    pub fallback: bool,
}

/// The seven most recent records, oldest first.
pub fn select_week(records: &[WebtoonRecord]) -> Result<Vec<WebtoonRecord>, WeeklyError> {
    if records.len() < WEEK_LENGTH {
        return Err(WeeklyError::InsufficientEntries(records.len()));
    }

    let mut week = records.to_vec();
    week.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    week.truncate(WEEK_LENGTH);
    week.reverse();

    Ok(week)
}

pub fn daily_analyses(week: &[WebtoonRecord]) -> Vec<DailyAnalysis> {
    week.iter()
        .enumerate()
        .map(|(i, record)| {
            let day_number = i + 1;
            let summary = record
                .summary
                .clone()
                .or_else(|| record.input_text.clone())
                .unwrap_or_default();
            let one_line = [&record.scene, &record.dialogue, &record.summary, &record.input_text]
                .into_iter()
                .find_map(|field| field.clone().filter(|s| !s.is_empty()))
                .unwrap_or_else(|| format!("Day {day_number}의 하루"));

            DailyAnalysis {
                emotion: record.emotion,
                emotion_intensity: record.emotion_intensity.unwrap_or(DEFAULT_INTENSITY),
                summary,
                one_line,
                keywords: record.keywords.clone(),
                day_number,
            }
        })
        .collect()
}

/// Template used when the narrator cannot be reached. Day names come from
/// each record's local date, or from its position when it has none.
pub fn fallback_narrative(week: &[WebtoonRecord], offset: FixedOffset) -> WeeklyNarrative {
    let last = week.len().saturating_sub(1);

    let daily_narratives = week
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let index = record
                .timestamp()
                .map(|ts| ts.with_timezone(&offset).weekday().num_days_from_monday() as usize)
                .unwrap_or(i % DAY_NAMES.len());
            let day = format!("{}요일", DAY_NAMES[index]);

            let narrative = [&record.scene, &record.summary, &record.input_text]
                .into_iter()
                .find_map(|field| field.clone().filter(|s| !s.is_empty()))
                .unwrap_or_else(|| format!("{day}의 특별한 순간"));

            DailyNarrative {
                day,
                narrative,
                connector: if i < last { CONNECTOR.to_string() } else { String::new() },
            }
        })
        .collect();

    let emotion_flow: Vec<Emotion> = week.iter().map(|record| record.emotion).collect();
    let first = emotion_flow.first().copied().unwrap_or_default();
    let end = emotion_flow.last().copied().unwrap_or_default();

    WeeklyNarrative {
        daily_narratives,
        weekly_summary: format!(
            "{}로 시작해서 {}로 마무리한 의미 있는 한 주였습니다.",
            first.label(),
            end.label()
        ),
        emotional_journey: Some("이번 주는 다양한 감정을 경험한 풍성한 한 주였어요.".to_string()),
        emotion_flow,
    }
}

#[tracing::instrument(name = "compile weekly story", skip_all, fields(records = records.len()))]
pub async fn compile<N: WeeklyNarrator>(
    records: &[WebtoonRecord],
    narrator: &N,
    offset: FixedOffset,
) -> Result<WeeklyStory, WeeklyError> {
    let week = select_week(records)?;
    let analyses = daily_analyses(&week);

    let (narrative, fallback) = match narrator.narrate(&analyses).await {
        Ok(narrative) => (narrative, false),
        Err(e) => {
            tracing::warn!(err.msg = %e, "weekly narrative unavailable, using template");
            (fallback_narrative(&week, offset), true)
        }
    };

    Ok(WeeklyStory {
        days: week,
        narrative,
        fallback,
    })
}
