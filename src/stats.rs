//! Derived views over a record set: frequency tables, sentiment rollup,
//! windowed filtering, the 14-day series and cadence figures.
//!
//! Everything here is pure. Callers pass `now` and the offset used to cut
//! calendar days so results are reproducible.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::{
    emotion::{Emotion, Sentiment},
    model::{Source, WebtoonRecord},
};

pub const DAILY_SERIES_DAYS: i64 = 14;
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsWindow {
    Days7,
    Days30,
    #[default]
    All,
}

impl StatsWindow {
    pub fn days(self) -> Option<i64> {
        match self {
            StatsWindow::Days7 => Some(7),
            StatsWindow::Days30 => Some(30),
            StatsWindow::All => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatsWindow::Days7 => "7",
            StatsWindow::Days30 => "30",
            StatsWindow::All => "all",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("window must be one of 7, 30 or all, got {0}")]
pub struct InvalidWindow(String);

impl FromStr for StatsWindow {
    type Err = InvalidWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7" => Ok(StatsWindow::Days7),
            "30" => Ok(StatsWindow::Days30),
            "all" => Ok(StatsWindow::All),
            other => Err(InvalidWindow(other.to_string())),
        }
    }
}

impl serde::Serialize for StatsWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for StatsWindow {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EmotionCount {
    pub emotion: Emotion,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SentimentRollup {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total: usize,
    pub positive_percent: f64,
    pub negative_percent: f64,
    pub neutral_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CadenceFigures {
    pub total: usize,
    pub most_frequent: Option<Emotion>,
    pub average_per_day: f64,
    pub days_since_first: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct ImageTypeCounts {
    pub webtoon: usize,
    pub character: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct SourceCounts {
    pub firebase: usize,
    pub local: usize,
}

/// Everything the stats screen shows, computed over one window.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatsReport {
    pub window: StatsWindow,
    pub emotions: Vec<EmotionCount>,
    pub sentiment: SentimentRollup,
    pub daily: Vec<DailyCount>,
    pub cadence: CadenceFigures,
    pub current_streak: usize,
    pub image_types: ImageTypeCounts,
    pub sources: SourceCounts,
    pub recent_count: usize,
}

impl StatsReport {
    pub fn build(
        records: &[WebtoonRecord],
        window: StatsWindow,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let windowed: Vec<WebtoonRecord> = filter_window(records, window, now)
            .into_iter()
            .cloned()
            .collect();

        StatsReport {
            window,
            emotions: emotion_frequency(&windowed),
            sentiment: sentiment_rollup(&windowed),
            daily: daily_series(records, now, offset),
            cadence: cadence(&windowed, window, now),
            current_streak: current_streak(records, now, offset),
            image_types: image_type_counts(&windowed),
            sources: source_counts(&windowed),
            recent_count: filter_window(records, StatsWindow::Days7, now).len(),
        }
    }
}

/// Count per emotion, highest first. Ties keep the fixed emotion order.
pub fn emotion_frequency(records: &[WebtoonRecord]) -> Vec<EmotionCount> {
    let mut counts: HashMap<Emotion, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.emotion).or_default() += 1;
    }

    let mut table: Vec<EmotionCount> = Emotion::ALL
        .iter()
        .filter_map(|emotion| {
            counts.get(emotion).map(|count| EmotionCount {
                emotion: *emotion,
                count: *count,
            })
        })
        .collect();
    table.sort_by(|a, b| b.count.cmp(&a.count));

    table
}

pub fn sentiment_rollup(records: &[WebtoonRecord]) -> SentimentRollup {
    let (mut positive, mut negative, mut neutral) = (0, 0, 0);
    for record in records {
        match record.emotion.sentiment() {
            Sentiment::Positive => positive += 1,
            Sentiment::Negative => negative += 1,
            Sentiment::Neutral => neutral += 1,
        }
    }

    let total = records.len();
    SentimentRollup {
        positive,
        negative,
        neutral,
        total,
        positive_percent: percent(positive, total),
        negative_percent: percent(negative, total),
        neutral_percent: percent(neutral, total),
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}

/// Records dated within `now - window`. Undated records only appear in the
/// `All` window.
pub fn filter_window(
    records: &[WebtoonRecord],
    window: StatsWindow,
    now: DateTime<Utc>,
) -> Vec<&WebtoonRecord> {
    let Some(days) = window.days() else {
        return records.iter().collect();
    };

    let since = now - Duration::days(days);
    records
        .iter()
        .filter(|record| record.timestamp().is_some_and(|ts| ts >= since))
        .collect()
}

/// Zero-filled per-day counts for the last 14 calendar days, oldest first,
/// ending with today.
pub fn daily_series(
    records: &[WebtoonRecord],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DailyCount> {
    let today = local_date(now, offset);
    let first = today - Duration::days(DAILY_SERIES_DAYS - 1);

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for ts in records.iter().filter_map(WebtoonRecord::timestamp) {
        let day = local_date(ts, offset);
        if day >= first && day <= today {
            *per_day.entry(day).or_default() += 1;
        }
    }

    first
        .iter_days()
        .take(DAILY_SERIES_DAYS as usize)
        .map(|date| DailyCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Totals over an already windowed record set. For `All` the average is
/// taken over the days since the first record.
pub fn cadence(records: &[WebtoonRecord], window: StatsWindow, now: DateTime<Utc>) -> CadenceFigures {
    let total = records.len();
    let most_frequent = emotion_frequency(records).first().map(|c| c.emotion);
    let days_since_first = days_since_first(records, now);

    let span = match window.days() {
        Some(days) => days,
        None => days_since_first.max(1),
    };
    let average_per_day = if total == 0 {
        0.0
    } else {
        total as f64 / span as f64
    };

    CadenceFigures {
        total,
        most_frequent,
        average_per_day,
        days_since_first,
    }
}

/// Whole days elapsed since the earliest record, rounded up, at least 1
/// when any dated record exists.
pub fn days_since_first(records: &[WebtoonRecord], now: DateTime<Utc>) -> i64 {
    let Some(first) = records.iter().filter_map(WebtoonRecord::timestamp).min() else {
        return 0;
    };

    let elapsed = (now - first).num_milliseconds().max(0);
    let day = Duration::days(1).num_milliseconds();
    ((elapsed + day - 1) / day).max(1)
}

/// Consecutive calendar days with at least one record, ending today, or
/// yesterday when nothing has been written yet today.
pub fn current_streak(records: &[WebtoonRecord], now: DateTime<Utc>, offset: FixedOffset) -> usize {
    let days: std::collections::HashSet<NaiveDate> = records
        .iter()
        .filter_map(WebtoonRecord::timestamp)
        .map(|ts| local_date(ts, offset))
        .collect();

    let today = local_date(now, offset);
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }

    streak
}

pub fn image_type_counts(records: &[WebtoonRecord]) -> ImageTypeCounts {
    let webtoon = records.iter().filter(|r| r.has_webtoon_image).count();
    ImageTypeCounts {
        webtoon,
        character: records.len() - webtoon,
    }
}

pub fn source_counts(records: &[WebtoonRecord]) -> SourceCounts {
    let firebase = records
        .iter()
        .filter(|r| r.source == Source::Firebase)
        .count();
    SourceCounts {
        firebase,
        local: records.len() - firebase,
    }
}

pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}
