use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};

use crate::emotion::Emotion;

#[derive(sqlx::FromRow, serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub nickname: Option<String>,
}

/// Record identifier. Local records use a unix-millis number, cloud records
/// a `"{userId}_{unixMillis}"` string. Values may collide across the two.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RecordId {
    Local(i64),
    Remote(String),
}

impl RecordId {
    pub fn remote(user_id: &str, created_at: DateTime<Utc>) -> Self {
        RecordId::Remote(format!("{}_{}", user_id, created_at.timestamp_millis()))
    }

    /// Loose equality used by local deletes: `"17"` and `17` name the same
    /// local record.
    pub fn matches(&self, other: &RecordId) -> bool {
        match (self, other) {
            (RecordId::Local(a), RecordId::Local(b)) => a == b,
            (RecordId::Remote(a), RecordId::Remote(b)) => a == b,
            (RecordId::Local(n), RecordId::Remote(s)) | (RecordId::Remote(s), RecordId::Local(n)) => {
                s.parse::<i64>().map(|parsed| parsed == *n).unwrap_or(false)
            }
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Local(id) => write!(f, "{id}"),
            RecordId::Remote(id) => f.write_str(id),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Firebase,
    #[default]
    Local,
}

/// One diary entry plus its emotion analysis and generated image.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebtoonRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, rename = "emotion_intensity")]
    pub emotion_intensity: Option<u8>,
    #[serde(default)]
    pub has_webtoon_image: bool,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub needs_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl WebtoonRecord {
    /// `createdAt` when present, `date` otherwise.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.date)
    }

    /// Whether a delete must also go to the remote store.
    pub fn lives_remotely(&self) -> bool {
        self.source == Source::Firebase
            || (self.user_id.is_some() && matches!(self.id, RecordId::Remote(_)))
    }

    pub fn to_new_webtoon(&self) -> NewWebtoon {
        NewWebtoon {
            created_at: self.timestamp(),
            emotion: self.emotion,
            image: self.image.clone(),
            input_text: self.input_text.clone(),
            summary: self.summary.clone(),
            scene: self.scene.clone(),
            dialogue: self.dialogue.clone(),
            keywords: self.keywords.clone(),
            emotion_intensity: self.emotion_intensity,
            has_webtoon_image: self.has_webtoon_image,
        }
    }
}

/// Payload for creating a record; identity fields are assigned by whichever
/// store persists it.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewWebtoon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, rename = "emotion_intensity")]
    pub emotion_intensity: Option<u8>,
    #[serde(default)]
    pub has_webtoon_image: bool,
}

impl NewWebtoon {
    pub fn into_local_record(
        self,
        user_id: Option<String>,
        now: DateTime<Utc>,
        error_reason: Option<String>,
    ) -> WebtoonRecord {
        let created_at = self.created_at.unwrap_or(now);

        WebtoonRecord {
            id: RecordId::Local(now.timestamp_millis()),
            user_id,
            created_at: Some(created_at),
            date: Some(created_at),
            updated_at: None,
            emotion: self.emotion,
            image: self.image,
            input_text: self.input_text,
            summary: self.summary,
            scene: self.scene,
            dialogue: self.dialogue,
            keywords: self.keywords,
            emotion_intensity: self.emotion_intensity,
            has_webtoon_image: self.has_webtoon_image,
            source: Source::Local,
            needs_sync: true,
            error_reason,
        }
    }
}

/// Row shape of the `webtoons` table.
#[derive(sqlx::FromRow, Debug)]
pub struct WebtoonEntity {
    pub id: String,
    pub user_id: String,
    pub emotion: String,
    pub image: Option<String>,
    pub input_text: Option<String>,
    pub summary: Option<String>,
    pub scene: Option<String>,
    pub dialogue: Option<String>,
    pub keywords: Vec<String>,
    pub emotion_intensity: Option<i16>,
    pub has_webtoon_image: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebtoonEntity> for WebtoonRecord {
    fn from(entity: WebtoonEntity) -> Self {
        WebtoonRecord {
            id: RecordId::Remote(entity.id),
            user_id: Some(entity.user_id),
            created_at: Some(entity.created_at),
            date: None,
            updated_at: Some(entity.updated_at),
            emotion: Emotion::normalize(&entity.emotion).unwrap_or_default(),
            image: entity.image,
            input_text: entity.input_text,
            summary: entity.summary,
            scene: entity.scene,
            dialogue: entity.dialogue,
            keywords: entity.keywords,
            emotion_intensity: entity
                .emotion_intensity
                .and_then(|value| u8::try_from(value).ok()),
            has_webtoon_image: entity.has_webtoon_image,
            source: Source::Firebase,
            needs_sync: false,
            error_reason: None,
        }
    }
}

/// Reusable avatar: a description and one portrait per emotion.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UserCharacter {
    pub description: String,
    #[serde(default)]
    pub images: BTreeMap<Emotion, String>,
}

impl UserCharacter {
    /// Portrait for `emotion`, falling back to the neutral one and then to
    /// whichever portrait exists.
    pub fn portrait_for(&self, emotion: Emotion) -> Option<&str> {
        self.images
            .get(&emotion)
            .or_else(|| self.images.get(&Emotion::Neutral))
            .or_else(|| self.images.values().next())
            .map(String::as_str)
    }
}

/// Display choices layered over a generated panel.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayCustomization {
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub bubble_text: String,
}
