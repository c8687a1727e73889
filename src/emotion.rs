//! The closed set of diary emotions and their sentiment buckets.
//!
//! Upstream services and older local records may carry a label decorated
//! with its emoji (`"😊 기쁨"`). Those strings are normalized here, once,
//! and every other module works with [`Emotion`] only.

use std::{fmt, str::FromStr};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Anxiety,
    Calm,
    #[default]
    Neutral,
}

/// (emotion, label, emoji) lookup used at every text boundary.
const TABLE: [(Emotion, &str, &str); 6] = [
    (Emotion::Joy, "기쁨", "😊"),
    (Emotion::Sadness, "슬픔", "😢"),
    (Emotion::Anger, "분노", "😡"),
    (Emotion::Anxiety, "불안", "😰"),
    (Emotion::Calm, "평온", "😌"),
    (Emotion::Neutral, "중립", "🙂"),
];

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Anxiety,
        Emotion::Calm,
        Emotion::Neutral,
    ];

    pub fn label(self) -> &'static str {
        TABLE[self.index()].1
    }

    pub fn emoji(self) -> &'static str {
        TABLE[self.index()].2
    }

    /// `"😊 기쁨"`, the form shown next to gallery entries.
    pub fn decorated(self) -> String {
        format!("{} {}", self.emoji(), self.label())
    }

    pub fn sentiment(self) -> Sentiment {
        match self {
            Emotion::Joy => Sentiment::Positive,
            Emotion::Sadness | Emotion::Anger | Emotion::Anxiety => Sentiment::Negative,
            Emotion::Calm | Emotion::Neutral => Sentiment::Neutral,
        }
    }

    /// Resolve a raw label, a bare emoji, or an emoji-decorated label in
    /// either order. Returns `None` when nothing in the text matches.
    pub fn normalize(raw: &str) -> Option<Emotion> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        for token in raw.split_whitespace() {
            if let Some((emotion, _, _)) = TABLE.iter().find(|(_, label, _)| *label == token) {
                return Some(*emotion);
            }
        }

        for token in raw.split_whitespace() {
            if let Some((emotion, _, _)) = TABLE.iter().find(|(_, _, emoji)| *emoji == token) {
                return Some(*emotion);
            }
        }

        // "😊기쁨" without a separator.
        TABLE
            .iter()
            .find(|(_, label, _)| raw.contains(label))
            .map(|(emotion, _, _)| *emotion)
    }

    fn index(self) -> usize {
        match self {
            Emotion::Joy => 0,
            Emotion::Sadness => 1,
            Emotion::Anger => 2,
            Emotion::Anxiety => 3,
            Emotion::Calm => 4,
            Emotion::Neutral => 5,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::normalize(s).ok_or_else(|| UnknownEmotion(s.to_string()))
    }
}

impl Serialize for Emotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Unknown or blank labels become [`Emotion::Neutral`]; stored records are
/// never rejected because of a label the classifier invented.
impl<'de> Deserialize<'de> for Emotion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EmotionVisitor)
    }
}

struct EmotionVisitor;

impl<'de> Visitor<'de> for EmotionVisitor {
    type Value = Emotion;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an emotion label")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Emotion::normalize(v).unwrap_or_default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Emotion::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Emotion::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}
