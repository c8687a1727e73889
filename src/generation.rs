//! Contracts of the analysis and image generation service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Response;

use crate::{emotion::Emotion, model::UserCharacter};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service unreachable: {0}")]
    Network(#[source] reqwest::Error),
    #[error("generation service answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from generation service: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenerationError::Malformed(e.to_string())
        } else {
            GenerationError::Network(e)
        }
    }
}

impl GenerationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::Status { status: 401 | 402, .. } => {
                "API 키 또는 크레딧 문제가 발생했습니다. 관리자에게 문의하세요."
            }
            GenerationError::Status { status, .. } if *status >= 500 => {
                "서버 오류가 발생했습니다. 잠시 후 다시 시도해주세요."
            }
            GenerationError::Malformed(_) => "분석 결과가 올바르지 않습니다.",
            _ => "분석 중 오류가 발생했습니다.",
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Analysis {
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub emotion_intensity: Option<u8>,
    #[serde(default)]
    pub sub_emotions: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub one_line: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Panel {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Story {
    #[serde(default)]
    pub panels: Vec<Panel>,
}

impl Story {
    pub fn first_panel(&self) -> Option<&Panel> {
        self.panels.first()
    }
}

/// Raw analysis reply. Either half may be missing on a bad upstream answer.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub story: Option<Story>,
}

/// Last successful analysis, kept on the device for the result view.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct LastAnalysis {
    pub analysis: Analysis,
    pub story: Story,
    pub date: DateTime<Utc>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct CharacterInfo<'a> {
    pub description: &'a str,
    pub base_images: &'a BTreeMap<Emotion, String>,
}

#[derive(serde::Serialize, Debug)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    character_info: Option<CharacterInfo<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(serde::Serialize, Debug)]
struct PortraitRequest<'a> {
    prompt: String,
    emotion: Emotion,
    character_description: &'a str,
}

#[derive(serde::Deserialize, Debug)]
struct PortraitResponse {
    url: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct DailyAnalysis {
    pub emotion: Emotion,
    pub emotion_intensity: u8,
    pub summary: String,
    pub one_line: String,
    pub keywords: Vec<String>,
    pub day_number: usize,
}

#[derive(serde::Serialize, Debug)]
struct NarrativeRequest<'a> {
    daily_analyses: &'a [DailyAnalysis],
    generate_images: bool,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct DailyNarrative {
    pub day: String,
    pub narrative: String,
    #[serde(default)]
    pub connector: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct WeeklyNarrative {
    pub daily_narratives: Vec<DailyNarrative>,
    pub weekly_summary: String,
    #[serde(default)]
    pub emotional_journey: Option<String>,
    #[serde(default)]
    pub emotion_flow: Vec<Emotion>,
}

#[allow(async_fn_in_trait)]
pub trait DiaryAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        character: Option<&UserCharacter>,
        user_id: Option<&str>,
    ) -> Result<AnalysisResponse, GenerationError>;
}

#[allow(async_fn_in_trait)]
pub trait WeeklyNarrator {
    async fn narrate(&self, days: &[DailyAnalysis]) -> Result<WeeklyNarrative, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Portrait of the described character showing `emotion`.
    #[tracing::instrument(name = "generate portrait", skip(self, description))]
    pub async fn generate_portrait(
        &self,
        description: &str,
        emotion: Emotion,
    ) -> Result<String, GenerationError> {
        let request = PortraitRequest {
            prompt: portrait_prompt(description, emotion),
            emotion,
            character_description: description,
        };

        let response = self
            .http
            .post(self.url("/api/generate_character"))
            .json(&request)
            .send()
            .await?;

        let PortraitResponse { url } = check(response).await?.json().await?;
        url.ok_or_else(|| GenerationError::Malformed("portrait response without url".into()))
    }

    /// One portrait per emotion. Stops at the first failure.
    pub async fn generate_character(
        &self,
        description: &str,
    ) -> Result<UserCharacter, GenerationError> {
        let mut images = BTreeMap::new();
        for emotion in Emotion::ALL {
            let url = self.generate_portrait(description, emotion).await?;
            images.insert(emotion, url);
        }

        Ok(UserCharacter {
            description: description.to_string(),
            images,
        })
    }
}

fn portrait_prompt(description: &str, emotion: Emotion) -> String {
    format!(
        "웹툰/만화 스타일 캐릭터 전신 일러스트:\n{description}\n표정: {}\n\
         자세: 정면을 보고 서있는 전신 포즈\n배경: 순수한 흰색 배경\n\
         스타일: 귀여운 한국 웹툰 스타일, 깔끔한 라인아트, 파스텔톤\n\
         중요: 동일한 캐릭터의 다른 표정",
        emotion.label()
    )
}

async fn check(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(GenerationError::Status {
        status: status.as_u16(),
        message,
    })
}

impl DiaryAnalyzer for GenerationClient {
    #[tracing::instrument(name = "analyze diary", skip_all, fields(with_character = character.is_some()))]
    async fn analyze(
        &self,
        text: &str,
        character: Option<&UserCharacter>,
        user_id: Option<&str>,
    ) -> Result<AnalysisResponse, GenerationError> {
        let character = character.filter(|c| !c.images.is_empty());
        let path = if character.is_some() {
            "/api/diary/analyze_with_webtoon_image"
        } else {
            "/api/diary/analyze_with_webtoon"
        };

        let request = AnalyzeRequest {
            text,
            character_info: character.map(|c| CharacterInfo {
                description: &c.description,
                base_images: &c.images,
            }),
            user_id: character.map(|_| user_id.unwrap_or("anonymous")),
        };

        let response = self.http.post(self.url(path)).json(&request).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

impl WeeklyNarrator for GenerationClient {
    #[tracing::instrument(name = "weekly narrative", skip_all, fields(days = days.len()))]
    async fn narrate(&self, days: &[DailyAnalysis]) -> Result<WeeklyNarrative, GenerationError> {
        let request = NarrativeRequest {
            daily_analyses: days,
            generate_images: false,
        };

        let response = self
            .http
            .post(self.url("/api/diary/generate_weekly_narrative"))
            .json(&request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}
