use axum::{Json, Router, http::StatusCode, routing::post};
use moodtoon::{
    emotion::Emotion,
    generation::{DailyAnalysis, DiaryAnalyzer, GenerationClient, GenerationError, WeeklyNarrator},
};
use serde_json::{Value, json};

use crate::helpers::serve_on_random_port;

async fn portrait(Json(body): Json<Value>) -> Json<Value> {
    let emotion = body["emotion"].as_str().unwrap_or_default();
    Json(json!({ "url": format!("https://img.test/{emotion}.png") }))
}

fn analysis_reply(image_url: Value, dialogue: Value) -> Json<Value> {
    Json(json!({
        "analysis": {
            "emotion": "😊 기쁨",
            "emotion_intensity": 7,
            "summary": "친구와 산책했다",
            "keywords": ["산책"]
        },
        "story": {
            "panels": [{ "scene": "공원", "dialogue": dialogue, "image_url": image_url }]
        }
    }))
}

async fn analyze(Json(body): Json<Value>) -> Json<Value> {
    let has_character = body.get("character_info").is_some();
    analysis_reply(
        json!("https://img.test/scene.png"),
        json!(has_character.then_some("character")),
    )
}

async fn analyze_with_image(Json(body): Json<Value>) -> Json<Value> {
    analysis_reply(
        body["character_info"]["base_images"]["기쁨"].clone(),
        body["user_id"].clone(),
    )
}

async fn weekly(Json(body): Json<Value>) -> Json<Value> {
    let days = body["daily_analyses"].as_array().cloned().unwrap_or_default();
    let narratives: Vec<Value> = days
        .iter()
        .map(|day| json!({ "day": format!("{}일차", day["day_number"]), "narrative": day["summary"] }))
        .collect();

    Json(json!({
        "daily_narratives": narratives,
        "weekly_summary": format!("images: {}", body["generate_images"]),
        "emotion_flow": days.iter().map(|day| day["emotion"].clone()).collect::<Vec<_>>()
    }))
}

async fn generation_server() -> GenerationClient {
    let router = Router::new()
        .route("/api/generate_character", post(portrait))
        .route("/api/diary/analyze_with_webtoon", post(analyze))
        .route("/api/diary/analyze_with_webtoon_image", post(analyze_with_image))
        .route("/api/diary/generate_weekly_narrative", post(weekly));

    GenerationClient::new(serve_on_random_port(router).await)
}

#[tokio::test]
async fn generates_one_portrait_per_emotion() {
    let client = generation_server().await;

    let character = client.generate_character("안경 쓴 고양이").await.unwrap();

    assert_eq!(character.description, "안경 쓴 고양이");
    assert_eq!(character.images.len(), Emotion::ALL.len());
    assert_eq!(
        character.images[&Emotion::Joy],
        "https://img.test/기쁨.png"
    );
}

#[tokio::test]
async fn analysis_uses_character_endpoint_only_with_a_character() {
    let client = generation_server().await;

    let plain = client.analyze("오늘 산책", None, Some("user-1")).await.unwrap();
    let panel = plain.story.unwrap().panels.remove(0);
    assert_eq!(panel.image_url.as_deref(), Some("https://img.test/scene.png"));
    assert_eq!(panel.dialogue.as_deref(), None);
    assert_eq!(plain.analysis.unwrap().emotion, Emotion::Joy);

    let character = client.generate_character("안경 쓴 고양이").await.unwrap();
    let styled = client
        .analyze("오늘 산책", Some(&character), None)
        .await
        .unwrap();
    let panel = styled.story.unwrap().panels.remove(0);
    assert_eq!(panel.image_url.as_deref(), Some("https://img.test/기쁨.png"));
    assert_eq!(panel.dialogue.as_deref(), Some("anonymous"));
}

#[tokio::test]
async fn weekly_narrative_is_requested_without_images() {
    let client = generation_server().await;
    let days: Vec<DailyAnalysis> = (1..=7)
        .map(|day_number| DailyAnalysis {
            emotion: Emotion::Calm,
            emotion_intensity: 5,
            summary: format!("{day_number}번째 날"),
            one_line: String::new(),
            keywords: Vec::new(),
            day_number,
        })
        .collect();

    let narrative = client.narrate(&days).await.unwrap();

    assert_eq!(narrative.daily_narratives.len(), 7);
    assert_eq!(narrative.daily_narratives[0].narrative, "1번째 날");
    assert_eq!(narrative.weekly_summary, "images: false");
    assert_eq!(narrative.emotion_flow, vec![Emotion::Calm; 7]);
}

#[tokio::test]
async fn upstream_failures_are_classified() {
    let credits = Router::new().fallback(|| async {
        (StatusCode::PAYMENT_REQUIRED, "credits exhausted")
    });
    let client = GenerationClient::new(serve_on_random_port(credits).await);

    let err = client.analyze("오늘", None, None).await.unwrap_err();
    assert!(matches!(err, GenerationError::Status { status: 402, .. }));
    assert!(err.user_message().contains("크레딧"));

    let malformed = Router::new().route(
        "/api/generate_character",
        post(|| async { Json(json!({})) }),
    );
    let client = GenerationClient::new(serve_on_random_port(malformed).await);

    let err = client.generate_character("고양이").await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));

    let unreachable = GenerationClient::new("http://127.0.0.1:9");
    let err = unreachable.generate_portrait("고양이", Emotion::Joy).await.unwrap_err();
    assert!(matches!(err, GenerationError::Network(_)));
}
