use axum::{
    body::Body,
    http::{self, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use moodtoon::{
    controllers::webtoons::ClearResponse,
    model::{RecordId, Source, WebtoonRecord},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::AppStateTest;

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("bearer {token}"));

    match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn should_require_authentication() {
    let test_state = AppStateTest::new(false).await;

    for (method, uri) in [
        ("GET", "/webtoons"),
        ("POST", "/webtoons"),
        ("DELETE", "/webtoons"),
        ("DELETE", "/webtoons/u1_1"),
        ("GET", "/webtoons/stats"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = test_state.generate_response(request).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_store_and_list_newest_first() {
    let test_state = AppStateTest::new(true).await;
    let (user, token) = test_state.generate_jwt_with_user().await;

    for (created_at, emotion) in [
        ("2025-06-01T10:00:00Z", "😊 기쁨"),
        ("2025-06-02T10:00:00Z", "슬픔"),
    ] {
        let response = test_state
            .generate_response(request(
                "POST",
                "/webtoons",
                &token,
                Some(json!({
                    "createdAt": created_at,
                    "emotion": emotion,
                    "inputText": "일기",
                    "keywords": ["하루"],
                    "emotion_intensity": 6,
                    "hasWebtoonImage": true
                })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let record: WebtoonRecord = read_json(response).await;
        assert_eq!(record.user_id.as_deref(), Some(user.id.as_str()));
        assert!(matches!(&record.id, RecordId::Remote(id) if id.starts_with(&user.id)));
    }

    let response = test_state
        .generate_response(request("GET", "/webtoons", &token, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let records: Vec<WebtoonRecord> = read_json(response).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].emotion.label(), "슬픔");
    assert_eq!(records[1].emotion.label(), "기쁨");
    assert!(records.iter().all(|r| r.source == Source::Firebase && !r.needs_sync));
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_reject_out_of_range_intensity() {
    let test_state = AppStateTest::new(true).await;
    let (_, token) = test_state.generate_jwt_with_user().await;

    let response = test_state
        .generate_response(request(
            "POST",
            "/webtoons",
            &token,
            Some(json!({ "emotion": "기쁨", "emotion_intensity": 11 })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_only_delete_own_records() {
    let test_state = AppStateTest::new(true).await;
    let (_, owner_token) = test_state.generate_jwt_with_user().await;
    let (_, other_token) = test_state.generate_jwt_with_user().await;

    let response = test_state
        .generate_response(request(
            "POST",
            "/webtoons",
            &owner_token,
            Some(json!({ "emotion": "평온" })),
        ))
        .await;
    let record: WebtoonRecord = read_json(response).await;
    let uri = format!("/webtoons/{}", record.id);

    let response = test_state
        .generate_response(request("DELETE", &uri, &other_token, None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = test_state
        .generate_response(request("DELETE", &uri, &owner_token, None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = test_state
        .generate_response(request("DELETE", &uri, &owner_token, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_clear_and_report_stats() {
    let test_state = AppStateTest::new(true).await;
    let (_, token) = test_state.generate_jwt_with_user().await;

    for emotion in ["기쁨", "기쁨", "불안"] {
        test_state
            .generate_response(request(
                "POST",
                "/webtoons",
                &token,
                Some(json!({ "emotion": emotion })),
            ))
            .await;
    }

    let response = test_state
        .generate_response(request("GET", "/webtoons/stats?window=7", &token, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = read_json(response).await;
    assert_eq!(stats["window"], "7");
    assert_eq!(stats["sentiment"]["positive"], 2);
    assert_eq!(stats["sentiment"]["negative"], 1);

    let response = test_state
        .generate_response(request("GET", "/webtoons/stats?window=5", &token, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test_state
        .generate_response(request("DELETE", "/webtoons", &token, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared: ClearResponse = read_json(response).await;
    assert_eq!(cleared.deleted, 3);
}
