use axum::{
    body::Body,
    http::{self, Request, StatusCode},
};
use http_body_util::BodyExt;
use moodtoon::controllers::auth::AuthResponse;
use serde_json::{Value, json};

use crate::AppStateTest;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn should_be_error_when_body_is_missing() {
    let test_state = AppStateTest::new(false).await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap();

    let response = test_state.generate_response(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_be_error_when_body_is_invalid() {
    let test_state = AppStateTest::new(false).await;

    let response = test_state
        .generate_response(post_json("/auth", json!({ "email": "test@localhost" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = test_state
        .generate_response(post_json("/auth", json!({ "email": "a", "password": "pass" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test_state
        .generate_response(post_json(
            "/auth/register",
            json!({
                "email": "user@example.com",
                "password": "this-password-length-should-be-over-32-characters"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_be_forbidden_when_registration_is_disabled() {
    let mut test_state = AppStateTest::new(false).await;
    test_state.app_state.config.application.allow_registration = false;

    let response = test_state
        .generate_response(post_json(
            "/auth/register",
            json!({ "email": "user@example.com", "password": "password" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_register_then_sign_in() {
    let test_state = AppStateTest::new(true).await;
    let credentials = json!({ "email": "user@example.com", "password": "password" });

    let response = test_state
        .generate_response(post_json("/auth/register", credentials.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = test_state
        .generate_response(post_json("/auth/register", credentials.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = test_state
        .generate_response(post_json("/auth", credentials))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let auth: AuthResponse = serde_json::from_slice(&body).unwrap();
    assert!(!auth.token.is_empty());
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_be_unauthorized_with_wrong_password_or_unknown_user() {
    let test_state = AppStateTest::new(true).await;
    let (user, _) = test_state.create_user().await;

    let response = test_state
        .generate_response(post_json(
            "/auth",
            json!({ "email": user.email, "password": "wrong" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test_state
        .generate_response(post_json(
            "/auth",
            json!({ "email": "nobody@example.com", "password": "password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
