use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use moodtoon::auth::encode_jwt;

use crate::AppStateTest;

async fn me_status(test_state: &AppStateTest, authorization: Option<String>) -> StatusCode {
    let mut request = Request::builder().uri("/me");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }

    test_state
        .generate_response(request.body(Body::empty()).unwrap())
        .await
        .status()
}

#[tokio::test]
async fn should_throw_error_when_request_does_not_contain_header_authorization() {
    let test_state = AppStateTest::new(false).await;

    assert_eq!(me_status(&test_state, None).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_throw_error_when_auth_header_is_malformed() {
    let test_state = AppStateTest::new(false).await;

    for value in ["random-string", "not-bearer random-string", "bearer"] {
        assert_eq!(
            me_status(&test_state, Some(value.to_string())).await,
            StatusCode::UNAUTHORIZED,
            "{value}"
        );
    }
}

#[tokio::test]
async fn should_throw_error_when_jwt_token_is_invalid() {
    let test_state = AppStateTest::new(false).await;

    let status = me_status(&test_state, Some("bearer random-string".to_string())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_throw_error_when_user_is_missing() {
    let test_state = AppStateTest::new(true).await;
    let token = encode_jwt("missing-user", &test_state.app_state.config.jwt).unwrap();

    let status = me_status(&test_state, Some(format!("bearer {token}"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn should_be_ok_when_user_is_exist() {
    let test_state = AppStateTest::new(true).await;
    let (_, token) = test_state.generate_jwt_with_user().await;

    let status = me_status(&test_state, Some(format!("Bearer {token}"))).await;

    assert_eq!(status, StatusCode::OK);
}
