use std::borrow::Cow;

use anyhow::Context;
use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidateLength, ValidationError, ValidationErrors};

use crate::{
    auth::{encode_jwt, error::AuthError, verify_password_hash},
    db::user::{create_user, find_user_by_email},
    error::Error,
    state::SharedAppState,
    telemetry::spawn_blocking_with_tracing,
};

#[derive(Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: SecretString,
}

impl Validate for AuthRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.email.validate_email() {
            errors.add(
                "email",
                ValidationError::new("email_email")
                    .with_message(Cow::from("Incorrect email format")),
            );
        }
        if !self.email.validate_length(Some(1), Some(100), None) {
            errors.add(
                "email",
                ValidationError::new("email_length")
                    .with_message(Cow::from("Email length must be between 1 and 100")),
            );
        }

        let password = self.password.expose_secret();
        if !password.validate_length(Some(1), Some(32), None) {
            errors.add(
                "password",
                ValidationError::new("password_length")
                    .with_message(Cow::from("Password length must be between 1 and 32")),
            );
        }

        if !errors.errors().is_empty() {
            return Err(errors);
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

async fn issue_token(app_state: SharedAppState, user_id: String) -> Result<AuthResponse, Error> {
    let token = spawn_blocking_with_tracing(move || encode_jwt(&user_id, &app_state.config.jwt))
        .await
        .context("encode jwt")
        .map_err(Error::Other)??;

    Ok(AuthResponse { token })
}

#[tracing::instrument(name = "[POST] auth", skip_all)]
pub async fn store(
    State(app_state): State<SharedAppState>,
    axum::extract::Json(request): axum::extract::Json<AuthRequest>,
) -> Result<Json<AuthResponse>, Error> {
    request.validate().map_err(Error::Validation)?;

    let (user, hashed_password) = find_user_by_email(&app_state.pool, &request.email).await?;

    spawn_blocking_with_tracing(move || verify_password_hash(hashed_password, request.password))
        .await
        .context("verify password hash")
        .map_err(Error::Other)?
        .map_err(|_| Error::Auth(AuthError::IncorrectCredential))?;

    Ok(Json(issue_token(app_state, user.id).await?))
}

#[tracing::instrument(name = "[POST] auth register", skip_all)]
pub async fn register(
    State(app_state): State<SharedAppState>,
    axum::extract::Json(request): axum::extract::Json<AuthRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), Error> {
    if !app_state.config.application.allow_registration {
        return Err(Error::Auth(AuthError::RegistrationDisabled));
    }
    request.validate().map_err(Error::Validation)?;

    let user = create_user(&app_state.pool, request.email, request.password).await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(issue_token(app_state, user.id).await?),
    ))
}
