use std::{borrow::Cow, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

use crate::{
    db::webtoons::{delete_user_webtoons, delete_webtoon, get_user_webtoons, insert_webtoon},
    error::Error,
    model::{NewWebtoon, User, WebtoonRecord},
    state::SharedAppState,
    stats::{StatsReport, StatsWindow},
};

const MAX_INTENSITY: u8 = 10;

#[tracing::instrument(name = "[GET] webtoons", skip_all, fields(user_id = %user.id))]
pub async fn index(
    Extension(user): Extension<Arc<User>>,
    State(app_state): State<SharedAppState>,
) -> Result<Json<Vec<WebtoonRecord>>, Error> {
    let webtoons = get_user_webtoons(&app_state.pool, &user.id).await?;

    Ok(Json(webtoons))
}

fn validate_new_webtoon(webtoon: &NewWebtoon) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if webtoon.emotion_intensity.is_some_and(|v| v > MAX_INTENSITY) {
        errors.add(
            "emotion_intensity",
            ValidationError::new("emotion_intensity_range")
                .with_message(Cow::from("Emotion intensity must be between 0 and 10")),
        );
    }

    if !errors.errors().is_empty() {
        return Err(errors);
    }

    Ok(())
}

#[tracing::instrument(name = "[POST] webtoons", skip_all, fields(user_id = %user.id))]
pub async fn store(
    Extension(user): Extension<Arc<User>>,
    State(app_state): State<SharedAppState>,
    axum::extract::Json(webtoon): axum::extract::Json<NewWebtoon>,
) -> Result<(StatusCode, Json<WebtoonRecord>), Error> {
    validate_new_webtoon(&webtoon).map_err(Error::Validation)?;

    let record = insert_webtoon(&app_state.pool, &user.id, webtoon).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[tracing::instrument(name = "[DELETE] webtoon", skip_all, fields(user_id = %user.id, %id))]
pub async fn destroy(
    Extension(user): Extension<Arc<User>>,
    State(app_state): State<SharedAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    delete_webtoon(&app_state.pool, &user.id, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize, Deserialize)]
pub struct ClearResponse {
    pub deleted: u64,
}

#[tracing::instrument(name = "[DELETE] webtoons", skip_all, fields(user_id = %user.id))]
pub async fn clear(
    Extension(user): Extension<Arc<User>>,
    State(app_state): State<SharedAppState>,
) -> Result<Json<ClearResponse>, Error> {
    let deleted = delete_user_webtoons(&app_state.pool, &user.id).await?;

    Ok(Json(ClearResponse { deleted }))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub window: StatsWindow,
}

#[tracing::instrument(name = "[GET] webtoons stats", skip_all, fields(user_id = %user.id))]
pub async fn stats(
    Extension(user): Extension<Arc<User>>,
    State(app_state): State<SharedAppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsReport>, Error> {
    let webtoons = get_user_webtoons(&app_state.pool, &user.id).await?;

    let report = StatsReport::build(
        &webtoons,
        query.window,
        Utc::now(),
        app_state.config.application.utc_offset(),
    );

    Ok(Json(report))
}
