use chrono::{Duration, Utc};
use futures::TryStreamExt;
use sqlx::{PgPool, Row};

use crate::{
    auth::error::AuthError,
    error::Error,
    model::{NewWebtoon, RecordId, WebtoonEntity, WebtoonRecord},
};

use super::error::DatabaseError;

const ID_ATTEMPTS: i64 = 16;

#[tracing::instrument(name = "get user webtoons", skip(pool))]
pub async fn get_user_webtoons(pool: &PgPool, user_id: &str) -> Result<Vec<WebtoonRecord>, Error> {
    let mut stream = sqlx::query_as::<_, WebtoonEntity>(
        r#"
        SELECT
            id, user_id, emotion,
            image, input_text, summary,
            scene, dialogue, keywords,
            emotion_intensity, has_webtoon_image,
            created_at, updated_at
        FROM
            webtoons
        WHERE
            user_id = $1
        ORDER BY created_at DESC, id DESC
    "#,
    )
    .bind(user_id)
    .fetch(pool);

    let mut webtoons = Vec::new();
    while let Some(entity) = stream
        .try_next()
        .await
        .map_err(DatabaseError::DatabaseError)?
    {
        webtoons.push(WebtoonRecord::from(entity));
    }

    Ok(webtoons)
}

/// Ids are `{user_id}_{millis}`. When two inserts land on the same
/// millisecond the later one moves forward until its id is free.
#[tracing::instrument(name = "insert webtoon", skip(pool, webtoon))]
pub async fn insert_webtoon(
    pool: &PgPool,
    user_id: &str,
    webtoon: NewWebtoon,
) -> Result<WebtoonRecord, Error> {
    let now = Utc::now();
    let created_at = webtoon.created_at.unwrap_or(now);

    for attempt in 0..ID_ATTEMPTS {
        let id = RecordId::remote(user_id, now + Duration::milliseconds(attempt)).to_string();

        let entity = sqlx::query_as::<_, WebtoonEntity>(
            r#"
            INSERT INTO webtoons
                (id, user_id, emotion, image, input_text, summary, scene, dialogue,
                 keywords, emotion_intensity, has_webtoon_image, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            RETURNING
                id, user_id, emotion,
                image, input_text, summary,
                scene, dialogue, keywords,
                emotion_intensity, has_webtoon_image,
                created_at, updated_at;
        "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(webtoon.emotion.label())
        .bind(&webtoon.image)
        .bind(&webtoon.input_text)
        .bind(&webtoon.summary)
        .bind(&webtoon.scene)
        .bind(&webtoon.dialogue)
        .bind(&webtoon.keywords)
        .bind(webtoon.emotion_intensity.map(i16::from))
        .bind(webtoon.has_webtoon_image)
        .bind(created_at)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(DatabaseError::DatabaseError)?;

        if let Some(entity) = entity {
            return Ok(WebtoonRecord::from(entity));
        }
        tracing::debug!(%id, "webtoon id taken, retrying");
    }

    Err(Error::Database(DatabaseError::Duplicate("webtoon")))
}

/// Delete one record owned by `user_id`. A record owned by someone else is
/// reported as forbidden, not as missing.
#[tracing::instrument(name = "delete webtoon", skip(pool))]
pub async fn delete_webtoon(pool: &PgPool, user_id: &str, webtoon_id: &str) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(DatabaseError::DatabaseError)?;

    let owner = sqlx::query(
        r#"
        SELECT user_id FROM webtoons WHERE id = $1 FOR UPDATE;
    "#,
    )
    .bind(webtoon_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(DatabaseError::DatabaseError)?;

    let owner: String = match owner {
        Some(row) => row.get("user_id"),
        None => return Err(Error::Database(DatabaseError::NotFound)),
    };

    if owner != user_id {
        return Err(Error::Auth(AuthError::Forbidden));
    }

    sqlx::query(
        r#"
        DELETE FROM webtoons WHERE id = $1;
    "#,
    )
    .bind(webtoon_id)
    .execute(&mut *tx)
    .await
    .map_err(DatabaseError::DatabaseError)?;

    tx.commit().await.map_err(DatabaseError::DatabaseError)?;

    Ok(())
}

#[tracing::instrument(name = "delete user webtoons", skip(pool))]
pub async fn delete_user_webtoons(pool: &PgPool, user_id: &str) -> Result<u64, Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM webtoons WHERE user_id = $1;
    "#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(DatabaseError::DatabaseError)?;

    Ok(result.rows_affected())
}
