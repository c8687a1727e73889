use anyhow::Context;
use secrecy::SecretString;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    auth::{compute_password_hash, error::AuthError},
    error::Error,
    model::User,
    telemetry::spawn_blocking_with_tracing,
};

use super::error::DatabaseError;

#[tracing::instrument(name = "find user by email", skip_all, fields(email))]
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<(User, String), Error> {
    let row = sqlx::query(
        r#"
        SELECT
            id, email, password, nickname
        FROM
            users
        WHERE
            email = $1
    "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::DatabaseError)?;

    let Some(row) = row else {
        return Err(Error::Auth(AuthError::UserNotFound));
    };

    Ok((
        User {
            id: row.get("id"),
            email: row.get("email"),
            nickname: row.get("nickname"),
        },
        row.get("password"),
    ))
}

#[tracing::instrument(name = "create user", skip_all, fields(email))]
pub async fn create_user(pool: &PgPool, email: String, password: SecretString) -> Result<User, Error> {
    let password_hashed = spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("compute password hash")
        .map_err(Error::Other)??;

    let user_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO users
            (id, email, password)
        VALUES
            ($1, $2, $3);
    "#,
    )
    .bind(&user_id)
    .bind(&email)
    .bind(&password_hashed)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_error) = &e {
            if db_error.is_unique_violation() {
                return DatabaseError::Duplicate("user");
            }
        }
        DatabaseError::DatabaseError(e)
    })?;

    Ok(User {
        id: user_id,
        email,
        nickname: None,
    })
}

#[tracing::instrument(name = "get user by id", skip_all, fields(user_id))]
pub async fn get_user_by_id_optional(pool: &PgPool, user_id: &str) -> Result<Option<User>, Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT
            id, email, nickname
        FROM
            users
        WHERE
            id = $1;
    "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::Database(DatabaseError::DatabaseError(e)))
}
