use std::sync::Arc;

use axum::{Extension, Json};

use crate::model::User;

#[tracing::instrument(name = "[GET] me", skip_all, fields(user_id = %user.id))]
pub async fn index(Extension(user): Extension<Arc<User>>) -> Json<Arc<User>> {
    Json(user)
}
