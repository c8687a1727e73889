use reqwest::{Response, StatusCode};
use secrecy::ExposeSecret;

use crate::{
    model::{NewWebtoon, RecordId, WebtoonRecord},
    session::Session,
};

use super::error::StoreError;

/// Per-user cloud collection of webtoon records.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Every record owned by the session user, newest first.
    async fn list(&self, session: &Session) -> Result<Vec<WebtoonRecord>, StoreError>;

    async fn create(
        &self,
        session: &Session,
        webtoon: &NewWebtoon,
    ) -> Result<WebtoonRecord, StoreError>;

    async fn delete(&self, session: &Session, id: &RecordId) -> Result<(), StoreError>;

    /// Remove every record of the session user; returns how many went.
    async fn clear(&self, session: &Session) -> Result<u64, StoreError>;
}

#[derive(serde::Deserialize)]
struct ClearResponse {
    deleted: u64,
}

/// [`RemoteStore`] over the sync server's `/webtoons` resource.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(StoreError::from_status(status, message))
}

impl RemoteStore for HttpRemoteStore {
    #[tracing::instrument(name = "remote list webtoons", skip_all, fields(user_id = %session.user_id))]
    async fn list(&self, session: &Session) -> Result<Vec<WebtoonRecord>, StoreError> {
        let response = self
            .http
            .get(self.url("/webtoons"))
            .bearer_auth(session.token.expose_secret())
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    #[tracing::instrument(name = "remote create webtoon", skip_all, fields(user_id = %session.user_id))]
    async fn create(
        &self,
        session: &Session,
        webtoon: &NewWebtoon,
    ) -> Result<WebtoonRecord, StoreError> {
        let response = self
            .http
            .post(self.url("/webtoons"))
            .bearer_auth(session.token.expose_secret())
            .json(webtoon)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    #[tracing::instrument(name = "remote delete webtoon", skip_all, fields(user_id = %session.user_id, %id))]
    async fn delete(&self, session: &Session, id: &RecordId) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.url(&format!("/webtoons/{id}")))
            .bearer_auth(session.token.expose_secret())
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            _ => check(response).await.map(|_| ()),
        }
    }

    #[tracing::instrument(name = "remote clear webtoons", skip_all, fields(user_id = %session.user_id))]
    async fn clear(&self, session: &Session) -> Result<u64, StoreError> {
        let response = self
            .http
            .delete(self.url("/webtoons"))
            .bearer_auth(session.token.expose_secret())
            .send()
            .await?;

        let ClearResponse { deleted } = check(response).await?.json().await?;
        Ok(deleted)
    }
}
