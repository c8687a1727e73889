//! Email/password session against the sync server.
//!
//! The current session is published on a `watch` channel; the record store
//! and any view holding a receiver observe sign-in and sign-out as they
//! happen.

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

use crate::{
    model::User,
    store::{
        error::StoreError,
        local::{LocalStore, USER_ID_KEY},
    },
};

#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: String,
    pub token: SecretString,
}

#[derive(serde::Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    token: String,
}

pub struct SessionManager<L> {
    http: reqwest::Client,
    base_url: String,
    local: L,
    sender: watch::Sender<Option<Session>>,
}

impl<L: LocalStore> SessionManager<L> {
    pub fn new(base_url: impl Into<String>, local: L) -> Self {
        let (sender, _) = watch::channel(None);

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            local,
            sender,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    #[tracing::instrument(name = "sign up", skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &SecretString) -> Result<User, StoreError> {
        self.authenticate("/auth/register", email, password).await
    }

    #[tracing::instrument(name = "sign in", skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<User, StoreError> {
        self.authenticate("/auth", email, password).await
    }

    /// Drop the session and every locally cached identifier of the user.
    #[tracing::instrument(name = "sign out", skip(self))]
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        self.sender.send_replace(None);
        self.local.remove(USER_ID_KEY).await?;

        Ok(())
    }

    async fn authenticate(
        &self,
        path: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<User, StoreError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&Credentials {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, message));
        }
        let TokenResponse { token } = response.json().await?;

        let user = self.fetch_me(&token).await?;

        self.local.set(USER_ID_KEY, user.id.clone()).await?;
        self.sender.send_replace(Some(Session {
            user_id: user.id.clone(),
            token: SecretString::from(token),
        }));

        tracing::info!(user_id = %user.id, "session started");

        Ok(user)
    }

    async fn fetch_me(&self, token: &str) -> Result<User, StoreError> {
        let response = self
            .http
            .get(format!("{}/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, message));
        }

        Ok(response.json().await?)
    }
}
