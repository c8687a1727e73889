use reqwest::StatusCode;

use super::local::LocalStoreError;

/// Failures seen by the record store and the clients behind it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("record not found")]
    NotFound,
    #[error("already exists")]
    Conflict,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("local store error")]
    Local(#[from] LocalStoreError),
}

impl StoreError {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => StoreError::Unauthenticated,
            StatusCode::FORBIDDEN => StoreError::PermissionDenied,
            StatusCode::NOT_FOUND => StoreError::NotFound,
            StatusCode::CONFLICT => StoreError::Conflict,
            _ => StoreError::Remote {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Message suitable for showing to the diary author.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Network(_) => {
                "네트워크에 연결할 수 없습니다. 로컬에 저장된 기록만 표시됩니다.".to_string()
            }
            StoreError::Unauthenticated => "로그인이 필요합니다.".to_string(),
            StoreError::PermissionDenied => {
                "권한이 없습니다. 본인이 만든 웹툰만 관리할 수 있습니다.".to_string()
            }
            StoreError::NotFound => "웹툰을 찾을 수 없습니다.".to_string(),
            StoreError::Conflict => "이미 존재하는 항목입니다.".to_string(),
            StoreError::MalformedResponse(_) => "서버 응답이 올바르지 않습니다.".to_string(),
            StoreError::Remote { message, .. } => format!("서버 오류가 발생했습니다: {message}"),
            StoreError::Local(_) => "기기에 저장하는 중 오류가 발생했습니다.".to_string(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return StoreError::MalformedResponse(error.to_string());
        }
        if let Some(status) = error.status() {
            return StoreError::from_status(status, error.to_string());
        }
        StoreError::Network(error.to_string())
    }
}
