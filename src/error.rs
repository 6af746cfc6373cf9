//! 统一的 API 错误类型与 JSON 错误响应。

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::blob::BlobError;
use crate::profiles::ProfileError;

#[derive(Debug)]
pub enum ApiError {
    MissingFile,
    UnsupportedMediaType(String),
    BadRequest(String),
    PayloadTooLarge,
    Persistence(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile
            | ApiError::UnsupportedMediaType(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::MissingFile => "No file uploaded".into(),
            ApiError::UnsupportedMediaType(mime) => {
                format!("Unsupported media type: {mime}")
            }
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::PayloadTooLarge => "Upload too large".into(),
            ApiError::Persistence(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Persistence(msg) = &self {
            error!(error = %msg, "persistence failure");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<BlobError> for ApiError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::UnsupportedMediaType(mime) => ApiError::UnsupportedMediaType(mime),
            BlobError::Io(err) => ApiError::Persistence(err.to_string()),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(error: ProfileError) -> Self {
        match error {
            ProfileError::Encode(err) => ApiError::Persistence(err.to_string()),
            ProfileError::Io(err) => ApiError::Persistence(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(error.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn missing_file_is_bad_request_with_json_body() {
        let (status, body) = body_json(ApiError::MissingFile).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn persistence_failure_is_internal_error() {
        let (status, body) = body_json(ApiError::Persistence("disk full".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "disk full");
    }
}
