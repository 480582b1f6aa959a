use axum::extract::multipart::MultipartError;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use filedrop_shared::error::FileError;
use tracing::error;

/// An error on its way out to the client as `{"error": "..."}`.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: String) -> Self {
        WebError { status, message }
    }

    pub fn not_found(message: String) -> Self {
        WebError {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Maps the file error taxonomy onto HTTP. Storage detail only leaks
    /// when `expose_detail` is set.
    pub fn from_file_error(err: FileError, expose_detail: bool) -> Self {
        match err {
            FileError::EmptyPayload => WebError::new(StatusCode::BAD_REQUEST, err.to_string()),
            FileError::PayloadTooLarge { .. } => {
                WebError::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            FileError::NotFound(_) => WebError::not_found("File not found".to_string()),
            FileError::Expired(_) => {
                WebError::new(StatusCode::GONE, "File has expired".to_string())
            }
            FileError::DuplicateKey(_) | FileError::StorageUnavailable(_) => {
                error!("Storage failure: {}", err);
                let message = match expose_detail {
                    true => err.to_string(),
                    false => "Storage unavailable".to_string(),
                };
                WebError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }

    /// A body that blew through the upload limit is a 413, anything else a 400.
    pub fn from_multipart(err: MultipartError) -> Self {
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => WebError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload too large: {}", err.body_text()),
            ),
            _ => WebError::new(
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", err.body_text()),
            ),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        let mut response = axum::response::Response::new(body.to_string().into());
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
