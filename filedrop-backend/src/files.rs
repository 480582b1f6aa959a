use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, FromRequestParts, Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HOST, X_CONTENT_TYPE_OPTIONS},
        request::Parts,
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use filedrop_shared::error::FileError;
use filedrop_shared::file::{
    DeleteResponse, ErrorResponse, FileListResponse, FileResponse, FileView, NewFile,
    UploadResponse,
};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    delivery::{FramedFile, RetrievalMode, OCTET_STREAM},
    error::WebError,
    SharedState,
};

/// Multipart field names that carry the upload.
const FILE_FIELDS: [&str; 2] = ["file", "pdf"];

/// Scheme and host the request came in on, for building file URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(pub String);

impl<S> FromRequestParts<S> for BaseUrl
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        Ok(BaseUrl(format!("{}://{}", scheme, host)))
    }
}

impl IntoResponse for FramedFile {
    fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, self.content_type.as_str())
            .header(CONTENT_DISPOSITION, self.content_disposition.as_str())
            .header(X_CONTENT_TYPE_OPTIONS, "nosniff");
        if let Some(length) = self.content_length {
            builder = builder.header(CONTENT_LENGTH, length);
        }
        match builder.body(Body::from(self.body)) {
            Ok(response) => response,
            Err(err) => {
                error!("Failed to frame file response: {:?}", err);
                WebError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to build file response".to_string(),
                )
                .into_response()
            }
        }
    }
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Upload a file
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ErrorResponse),
        (status = 413, description = "File larger than the upload limit", body = ErrorResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn upload_file(
    State(state): State<SharedState>,
    base_url: BaseUrl,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), WebError> {
    // no multipart body means no file
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Rejected upload body: {}", rejection.body_text());
        state.web_error(FileError::EmptyPayload)
    })?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {:?}", e);
        WebError::from_multipart(e)
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if FILE_FIELDS.contains(&field_name.as_str()) {
            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unnamed".to_string());
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| OCTET_STREAM.to_string());
            debug!(
                "File name: {:?}, content type: {:?}",
                filename, content_type
            );

            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {:?}", e);
                WebError::from_multipart(e)
            })?;
            debug!("Read {} bytes from field {}", data.len(), field_name);

            upload = Some(NewFile::new(filename, content_type, data.to_vec()));
        } else {
            debug!("Ignoring unknown multipart field: {}", field_name);
        }
    }

    let upload = upload.ok_or_else(|| state.web_error(FileError::EmptyPayload))?;

    let record = state
        .controller
        .upload(upload)
        .await
        .map_err(|err| state.web_error(err))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            file: FileView::new(record.summary(), &base_url.0),
        }),
    ))
}

/// List every stored file, newest first
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    responses(
        (status = 200, description = "All files", body = FileListResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn list_files(
    State(state): State<SharedState>,
    base_url: BaseUrl,
) -> Result<Json<FileListResponse>, WebError> {
    let files = state
        .controller
        .list_all()
        .await
        .map_err(|err| state.web_error(err))?;

    debug!("Listed {} files", files.len());

    Ok(Json(FileListResponse {
        success: true,
        files: files
            .into_iter()
            .map(|summary| FileView::new(summary, &base_url.0))
            .collect(),
    }))
}

/// Get a file's metadata
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "No such file", body = ErrorResponse),
        (status = 410, description = "File has expired", body = ErrorResponse),
    )
)]
pub async fn get_file(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    base_url: BaseUrl,
) -> Result<Json<FileResponse>, WebError> {
    let summary = state
        .controller
        .metadata(&id)
        .await
        .map_err(|err| state.web_error(err))?;

    Ok(Json(FileResponse {
        success: true,
        file: FileView::new(summary, &base_url.0),
    }))
}

/// View a file in the browser
#[utoipa::path(
    get,
    path = "/api/files/view/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Raw file bytes, served inline with the stored content type"),
        (status = 404, description = "No such file", body = ErrorResponse),
        (status = 410, description = "File has expired", body = ErrorResponse),
    )
)]
pub async fn view_file(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<FramedFile, WebError> {
    state
        .controller
        .retrieve(&id, RetrievalMode::View)
        .await
        .map_err(|err| state.web_error(err))
}

/// Download a file
#[utoipa::path(
    get,
    path = "/api/files/download/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Raw file bytes as an attachment"),
        (status = 404, description = "No such file", body = ErrorResponse),
        (status = 410, description = "File has expired", body = ErrorResponse),
    )
)]
pub async fn download_file(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<FramedFile, WebError> {
    state
        .controller
        .retrieve(&id, RetrievalMode::Download)
        .await
        .map_err(|err| state.web_error(err))
}

/// Delete a file
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 404, description = "No such file", body = ErrorResponse),
    )
)]
pub async fn delete_file(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, WebError> {
    state
        .controller
        .remove(&id)
        .await
        .map_err(|err| state.web_error(err))?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
    }))
}
