pub mod cli;
pub mod clock;
pub mod delivery;
pub mod entity;
pub mod error;
pub mod files;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod status;
pub mod storage;
pub mod store;
pub mod sweeper;
#[cfg(test)]
mod tests;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use filedrop_shared::error::FileError;
use std::{borrow::Cow, sync::Arc, time::Duration};
use tower::{BoxError, ServiceBuilder};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

use crate::{
    cli::CliOpts,
    clock::SystemClock,
    delivery::DeliveryController,
    error::WebError,
    files::{delete_file, download_file, get_file, list_files, upload_file, view_file},
    logging::logging_layer,
    status::{api_index, endpoint_not_found, health},
    storage::DBError,
    store::SqlStore,
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub controller: DeliveryController,
    /// Show storage error detail to clients.
    pub dev_mode: bool,
}

impl AppState {
    pub async fn new(cli: &CliOpts) -> Result<Self, DBError> {
        let conn = storage::new(&cli.db_path(), cli.store_timeout()).await?;
        let store = SqlStore::new(conn, cli.store_timeout());
        Ok(Self {
            controller: DeliveryController::new(
                Arc::new(store),
                Arc::new(SystemClock),
                cli.delivery_config(),
            ),
            dev_mode: cli.dev_mode,
        })
    }

    pub fn web_error(&self, err: FileError) -> WebError {
        WebError::from_file_error(err, self.dev_mode)
    }

    #[cfg(test)]
    pub async fn test() -> Self {
        Self::test_with(
            Arc::new(SystemClock),
            crate::delivery::DeliveryConfig::default(),
        )
        .await
    }

    #[cfg(test)]
    pub async fn test_with(
        clock: Arc<dyn crate::clock::Clock>,
        config: crate::delivery::DeliveryConfig,
    ) -> Self {
        let conn = storage::start_db(None, Duration::from_secs(5))
            .await
            .expect("Failed to start test DB");
        let store = SqlStore::new(conn, Duration::from_secs(5));
        Self {
            controller: DeliveryController::new(Arc::new(store), clock, config),
            dev_mode: false,
        }
    }
}

pub fn build_app<T>(shared_state: &SharedState) -> Router<T> {
    let upload_limit = shared_state
        .controller
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    let router = Router::new()
        .route("/api/files", get(list_files))
        .route(
            "/api/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/view/{id}", get(view_file))
        .route("/api/files/download/{id}", get(download_file))
        .route("/", get(api_index))
        .route("/api/health", get(health))
        .merge(openapi::api_route())
        .fallback(endpoint_not_found);

    router
        // Add middleware to all routes
        .layer(
            ServiceBuilder::new()
                .layer(middleware::corslayer())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    |response: &Response<Body>| {
                        if response.status() == StatusCode::OK {
                            "private, no-transform, max-age=0".parse().ok()
                        } else {
                            None
                        }
                    },
                ))
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(REQUEST_TIMEOUT)
                .layer(logging_layer()),
        )
        .with_state(shared_state.clone())
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        let msg = "service is overloaded, try again later";
        error!("{}", msg);
        return (StatusCode::SERVICE_UNAVAILABLE, Cow::from(msg));
    }

    let msg = format!("Unhandled internal error: {error}");
    error!("{}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Cow::from(msg))
}

#[tokio::test]
async fn test_handle_error() {
    let err = tower::timeout::error::Elapsed::new();
    let res = handle_error(Box::new(err)).await.into_response();
    let expected = (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out")).into_response();

    assert_eq!(res.status(), expected.status());

    let err = tower::load_shed::error::Overloaded::new();
    let res = handle_error(Box::new(err)).await.into_response();
    let expected = (
        StatusCode::SERVICE_UNAVAILABLE,
        Cow::from("service is overloaded, try again later"),
    )
        .into_response();

    assert_eq!(res.status(), expected.status());

    let err = std::io::Error::other("boom");
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
