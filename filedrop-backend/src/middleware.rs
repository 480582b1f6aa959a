//! Axum middleware things
//!

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

pub fn corslayer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        // browsers hide this from scripts unless it's exposed
        .expose_headers([header::CONTENT_DISPOSITION])
        .allow_origin(Any)
}
