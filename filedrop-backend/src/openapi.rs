use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(description = "Expiring file sharing API", license(name = "MIT or Apache2", identifier="MIT Apache2.0"), title = "filedrop", version = env!("CARGO_PKG_VERSION")),
    paths(
        crate::files::upload_file,
        crate::files::list_files,
        crate::files::get_file,
        crate::files::view_file,
        crate::files::download_file,
        crate::files::delete_file,
        crate::status::health,
        crate::status::api_index
    ),
    tags(
        (name = "files", description = "Upload, fetch and delete files"),
        (name = "status", description = "Service health and discovery")
    )
)]
pub struct ApiDoc;

pub(crate) fn api_route<T: Clone + Sync + Send + 'static>() -> Router<T> {
    let doc = ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/api/swagger-ui").url("/api/openapi.json", doc))
}
