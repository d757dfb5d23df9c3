use axum::http::header;
use axum::response::IntoResponse;

/// Serves the `OpenAPI` document, stamped with the running crate version.
pub async fn openapi_yaml() -> impl IntoResponse {
    let spec = include_str!("../../openapi.yaml")
        .replace("version: 0.0.0", concat!("version: ", env!("CARGO_PKG_VERSION")));

    ([(header::CONTENT_TYPE, "text/yaml")], spec)
}
