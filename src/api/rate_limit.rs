use crate::api::AppState;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

/// Counts every rate limit decision and surfaces throttled requests in the
/// logs. Tier resolution mirrors the router: room creation runs on its own
/// stricter limiter, everything else on the standard one.
pub async fn log_rate_limit_events(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let tier =
        if request.method() == Method::POST && request.uri().path() == "/v1/rooms" { "create" } else { "standard" };

    let response = next.run(request).await;

    let retry_after =
        response.headers().get("x-ratelimit-after").and_then(|v| v.to_str().ok()).map(ToString::to_string);

    state.rate_limit_service.log_decision(tier, response.status(), retry_after);

    response
}
