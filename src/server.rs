//! Axum router construction and route mapping.
//!
//! The [`app`] function wires the `/api/content` surface to its handlers
//! and returns a ready-to-serve [`axum::Router`].  Body size limiting is
//! disabled at the framework level; the engine enforces the configured
//! upload cap while streaming.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::generate_request_id;
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the Teledrop API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Teledrop API",
        version = "0.1.0",
        description = "Self-hosted file sharing: upload a file, share a slug"
    ),
    paths(
        health_check,
        crate::handlers::drop::create_drop,
        crate::handlers::drop::list_drops,
        crate::handlers::drop::preview_drop,
        crate::handlers::stream::download_drop,
        crate::handlers::drop::update_detail,
        crate::handlers::drop::update_permission,
        crate::handlers::drop::update_favorite,
        crate::handlers::drop::set_password,
        crate::handlers::drop::reset_password,
        crate::handlers::drop::delete_drop,
        crate::handlers::drop::keycheck,
    ),
    components(schemas(crate::engine::DropSnapshot, crate::engine::DropPage)),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Drops", description = "Drop upload, preview, download, and management"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all Teledrop routes.
pub fn app(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    let content = Router::new()
        .route(
            "/",
            post(handlers::drop::create_drop).get(handlers::drop::list_drops),
        )
        .route("/keycheck/:slug", get(handlers::drop::keycheck))
        .route("/:slug/preview", get(handlers::drop::preview_drop))
        .route("/:slug/detail", patch(handlers::drop::update_detail))
        .route("/:slug/permission", patch(handlers::drop::update_permission))
        .route("/:slug/favorite", patch(handlers::drop::update_favorite))
        .route("/:slug/password", patch(handlers::drop::set_password))
        .route("/:slug/reset", patch(handlers::drop::reset_password))
        .route(
            "/:slug",
            get(handlers::stream::download_drop).delete(handlers::drop::delete_drop),
        );

    Router::new()
        // Infrastructure endpoints (not part of the content API).
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/content", content)
        // Swagger UI at /docs, OpenAPI spec at /openapi.json.
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .with_state(state)
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        // The engine streams uploads against its own configured cap;
        // axum's default 2MB limit would cut large drops off first.
        .layer(DefaultBodyLimit::disable())
}

// -- Common headers middleware -----------------------------------------------

/// Adds standard response headers to every response:
/// - `x-request-id`: 16-character hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `Teledrop`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("Teledrop"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}
