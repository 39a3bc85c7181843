use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handler::{self, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handler::healthcheck))
        .route(
            "/bookmarks",
            get(handler::list_bookmarks).post(handler::create_bookmark),
        )
        .route(
            "/bookmarks/:id",
            put(handler::update_bookmark).delete(handler::delete_bookmark),
        )
        .route("/folders", get(handler::list_folders).post(handler::create_folder))
        .route(
            "/folders/:id",
            get(handler::get_folder)
                .put(handler::update_folder)
                .delete(handler::delete_folder),
        )
}

/// The full application: API routes, optional static assets at `/`, CORS and
/// request tracing.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let mut router = api_routes();
    if let Some(dir) = static_dir {
        tracing::info!(dir = %dir.display(), "serving static files");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(short_circuit_options)),
        )
        .with_state(state)
}

// Any OPTIONS request is answered here, preflight or not.
async fn short_circuit_options(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(req).await
}
