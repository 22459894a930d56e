//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::handlers;
use crate::web::state::AppState;
use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/system", get(handlers::system))
        .route("/system/history", get(handlers::system_history))
        .route("/network", get(handlers::network))
        .route("/cpu", get(handlers::cpu))
        .route("/memory", get(handlers::memory))
        .route("/disks", get(handlers::disks))
        .route("/hardware", get(handlers::hardware))
        .route("/processes", get(handlers::processes))
        .route("/sessions", get(handlers::sessions))
        .route("/sessions/:kind", delete(handlers::cancel_session))
        .route("/health", get(handlers::health_check));

    let mut app = Router::new()
        .route("/", get(handlers::index))
        .nest("/api", api)
        .with_state(state);

    // Add CORS if enabled
    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
