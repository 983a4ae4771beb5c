use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::{handler::*, middleware::mw_require_auth, AppState};

/// Builds the API router. Whether the todo routes sit behind the bearer-token
/// gate is decided here, once, from `AppState::auth.enabled`; `/api/me` is
/// always gated.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let todos = Router::new()
        .route("/api/todo/new", post(create_todo))
        .route(
            "/api/todo/active",
            get(get_active_todos).put(update_active_todo),
        )
        .route("/api/todo/all", get(get_all_todos))
        .route(
            "/api/todo/complete",
            get(get_complete_todos)
                .put(complete_todo)
                .delete(delete_complete_todos),
        )
        .route("/api/todo/s3url", get(get_upload_url))
        .route("/api/todo/s3url/", get(get_upload_url))
        .route("/api/todo/s3url/:bucket", get(get_upload_url))
        .route("/api/todo/s3url/:bucket/:key", get(get_upload_url));

    let todos = if app_state.auth.enabled {
        todos.route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
    } else {
        tracing::warn!("authentication is disabled, todo routes are open");
        todos
    };

    let identity = Router::new()
        .route("/api/me", get(me))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth));

    Router::new()
        .merge(todos)
        .merge(identity)
        .route("/api/auth", post(authenticate))
        .route("/api/token", post(refresh_access_token))
        .route("/", get(health_checker_handler))
        .with_state(app_state)
}
