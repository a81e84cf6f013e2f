use std::sync::Arc;

use axum::{
    body::Bytes, extract::State, http::StatusCode, response::IntoResponse, routing::post, Router,
};
use log::{info, warn};

use crate::{gateway::Gateway, hooks::PushEventParser, updater::Updater};

struct AppState<G> {
    updater: Updater<G>,
    parser: Box<dyn PushEventParser>,
}

/// Routes push hooks posted to `/` into the updater.
pub fn router<G: Gateway + 'static>(updater: Updater<G>, parser: Box<dyn PushEventParser>) -> Router {
    Router::new()
        .route("/", post(handle_hook::<G>))
        .with_state(Arc::new(AppState { updater, parser }))
}

async fn handle_hook<G: Gateway + 'static>(
    State(state): State<Arc<AppState<G>>>,
    body: Bytes,
) -> impl IntoResponse {
    let hook = match state.parser.parse(&body) {
        Ok(hook) => hook,
        Err(err) => {
            warn!("failed to parse push hook: {:#}", err);
            return (StatusCode::BAD_REQUEST, format!("invalid hook: {err}"));
        }
    };

    info!(
        "received push for {} tags={:?}",
        hook.repository, hook.updated_tags
    );

    // gateways are blocking clients
    let result =
        tokio::task::spawn_blocking(move || state.updater.update_from_hook(&hook)).await;

    match result {
        Ok(Ok(())) => (StatusCode::OK, "ok".to_string()),
        Ok(Err(err)) => {
            warn!("failed to update from push hook: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        Err(err) => {
            warn!("update task failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "update task failed".to_string(),
            )
        }
    }
}
