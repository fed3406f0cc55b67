mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::SessionEngine;
use crate::gen::GeneratorClient;

/// Shared state of one running session.
///
/// The engine sits behind an async mutex: every operation (including the
/// slow external-generation ones) holds it for its full duration, so the
/// generate / card-batch / consolidate calls are serialized per session.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<SessionEngine>>,
    pub client: GeneratorClient,
}

impl AppState {
    pub fn new(engine: SessionEngine, client: GeneratorClient) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            client,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Session
        .route("/session", get(handlers::get_session))
        .route("/session/question", post(handlers::submit_question))
        .route("/session/auto-submit", post(handlers::set_auto_submit))
        // Version tree
        .route("/tree", get(handlers::get_tree))
        .route("/tree/select/{id}", post(handlers::select_node))
        .route("/tree/nodes/{id}", delete(handlers::delete_node))
        // Annotations
        .route("/annotations", get(handlers::list_annotations))
        .route("/annotations", post(handlers::add_annotation))
        .route("/annotations/{id}", delete(handlers::remove_annotation))
        // Cards
        .route("/cards", get(handlers::list_cards))
        .route("/cards", post(handlers::generate_cards))
        .route("/cards/{id}/promote", post(handlers::promote_card))
        // Collection
        .route("/collections", get(handlers::list_collection))
        .route("/collections/reorder", post(handlers::reorder_collection))
        .route("/collections/{id}", delete(handlers::remove_collection_item))
        .route("/collections/{id}/locate", get(handlers::locate_collected))
        // Consolidation
        .route("/consolidate", post(handlers::consolidate))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
