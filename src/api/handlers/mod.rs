use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::engine::{
    ChildOutcome, Consolidation, EngineError, ResolvedSpan, SessionEngine, SessionSnapshot,
    ROOT_TITLE,
};
use crate::gen::{compose_context, enhance_question, ClientError, GeneratorClient, LearnerProfile};
use crate::models::{Annotation, AnnotationKind, Card, CollectionItem, DocumentNode, NodeId};
use crate::tree_render;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine rejection to a response. Engine errors are synchronous
/// validation failures and safe to expose.
fn engine_error(err: EngineError) -> (StatusCode, String) {
    match err {
        EngineError::InvalidInput(_) | EngineError::InvalidOperation(_) => {
            tracing::warn!("Validation error: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        EngineError::NodeNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
    }
}

/// Map a generation-service failure to a response. Retryable failures are
/// reported as such; none of them commits partial session state.
fn service_error(err: ClientError) -> (StatusCode, String) {
    tracing::warn!("Generation service call failed: {}", err);
    if err.is_retryable() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{err}; please retry"),
        )
    } else {
        (StatusCode::BAD_GATEWAY, err.to_string())
    }
}

// ============================================================
// Request / response shapes
// ============================================================

#[derive(Debug, Deserialize)]
pub struct QuestionInput {
    pub question: String,
    #[serde(default)]
    pub profile: LearnerProfile,
}

#[derive(Debug, Deserialize)]
pub struct AnnotateInput {
    pub text: String,
    pub kind: AnnotationKind,
    #[serde(default)]
    pub profile: LearnerProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct CardsInput {
    #[serde(default)]
    pub profile: LearnerProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsolidateInput {
    /// Regenerate even when a fresh cached view exists.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub profile: LearnerProfile,
}

#[derive(Debug, Deserialize)]
pub struct ReorderInput {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct AutoSubmitInput {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentView {
    pub node_id: NodeId,
    pub content: String,
    /// Freshly generated texts render as rich text; restored node views
    /// render plain so annotation spans stay addressable.
    pub render_markdown: bool,
    pub annotations: Vec<Annotation>,
    pub spans: Vec<ResolvedSpan>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotationResult {
    pub annotation: Annotation,
    pub spans: Vec<ResolvedSpan>,
    /// Cards produced when auto-submit is on; absent otherwise or when the
    /// batch failed (the annotation itself still stands).
    pub cards: Option<Vec<Card>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotationsView {
    pub annotations: Vec<Annotation>,
    pub spans: Vec<ResolvedSpan>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TreeView {
    pub nodes: std::collections::BTreeMap<NodeId, DocumentNode>,
    pub root_id: Option<NodeId>,
    pub current_id: Option<NodeId>,
    /// ASCII rendering of the tree, for terminals and logs.
    pub outline: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromoteResult {
    pub node_id: NodeId,
    pub created: bool,
    pub view: DocumentView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResult {
    pub removed: Vec<NodeId>,
    pub current_id: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocateResult {
    pub node_id: NodeId,
    pub annotation_id: String,
    /// Whether the caller must select the node before focusing the span.
    pub requires_navigation: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    pub text: String,
    pub cached: bool,
    pub placeholder: bool,
    pub render_markdown: bool,
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Session
// ============================================================

pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let engine = state.engine.lock().await;
    Json(engine.snapshot())
}

pub async fn submit_question(
    State(state): State<AppState>,
    Json(input): Json<QuestionInput>,
) -> Result<Json<DocumentView>, (StatusCode, String)> {
    let question = input.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }

    let mut engine = state.engine.lock().await;
    let enhanced = enhance_question(&question, &input.profile);
    let context = compose_context(&input.profile, "");
    let content = state
        .client
        .generate(&enhanced, &context)
        .await
        .map_err(service_error)?;

    let node_id = engine.install_root(&content, ROOT_TITLE);
    Ok(Json(DocumentView {
        node_id,
        content,
        render_markdown: true,
        annotations: Vec::new(),
        spans: Vec::new(),
    }))
}

pub async fn set_auto_submit(
    State(state): State<AppState>,
    Json(input): Json<AutoSubmitInput>,
) -> impl IntoResponse {
    let mut engine = state.engine.lock().await;
    engine.set_auto_submit(input.enabled);
    Json(serde_json::json!({ "enabled": input.enabled }))
}

// ============================================================
// Version tree
// ============================================================

pub async fn get_tree(State(state): State<AppState>) -> Json<TreeView> {
    let engine = state.engine.lock().await;
    Json(TreeView {
        nodes: engine.tree().nodes().clone(),
        root_id: engine.tree().root_id(),
        current_id: engine.tree().current_id(),
        outline: tree_render::render_tree(engine.tree(), engine.collection()),
    })
}

pub async fn select_node(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
) -> Result<Json<DocumentView>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    engine.select_node(id).map_err(engine_error)?;
    node_view(&engine).map(Json)
}

pub async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
) -> Result<Json<DeleteResult>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    let outcome = engine.delete_node(id).map_err(engine_error)?;
    Ok(Json(DeleteResult {
        removed: outcome.removed,
        current_id: engine.tree().current_id(),
    }))
}

/// View of the current node with its annotations re-anchored.
fn node_view(engine: &SessionEngine) -> Result<DocumentView, (StatusCode, String)> {
    let node = engine
        .current_node()
        .ok_or((StatusCode::NOT_FOUND, "no document is active".to_string()))?;
    Ok(DocumentView {
        node_id: node.id,
        content: node.content.clone(),
        render_markdown: false,
        annotations: engine.active_annotations(),
        spans: engine.resolved_spans(),
    })
}

// ============================================================
// Annotations
// ============================================================

pub async fn list_annotations(State(state): State<AppState>) -> Json<AnnotationsView> {
    let engine = state.engine.lock().await;
    Json(AnnotationsView {
        annotations: engine.active_annotations(),
        spans: engine.resolved_spans(),
    })
}

pub async fn add_annotation(
    State(state): State<AppState>,
    Json(input): Json<AnnotateInput>,
) -> Result<(StatusCode, Json<AnnotationResult>), (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    let annotation = engine.annotate(&input.text, input.kind).map_err(engine_error)?;

    let cards = if engine.auto_submit() && !engine.pending_card_annotations().is_empty() {
        match run_card_batch(&state.client, &mut engine, &input.profile).await {
            Ok(cards) => Some(cards),
            Err(err) => {
                // The annotation stands; the failed batch committed nothing.
                tracing::warn!("Auto-submit card generation failed: {}", err);
                None
            }
        }
    } else {
        None
    };

    let spans = engine.resolved_spans();
    Ok((
        StatusCode::CREATED,
        Json(AnnotationResult {
            annotation,
            spans,
            cards,
        }),
    ))
}

pub async fn remove_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    let mut engine = state.engine.lock().await;
    // Idempotent: removing an unknown id is still a success.
    engine.remove_annotation(&id);
    StatusCode::NO_CONTENT
}

// ============================================================
// Cards
// ============================================================

/// One external call per summarize/unfamiliar annotation, strictly in
/// annotation order. The batch commits only when every call succeeded.
async fn run_card_batch(
    client: &GeneratorClient,
    engine: &mut SessionEngine,
    profile: &LearnerProfile,
) -> Result<Vec<Card>, ClientError> {
    let pending = engine.pending_card_annotations();
    let document = engine.current_content().unwrap_or_default().to_string();
    let context = compose_context(profile, &document);

    let mut cards = Vec::new();
    for annotation in pending {
        let content = client
            .annotate(&annotation.text, annotation.kind, &context)
            .await?;
        cards.push(Card {
            id: annotation.id.clone(),
            title: annotation.text.clone(),
            kind: annotation.kind,
            content,
        });
    }
    engine.set_cards(cards.clone());
    Ok(cards)
}

pub async fn list_cards(State(state): State<AppState>) -> Json<Vec<Card>> {
    let engine = state.engine.lock().await;
    Json(engine.cards().to_vec())
}

pub async fn generate_cards(
    State(state): State<AppState>,
    Json(input): Json<CardsInput>,
) -> Result<Json<Vec<Card>>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    let cards = run_card_batch(&state.client, &mut engine, &input.profile)
        .await
        .map_err(service_error)?;
    Ok(Json(cards))
}

pub async fn promote_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PromoteResult>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    let outcome = engine.promote_card(&id).map_err(engine_error)?;
    Ok(Json(PromoteResult {
        node_id: outcome.node_id(),
        created: matches!(outcome, ChildOutcome::Created(_)),
        view: node_view(&engine)?,
    }))
}

// ============================================================
// Collection
// ============================================================

pub async fn list_collection(State(state): State<AppState>) -> Json<Vec<CollectionItem>> {
    let engine = state.engine.lock().await;
    Json(engine.collection().items().to_vec())
}

pub async fn reorder_collection(
    State(state): State<AppState>,
    Json(input): Json<ReorderInput>,
) -> Result<Json<Vec<CollectionItem>>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;
    if !engine.reorder_collection(input.from, input.to) {
        return Err((
            StatusCode::BAD_REQUEST,
            "reorder indexes out of range".to_string(),
        ));
    }
    Ok(Json(engine.collection().items().to_vec()))
}

pub async fn remove_collection_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    let mut engine = state.engine.lock().await;
    // An item and its annotation share an id; removing one removes both.
    engine.remove_annotation(&id);
    StatusCode::NO_CONTENT
}

pub async fn locate_collected(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LocateResult>, (StatusCode, String)> {
    let engine = state.engine.lock().await;
    let (node_id, annotation_id) = engine
        .locate_collected(&id)
        .ok_or((StatusCode::NOT_FOUND, "collection item not found".to_string()))?;
    Ok(Json(LocateResult {
        node_id,
        annotation_id,
        requires_navigation: engine.tree().current_id() != Some(node_id),
    }))
}

// ============================================================
// Consolidation
// ============================================================

pub async fn consolidate(
    State(state): State<AppState>,
    Json(input): Json<ConsolidateInput>,
) -> Result<Json<ConsolidatedResult>, (StatusCode, String)> {
    let mut engine = state.engine.lock().await;

    // Staleness forces regeneration just like an explicit request.
    let force = input.force || engine.is_consolidation_stale();
    let document = engine.current_content().unwrap_or_default().to_string();

    match engine.select_consolidated(force) {
        Consolidation::Placeholder(text) => Ok(Json(ConsolidatedResult {
            text: text.to_string(),
            cached: false,
            placeholder: true,
            render_markdown: false,
        })),
        Consolidation::Cached(text) => Ok(Json(ConsolidatedResult {
            text,
            cached: true,
            placeholder: false,
            render_markdown: true,
        })),
        Consolidation::Pending(items) => {
            let context = compose_context(&input.profile, &document);
            let text = state
                .client
                .consolidate(&items, &context)
                .await
                .map_err(service_error)?;
            engine.install_consolidated(text.clone());
            Ok(Json(ConsolidatedResult {
                text,
                cached: false,
                placeholder: false,
                render_markdown: true,
            }))
        }
    }
}
