use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use newsvec_core::{Document, EngineConfig, EngineError, IngestReport, NewDocument, NewsEngine, RebuildReport, SledStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SimilarParams {
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SimilarResponse {
    pub doc_id: u32,
    pub title: String,
    pub vocabulary_version: u64,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SimilarHit>,
}

#[derive(Serialize)]
pub struct SimilarHit {
    pub doc_id: u32,
    pub score: f64,
    pub title: String,
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct VocabularyResponse {
    pub version: u64,
    pub built_at: String,
    pub size: usize,
    pub terms: Vec<String>,
}

/// Queries take the read lock; ingest and rebuild take the write lock, so a
/// query never sees a rebuild half-applied.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<NewsEngine<SledStore>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(engine: NewsEngine<SledStore>, admin_token: Option<String>) -> Self {
        Self { engine: Arc::new(RwLock::new(engine)), admin_token }
    }
}

type ApiError = (StatusCode, String);

pub fn build_app(db_dir: &std::path::Path, config: EngineConfig) -> Result<Router> {
    let engine = NewsEngine::new(SledStore::open(db_dir)?, config)?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState::new(engine, admin_token)))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/similar/:doc_id", get(similar_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/vocabulary", get(vocabulary_handler))
        .route("/admin/documents", post(ingest_handler))
        .route("/admin/rebuild", post(rebuild_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn engine_error(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        // the corpus needs a rebuild before it can be queried
        EngineError::VocabularyMissing
        | EngineError::MissingVector(_)
        | EngineError::StaleVector { .. }
        | EngineError::DimensionMismatch { .. } => StatusCode::CONFLICT,
        _ => {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

pub async fn similar_handler(State(state): State<AppState>, Path(doc_id): Path<u32>, Query(params): Query<SimilarParams>) -> Result<Json<SimilarResponse>, ApiError> {
    let start = std::time::Instant::now();
    let ranking = state.engine.read().find_similar(doc_id).map_err(engine_error)?;

    let k = params.k.clamp(1, 100);
    let total_hits = ranking.hits.len();
    let results = ranking
        .hits
        .into_iter()
        .take(k)
        .map(|h| SimilarHit { doc_id: h.id, score: h.score, title: h.title, url: h.url })
        .collect();

    Ok(Json(SimilarResponse {
        doc_id,
        title: ranking.query_title,
        vocabulary_version: ranking.vocabulary_version,
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<Document>, ApiError> {
    let doc = state.engine.read().document(doc_id).map_err(engine_error)?;
    Ok(Json(doc))
}

pub async fn vocabulary_handler(State(state): State<AppState>) -> Result<Json<VocabularyResponse>, ApiError> {
    let vocab = state.engine.read().vocabulary().map_err(engine_error)?;
    Ok(Json(VocabularyResponse { version: vocab.version, built_at: vocab.built_at, size: vocab.terms.len(), terms: vocab.terms }))
}

// --- Admin endpoints ---
async fn ingest_handler(State(state): State<AppState>, headers: HeaderMap, Json(docs): Json<Vec<NewDocument>>) -> Result<Json<IngestReport>, ApiError> {
    authorize(&state, &headers)?;
    let report = with_write_lock(&state, move |engine| engine.ingest(docs)).await?;
    Ok(Json(report))
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildReport>, ApiError> {
    authorize(&state, &headers)?;
    let report = with_write_lock(&state, |engine| engine.rebuild_vocabulary_and_vectors()).await?;
    Ok(Json(report))
}

/// Run `f` under the engine write lock on the blocking pool, off the async workers.
async fn with_write_lock<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&NewsEngine<SledStore>) -> Result<T, EngineError> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&*engine.write()))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("admin task failed: {e}")))?
        .map_err(engine_error)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
