use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use newsvec_core::{EngineConfig, NewsEngine, SledStore};
use serde_json::{json, Value};
use server::{router, AppState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn app() -> Router {
    let engine = NewsEngine::new(SledStore::temporary().unwrap(), EngineConfig::default()).unwrap();
    router(AppState::new(engine, Some(TOKEN.into())))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seed(app: &Router) {
    let docs = json!([
        {"title": "Flood hits valley", "description": "Monsoon flood hits valley", "url": "https://a/1"},
        {"title": "Relief reaches valley", "description": "Valley flood relief arrives", "url": "https://a/2"},
        {"title": "Markets close", "description": "Stock exchange closes higher", "url": "https://a/3"},
        {"title": "Duplicate", "description": "Monsoon flood hits valley", "url": "https://a/1"}
    ]);
    let (status, report) = call(app, admin_post("/admin/documents", docs)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["inserted"], json!([0, 1, 2]));
    assert_eq!(report["duplicates"], 1);
}

#[tokio::test]
async fn health_is_ok() {
    let resp = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = app();
    let req = Request::post("/admin/rebuild").body(Body::empty()).unwrap();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/admin/rebuild").header("X-ADMIN-TOKEN", "wrong").body(Body::empty()).unwrap();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn similar_requires_a_rebuild() {
    let app = app();
    seed(&app).await;
    let (status, _) = call(&app, get("/similar/0")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn documents_ingested_after_a_rebuild_conflict_until_the_next_one() {
    let app = app();
    seed(&app).await;
    call(&app, admin_post("/admin/rebuild", Value::Null)).await;
    let late = json!([{"title": "Late", "description": "Valley flood warning", "url": "https://a/9"}]);
    call(&app, admin_post("/admin/documents", late)).await;

    let (status, _) = call(&app, get("/similar/0")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, admin_post("/admin/rebuild", Value::Null)).await;
    let (status, _) = call(&app, get("/similar/0")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn similar_returns_ranked_results() {
    let app = app();
    seed(&app).await;
    let (status, report) = call(&app, admin_post("/admin/rebuild", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["version"], 1);
    assert_eq!(report["documents"], 3);

    let (status, body) = call(&app, get("/similar/0?k=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Flood hits valley");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["doc_id"], 1);
    assert_eq!(results[0]["url"], "https://a/2");

    let (status, _) = call(&app, get("/similar/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn document_and_vocabulary_lookups() {
    let app = app();
    seed(&app).await;
    call(&app, admin_post("/admin/rebuild", Value::Null)).await;

    let (status, vocab) = call(&app, get("/vocabulary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vocab["terms"], json!(["flood", "valley"]));
    assert_eq!(vocab["size"], 2);

    let (status, doc) = call(&app, get("/doc/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["vector"]["counts"], json!([1, 1]));
    assert_eq!(doc["vector"]["vocabulary_version"], 1);

    let (status, _) = call(&app, get("/doc/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn build_app_opens_a_database_directory() {
    let dir = tempdir().unwrap();
    let app = server::build_app(dir.path(), EngineConfig::default()).unwrap();
    let (status, _) = call(&app, get("/vocabulary")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(flavor = "current_thread")]
async fn rebuild_waiting_for_the_lock_leaves_the_runtime_free() {
    let engine = NewsEngine::new(SledStore::temporary().unwrap(), EngineConfig::default()).unwrap();
    let state = AppState::new(engine, Some(TOKEN.into()));
    let app = router(state.clone());
    seed(&app).await;

    let released = Arc::new(AtomicBool::new(false));
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let holder = {
        let engine = state.engine.clone();
        let released = released.clone();
        std::thread::spawn(move || {
            let guard = engine.write();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
            released.store(true, Ordering::SeqCst);
            drop(guard);
        })
    };
    locked_rx.recv().unwrap();

    let rebuild = tokio::spawn({
        let app = app.clone();
        async move { call(&app, admin_post("/admin/rebuild", Value::Null)).await }
    });
    tokio::task::yield_now().await;

    // the single runtime thread still serves requests while the rebuild waits
    let resp = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!released.load(Ordering::SeqCst));

    let (status, report) = rebuild.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["version"], 1);
    holder.join().unwrap();
}
