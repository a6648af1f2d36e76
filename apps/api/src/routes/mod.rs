pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::cards::handlers as cards;
use crate::collections::handlers as collections;
use crate::imports::handlers as imports;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Cards
        .route(
            "/api/v1/cards",
            get(cards::handle_list_cards).post(cards::handle_create_card),
        )
        .route("/api/v1/cards/bulk", post(cards::handle_bulk_save))
        .route("/api/v1/cards/export", get(cards::handle_export_cards))
        .route(
            "/api/v1/cards/:id",
            get(cards::handle_get_card)
                .put(cards::handle_update_card)
                .delete(cards::handle_delete_card),
        )
        .route("/api/v1/cards/:id/export", get(cards::handle_export_card))
        // Collections
        .route(
            "/api/v1/collections",
            get(collections::handle_list_collections).post(collections::handle_create_collection),
        )
        .route("/api/v1/collections/suggest", post(collections::handle_suggest))
        .route("/api/v1/collections/:id", get(collections::handle_get_collection))
        .route("/api/v1/collections/:id/cards", post(collections::handle_add_card))
        .route(
            "/api/v1/collections/:id/export",
            get(collections::handle_export_collection),
        )
        // Imports
        .route(
            "/api/v1/imports",
            get(imports::handle_list_imports).post(imports::handle_create_import),
        )
        .route("/api/v1/imports/active", get(imports::handle_active_imports))
        .route("/api/v1/imports/parse", post(imports::handle_parse_import))
        .route("/api/v1/imports/:id", get(imports::handle_get_import))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::collections::suggest::SuggestionTable;
    use crate::config::Config;
    use crate::imports::parser::parse_import_json;
    use crate::imports::tracker::ImportTracker;
    use crate::llm_client::testing::{chain_of, StubProvider};
    use crate::models::card::CardTemplate;
    use crate::models::import_job::ImportJob;
    use crate::store::memory::MemoryStore;
    use crate::store::RecipeStore;

    const ENHANCED: &str = r#"{"what_it_does": "Does it.", "who_its_for": "Analysts"}"#;

    fn test_state() -> (AppState, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn RecipeStore> = memory.clone();
        let state = AppState {
            store: store.clone(),
            llm: chain_of(vec![StubProvider::replying("gemini", ENHANCED)]),
            config: Config::for_tests(),
            tracker: ImportTracker::new(store, Duration::from_secs(5)),
            suggestions: Arc::new(SuggestionTable::load(None).unwrap()),
        };
        (state, memory)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state();
        let app = build_router(state);
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "recipedeck");
        assert_eq!(body["ai_providers"], json!(["gemini"]));
    }

    #[tokio::test]
    async fn test_card_crud() {
        let (state, _) = test_state();
        let app = build_router(state);
        let user_id = Uuid::new_v4();

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/cards",
            Some(json!({"user_id": user_id, "card": {"name": "Draft an email"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, listed) = send(&app, "GET", &format!("/api/v1/cards?user_id={user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/v1/cards/{id}"),
            Some(json!({"name": "Draft a reply", "tips": ["Be brief"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Draft a reply");
        assert_eq!(updated["id"], created["id"]);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/cards/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "GET", &format!("/api/v1/cards/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_card_requires_name() {
        let (state, memory) = test_state();
        let app = build_router(state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/cards",
            Some(json!({"user_id": Uuid::new_v4(), "card": {"name": " "}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(memory.insert_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_save_reports_partial_success() {
        let (state, memory) = test_state();
        memory.reject_card_named("Broken");
        let app = build_router(state);

        let (status, report) = send(
            &app,
            "POST",
            "/api/v1/cards/bulk",
            Some(json!({
                "user_id": Uuid::new_v4(),
                "cards": [{"name": "One"}, {"name": "Broken"}, {"name": "Three"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["saved"].as_array().unwrap().len(), 2);
        assert_eq!(report["failed"][0]["name"], "Broken");
    }

    #[tokio::test]
    async fn test_suggest() {
        let (state, _) = test_state();
        let app = build_router(state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/collections/suggest",
            Some(json!({"name": "Research citations"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0]["name"], "Research & Discovery");
        assert!((body["suggestions"][0]["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_runs_to_completion() {
        let (state, memory) = test_state();
        let app = build_router(state);
        let user_id = Uuid::new_v4();

        let (status, job) = send(
            &app,
            "POST",
            "/api/v1/imports",
            Some(json!({
                "user_id": user_id,
                "name": "Starter pack",
                "cards": [{"name": "Summarize"}, {"name": "Translate"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(job["status"], "pending");
        assert_eq!(job["total_cards"], 2);
        let id = job["id"].as_str().unwrap().to_string();

        let mut latest = Value::Null;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let (_, body) = send(&app, "GET", &format!("/api/v1/imports/{id}"), None).await;
            latest = body;
            if latest["status"] == "completed" {
                break;
            }
        }
        assert_eq!(latest["status"], "completed");
        assert_eq!(latest["processed_cards"], 2);
        assert_eq!(latest["progress"], 1.0);
        assert_eq!(memory.card_names(), vec!["Summarize", "Translate"]);

        let (_, active) = send(&app, "GET", "/api/v1/imports/active", None).await;
        assert_eq!(active["active"], 0);
        assert_eq!(active["jobs"][0]["status"], "completed");

        let (_, listed) = send(&app, "GET", &format!("/api/v1/imports?user_id={user_id}"), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_active_imports_scoped_to_user() {
        let (state, _) = test_state();
        let mine = Uuid::new_v4();
        let job = ImportJob::new(mine, "Mine", vec![CardTemplate::named("a")]);
        state.tracker.track(job.clone()).await;
        state
            .tracker
            .track(ImportJob::new(Uuid::new_v4(), "Theirs", vec![CardTemplate::named("b")]))
            .await;
        let app = build_router(state);

        let (status, body) =
            send(&app, "GET", &format!("/api/v1/imports/active?user_id={mine}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], 1);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
        assert_eq!(body["jobs"][0]["id"], job.id.to_string());

        let (_, body) = send(&app, "GET", "/api/v1/imports/active", None).await;
        assert_eq!(body["active"], 2);
    }

    #[tokio::test]
    async fn test_import_limits() {
        let (state, _) = test_state();
        let app = build_router(state);
        let too_many: Vec<Value> = (0..101).map(|i| json!({"name": format!("card {i}")})).collect();

        for cards in [json!([]), Value::Array(too_many)] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/v1/imports",
                Some(json!({"user_id": Uuid::new_v4(), "name": "Batch", "cards": cards})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_parse_preview() {
        let (state, memory) = test_state();
        let app = build_router(state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/imports/parse",
            Some(json!({"text": r#"[{"name": "A"}, {"name": "B"}]"#})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert!(memory.card_names().is_empty());
    }

    #[tokio::test]
    async fn test_collection_export_reimports() {
        let (state, _) = test_state();
        let app = build_router(state);
        let user_id = Uuid::new_v4();

        let (_, collection) = send(
            &app,
            "POST",
            "/api/v1/collections",
            Some(json!({"user_id": user_id, "name": "Research", "description": "Papers"})),
        )
        .await;
        let collection_id = collection["id"].as_str().unwrap().to_string();

        for name in ["Find sources", "Summarize papers"] {
            let (_, card) = send(
                &app,
                "POST",
                "/api/v1/cards",
                Some(json!({"user_id": user_id, "card": {"name": name, "steps": ["Go"]}})),
            )
            .await;
            let (status, _) = send(
                &app,
                "POST",
                &format!("/api/v1/collections/{collection_id}/cards"),
                Some(json!({"card_id": card["id"]})),
            )
            .await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        let (status, detail) =
            send(&app, "GET", &format!("/api/v1/collections/{collection_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["cards"].as_array().unwrap().len(), 2);

        let (status, export) = send(
            &app,
            "GET",
            &format!("/api/v1/collections/{collection_id}/export"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<String> = parse_import_json(&export.to_string())
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Find sources", "Summarize papers"]);
    }

    #[tokio::test]
    async fn test_markdown_export_headers() {
        let (state, _) = test_state();
        let app = build_router(state);
        let user_id = Uuid::new_v4();
        send(
            &app,
            "POST",
            "/api/v1/cards",
            Some(json!({"user_id": user_id, "card": {"name": "Draft an email"}})),
        )
        .await;

        let request = Request::builder()
            .uri(format!("/api/v1/cards/export?user_id={user_id}&format=markdown"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/markdown; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"recipe-cards.md\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let markdown = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(markdown.contains("## Draft an email"));
    }
}
