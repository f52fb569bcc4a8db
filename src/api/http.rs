// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{
    ApiHandlers, ApiResponse, ApiResult, BackgroundSyncRequest, ConnectivityReport, QueueCount,
};
use crate::api::websocket::ws_handler;
use crate::connectivity::ConnectivityState;
use crate::push::{ClickAction, NotificationClick, PushDelivery};
use crate::queue::{ActionRequest, DeadAction, QueuedAction, SubmitOutcome, SyncResult};

pub struct HttpServer {
    handlers: Arc<ApiHandlers>,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(handlers: Arc<ApiHandlers>, addr: SocketAddr) -> Self {
        Self { handlers, addr }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/requests", post(submit_handler))
            .route("/api/queue", get(list_queue_handler))
            .route("/api/queue/count", get(queue_count_handler))
            .route("/api/queue/dead", get(list_dead_handler))
            .route("/api/queue/:id", delete(remove_action_handler))
            .route("/api/sync", post(sync_handler))
            .route("/api/background-sync", post(background_sync_handler))
            .route("/api/connectivity", get(connectivity_handler).post(report_connectivity_handler))
            .route("/api/push", post(push_handler))
            .route("/api/push/click", post(click_handler))
            .route("/api/push/subscription-change", post(subscription_change_handler))
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(&self.handlers))
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.router();

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn submit_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<ActionRequest>,
) -> ApiResult<SubmitOutcome> {
    handlers.submit_request(request).await
}

async fn list_queue_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Vec<QueuedAction>> {
    handlers.list_queue().await
}

async fn queue_count_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<QueueCount> {
    handlers.queue_count().await
}

async fn list_dead_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Vec<DeadAction>> {
    handlers.list_dead().await
}

async fn remove_action_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    handlers.remove_action(&id).await
}

async fn sync_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Option<SyncResult>> {
    handlers.trigger_sync().await
}

async fn background_sync_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<BackgroundSyncRequest>,
) -> Json<ApiResponse<()>> {
    handlers.request_background_sync(request)
}

async fn connectivity_handler(State(handlers): State<Arc<ApiHandlers>>) -> Json<ApiResponse<ConnectivityState>> {
    handlers.connectivity()
}

async fn report_connectivity_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(report): Json<ConnectivityReport>,
) -> Json<ApiResponse<ConnectivityState>> {
    handlers.report_connectivity(report)
}

async fn push_handler(State(handlers): State<Arc<ApiHandlers>>, body: Bytes) -> ApiResult<PushDelivery> {
    handlers.push(&body)
}

async fn click_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(click): Json<NotificationClick>,
) -> ApiResult<ClickAction> {
    handlers.notification_click(click)
}

async fn subscription_change_handler(State(handlers): State<Arc<ApiHandlers>>) -> Json<ApiResponse<()>> {
    handlers.subscription_change()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::{AgentEvent, EventHub};
    use crate::connectivity::ConnectivityMonitor;
    use crate::push::PushHandler;
    use crate::queue::{OfflineQueue, RetryPolicy};
    use crate::sync::{BackgroundSync, SyncCoordinator};
    use crate::test_helpers::{self, ScriptedReplayer};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    struct TestApp {
        base: String,
        monitor: Arc<ConnectivityMonitor>,
        hub: Arc<EventHub>,
        replayer: Arc<ScriptedReplayer>,
        client: reqwest::Client,
        task: tokio::task::JoinHandle<()>,
        _dir: TempDir,
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            self.task.abort();
        }
    }

    async fn spawn_app(replayer: Arc<ScriptedReplayer>) -> TestApp {
        let config = test_helpers::create_test_config();
        let (store, dir) = test_helpers::setup_test_queue_store().await;
        let background = Arc::new(BackgroundSync::new(true));
        let queue = Arc::new(OfflineQueue::new(
            Arc::new(store),
            replayer.clone(),
            Arc::clone(&background),
            Url::parse(&config.backend_api_url).unwrap(),
            RetryPolicy::default(),
        ));
        let hub = Arc::new(EventHub::new());
        let monitor = Arc::new(ConnectivityMonitor::new());
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&queue),
            hub.clone(),
            background,
            Duration::ZERO,
        ));
        let push = Arc::new(PushHandler::new(hub.clone(), Url::parse(&config.app_origin).unwrap()));
        let handlers = Arc::new(ApiHandlers::new(
            queue,
            coordinator,
            Arc::clone(&monitor),
            push,
            Arc::clone(&hub),
        ));

        let app = HttpServer::new(handlers, config.local_api_bind).router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            base,
            monitor,
            hub,
            replayer,
            client: reqwest::Client::new(),
            task,
            _dir: dir,
        }
    }

    impl TestApp {
        async fn get(&self, path: &str) -> (u16, Value) {
            let response = self.client.get(format!("{}{}", self.base, path)).send().await.unwrap();
            (response.status().as_u16(), response.json().await.unwrap())
        }

        async fn post(&self, path: &str, body: Value) -> (u16, Value) {
            let response = self
                .client
                .post(format!("{}{}", self.base, path))
                .json(&body)
                .send()
                .await
                .unwrap();
            (response.status().as_u16(), response.json().await.unwrap())
        }
    }

    fn log_dose() -> Value {
        json!({
            "method": "POST",
            "url": "https://api.example.com/rest/v1/medication_logs",
            "headers": {"Authorization": "Bearer t"},
            "body": "{\"medication_id\":7}"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        let (status, body) = app.get("/health").await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"success": true, "data": "ok", "error": null}));
    }

    #[tokio::test]
    async fn test_offline_submit_queues_then_manual_sync_drains() {
        let app = spawn_app(ScriptedReplayer::always(201)).await;

        let (_, state) = app.post("/api/connectivity", json!({"online": false})).await;
        assert_eq!(state["data"]["is_online"], false);

        let (status, body) = app.post("/api/requests", log_dose()).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["outcome"], "queued");
        assert!(app.replayer.calls().is_empty());

        let (_, count) = app.get("/api/queue/count").await;
        assert_eq!(count["data"]["pending"], 1);

        let (status, _) = app.post("/api/sync", json!({})).await;
        assert_eq!(status, 503);

        app.monitor.report(true);
        let (status, body) = app.post("/api/sync", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"], json!({"success": 1, "failed": 0}));

        let (_, queue) = app.get("/api/queue").await;
        assert_eq!(queue["data"], json!([]));
    }

    #[tokio::test]
    async fn test_online_submit_is_delivered() {
        let app = spawn_app(ScriptedReplayer::always(201)).await;
        let (_, body) = app.post("/api/requests", log_dose()).await;
        assert_eq!(body["data"]["outcome"], "delivered");
        assert_eq!(body["data"]["status"], 201);
    }

    #[tokio::test]
    async fn test_submit_to_foreign_origin_is_rejected() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        let mut request = log_dose();
        request["url"] = json!("https://elsewhere.example.org/steal");

        let (status, body) = app.post("/api/requests", request).await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("origin"));
    }

    #[tokio::test]
    async fn test_remove_queued_action() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        app.monitor.report(false);
        let (_, body) = app.post("/api/requests", log_dose()).await;
        let id = body["data"]["action_id"].as_str().unwrap().to_string();

        let url = format!("{}/api/queue/{}", app.base, id);
        let response = app.client.delete(&url).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let response = app.client.delete(&url).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_push_and_click() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        let mut events = app.hub.subscribe();

        let response = app
            .client
            .post(format!("{}/api/push", app.base))
            .body(r#"{"title":"Dose due","body":"Take Metformin 500mg"}"#)
            .send()
            .await
            .unwrap();
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["data"]["displayed"], true);
        assert_eq!(body["data"]["notification"]["tag"], "medication-reminder");
        assert!(matches!(events.recv().await.unwrap(), AgentEvent::Notification(_)));

        let (_, body) = app.post("/api/push/click", json!({"tag": "medication-reminder"})).await;
        assert_eq!(body["data"]["action"], "open_window");
        assert_eq!(body["data"]["url"], "https://app.example.com/dashboard");
    }

    #[tokio::test]
    async fn test_malformed_push_is_bad_request() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        let response = app
            .client
            .post(format!("{}/api/push", app.base))
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_background_sync_registration() {
        let app = spawn_app(ScriptedReplayer::always(200)).await;
        let (status, body) = app.post("/api/background-sync", json!({"tag": "sync-medication-logs"})).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
    }
}
