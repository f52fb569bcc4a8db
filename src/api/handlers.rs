// SPDX-License-Identifier: GPL-3.0-only
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::events::EventHub;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::push::{ClickAction, NotificationClick, PushDelivery, PushError, PushHandler};
use crate::queue::{ActionRequest, DeadAction, OfflineQueue, QueueError, QueuedAction, SubmitOutcome, SyncResult};
use crate::sync::SyncCoordinator;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackgroundSyncRequest {
    pub tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub online: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueCount {
    pub pending: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

fn queue_failure(e: QueueError) -> ApiError {
    match e {
        QueueError::InvalidAction(reason) => failure(StatusCode::BAD_REQUEST, reason),
        e => {
            error!(error = %e, "Queue storage failure");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "queue storage failure")
        }
    }
}

pub struct ApiHandlers {
    queue: Arc<OfflineQueue>,
    coordinator: Arc<SyncCoordinator>,
    monitor: Arc<ConnectivityMonitor>,
    push: Arc<PushHandler>,
    hub: Arc<EventHub>,
}

impl ApiHandlers {
    pub fn new(
        queue: Arc<OfflineQueue>,
        coordinator: Arc<SyncCoordinator>,
        monitor: Arc<ConnectivityMonitor>,
        push: Arc<PushHandler>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            queue,
            coordinator,
            monitor,
            push,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    pub async fn submit_request(&self, request: ActionRequest) -> ApiResult<SubmitOutcome> {
        let online = self.monitor.current().is_online;
        let outcome = self
            .queue
            .submit(QueuedAction::from(request), online)
            .await
            .map_err(queue_failure)?;
        Ok(Json(ApiResponse::success(outcome)))
    }

    pub async fn list_queue(&self) -> ApiResult<Vec<QueuedAction>> {
        let actions = self.queue.list_pending().await.map_err(queue_failure)?;
        Ok(Json(ApiResponse::success(actions)))
    }

    pub async fn queue_count(&self) -> ApiResult<QueueCount> {
        let pending = self.queue.pending_count().await.map_err(queue_failure)?;
        Ok(Json(ApiResponse::success(QueueCount { pending })))
    }

    pub async fn list_dead(&self) -> ApiResult<Vec<DeadAction>> {
        let actions = self.queue.list_dead().await.map_err(queue_failure)?;
        Ok(Json(ApiResponse::success(actions)))
    }

    pub async fn remove_action(&self, id: &str) -> ApiResult<()> {
        if self.queue.remove(id).await.map_err(queue_failure)? {
            info!(action_id = %id, "Queued action discarded");
            Ok(Json(ApiResponse::success(())))
        } else {
            Err(failure(StatusCode::NOT_FOUND, format!("no queued action {}", id)))
        }
    }

    /// Run a sync now. `None` means there was nothing to do or a sync was
    /// already running.
    pub async fn trigger_sync(&self) -> ApiResult<Option<SyncResult>> {
        if !self.monitor.current().is_online {
            return Err(failure(StatusCode::SERVICE_UNAVAILABLE, "offline"));
        }
        let result = self.coordinator.sync_once().await.map_err(queue_failure)?;
        Ok(Json(ApiResponse::success(result)))
    }

    pub fn request_background_sync(&self, request: BackgroundSyncRequest) -> Json<ApiResponse<()>> {
        self.queue.request_background_sync(&request.tag);
        Json(ApiResponse::success(()))
    }

    pub fn connectivity(&self) -> Json<ApiResponse<ConnectivityState>> {
        Json(ApiResponse::success(self.monitor.current()))
    }

    pub fn report_connectivity(&self, report: ConnectivityReport) -> Json<ApiResponse<ConnectivityState>> {
        self.monitor.report(report.online);
        Json(ApiResponse::success(self.monitor.current()))
    }

    pub fn push(&self, data: &[u8]) -> ApiResult<PushDelivery> {
        let data = if data.is_empty() { None } else { Some(data) };
        match self.push.handle_push(data) {
            Ok(delivery) => Ok(Json(ApiResponse::success(delivery))),
            Err(e) => Err(failure(StatusCode::BAD_REQUEST, e.to_string())),
        }
    }

    pub fn notification_click(&self, click: NotificationClick) -> ApiResult<ClickAction> {
        match self.push.handle_click(&click) {
            Ok(action) => Ok(Json(ApiResponse::success(action))),
            Err(e @ PushError::Platform(_)) => {
                warn!(error = %e, "Notification click could not be routed");
                Err(failure(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
            }
            Err(e) => Err(failure(StatusCode::BAD_REQUEST, e.to_string())),
        }
    }

    pub fn subscription_change(&self) -> Json<ApiResponse<()>> {
        self.push.handle_subscription_change();
        Json(ApiResponse::success(()))
    }
}
