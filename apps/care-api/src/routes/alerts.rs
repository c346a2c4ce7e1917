use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use common_db::models::{Alert, AlertFilters, AlertStatus, Page};

use crate::auth::Staff;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /alerts`
pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    Query(filters): Query<AlertFilters>,
) -> Result<Json<Page<Alert>>, ApiError> {
    Ok(Json(state.core.alerts.list_alerts(&filters).await?))
}

#[derive(Debug, Deserialize)]
pub struct AlertStatusRequest {
    pub status: AlertStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// `POST /alerts/:id/status`
pub async fn update_status(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(id): Path<i64>,
    Json(body): Json<AlertStatusRequest>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(
        state
            .core
            .alerts
            .update_alert_status(id, body.status, ctx.professional_id, body.resolved_at)
            .await?,
    ))
}
