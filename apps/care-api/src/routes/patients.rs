//! Ocorrências e PIN do paciente, pela equipe

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use care_core::{NewOccurrence, RecordedOccurrence};
use common_db::models::{Occurrence, OccurrenceFilters, OccurrenceSource};

use crate::auth::Staff;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /patients/:id/occurrences`
pub async fn occurrences(
    State(state): State<AppState>,
    _staff: Staff,
    Path(patient_id): Path<i64>,
    Query(filters): Query<OccurrenceFilters>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
    Ok(Json(
        state
            .core
            .occurrences
            .list_patient_occurrences(patient_id, &filters)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct OccurrenceRequest {
    #[validate(length(min = 1, max = 120))]
    pub kind: String,
    #[validate(range(min = 0, max = 10))]
    pub intensity: i32,
    #[serde(default = "professional_source")]
    pub source: OccurrenceSource,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn professional_source() -> OccurrenceSource {
    OccurrenceSource::Professional
}

/// `POST /patients/:id/occurrences`
pub async fn record_occurrence(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(patient_id): Path<i64>,
    Json(body): Json<OccurrenceRequest>,
) -> Result<(StatusCode, Json<RecordedOccurrence>), ApiError> {
    body.validate()?;
    let recorded = state
        .core
        .occurrences
        .create_occurrence(
            patient_id,
            NewOccurrence {
                kind: body.kind,
                intensity: body.intensity,
                source: body.source,
                notes: body.notes,
            },
            &ctx,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

#[derive(Deserialize)]
pub struct PinRequest {
    pub pin: String,
}

/// `PUT /patients/:id/pin`
pub async fn set_pin(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(patient_id): Path<i64>,
    Json(body): Json<PinRequest>,
) -> Result<StatusCode, ApiError> {
    state.core.auth.set_pin(patient_id, &body.pin, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
