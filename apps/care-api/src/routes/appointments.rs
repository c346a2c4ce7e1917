//! Agenda da equipe

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use care_core::NewAppointment;
use common_db::models::{
    Appointment, AppointmentFilters, AppointmentPatch, AppointmentStatus, AppointmentType, Page,
};

use crate::auth::Staff;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /appointments`
pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    Query(filters): Query<AppointmentFilters>,
) -> Result<Json<Page<Appointment>>, ApiError> {
    Ok(Json(state.core.appointments.list_appointments(&filters).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub patient_id: i64,
    /// Padrão: o profissional autenticado
    pub professional_id: Option<i64>,
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// `POST /appointments`
pub async fn create(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    body.validate()?;
    let appointment = state
        .core
        .appointments
        .create_appointment(
            NewAppointment {
                patient_id: body.patient_id,
                professional_id: body.professional_id.unwrap_or(ctx.professional_id),
                starts_at: body.starts_at,
                appointment_type: body.appointment_type,
                notes: body.notes,
            },
            &ctx,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `PATCH /appointments/:id`
pub async fn update(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(
        state
            .core
            .appointments
            .update_appointment(id, patch, &ctx)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// `POST /appointments/:id/cancel`; corpo opcional
pub async fn cancel(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Appointment>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    body.validate()?;
    Ok(Json(
        state
            .core
            .appointments
            .cancel_appointment(id, &ctx, body.reason.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// `POST /appointments/:id/status`
pub async fn update_status(
    State(state): State<AppState>,
    Staff(ctx): Staff,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Appointment>, ApiError> {
    body.validate()?;
    Ok(Json(
        state
            .core
            .appointments
            .update_appointment_status(id, body.status, &ctx, body.notes.as_deref())
            .await?,
    ))
}
