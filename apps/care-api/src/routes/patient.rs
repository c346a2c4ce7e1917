//! Rotas do aplicativo do paciente

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use care_core::{NewOccurrence, ProfessionalContext, RecordedOccurrence};
use common_db::models::{Appointment, AppointmentStatus, OccurrenceSource};

use crate::auth::{BearerToken, ClientMeta, PatientSession};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 11, max = 14))]
    pub cpf: String,
    #[validate(length(min = 4, max = 6))]
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub patient: PatientSummary,
}

/// `POST /patient/login`
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    body.validate()?;
    let login = state
        .core
        .auth
        .login_with_pin(&body.cpf, &body.pin, &meta)
        .await?;

    Ok(Json(LoginResponse {
        token: login.token,
        expires_at: login.expires_at,
        patient: PatientSummary {
            id: login.patient.id,
            name: login.patient.name,
        },
    }))
}

/// `POST /patient/logout`
pub async fn logout(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, ApiError> {
    state.core.auth.logout(&token, &meta).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    #[serde(default = "default_upcoming")]
    pub upcoming: bool,
}

fn default_upcoming() -> bool {
    true
}

/// `GET /patient/appointments`
pub async fn appointments(
    State(state): State<AppState>,
    session: PatientSession,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let agenda = state
        .core
        .appointments
        .list_patient_appointments(session.patient_id, query.upcoming)
        .await?;
    Ok(Json(agenda))
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub status: AppointmentStatus,
}

/// `POST /patient/appointments/:id/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    session: PatientSession,
    Path(id): Path<i64>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let status = state
        .core
        .appointments
        .confirm_attendance(id, session.patient_id)
        .await?;
    Ok(Json(ConfirmResponse { status }))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DeclineRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// `POST /patient/appointments/:id/decline`; corpo opcional
pub async fn decline(
    State(state): State<AppState>,
    session: PatientSession,
    Path(id): Path<i64>,
    body: Option<Json<DeclineRequest>>,
) -> Result<Json<Appointment>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    body.validate()?;
    let appointment = state
        .core
        .appointments
        .decline_appointment(id, session.patient_id, body.reason.as_deref())
        .await?;
    Ok(Json(appointment))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SymptomRequest {
    #[validate(length(min = 1, max = 120))]
    pub kind: String,
    #[validate(range(min = 0, max = 10))]
    pub intensity: i32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// `POST /patient/symptoms`: registrado em nome do profissional responsável
pub async fn report_symptom(
    State(state): State<AppState>,
    session: PatientSession,
    Json(body): Json<SymptomRequest>,
) -> Result<(StatusCode, Json<RecordedOccurrence>), ApiError> {
    body.validate()?;
    let patient = state.core.auth.patient(session.patient_id).await?;
    let professional_id = patient.professional_id.ok_or_else(|| {
        ApiError::Validation("Paciente sem profissional responsável".to_string())
    })?;

    let recorded = state
        .core
        .occurrences
        .create_occurrence(
            patient.id,
            NewOccurrence {
                kind: body.kind,
                intensity: body.intensity,
                source: OccurrenceSource::Patient,
                notes: body.notes,
            },
            &ProfessionalContext::new(professional_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
