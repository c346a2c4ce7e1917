//! Contratos dos colaboradores externos do núcleo
//!
//! Os engines dependem apenas destes traits; as implementações SQLite ficam
//! em [`crate::sqlite`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use common_db::models::{
    Alert, AlertFilters, AlertResolution, Appointment, AppointmentFilters, AppointmentPatch,
    AppointmentStatus, ConflictQuery, CreateAlert, CreateAppointment, CreateOccurrence,
    Occurrence, OccurrenceFilters, Page, Patient,
};
use common_db::DbError;

use crate::audit::{AuditRecord, RequestMeta};

/// Gravador de auditoria (somente inserção)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuditPort: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), DbError>;
}

/// Store de pacientes, visto pelo engine de autenticação
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PatientAuthRepository: Send + Sync {
    async fn find_by_identifier(&self, cpf: &str) -> Result<Option<Patient>, DbError>;

    async fn find_by_id(&self, patient_id: i64) -> Result<Option<Patient>, DbError>;

    async fn reset_auth_state(&self, patient_id: i64) -> Result<(), DbError>;

    async fn record_failed_attempt(
        &self,
        patient_id: i64,
        attempts: i64,
        blocked_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>;

    async fn set_pin_hash(&self, patient_id: i64, pin_hash: &str) -> Result<(), DbError>;
}

/// Sessão emitida para o paciente; o formato do token é opaco
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Emissor de sessões de paciente
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn create(&self, patient_id: i64, meta: &RequestMeta) -> Result<IssuedSession, DbError>;

    /// Paciente dono de uma sessão ativa
    async fn resolve(&self, token: &str) -> Result<Option<i64>, DbError>;

    /// Revoga a sessão; retorna o paciente se ela ainda estava ativa
    async fn revoke(&self, token: &str) -> Result<Option<i64>, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, DbError>;

    async fn list(&self, filters: &AppointmentFilters) -> Result<Page<Appointment>, DbError>;

    async fn create(&self, input: &CreateAppointment) -> Result<Appointment, DbError>;

    async fn update(
        &self,
        id: i64,
        patch: &AppointmentPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError>;

    /// `notes = None` preserva as observações atuais
    async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError>;

    async fn has_conflict(&self, query: &ConflictQuery) -> Result<bool, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OccurrenceRepository: Send + Sync {
    async fn create(&self, input: &CreateOccurrence) -> Result<Occurrence, DbError>;

    async fn list_by_patient(
        &self,
        patient_id: i64,
        filters: &OccurrenceFilters,
    ) -> Result<Vec<Occurrence>, DbError>;
}

/// Destino dos alertas gerados e suas transições
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertPort: Send + Sync {
    async fn create(&self, input: &CreateAlert) -> Result<Alert, DbError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Alert>, DbError>;

    async fn list(&self, filters: &AlertFilters) -> Result<Page<Alert>, DbError>;

    async fn update_status(&self, id: i64, resolution: &AlertResolution)
        -> Result<Alert, DbError>;
}
