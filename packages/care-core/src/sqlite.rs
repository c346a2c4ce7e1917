//! Implementações dos contratos sobre os repositórios SQLite de `common-db`

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

use common_db::crypto::{generate_session_token, hash_session_token};
use common_db::models::{
    Alert, AlertFilters, AlertResolution, Appointment, AppointmentFilters, AppointmentPatch,
    AppointmentStatus, ConflictQuery, CreateAlert, CreateAppointment, CreateAuditEntry,
    CreateOccurrence, CreateSession, Occurrence, OccurrenceFilters, Page, Patient,
};
use common_db::repository::{
    AlertStore, AppointmentStore, AuditStore, OccurrenceStore, PatientStore, SessionStore,
};
use common_db::DbError;

use crate::audit::{AuditRecord, RequestMeta};
use crate::clock::Clock;
use crate::ports::{
    AlertPort, AppointmentRepository, AuditPort, IssuedSession, OccurrenceRepository,
    PatientAuthRepository, SessionIssuer,
};

#[async_trait]
impl PatientAuthRepository for PatientStore {
    async fn find_by_identifier(&self, cpf: &str) -> Result<Option<Patient>, DbError> {
        self.find_by_cpf(cpf).await
    }

    async fn find_by_id(&self, patient_id: i64) -> Result<Option<Patient>, DbError> {
        PatientStore::find_by_id(self, patient_id).await
    }

    async fn reset_auth_state(&self, patient_id: i64) -> Result<(), DbError> {
        PatientStore::reset_auth_state(self, patient_id).await
    }

    async fn record_failed_attempt(
        &self,
        patient_id: i64,
        attempts: i64,
        blocked_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        PatientStore::record_failed_attempt(self, patient_id, attempts, blocked_until).await
    }

    async fn set_pin_hash(&self, patient_id: i64, pin_hash: &str) -> Result<(), DbError> {
        PatientStore::set_pin_hash(self, patient_id, pin_hash).await
    }
}

#[async_trait]
impl AppointmentRepository for AppointmentStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, DbError> {
        AppointmentStore::find_by_id(self, id).await
    }

    async fn list(&self, filters: &AppointmentFilters) -> Result<Page<Appointment>, DbError> {
        AppointmentStore::list(self, filters).await
    }

    async fn create(&self, input: &CreateAppointment) -> Result<Appointment, DbError> {
        AppointmentStore::create(self, input).await
    }

    async fn update(
        &self,
        id: i64,
        patch: &AppointmentPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError> {
        AppointmentStore::update(self, id, patch, updated_at).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError> {
        AppointmentStore::update_status(self, id, status, notes.as_deref(), updated_at).await
    }

    async fn has_conflict(&self, query: &ConflictQuery) -> Result<bool, DbError> {
        AppointmentStore::has_conflict(self, query).await
    }
}

#[async_trait]
impl OccurrenceRepository for OccurrenceStore {
    async fn create(&self, input: &CreateOccurrence) -> Result<Occurrence, DbError> {
        OccurrenceStore::create(self, input).await
    }

    async fn list_by_patient(
        &self,
        patient_id: i64,
        filters: &OccurrenceFilters,
    ) -> Result<Vec<Occurrence>, DbError> {
        OccurrenceStore::list_by_patient(self, patient_id, filters).await
    }
}

#[async_trait]
impl AlertPort for AlertStore {
    async fn create(&self, input: &CreateAlert) -> Result<Alert, DbError> {
        AlertStore::create(self, input).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Alert>, DbError> {
        AlertStore::find_by_id(self, id).await
    }

    async fn list(&self, filters: &AlertFilters) -> Result<Page<Alert>, DbError> {
        AlertStore::list(self, filters).await
    }

    async fn update_status(&self, id: i64, resolution: &AlertResolution) -> Result<Alert, DbError> {
        AlertStore::update_status(self, id, resolution).await
    }
}

/// Grava registros de auditoria com o horário do relógio injetado
pub struct AuditRecorder {
    store: AuditStore,
    clock: Arc<dyn Clock>,
}

impl AuditRecorder {
    pub fn new(store: AuditStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl AuditPort for AuditRecorder {
    async fn record(&self, record: AuditRecord) -> Result<(), DbError> {
        let entry = CreateAuditEntry {
            action: record.action.as_str().to_string(),
            entity_type: record.entity_type().to_string(),
            entity_id: record.entity_id,
            details: record.details,
            actor_id: record.actor_id,
            created_at: self.clock.now(),
        };
        let id = self.store.insert(&entry).await?;
        debug!(audit_id = id, action = %entry.action, entity_id = entry.entity_id, "Auditoria gravada");
        Ok(())
    }
}

/// Sessões opacas: o token só existe no cliente, o banco guarda o HMAC
pub struct SqliteSessionIssuer {
    store: SessionStore,
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SqliteSessionIssuer {
    pub fn new(store: SessionStore, secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            secret: Zeroizing::new(secret.to_vec()),
            ttl,
            clock,
        }
    }

    fn token_hash(&self, token: &str) -> Result<String, DbError> {
        hash_session_token(token, &self.secret)
    }
}

#[async_trait]
impl SessionIssuer for SqliteSessionIssuer {
    async fn create(&self, patient_id: i64, meta: &RequestMeta) -> Result<IssuedSession, DbError> {
        let token = generate_session_token();
        let now = self.clock.now();
        let session = self
            .store
            .create(&CreateSession {
                patient_id,
                token_hash: self.token_hash(&token)?,
                expires_at: now + self.ttl,
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
                created_at: now,
            })
            .await?;

        Ok(IssuedSession {
            token: token.to_string(),
            expires_at: session.expires_at,
        })
    }

    async fn resolve(&self, token: &str) -> Result<Option<i64>, DbError> {
        let session = self.store.find_by_token_hash(&self.token_hash(token)?).await?;
        let now = self.clock.now();
        Ok(session
            .filter(|session| session.is_active(now))
            .map(|session| session.patient_id))
    }

    async fn revoke(&self, token: &str) -> Result<Option<i64>, DbError> {
        let revoked = self
            .store
            .revoke(&self.token_hash(token)?, self.clock.now())
            .await?;
        Ok(revoked.map(|session| session.patient_id))
    }
}
