//! Care Core - Regras do núcleo de cuidado da clínica
//!
//! Três engines independentes sobre contratos injetados:
//! - [`PatientAuthEngine`]: login do paciente por CPF + PIN com bloqueio
//! - [`AppointmentEngine`]: agendamentos sem conflito de horário
//! - [`OccurrenceEngine`]: relatos de sintomas e escalonamento para alertas
//!
//! [`CareCore::sqlite`] monta tudo sobre um pool SQLite de `common-db`.

use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;
use zeroize::Zeroizing;

pub mod alerts;
pub mod appointments;
pub mod audit;
pub mod auth;
pub mod clock;
pub mod error;
pub mod escalation;
pub mod occurrences;
pub mod ports;
pub mod sqlite;

pub use alerts::AlertService;
pub use appointments::{AppointmentEngine, NewAppointment};
pub use audit::{AuditAction, AuditRecord, ProfessionalContext, RequestMeta};
pub use auth::{PatientAuthEngine, PatientLogin};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use occurrences::{NewOccurrence, OccurrenceEngine, RecordedOccurrence};

use common_db::repository::{
    AlertStore, AppointmentStore, AuditStore, OccurrenceStore, PatientStore, SessionStore,
};
use sqlite::{AuditRecorder, SqliteSessionIssuer};

/// Configuração das sessões de paciente
#[derive(Clone)]
pub struct SessionSettings {
    /// Segredo do HMAC dos tokens
    pub secret: Zeroizing<Vec<u8>>,
    pub ttl: Duration,
}

/// Engines prontos para uso, compartilhando relógio e auditoria
pub struct CareCore {
    pub auth: PatientAuthEngine,
    pub appointments: AppointmentEngine,
    pub occurrences: OccurrenceEngine,
    pub alerts: AlertService,
}

impl CareCore {
    pub fn sqlite(pool: SqlitePool, sessions: &SessionSettings, clock: Arc<dyn Clock>) -> Self {
        let audit = Arc::new(AuditRecorder::new(AuditStore::new(pool.clone()), clock.clone()));
        let alerts = Arc::new(AlertStore::new(pool.clone()));
        let issuer = Arc::new(SqliteSessionIssuer::new(
            SessionStore::new(pool.clone()),
            &sessions.secret,
            sessions.ttl,
            clock.clone(),
        ));

        Self {
            auth: PatientAuthEngine::new(
                Arc::new(PatientStore::new(pool.clone())),
                issuer,
                audit.clone(),
                clock.clone(),
            ),
            appointments: AppointmentEngine::new(
                Arc::new(AppointmentStore::new(pool.clone())),
                audit.clone(),
                clock.clone(),
            ),
            occurrences: OccurrenceEngine::new(
                Arc::new(OccurrenceStore::new(pool)),
                alerts.clone(),
                audit.clone(),
                clock.clone(),
            ),
            alerts: AlertService::new(alerts, audit, clock),
        }
    }
}
