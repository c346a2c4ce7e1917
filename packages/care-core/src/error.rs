//! Erros de regra de negócio do núcleo
//!
//! As violações de regra têm nomes estáveis (`code`) que a camada de
//! transporte traduz para seus próprios status. Falhas de colaboradores
//! (store, auditoria) são propagadas sem alteração.

use chrono::{DateTime, Utc};
use common_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Paciente não encontrado")]
    PatientNotFound,

    #[error("PIN inválido ({attempts} tentativa(s) com falha)")]
    InvalidPin { attempts: i64 },

    #[error("PIN bloqueado até {blocked_until}")]
    PatientPinBlocked { blocked_until: DateTime<Utc> },

    #[error("Agendamento {0} não encontrado")]
    AppointmentNotFound(i64),

    #[error("Profissional {professional_id} já possui agendamento em {starts_at}")]
    AppointmentConflict {
        professional_id: i64,
        starts_at: DateTime<Utc>,
    },

    #[error("Alerta {0} não encontrado")]
    AlertNotFound(i64),

    #[error("Sessão inválida ou expirada")]
    SessionInvalid,

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl CoreError {
    /// Nome estável do erro, exposto aos chamadores
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::PatientNotFound => "PATIENT_NOT_FOUND",
            CoreError::InvalidPin { .. } => "INVALID_PIN",
            CoreError::PatientPinBlocked { .. } => "PATIENT_PIN_BLOCKED",
            CoreError::AppointmentNotFound(_) => "APPOINTMENT_NOT_FOUND",
            CoreError::AppointmentConflict { .. } => "APPOINTMENT_CONFLICT",
            CoreError::AlertNotFound(_) => "ALERT_NOT_FOUND",
            CoreError::SessionInvalid => "SESSION_INVALID",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::Store(_) => "STORE_FAILURE",
        }
    }

    /// Violação de regra de negócio (e não falha de infraestrutura)
    pub fn is_domain(&self) -> bool {
        !matches!(self, CoreError::Store(_))
    }
}
