//! Autenticação do paciente por CPF + PIN
//!
//! Três falhas consecutivas bloqueiam o PIN por 15 minutos. O bloqueio não é
//! um estado persistido: é derivado de `pin_blocked_until` no momento de cada
//! tentativa. Um bloqueio vencido zera o contador antes da nova avaliação.
//!
//! O contador é lido e regravado (sem incremento atômico); tentativas
//! concorrentes contra o mesmo paciente podem subcontar falhas.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

use common_db::crypto;
use common_db::models::Patient;

use crate::audit::{AuditAction, AuditRecord, ProfessionalContext, RequestMeta};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::ports::{AuditPort, PatientAuthRepository, SessionIssuer};

/// Falhas consecutivas que disparam o bloqueio
pub const MAX_ATTEMPTS: i64 = 3;
/// Duração do bloqueio
pub const BLOCK_MINUTES: i64 = 15;

/// Resultado de um login bem-sucedido
#[derive(Debug, Clone, Serialize)]
pub struct PatientLogin {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub patient: Patient,
}

/// Mantém apenas os dígitos do CPF
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(char::is_ascii_digit).collect()
}

/// PIN numérico de 4 a 6 dígitos
pub fn is_valid_pin(pin: &str) -> bool {
    (4..=6).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

pub struct PatientAuthEngine {
    patients: Arc<dyn PatientAuthRepository>,
    sessions: Arc<dyn SessionIssuer>,
    audit: Arc<dyn AuditPort>,
    clock: Arc<dyn Clock>,
}

impl PatientAuthEngine {
    pub fn new(
        patients: Arc<dyn PatientAuthRepository>,
        sessions: Arc<dyn SessionIssuer>,
        audit: Arc<dyn AuditPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            patients,
            sessions,
            audit,
            clock,
        }
    }

    pub async fn login_with_pin(
        &self,
        cpf: &str,
        pin: &str,
        meta: &RequestMeta,
    ) -> Result<PatientLogin, CoreError> {
        let pin = Zeroizing::new(pin.to_string());
        let patient = self
            .patients
            .find_by_identifier(&normalize_cpf(cpf))
            .await?
            .ok_or(CoreError::PatientNotFound)?;

        let now = self.clock.now();
        if let Some(blocked_until) = patient.pin_blocked_until.filter(|until| *until > now) {
            warn!(patient_id = patient.id, %blocked_until, "Tentativa de login com PIN bloqueado");
            return Err(CoreError::PatientPinBlocked { blocked_until });
        }

        let previous_attempts = if patient.pin_blocked_until.is_some() {
            0
        } else {
            patient.pin_attempts
        };

        let pin_matches = match patient.pin_hash.as_deref() {
            Some(hash) => crypto::verify_pin(&pin, hash)?,
            None => false,
        };

        if !pin_matches {
            return Err(self
                .register_failure(&patient, previous_attempts, now, meta)
                .await?);
        }

        self.patients.reset_auth_state(patient.id).await?;
        let session = self.sessions.create(patient.id, meta).await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::PatientSessionCreated, patient.id).details(json!({
                    "expiresAt": session.expires_at,
                    "ip": meta.ip,
                    "userAgent": meta.user_agent,
                })),
            )
            .await?;

        info!(patient_id = patient.id, "Sessão de paciente criada");
        Ok(PatientLogin {
            token: session.token,
            expires_at: session.expires_at,
            patient: Patient {
                pin_attempts: 0,
                pin_blocked_until: None,
                ..patient
            },
        })
    }

    /// Grava a falha e devolve o erro a ser retornado ao chamador
    async fn register_failure(
        &self,
        patient: &Patient,
        previous_attempts: i64,
        now: DateTime<Utc>,
        meta: &RequestMeta,
    ) -> Result<CoreError, CoreError> {
        let attempts = previous_attempts + 1;
        let blocked_until = if attempts >= MAX_ATTEMPTS {
            Some(now + Duration::minutes(BLOCK_MINUTES))
        } else {
            None
        };

        self.patients
            .record_failed_attempt(patient.id, attempts, blocked_until)
            .await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::PatientPinFailed, patient.id).details(json!({
                    "attempts": attempts,
                    "blockedUntil": blocked_until,
                    "ip": meta.ip,
                    "userAgent": meta.user_agent,
                })),
            )
            .await?;

        Ok(match blocked_until {
            Some(blocked_until) => {
                warn!(patient_id = patient.id, attempts, %blocked_until, "PIN bloqueado por excesso de tentativas");
                CoreError::PatientPinBlocked { blocked_until }
            }
            None => {
                warn!(patient_id = patient.id, attempts, "PIN inválido");
                CoreError::InvalidPin { attempts }
            }
        })
    }

    /// Paciente dono de uma sessão ativa
    pub async fn authenticate(&self, token: &str) -> Result<i64, CoreError> {
        self.sessions
            .resolve(token)
            .await?
            .ok_or(CoreError::SessionInvalid)
    }

    pub async fn patient(&self, patient_id: i64) -> Result<Patient, CoreError> {
        self.patients
            .find_by_id(patient_id)
            .await?
            .ok_or(CoreError::PatientNotFound)
    }

    /// Revoga a sessão; a auditoria do logout é best-effort
    pub async fn logout(&self, token: &str, meta: &RequestMeta) -> Result<(), CoreError> {
        let Some(patient_id) = self.sessions.revoke(token).await? else {
            return Ok(());
        };

        let record = AuditRecord::new(AuditAction::PatientSessionRevoked, patient_id).details(
            json!({
                "ip": meta.ip,
                "userAgent": meta.user_agent,
            }),
        );
        if let Err(e) = self.audit.record(record).await {
            warn!(patient_id, error = %e, "Falha ao auditar logout do paciente");
        }

        info!(patient_id, "Sessão de paciente encerrada");
        Ok(())
    }

    /// Define (ou redefine) o PIN do paciente e libera o bloqueio
    pub async fn set_pin(
        &self,
        patient_id: i64,
        pin: &str,
        ctx: &ProfessionalContext,
    ) -> Result<(), CoreError> {
        let pin = Zeroizing::new(pin.to_string());
        if !is_valid_pin(&pin) {
            return Err(CoreError::InvalidInput(
                "PIN deve ter de 4 a 6 dígitos".to_string(),
            ));
        }

        self.patients
            .find_by_id(patient_id)
            .await?
            .ok_or(CoreError::PatientNotFound)?;

        let hash = crypto::hash_pin(&pin)?;
        self.patients.set_pin_hash(patient_id, &hash).await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::PatientPinUpdated, patient_id)
                    .actor(ctx.professional_id),
            )
            .await?;

        info!(patient_id, professional_id = ctx.professional_id, "PIN do paciente atualizado");
        Ok(())
    }
}
