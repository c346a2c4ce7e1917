//! Ações auditadas e contexto das requisições

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ações gravadas na trilha de auditoria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PatientPinFailed,
    PatientSessionCreated,
    PatientSessionRevoked,
    PatientPinUpdated,
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCanceled,
    AppointmentStatusUpdated,
    AppointmentConfirmed,
    AppointmentDeclined,
    OccurrenceCreated,
    AlertStatusUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PatientPinFailed => "PATIENT_PIN_FAILED",
            AuditAction::PatientSessionCreated => "PATIENT_SESSION_CREATED",
            AuditAction::PatientSessionRevoked => "PATIENT_SESSION_REVOKED",
            AuditAction::PatientPinUpdated => "PATIENT_PIN_UPDATED",
            AuditAction::AppointmentCreated => "APPOINTMENT_CREATED",
            AuditAction::AppointmentUpdated => "APPOINTMENT_UPDATED",
            AuditAction::AppointmentCanceled => "APPOINTMENT_CANCELED",
            AuditAction::AppointmentStatusUpdated => "APPOINTMENT_STATUS_UPDATED",
            AuditAction::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            AuditAction::AppointmentDeclined => "APPOINTMENT_DECLINED",
            AuditAction::OccurrenceCreated => "OCCURRENCE_CREATED",
            AuditAction::AlertStatusUpdated => "ALERT_STATUS_UPDATED",
        }
    }

    /// Tipo de entidade a que a ação se refere
    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::PatientPinFailed
            | AuditAction::PatientSessionCreated
            | AuditAction::PatientSessionRevoked
            | AuditAction::PatientPinUpdated => "patient",
            AuditAction::AppointmentCreated
            | AuditAction::AppointmentUpdated
            | AuditAction::AppointmentCanceled
            | AuditAction::AppointmentStatusUpdated
            | AuditAction::AppointmentConfirmed
            | AuditAction::AppointmentDeclined => "appointment",
            AuditAction::OccurrenceCreated => "occurrence",
            AuditAction::AlertStatusUpdated => "alert",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registro enviado ao gravador de auditoria
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub entity_id: i64,
    pub details: Value,
    pub actor_id: Option<i64>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, entity_id: i64) -> Self {
        Self {
            action,
            entity_id,
            details: Value::Object(Default::default()),
            actor_id: None,
        }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn actor(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn entity_type(&self) -> &'static str {
        self.action.entity_type()
    }
}

/// Metadados da requisição de origem (auditoria de login)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Profissional que executa a operação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalContext {
    pub professional_id: i64,
}

impl ProfessionalContext {
    pub fn new(professional_id: i64) -> Self {
        Self { professional_id }
    }
}

/// Apara o texto livre; vazio vira `None`
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_names_and_entities() {
        assert_eq!(AuditAction::PatientPinFailed.as_str(), "PATIENT_PIN_FAILED");
        assert_eq!(AuditAction::AppointmentDeclined.entity_type(), "appointment");
        assert_eq!(
            serde_json::to_value(AuditAction::AppointmentStatusUpdated).unwrap(),
            json!("APPOINTMENT_STATUS_UPDATED")
        );
    }

    #[test]
    fn test_record_builder() {
        let record = AuditRecord::new(AuditAction::OccurrenceCreated, 9)
            .details(json!({ "kind": "Febre" }))
            .actor(4);
        assert_eq!(record.entity_type(), "occurrence");
        assert_eq!(record.actor_id, Some(4));
        assert_eq!(record.details["kind"], "Febre");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(Some("  dor  ")), Some("dor".to_string()));
        assert_eq!(normalize_text(Some("   ")), None);
        assert_eq!(normalize_text(None), None);
    }
}
