//! Registro de ocorrências clínicas e escalonamento para alertas

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use common_db::models::{
    Alert, CreateOccurrence, Occurrence, OccurrenceFilters, OccurrenceSource,
};

use crate::audit::{normalize_text, AuditAction, AuditRecord, ProfessionalContext};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::escalation::alert_for_occurrence;
use crate::ports::{AlertPort, AuditPort, OccurrenceRepository};

pub const MAX_INTENSITY: i32 = 10;

/// Dados de uma nova ocorrência
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOccurrence {
    pub kind: String,
    pub intensity: i32,
    pub source: OccurrenceSource,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Ocorrência gravada e o alerta gerado por ela, se houver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedOccurrence {
    pub occurrence: Occurrence,
    pub alert: Option<Alert>,
}

pub struct OccurrenceEngine {
    occurrences: Arc<dyn OccurrenceRepository>,
    alerts: Arc<dyn AlertPort>,
    audit: Arc<dyn AuditPort>,
    clock: Arc<dyn Clock>,
}

impl OccurrenceEngine {
    pub fn new(
        occurrences: Arc<dyn OccurrenceRepository>,
        alerts: Arc<dyn AlertPort>,
        audit: Arc<dyn AuditPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            occurrences,
            alerts,
            audit,
            clock,
        }
    }

    /// Ocorrências do paciente, mais recentes primeiro
    pub async fn list_patient_occurrences(
        &self,
        patient_id: i64,
        filters: &OccurrenceFilters,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let filters = OccurrenceFilters {
            kind: normalize_text(filters.kind.as_deref()),
            ..filters.clone()
        };
        Ok(self
            .occurrences
            .list_by_patient(patient_id, &filters)
            .await?)
    }

    /// Grava a ocorrência e, se relatada pelo paciente, abre um alerta
    ///
    /// Ordem: ocorrência, auditoria, alerta. Falha ao criar o alerta é
    /// propagada, mas a ocorrência já gravada permanece.
    pub async fn create_occurrence(
        &self,
        patient_id: i64,
        input: NewOccurrence,
        ctx: &ProfessionalContext,
    ) -> Result<RecordedOccurrence, CoreError> {
        let kind = normalize_text(Some(&input.kind))
            .ok_or_else(|| CoreError::InvalidInput("tipo da ocorrência vazio".to_string()))?;
        if !(0..=MAX_INTENSITY).contains(&input.intensity) {
            return Err(CoreError::InvalidInput(format!(
                "intensidade deve estar entre 0 e {}",
                MAX_INTENSITY
            )));
        }

        let record = CreateOccurrence {
            patient_id,
            professional_id: ctx.professional_id,
            kind,
            intensity: input.intensity,
            source: input.source,
            notes: normalize_text(input.notes.as_deref()),
            created_at: self.clock.now(),
        };
        let occurrence = self.occurrences.create(&record).await?;

        let mut audit = AuditRecord::new(AuditAction::OccurrenceCreated, occurrence.id).details(
            json!({
                "patientId": occurrence.patient_id,
                "professionalId": occurrence.professional_id,
                "kind": occurrence.kind,
                "intensity": occurrence.intensity,
                "source": occurrence.source,
            }),
        );
        if occurrence.source == OccurrenceSource::Professional {
            audit = audit.actor(ctx.professional_id);
        }
        self.audit.record(audit).await?;

        info!(
            occurrence_id = occurrence.id,
            patient_id,
            source = %occurrence.source,
            intensity = occurrence.intensity,
            "Ocorrência registrada"
        );

        let alert = match alert_for_occurrence(&occurrence) {
            Some(new_alert) => {
                let alert = self.alerts.create(&new_alert).await?;
                info!(
                    alert_id = alert.id,
                    occurrence_id = occurrence.id,
                    severity = %alert.severity,
                    "Alerta aberto a partir de relato do paciente"
                );
                Some(alert)
            }
            None => {
                debug!(occurrence_id = occurrence.id, "Ocorrência sem escalonamento");
                None
            }
        };

        Ok(RecordedOccurrence { occurrence, alert })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::escalation::PATIENT_SYMPTOM_ALERT_KIND;
    use crate::ports::{MockAlertPort, MockAuditPort, MockOccurrenceRepository};
    use chrono::{DateTime, TimeZone, Utc};
    use common_db::models::{AlertSeverity, AlertStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap()
    }

    fn stored_repo() -> MockOccurrenceRepository {
        let mut repo = MockOccurrenceRepository::new();
        repo.expect_create().returning(|input| {
            Ok(Occurrence {
                id: 42,
                patient_id: input.patient_id,
                professional_id: input.professional_id,
                kind: input.kind.clone(),
                intensity: input.intensity,
                source: input.source,
                notes: input.notes.clone(),
                created_at: input.created_at,
            })
        });
        repo
    }

    fn echo_alerts() -> MockAlertPort {
        let mut alerts = MockAlertPort::new();
        alerts.expect_create().times(1).returning(|input| {
            Ok(Alert {
                id: 7,
                patient_id: input.patient_id,
                kind: input.kind.clone(),
                severity: input.severity,
                status: input.status,
                details: input.details.clone(),
                created_at: input.created_at,
                resolved_at: None,
                resolved_by: None,
            })
        });
        alerts
    }

    fn audit_once() -> MockAuditPort {
        let mut audit = MockAuditPort::new();
        audit
            .expect_record()
            .withf(|r| r.action == AuditAction::OccurrenceCreated && r.entity_id == 42)
            .times(1)
            .returning(|_| Ok(()));
        audit
    }

    fn engine(
        repo: MockOccurrenceRepository,
        alerts: MockAlertPort,
        audit: MockAuditPort,
    ) -> OccurrenceEngine {
        OccurrenceEngine::new(
            Arc::new(repo),
            Arc::new(alerts),
            Arc::new(audit),
            Arc::new(ManualClock::new(now())),
        )
    }

    fn patient_report(kind: &str, intensity: i32) -> NewOccurrence {
        NewOccurrence {
            kind: kind.to_string(),
            intensity,
            source: OccurrenceSource::Patient,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_high_intensity_report_opens_high_alert() {
        let engine = engine(stored_repo(), echo_alerts(), audit_once());

        let recorded = engine
            .create_occurrence(5, patient_report("  Febre alta ", 9), &ProfessionalContext::new(2))
            .await
            .unwrap();

        assert_eq!(recorded.occurrence.kind, "Febre alta");
        let alert = recorded.alert.unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.kind, PATIENT_SYMPTOM_ALERT_KIND);
        assert_eq!(alert.created_at, now());
        assert!(alert
            .details
            .unwrap()
            .contains("Febre alta\" com intensidade 9/10"));
    }

    #[tokio::test]
    async fn test_medium_and_low_severity() {
        let medium = engine(stored_repo(), echo_alerts(), audit_once())
            .create_occurrence(5, patient_report("Dor", 5), &ProfessionalContext::new(2))
            .await
            .unwrap();
        assert_eq!(medium.alert.unwrap().severity, AlertSeverity::Medium);

        let low = engine(stored_repo(), echo_alerts(), audit_once())
            .create_occurrence(5, patient_report("Dor", 2), &ProfessionalContext::new(2))
            .await
            .unwrap();
        assert_eq!(low.alert.unwrap().severity, AlertSeverity::Low);
    }

    #[tokio::test]
    async fn test_professional_source_never_escalates() {
        let mut alerts = MockAlertPort::new();
        alerts.expect_create().never();
        let mut audit = MockAuditPort::new();
        audit
            .expect_record()
            .withf(|r| r.actor_id == Some(2))
            .times(1)
            .returning(|_| Ok(()));

        let recorded = engine(stored_repo(), alerts, audit)
            .create_occurrence(
                5,
                NewOccurrence {
                    kind: "Febre alta".to_string(),
                    intensity: 10,
                    source: OccurrenceSource::Professional,
                    notes: Some("   ".to_string()),
                },
                &ProfessionalContext::new(2),
            )
            .await
            .unwrap();

        assert!(recorded.alert.is_none());
        assert_eq!(recorded.occurrence.notes, None);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_store() {
        let mut repo = MockOccurrenceRepository::new();
        repo.expect_create().never();
        let engine = engine(repo, MockAlertPort::new(), MockAuditPort::new());
        let ctx = ProfessionalContext::new(2);

        assert!(matches!(
            engine.create_occurrence(5, patient_report("   ", 3), &ctx).await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.create_occurrence(5, patient_report("Dor", 11), &ctx).await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.create_occurrence(5, patient_report("Dor", -1), &ctx).await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_trims_kind_filter() {
        let mut repo = MockOccurrenceRepository::new();
        repo.expect_list_by_patient()
            .withf(|patient_id, filters| *patient_id == 5 && filters.kind.as_deref() == Some("Dor"))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let result = engine(repo, MockAlertPort::new(), MockAuditPort::new())
            .list_patient_occurrences(
                5,
                &OccurrenceFilters {
                    kind: Some(" Dor ".to_string()),
                    ..OccurrenceFilters::default()
                },
            )
            .await
            .unwrap();

        assert!(result.is_empty());
    }
}
