//! Transições de alertas pela equipe

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use common_db::models::{Alert, AlertFilters, AlertResolution, AlertStatus, Page, MAX_PAGE_LIMIT};

use crate::audit::{AuditAction, AuditRecord};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::ports::{AlertPort, AuditPort};

pub struct AlertService {
    alerts: Arc<dyn AlertPort>,
    audit: Arc<dyn AuditPort>,
    clock: Arc<dyn Clock>,
}

impl AlertService {
    pub fn new(alerts: Arc<dyn AlertPort>, audit: Arc<dyn AuditPort>, clock: Arc<dyn Clock>) -> Self {
        Self {
            alerts,
            audit,
            clock,
        }
    }

    /// Alertas mais recentes primeiro
    pub async fn list_alerts(&self, filters: &AlertFilters) -> Result<Page<Alert>, CoreError> {
        let filters = AlertFilters {
            limit: filters.limit.clamp(1, MAX_PAGE_LIMIT),
            offset: filters.offset.max(0),
            ..filters.clone()
        };
        Ok(self.alerts.list(&filters).await?)
    }

    /// Reabrir limpa a resolução; reconhecer ou fechar registra quem e quando
    pub async fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
        actor_id: i64,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Alert, CoreError> {
        let current = self
            .alerts
            .find_by_id(id)
            .await?
            .ok_or(CoreError::AlertNotFound(id))?;

        let resolution = match status {
            AlertStatus::Open => AlertResolution {
                status,
                resolved_at: None,
                resolved_by: None,
            },
            AlertStatus::Acknowledged | AlertStatus::Closed => AlertResolution {
                status,
                resolved_at: Some(resolved_at.unwrap_or_else(|| self.clock.now())),
                resolved_by: Some(actor_id),
            },
        };
        let updated = self.alerts.update_status(id, &resolution).await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AlertStatusUpdated, id)
                    .actor(actor_id)
                    .details(json!({
                        "from": current.status,
                        "to": status,
                        "patientId": current.patient_id,
                    })),
            )
            .await?;

        info!(alert_id = id, from = %current.status, to = %status, "Status do alerta atualizado");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ports::{MockAlertPort, MockAuditPort};
    use chrono::TimeZone;
    use common_db::models::AlertSeverity;
    use mockall::predicate::eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 11, 0, 0).unwrap()
    }

    fn alert(status: AlertStatus) -> Alert {
        Alert {
            id: 3,
            patient_id: 5,
            kind: "sintoma_paciente".to_string(),
            severity: AlertSeverity::High,
            status,
            details: None,
            created_at: now(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    fn applied(resolution: &AlertResolution) -> Alert {
        Alert {
            resolved_at: resolution.resolved_at,
            resolved_by: resolution.resolved_by,
            ..alert(resolution.status)
        }
    }

    fn service(alerts: MockAlertPort, audit: MockAuditPort) -> AlertService {
        AlertService::new(Arc::new(alerts), Arc::new(audit), Arc::new(ManualClock::new(now())))
    }

    fn audit_once() -> MockAuditPort {
        let mut audit = MockAuditPort::new();
        audit
            .expect_record()
            .withf(|r| r.action == AuditAction::AlertStatusUpdated && r.actor_id == Some(9))
            .times(1)
            .returning(|_| Ok(()));
        audit
    }

    #[tokio::test]
    async fn test_acknowledge_defaults_resolution_to_now() {
        let mut alerts = MockAlertPort::new();
        alerts
            .expect_find_by_id()
            .returning(|_| Ok(Some(alert(AlertStatus::Open))));
        alerts
            .expect_update_status()
            .with(
                eq(3_i64),
                eq(AlertResolution {
                    status: AlertStatus::Acknowledged,
                    resolved_at: Some(now()),
                    resolved_by: Some(9),
                }),
            )
            .times(1)
            .returning(|_, resolution| Ok(applied(resolution)));

        let updated = service(alerts, audit_once())
            .update_alert_status(3, AlertStatus::Acknowledged, 9, None)
            .await
            .unwrap();

        assert_eq!(updated.resolved_by, Some(9));
    }

    #[tokio::test]
    async fn test_reopen_clears_resolution() {
        let mut alerts = MockAlertPort::new();
        alerts.expect_find_by_id().returning(|_| {
            Ok(Some(Alert {
                resolved_at: Some(now()),
                resolved_by: Some(9),
                ..alert(AlertStatus::Closed)
            }))
        });
        alerts
            .expect_update_status()
            .withf(|_, r| r.status == AlertStatus::Open && r.resolved_at.is_none() && r.resolved_by.is_none())
            .times(1)
            .returning(|_, resolution| Ok(applied(resolution)));

        let reopened = service(alerts, audit_once())
            .update_alert_status(3, AlertStatus::Open, 9, Some(now()))
            .await
            .unwrap();

        assert_eq!(reopened.status, AlertStatus::Open);
        assert_eq!(reopened.resolved_at, None);
    }

    #[tokio::test]
    async fn test_missing_alert() {
        let mut alerts = MockAlertPort::new();
        alerts.expect_find_by_id().returning(|_| Ok(None));
        alerts.expect_update_status().never();

        let result = service(alerts, MockAuditPort::new())
            .update_alert_status(99, AlertStatus::Closed, 9, None)
            .await;

        assert!(matches!(result, Err(CoreError::AlertNotFound(99))));
    }
}
