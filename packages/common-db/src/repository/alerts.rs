use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::clamp_page;
use crate::error::DbError;
use crate::models::{Alert, AlertFilters, AlertResolution, CreateAlert, Page};

const ALERT_COLUMNS: &str =
    "id, patient_id, kind, severity, status, details, created_at, resolved_at, resolved_by";

/// Acesso à tabela `alerts`
#[derive(Debug, Clone)]
pub struct AlertStore {
    pool: SqlitePool,
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &AlertFilters) {
    builder.push(" WHERE 1 = 1");
    if let Some(patient_id) = filters.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(severity) = filters.severity {
        builder.push(" AND severity = ").push_bind(severity.as_str());
    }
}

impl AlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &CreateAlert) -> Result<Alert, DbError> {
        let sql = format!(
            "INSERT INTO alerts (patient_id, kind, severity, status, details, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            ALERT_COLUMNS
        );
        let alert = sqlx::query_as::<_, Alert>(&sql)
            .bind(input.patient_id)
            .bind(&input.kind)
            .bind(input.severity.as_str())
            .bind(input.status.as_str())
            .bind(&input.details)
            .bind(input.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(alert)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Alert>, DbError> {
        let sql = format!("SELECT {} FROM alerts WHERE id = ?", ALERT_COLUMNS);
        let alert = sqlx::query_as::<_, Alert>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alert)
    }

    /// Alertas mais recentes primeiro
    pub async fn list(&self, filters: &AlertFilters) -> Result<Page<Alert>, DbError> {
        let (limit, offset) = clamp_page(filters.limit, filters.offset);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM alerts");
        push_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM alerts", ALERT_COLUMNS));
        push_filters(&mut select, filters);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let data = select
            .build_query_as::<Alert>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { data, total })
    }

    pub async fn update_status(
        &self,
        id: i64,
        resolution: &AlertResolution,
    ) -> Result<Alert, DbError> {
        let sql = format!(
            "UPDATE alerts SET status = ?, resolved_at = ?, resolved_by = ?
             WHERE id = ?
             RETURNING {}",
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, Alert>(&sql)
            .bind(resolution.status.as_str())
            .bind(resolution.resolved_at)
            .bind(resolution.resolved_by)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Alerta {}", id)))
    }
}
