use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::clamp_page;
use crate::error::DbError;
use crate::models::{
    Appointment, AppointmentFilters, AppointmentPatch, AppointmentStatus, ConflictQuery,
    CreateAppointment, Page,
};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, professional_id, starts_at, type, status, notes, created_at, updated_at";

/// Acesso à tabela `appointments`
#[derive(Debug, Clone)]
pub struct AppointmentStore {
    pool: SqlitePool,
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filters: &'a AppointmentFilters) {
    builder.push(" WHERE 1 = 1");
    if let Some(start) = filters.start {
        builder.push(" AND starts_at >= ").push_bind(start);
    }
    if let Some(end) = filters.end {
        builder.push(" AND starts_at <= ").push_bind(end);
    }
    if let Some(patient_id) = filters.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(professional_id) = filters.professional_id {
        builder.push(" AND professional_id = ").push_bind(professional_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

impl AppointmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, DbError> {
        let sql = format!("SELECT {} FROM appointments WHERE id = ?", APPOINTMENT_COLUMNS);
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(appointment)
    }

    /// Listagem filtrada e paginada, ordenada por horário
    pub async fn list(&self, filters: &AppointmentFilters) -> Result<Page<Appointment>, DbError> {
        let (limit, offset) = clamp_page(filters.limit, filters.offset);
        debug!(limit, offset, "Listando agendamentos");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM appointments");
        push_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM appointments",
            APPOINTMENT_COLUMNS
        ));
        push_filters(&mut select, filters);
        select
            .push(" ORDER BY starts_at ASC, id ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let data = select
            .build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { data, total })
    }

    pub async fn create(&self, input: &CreateAppointment) -> Result<Appointment, DbError> {
        let sql = format!(
            "INSERT INTO appointments
                (patient_id, professional_id, starts_at, type, status, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            APPOINTMENT_COLUMNS
        );
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(input.patient_id)
            .bind(input.professional_id)
            .bind(input.starts_at)
            .bind(input.appointment_type.as_str())
            .bind(input.status.as_str())
            .bind(&input.notes)
            .bind(input.created_at)
            .bind(input.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(appointment)
    }

    /// Aplica somente os campos presentes no patch
    pub async fn update(
        &self,
        id: i64,
        patch: &AppointmentPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE appointments SET updated_at = ");
        builder.push_bind(updated_at);
        if let Some(starts_at) = patch.starts_at {
            builder.push(", starts_at = ").push_bind(starts_at);
        }
        if let Some(appointment_type) = patch.appointment_type {
            builder.push(", type = ").push_bind(appointment_type.as_str());
        }
        if let Some(notes) = &patch.notes {
            builder.push(", notes = ").push_bind(notes.clone());
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", APPOINTMENT_COLUMNS));

        builder
            .build_query_as::<Appointment>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Agendamento {}", id)))
    }

    /// Troca o status; `notes = None` preserva as observações atuais
    pub async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
        notes: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, DbError> {
        let sql = format!(
            "UPDATE appointments
             SET status = ?, notes = COALESCE(?, notes), updated_at = ?
             WHERE id = ?
             RETURNING {}",
            APPOINTMENT_COLUMNS
        );
        sqlx::query_as::<_, Appointment>(&sql)
            .bind(status.as_str())
            .bind(notes)
            .bind(updated_at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Agendamento {}", id)))
    }

    /// Existe agendamento não cancelado do mesmo profissional no mesmo instante?
    pub async fn has_conflict(&self, query: &ConflictQuery) -> Result<bool, DbError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE professional_id = ?
                  AND starts_at = ?
                  AND status <> 'canceled'
                  AND (? IS NULL OR id <> ?)
             )",
        )
        .bind(query.professional_id)
        .bind(query.starts_at)
        .bind(query.exclude_id)
        .bind(query.exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }
}
