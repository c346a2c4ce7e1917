//! Ciclo de vida dos agendamentos
//!
//! Conflito = mesmo profissional e exatamente o mesmo `starts_at` (precisão
//! de segundos), ignorando cancelados. Não há duração: horários vizinhos ou
//! sobrepostos clinicamente são permitidos.
//!
//! Transições usuais:
//! `scheduled -> {confirmed, canceled, no_show}`,
//! `confirmed -> {completed, canceled, no_show}`. O engine não impede nova
//! transição ou edição de linhas terminais; essa política fica com o chamador.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use common_db::models::{
    Appointment, AppointmentFilters, AppointmentPatch, AppointmentStatus, AppointmentType,
    ConflictQuery, CreateAppointment, Page, MAX_PAGE_LIMIT,
};
use common_db::DbError;

use crate::audit::{normalize_text, AuditAction, AuditRecord, ProfessionalContext};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::ports::{AppointmentRepository, AuditPort};

/// Dados de um novo agendamento
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub professional_id: i64,
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Horário armazenado com precisão de segundos
fn slot(starts_at: DateTime<Utc>) -> DateTime<Utc> {
    starts_at.trunc_subsecs(0)
}

pub struct AppointmentEngine {
    appointments: Arc<dyn AppointmentRepository>,
    audit: Arc<dyn AuditPort>,
    clock: Arc<dyn Clock>,
}

impl AppointmentEngine {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        audit: Arc<dyn AuditPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            appointments,
            audit,
            clock,
        }
    }

    pub async fn list_appointments(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Page<Appointment>, CoreError> {
        let filters = AppointmentFilters {
            limit: filters.limit.clamp(1, MAX_PAGE_LIMIT),
            offset: filters.offset.max(0),
            ..filters.clone()
        };
        debug!(?filters, "Listando agendamentos");
        Ok(self.appointments.list(&filters).await?)
    }

    pub async fn get_appointment(&self, id: i64) -> Result<Appointment, CoreError> {
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or(CoreError::AppointmentNotFound(id))
    }

    /// Agenda do paciente; `upcoming_only` descarta horários passados.
    /// Retorna no máximo `MAX_PAGE_LIMIT` agendamentos, em ordem de horário.
    pub async fn list_patient_appointments(
        &self,
        patient_id: i64,
        upcoming_only: bool,
    ) -> Result<Vec<Appointment>, CoreError> {
        let filters = AppointmentFilters {
            patient_id: Some(patient_id),
            start: upcoming_only.then(|| self.clock.now()),
            limit: MAX_PAGE_LIMIT,
            ..AppointmentFilters::default()
        };
        Ok(self.appointments.list(&filters).await?.data)
    }

    pub async fn create_appointment(
        &self,
        input: NewAppointment,
        ctx: &ProfessionalContext,
    ) -> Result<Appointment, CoreError> {
        let starts_at = slot(input.starts_at);
        self.ensure_slot_free(input.professional_id, starts_at, None)
            .await?;

        let record = CreateAppointment {
            patient_id: input.patient_id,
            professional_id: input.professional_id,
            starts_at,
            appointment_type: input.appointment_type,
            status: AppointmentStatus::Scheduled,
            notes: normalize_text(input.notes.as_deref()),
            created_at: self.clock.now(),
        };
        let appointment = self
            .appointments
            .create(&record)
            .await
            .map_err(|e| conflict_or_store(e, input.professional_id, starts_at))?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentCreated, appointment.id)
                    .actor(ctx.professional_id)
                    .details(json!({
                        "patientId": appointment.patient_id,
                        "professionalId": appointment.professional_id,
                        "startsAt": appointment.starts_at,
                        "type": appointment.appointment_type,
                    })),
            )
            .await?;

        info!(
            appointment_id = appointment.id,
            professional_id = appointment.professional_id,
            starts_at = %appointment.starts_at,
            "Agendamento criado"
        );
        Ok(appointment)
    }

    /// Atualiza horário, tipo ou observações; sem mudança efetiva não grava nada
    pub async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
        ctx: &ProfessionalContext,
    ) -> Result<Appointment, CoreError> {
        let current = self.get_appointment(id).await?;

        let changes = AppointmentPatch {
            starts_at: patch
                .starts_at
                .map(slot)
                .filter(|starts_at| *starts_at != current.starts_at),
            appointment_type: patch
                .appointment_type
                .filter(|kind| *kind != current.appointment_type),
            notes: patch
                .notes
                .map(|notes| normalize_text(notes.as_deref()))
                .filter(|notes| *notes != current.notes),
        };

        if changes.is_empty() {
            debug!(appointment_id = id, "Nenhuma alteração efetiva no agendamento");
            return Ok(current);
        }

        if let Some(starts_at) = changes.starts_at {
            self.ensure_slot_free(current.professional_id, starts_at, Some(id))
                .await?;
        }

        let updated = self
            .appointments
            .update(id, &changes, self.clock.now())
            .await
            .map_err(|e| {
                conflict_or_store(
                    e,
                    current.professional_id,
                    changes.starts_at.unwrap_or(current.starts_at),
                )
            })?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentUpdated, id)
                    .actor(ctx.professional_id)
                    .details(json!({
                        "changes": changes.field_names(),
                        "startsAt": changes.starts_at,
                        "type": changes.appointment_type,
                    })),
            )
            .await?;

        info!(appointment_id = id, changes = ?changes.field_names(), "Agendamento atualizado");
        Ok(updated)
    }

    /// Cancela; sem motivo, preserva as observações atuais
    pub async fn cancel_appointment(
        &self,
        id: i64,
        ctx: &ProfessionalContext,
        reason: Option<&str>,
    ) -> Result<Appointment, CoreError> {
        let current = self.get_appointment(id).await?;
        let reason = normalize_text(reason);

        let canceled = self
            .write_status(&current, AppointmentStatus::Canceled, reason.clone())
            .await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentCanceled, id)
                    .actor(ctx.professional_id)
                    .details(json!({
                        "previousStatus": current.status,
                        "reason": reason,
                    })),
            )
            .await?;

        info!(appointment_id = id, "Agendamento cancelado");
        Ok(canceled)
    }

    /// Transição direta de status pela equipe
    pub async fn update_appointment_status(
        &self,
        id: i64,
        status: AppointmentStatus,
        ctx: &ProfessionalContext,
        notes: Option<&str>,
    ) -> Result<Appointment, CoreError> {
        let current = self.get_appointment(id).await?;
        let notes = normalize_text(notes);

        let updated = self.write_status(&current, status, notes).await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentStatusUpdated, id)
                    .actor(ctx.professional_id)
                    .details(json!({
                        "from": current.status,
                        "to": status,
                    })),
            )
            .await?;

        info!(appointment_id = id, from = %current.status, to = %status, "Status do agendamento atualizado");
        Ok(updated)
    }

    /// Confirmação de presença pelo paciente (idempotente)
    pub async fn confirm_attendance(
        &self,
        id: i64,
        patient_id: i64,
    ) -> Result<AppointmentStatus, CoreError> {
        let current = self.owned_by(id, patient_id).await?;

        if matches!(
            current.status,
            AppointmentStatus::Confirmed | AppointmentStatus::Completed
        ) {
            debug!(appointment_id = id, status = %current.status, "Presença já confirmada");
            return Ok(current.status);
        }

        let updated = self
            .write_status(&current, AppointmentStatus::Confirmed, None)
            .await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentConfirmed, id).details(json!({
                    "patientId": patient_id,
                    "previousStatus": current.status,
                })),
            )
            .await?;

        info!(appointment_id = id, patient_id, "Presença confirmada pelo paciente");
        Ok(updated.status)
    }

    /// Recusa do paciente, registrada como ausência antecipada (`no_show`)
    pub async fn decline_appointment(
        &self,
        id: i64,
        patient_id: i64,
        reason: Option<&str>,
    ) -> Result<Appointment, CoreError> {
        let current = self.owned_by(id, patient_id).await?;
        let reason = normalize_text(reason);

        let updated = self
            .write_status(&current, AppointmentStatus::NoShow, reason.clone())
            .await?;

        self.audit
            .record(
                AuditRecord::new(AuditAction::AppointmentDeclined, id).details(json!({
                    "patientId": patient_id,
                    "previousStatus": current.status,
                    "reason": reason,
                })),
            )
            .await?;

        info!(appointment_id = id, patient_id, "Agendamento recusado pelo paciente");
        Ok(updated)
    }

    /// Grava o novo status. Reabrir uma linha cancelada volta a ocupar o
    /// horário, então o conflito é verificado antes da escrita.
    async fn write_status(
        &self,
        current: &Appointment,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, CoreError> {
        if current.status == AppointmentStatus::Canceled && status != AppointmentStatus::Canceled {
            self.ensure_slot_free(current.professional_id, current.starts_at, Some(current.id))
                .await?;
        }

        self.appointments
            .update_status(current.id, status, notes, self.clock.now())
            .await
            .map_err(|e| conflict_or_store(e, current.professional_id, current.starts_at))
    }

    /// Agendamento de outro paciente é tratado como inexistente
    async fn owned_by(&self, id: i64, patient_id: i64) -> Result<Appointment, CoreError> {
        self.appointments
            .find_by_id(id)
            .await?
            .filter(|appointment| appointment.patient_id == patient_id)
            .ok_or(CoreError::AppointmentNotFound(id))
    }

    async fn ensure_slot_free(
        &self,
        professional_id: i64,
        starts_at: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> Result<(), CoreError> {
        let query = ConflictQuery {
            professional_id,
            starts_at,
            exclude_id,
        };
        if self.appointments.has_conflict(&query).await? {
            warn!(professional_id, %starts_at, "Conflito de horário no agendamento");
            return Err(CoreError::AppointmentConflict {
                professional_id,
                starts_at,
            });
        }
        Ok(())
    }
}

/// A restrição única do store é a guarda definitiva contra corrida
fn conflict_or_store(error: DbError, professional_id: i64, starts_at: DateTime<Utc>) -> CoreError {
    if error.is_constraint_violation() {
        warn!(professional_id, %starts_at, "Conflito de horário detectado pelo banco");
        CoreError::AppointmentConflict {
            professional_id,
            starts_at,
        }
    } else {
        CoreError::Store(error)
    }
}
