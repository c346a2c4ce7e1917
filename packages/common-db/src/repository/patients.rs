use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbError;
use crate::models::{CreatePatient, Patient};

const PATIENT_COLUMNS: &str =
    "id, cpf, name, pin_hash, pin_attempts, pin_blocked_until, professional_id, created_at";

/// Acesso à tabela `patients`
#[derive(Debug, Clone)]
pub struct PatientStore {
    pool: SqlitePool,
}

impl PatientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Patient>, DbError> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, DbError> {
        debug!("Buscando paciente por CPF");
        let sql = format!("SELECT {} FROM patients WHERE cpf = ?", PATIENT_COLUMNS);
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(cpf)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn create(&self, input: &CreatePatient) -> Result<Patient, DbError> {
        let sql = format!(
            "INSERT INTO patients (cpf, name, pin_hash, pin_attempts, professional_id, created_at)
             VALUES (?, ?, ?, 0, ?, ?)
             RETURNING {}",
            PATIENT_COLUMNS
        );
        let patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(&input.cpf)
            .bind(&input.name)
            .bind(&input.pin_hash)
            .bind(input.professional_id)
            .bind(input.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(patient)
    }

    /// Zera tentativas e remove o bloqueio
    pub async fn reset_auth_state(&self, patient_id: i64) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE patients SET pin_attempts = 0, pin_blocked_until = NULL WHERE id = ?",
        )
        .bind(patient_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Paciente {}", patient_id)));
        }
        Ok(())
    }

    pub async fn record_failed_attempt(
        &self,
        patient_id: i64,
        attempts: i64,
        blocked_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE patients SET pin_attempts = ?, pin_blocked_until = ? WHERE id = ?",
        )
        .bind(attempts)
        .bind(blocked_until)
        .bind(patient_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Paciente {}", patient_id)));
        }
        Ok(())
    }

    /// Troca o hash do PIN e libera o paciente
    pub async fn set_pin_hash(&self, patient_id: i64, pin_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE patients
             SET pin_hash = ?, pin_attempts = 0, pin_blocked_until = NULL
             WHERE id = ?",
        )
        .bind(pin_hash)
        .bind(patient_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Paciente {}", patient_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_memory_pool;
    use crate::repository::test_support::at;
    use chrono::Duration;

    #[tokio::test]
    async fn test_failed_attempts_and_reset() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let store = PatientStore::new(pool);

        let patient = store
            .create(&CreatePatient {
                cpf: "11111111111".to_string(),
                name: "Maria".to_string(),
                pin_hash: Some("hash".to_string()),
                professional_id: None,
                created_at: at(8, 0),
            })
            .await?;
        assert_eq!(patient.pin_attempts, 0);

        let until = at(9, 0) + Duration::minutes(15);
        store.record_failed_attempt(patient.id, 3, Some(until)).await?;

        let blocked = store.find_by_cpf("11111111111").await?.unwrap();
        assert_eq!(blocked.pin_attempts, 3);
        assert_eq!(blocked.pin_blocked_until, Some(until));

        store.reset_auth_state(patient.id).await?;
        let reset = store.find_by_id(patient.id).await?.unwrap();
        assert_eq!(reset.pin_attempts, 0);
        assert_eq!(reset.pin_blocked_until, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_cpf_is_constraint_violation() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let store = PatientStore::new(pool);
        let input = CreatePatient {
            cpf: "22222222222".to_string(),
            name: "João".to_string(),
            pin_hash: None,
            professional_id: None,
            created_at: at(8, 0),
        };

        store.create(&input).await?;
        let err = store.create(&input).await.unwrap_err();
        assert!(err.is_constraint_violation());

        Ok(())
    }

    #[tokio::test]
    async fn test_updates_on_missing_patient() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let store = PatientStore::new(pool);

        assert!(store.find_by_cpf("00000000000").await?.is_none());
        assert!(matches!(
            store.reset_auth_state(999).await,
            Err(DbError::NotFound(_))
        ));

        Ok(())
    }
}
