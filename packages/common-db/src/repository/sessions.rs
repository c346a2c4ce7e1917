use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::models::{CreateSession, PatientSession};

const SESSION_COLUMNS: &str =
    "id, patient_id, token_hash, expires_at, revoked_at, ip, user_agent, created_at";

/// Acesso à tabela `patient_sessions`
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &CreateSession) -> Result<PatientSession, DbError> {
        let sql = format!(
            "INSERT INTO patient_sessions
                (patient_id, token_hash, expires_at, ip, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, PatientSession>(&sql)
            .bind(input.patient_id)
            .bind(&input.token_hash)
            .bind(input.expires_at)
            .bind(&input.ip)
            .bind(&input.user_agent)
            .bind(input.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<PatientSession>, DbError> {
        let sql = format!(
            "SELECT {} FROM patient_sessions WHERE token_hash = ?",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, PatientSession>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Revoga a sessão; retorna a sessão revogada se ela ainda estava ativa
    pub async fn revoke(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PatientSession>, DbError> {
        let sql = format!(
            "UPDATE patient_sessions SET revoked_at = ?
             WHERE token_hash = ? AND revoked_at IS NULL
             RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, PatientSession>(&sql)
            .bind(at)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }
}
