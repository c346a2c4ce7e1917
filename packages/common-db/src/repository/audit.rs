use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::models::{AuditEntry, CreateAuditEntry};

/// Trilha de auditoria, somente inserção e leitura
#[derive(Debug, Clone)]
pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &CreateAuditEntry) -> Result<i64, DbError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO audit_log (action, entity_type, entity_id, details, actor_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(Json(&entry.details))
        .bind(entry.actor_id)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Histórico de uma entidade, em ordem de gravação
    pub async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<AuditEntry>, DbError> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            "SELECT id, action, entity_type, entity_id, details, actor_id, created_at
             FROM audit_log
             WHERE entity_type = ? AND entity_id = ?
             ORDER BY id ASC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_memory_pool;
    use crate::repository::test_support::at;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_read_back_details() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let store = AuditStore::new(pool);

        store
            .insert(&CreateAuditEntry {
                action: "APPOINTMENT_CREATED".to_string(),
                entity_type: "appointment".to_string(),
                entity_id: 42,
                details: json!({ "professionalId": 3, "type": "triage" }),
                actor_id: Some(3),
                created_at: at(9, 0),
            })
            .await?;
        store
            .insert(&CreateAuditEntry {
                action: "APPOINTMENT_CONFIRMED".to_string(),
                entity_type: "appointment".to_string(),
                entity_id: 42,
                details: json!({}),
                actor_id: None,
                created_at: at(9, 5),
            })
            .await?;

        let entries = store.list_for_entity("appointment", 42).await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "APPOINTMENT_CREATED");
        assert_eq!(entries[0].details["type"], "triage");
        assert_eq!(entries[1].actor_id, None);

        Ok(())
    }
}
