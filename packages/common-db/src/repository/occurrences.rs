use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::DbError;
use crate::models::{CreateOccurrence, Occurrence, OccurrenceFilters};

const OCCURRENCE_COLUMNS: &str =
    "id, patient_id, professional_id, kind, intensity, source, notes, created_at";

/// Acesso à tabela `occurrences`
#[derive(Debug, Clone)]
pub struct OccurrenceStore {
    pool: SqlitePool,
}

impl OccurrenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &CreateOccurrence) -> Result<Occurrence, DbError> {
        let sql = format!(
            "INSERT INTO occurrences
                (patient_id, professional_id, kind, intensity, source, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            OCCURRENCE_COLUMNS
        );
        let occurrence = sqlx::query_as::<_, Occurrence>(&sql)
            .bind(input.patient_id)
            .bind(input.professional_id)
            .bind(&input.kind)
            .bind(input.intensity)
            .bind(input.source.as_str())
            .bind(&input.notes)
            .bind(input.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(occurrence)
    }

    /// Ocorrências do paciente, mais recentes primeiro
    pub async fn list_by_patient(
        &self,
        patient_id: i64,
        filters: &OccurrenceFilters,
    ) -> Result<Vec<Occurrence>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM occurrences WHERE patient_id = ",
            OCCURRENCE_COLUMNS
        ));
        builder.push_bind(patient_id);
        if let Some(start) = filters.start {
            builder.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filters.end {
            builder.push(" AND created_at <= ").push_bind(end);
        }
        if let Some(kind) = &filters.kind {
            builder.push(" AND kind = ").push_bind(kind.clone());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let occurrences = builder
            .build_query_as::<Occurrence>()
            .fetch_all(&self.pool)
            .await?;
        Ok(occurrences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_memory_pool;
    use crate::models::OccurrenceSource;
    use crate::repository::test_support::{at, seed_patient};

    fn occurrence(patient_id: i64, kind: &str, hour: u32) -> CreateOccurrence {
        CreateOccurrence {
            patient_id,
            professional_id: 1,
            kind: kind.to_string(),
            intensity: 6,
            source: OccurrenceSource::Patient,
            notes: None,
            created_at: at(hour, 0),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filters() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let patient_id = seed_patient(&pool, "11111111111").await;
        let other = seed_patient(&pool, "22222222222").await;
        let store = OccurrenceStore::new(pool);

        store.create(&occurrence(patient_id, "Febre", 9)).await?;
        store.create(&occurrence(patient_id, "Náusea", 11)).await?;
        store.create(&occurrence(patient_id, "Febre", 13)).await?;
        store.create(&occurrence(other, "Febre", 12)).await?;

        let all = store
            .list_by_patient(patient_id, &OccurrenceFilters::default())
            .await?;
        let hours: Vec<_> = all.iter().map(|o| o.created_at).collect();
        assert_eq!(hours, vec![at(13, 0), at(11, 0), at(9, 0)]);

        let fevers = store
            .list_by_patient(
                patient_id,
                &OccurrenceFilters {
                    kind: Some("Febre".to_string()),
                    start: Some(at(10, 0)),
                    end: None,
                },
            )
            .await?;
        assert_eq!(fevers.len(), 1);
        assert_eq!(fevers[0].created_at, at(13, 0));

        Ok(())
    }

    #[tokio::test]
    async fn test_intensity_out_of_range_is_rejected() -> anyhow::Result<()> {
        let pool = init_memory_pool().await?;
        let patient_id = seed_patient(&pool, "11111111111").await;
        let store = OccurrenceStore::new(pool);

        let mut input = occurrence(patient_id, "Dor", 9);
        input.intensity = 11;
        let err = store.create(&input).await.unwrap_err();
        assert!(err.is_constraint_violation());

        Ok(())
    }
}
