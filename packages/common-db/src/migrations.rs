//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_care_core.sql
    r#"
    -- Pacientes com credencial de PIN e estado de bloqueio
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cpf TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        pin_hash TEXT,
        pin_attempts INTEGER NOT NULL DEFAULT 0 CHECK (pin_attempts >= 0),
        pin_blocked_until TIMESTAMP,
        professional_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Agendamentos
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        professional_id INTEGER NOT NULL,
        starts_at TIMESTAMP NOT NULL,
        type TEXT NOT NULL CHECK (type IN ('triage', 'treatment', 'return')),
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'confirmed', 'completed', 'no_show', 'canceled')),
        notes TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    -- Um profissional não pode ter dois agendamentos ativos no mesmo instante
    CREATE UNIQUE INDEX IF NOT EXISTS ux_appointments_professional_slot
        ON appointments (professional_id, starts_at)
        WHERE status <> 'canceled';

    -- Ocorrências clínicas (imutáveis)
    CREATE TABLE IF NOT EXISTS occurrences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        professional_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        intensity INTEGER NOT NULL CHECK (intensity BETWEEN 0 AND 10),
        source TEXT NOT NULL CHECK (source IN ('patient', 'professional')),
        notes TEXT,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    -- Alertas
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        severity TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
        status TEXT NOT NULL CHECK (status IN ('open', 'acknowledged', 'closed')),
        details TEXT,
        created_at TIMESTAMP NOT NULL,
        resolved_at TIMESTAMP,
        resolved_by INTEGER,
        CHECK ((status = 'open') = (resolved_at IS NULL AND resolved_by IS NULL)),
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    -- Trilha de auditoria (somente inserção)
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        details TEXT NOT NULL DEFAULT '{}',
        actor_id INTEGER,
        created_at TIMESTAMP NOT NULL
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_starts_at ON appointments (starts_at);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    CREATE INDEX IF NOT EXISTS idx_occurrences_patient ON occurrences (patient_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts (status);
    CREATE INDEX IF NOT EXISTS idx_alerts_patient ON alerts (patient_id);
    CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log (entity_type, entity_id);
    "#,

    // 002_patient_sessions.sql
    r#"
    -- Sessões de paciente (token opaco; apenas o hash é armazenado)
    CREATE TABLE IF NOT EXISTS patient_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        token_hash TEXT NOT NULL UNIQUE,
        expires_at TIMESTAMP NOT NULL,
        revoked_at TIMESTAMP,
        ip TEXT,
        user_agent TEXT,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_patient_sessions_patient ON patient_sessions (patient_id);
    "#,
];

/// Quantidade de migrações conhecidas (versão final do esquema)
pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", latest_version());
    Ok(())
}
