//! Common DB - Biblioteca compartilhada de acesso ao banco de dados da clínica
//!
//! Esta biblioteca fornece:
//! - Modelos de dados compartilhados (pacientes, agendamentos, ocorrências, alertas)
//! - Migrações automáticas do banco de dados
//! - Hash de credenciais (PIN e tokens de sessão)
//! - Repositórios SQLite usados pelo núcleo de cuidado

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod crypto;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;

pub use error::DbError;

/// Configuração da conexão com o banco de dados
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
    /// Tempo máximo de espera por lock do SQLite
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/clinic.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Inicializa o pool de conexões SQLite e aplica as migrações
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout)
        .pragma("synchronous", "NORMAL");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco de dados inicializado com sucesso: {}", config.db_path);
    Ok(pool)
}

/// Banco em memória já migrado, para testes
///
/// Usa uma única conexão sem expiração: cada conexão `:memory:` é um banco
/// independente.
#[cfg(any(test, feature = "test-utils"))]
pub async fn init_memory_pool() -> Result<SqlitePool> {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("URL de banco em memória inválida")?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Falha ao abrir banco em memória")?;

    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_db_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");

        let config = DbConfig {
            db_path: db_path.to_string_lossy().to_string(),
            max_connections: 2,
            ..DbConfig::default()
        };

        let pool = init_db_pool(&config).await?;

        let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
        assert_eq!(result.0, 1);
        assert!(db_path.exists());

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_pool_is_migrated() -> Result<()> {
        let pool = init_memory_pool().await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, migrations::latest_version());

        Ok(())
    }
}
