//! Definições de erro para a biblioteca common-db
//!
//! Este módulo define os tipos de erro usados pelos repositórios e pelas
//! rotinas de credenciais

use thiserror::Error;

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Valor inválido para {field}: {value}")]
    InvalidEnum { field: &'static str, value: String },

    #[error("Erro de credencial: {0}")]
    CredentialError(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

impl DbError {
    /// Indica se o erro veio de uma restrição UNIQUE/CHECK do SQLite
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                if dbe.is_unique_violation() || dbe.is_check_violation() {
                    return DbError::ConstraintViolation(dbe.message().to_string());
                }
                // SQLITE_CONSTRAINT_UNIQUE / _PRIMARYKEY / _CHECK
                if let Some(code) = dbe.code() {
                    if matches!(code.as_ref(), "2067" | "1555" | "275") {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                DbError::QueryError(format!("Erro ao decodificar valor: {}", source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            sqlx::Error::Migrate(err) => DbError::MigrationError(err.to_string()),
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(error: serde_json::Error) -> Self {
        DbError::QueryError(format!("JSON inválido: {}", error))
    }
}
