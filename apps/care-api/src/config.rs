//! Configuração da aplicação via variáveis de ambiente `CLINIC_*`

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

use common_db::DbConfig;

/// Tamanho mínimo dos segredos de sessão e JWT
pub const MIN_SECRET_LEN: usize = 32;

/// Sem `Debug`: carrega segredos
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub session_secret: Zeroizing<String>,
    pub session_ttl_hours: i64,
    pub staff_jwt_secret: Zeroizing<String>,
    /// Tentativas de login permitidas por cliente na janela
    pub login_rate_limit: u32,
    pub login_rate_window: Duration,
    /// Atrás de proxy reverso confiável: chave do limite vem de `X-Forwarded-For`
    pub trust_proxy: bool,
    pub max_concurrency: usize,
    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Monta a configuração a partir de uma fonte de variáveis qualquer
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();

        let config = Self {
            bind_addr: parse_or(&lookup, "CLINIC_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            db: DbConfig {
                db_path: lookup("CLINIC_DB_PATH").unwrap_or(defaults.db_path),
                max_connections: parse_or(
                    &lookup,
                    "CLINIC_DB_MAX_CONNECTIONS",
                    defaults.max_connections,
                )?,
                busy_timeout: defaults.busy_timeout,
            },
            session_secret: required_secret(&lookup, "CLINIC_SESSION_SECRET")?,
            session_ttl_hours: parse_or(&lookup, "CLINIC_SESSION_TTL_HOURS", 12)?,
            staff_jwt_secret: required_secret(&lookup, "CLINIC_STAFF_JWT_SECRET")?,
            login_rate_limit: parse_or(&lookup, "CLINIC_LOGIN_RATE_LIMIT", 10)?,
            login_rate_window: Duration::from_secs(parse_or(
                &lookup,
                "CLINIC_LOGIN_RATE_WINDOW_SECS",
                60,
            )?),
            trust_proxy: parse_or(&lookup, "CLINIC_TRUST_PROXY", false)?,
            max_concurrency: parse_or(&lookup, "CLINIC_MAX_CONCURRENCY", 256)?,
            log_json: parse_or(&lookup, "CLINIC_LOG_JSON", false)?,
        };

        if config.session_ttl_hours <= 0 {
            bail!("CLINIC_SESSION_TTL_HOURS deve ser positivo");
        }
        if config.login_rate_limit == 0 {
            bail!("CLINIC_LOGIN_RATE_LIMIT deve ser positivo");
        }
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Valor inválido para {}: {}", key, raw)),
        None => Ok(default),
    }
}

fn required_secret<F>(lookup: &F, key: &str) -> Result<Zeroizing<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = Zeroizing::new(
        lookup(key).with_context(|| format!("Variável obrigatória ausente: {}", key))?,
    );
    if secret.len() < MIN_SECRET_LEN {
        bail!("{} deve ter pelo menos {} caracteres", key, MIN_SECRET_LEN);
    }
    Ok(secret)
}
