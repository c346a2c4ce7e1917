use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;
use zeroize::Zeroizing;

use care_core::{CareCore, Clock, SessionSettings};

use crate::auth::StaffKeys;
use crate::config::AppConfig;
use crate::rate_limit::{InMemoryRateLimitStore, RateLimitPolicy, RateLimitStore};

/// Estado compartilhado pelos handlers
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<CareCore>,
    pub staff_keys: Arc<StaffKeys>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub login_policy: RateLimitPolicy,
    /// Usa `X-Forwarded-For` como chave do limite de login
    pub trust_proxy: bool,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionSettings {
            secret: Zeroizing::new(config.session_secret.as_bytes().to_vec()),
            ttl: Duration::hours(config.session_ttl_hours),
        };

        Self {
            core: Arc::new(CareCore::sqlite(pool, &sessions, clock)),
            staff_keys: Arc::new(StaffKeys::new(config.staff_jwt_secret.as_bytes())),
            rate_limits: Arc::new(InMemoryRateLimitStore::new()),
            login_policy: RateLimitPolicy {
                limit: config.login_rate_limit,
                window: config.login_rate_window,
            },
            trust_proxy: config.trust_proxy,
        }
    }
}
