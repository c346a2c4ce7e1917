//! Limite de tentativas no login do paciente
//!
//! Janela fixa por cliente: o balde é criado na primeira requisição e zerado
//! quando a janela expira. Baldes vencidos são descartados quando o mapa
//! passa de `PRUNE_THRESHOLD` entradas. O store é injetável para que
//! implantações com várias instâncias usem um cache compartilhado.
//!
//! `X-Forwarded-For` só é considerado com `CLINIC_TRUST_PROXY=true`; sem
//! proxy reverso confiável a chave é o endereço do peer TCP.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Extensions, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Quantas requisições cabem em cada janela
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

pub trait RateLimitStore: Send + Sync {
    /// Conta uma requisição; `Err(segundos)` quando o limite foi excedido
    fn hit(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> Result<(), u64>;
}

/// Tamanho a partir do qual o store limpa baldes vencidos
pub const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_expires_at: Instant,
}

/// Store em memória para implantação de instância única
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baldes ativos no momento
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn hit(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> Result<(), u64> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= PRUNE_THRESHOLD {
            buckets.retain(|_, bucket| bucket.window_expires_at > now);
        }

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            window_expires_at: now + policy.window,
        });
        if bucket.window_expires_at <= now {
            bucket.count = 0;
            bucket.window_expires_at = now + policy.window;
        }

        if bucket.count >= policy.limit {
            let remaining = bucket.window_expires_at.saturating_duration_since(now);
            return Err(remaining.as_secs().max(1));
        }
        bucket.count += 1;
        Ok(())
    }
}

/// IP do cliente: com `trust_proxy`, o primeiro de `X-Forwarded-For`;
/// senão (ou na ausência do cabeçalho) o peer TCP
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> Option<String> {
    trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

pub async fn limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let client = client_ip(req.headers(), req.extensions(), state.trust_proxy);
    let key = format!("login:{}", client.as_deref().unwrap_or("anonymous"));
    if let Err(retry_after) = state
        .rate_limits
        .hit(&key, state.login_policy, Instant::now())
    {
        warn!(%key, retry_after, "Limite de tentativas de login excedido");
        return ApiError::RateLimited { retry_after }.into_response();
    }
    next.run(req).await
}
