//! Extratores de autenticação
//!
//! Equipe: JWT HS256 cujo `sub` é o id do profissional. Paciente: token opaco
//! de sessão emitido no login por PIN. Ambos chegam em `Authorization: Bearer`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use care_core::{ProfessionalContext, RequestMeta};

use crate::error::ApiError;
use crate::rate_limit::client_ip;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StaffClaims {
    /// Id do profissional
    pub sub: String,
    pub exp: usize,
}

/// Chaves do JWT da equipe
pub struct StaffKeys {
    decoding: DecodingKey,
    encoding: EncodingKey,
}

impl StaffKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
        }
    }

    pub fn verify(&self, token: &str) -> Result<ProfessionalContext, ApiError> {
        let data = decode::<StaffClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(error = %e, "JWT da equipe rejeitado");
                ApiError::Unauthorized
            })?;
        let professional_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| ApiError::Unauthorized)?;
        Ok(ProfessionalContext::new(professional_id))
    }

    /// Emite um token para o profissional (ferramentas internas e testes)
    pub fn issue(&self, professional_id: i64, ttl: chrono::Duration) -> Result<String, ApiError> {
        let claims = StaffClaims {
            sub: professional_id.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
        };
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Falha ao emitir JWT: {}", e)))
    }
}

/// Token bruto do cabeçalho `Authorization`
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| BearerToken(token.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// Profissional autenticado
pub struct Staff(pub ProfessionalContext);

#[async_trait]
impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        Ok(Staff(state.staff_keys.verify(&token)?))
    }
}

/// Paciente com sessão ativa
pub struct PatientSession {
    pub patient_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for PatientSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let patient_id = state.core.auth.authenticate(&token).await?;
        Ok(PatientSession { patient_id })
    }
}

/// IP e user-agent de origem, gravados na auditoria de login
pub struct ClientMeta(pub RequestMeta);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = client_ip(&parts.headers, &parts.extensions);
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(ClientMeta(RequestMeta { ip, user_agent }))
    }
}
