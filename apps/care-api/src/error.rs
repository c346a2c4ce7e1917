//! Erros da API com corpo JSON estruturado

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::ValidationErrors;

use care_core::CoreError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Autenticação necessária")]
    Unauthorized,

    #[error("Requisição inválida: {0}")]
    Validation(String),

    #[error("Limite de requisições excedido")]
    RateLimited { retry_after: u64 },

    #[error("Erro interno: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Core(err) => core_parts(err),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                self.to_string(),
            ),
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_INPUT",
                detail.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Tente novamente em {}s", retry_after),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "Erro interno na API");
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "Erro interno".to_string(),
    )
}

fn core_parts(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        // CPF desconhecido e PIN errado são indistinguíveis para o cliente
        CoreError::PatientNotFound | CoreError::InvalidPin { .. } => (
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "CPF ou PIN inválido".to_string(),
        ),
        CoreError::PatientPinBlocked { .. } => {
            (StatusCode::LOCKED, err.code(), err.to_string())
        }
        CoreError::AppointmentNotFound(_) | CoreError::AlertNotFound(_) => {
            (StatusCode::NOT_FOUND, err.code(), err.to_string())
        }
        CoreError::AppointmentConflict { .. } => {
            (StatusCode::CONFLICT, err.code(), err.to_string())
        }
        CoreError::SessionInvalid => (StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
        CoreError::InvalidInput(detail) => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.code(), detail.clone())
        }
        CoreError::Store(db) => {
            tracing::error!(error = %db, "Falha no banco de dados");
            internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common_db::DbError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_login_failures_share_status_and_code() {
        let not_found = ApiError::from(CoreError::PatientNotFound);
        let wrong_pin = ApiError::from(CoreError::InvalidPin { attempts: 2 });
        assert_eq!(not_found.parts().1, "INVALID_CREDENTIALS");
        assert_eq!(not_found.parts(), wrong_pin.parts());
        assert_eq!(status_of(not_found), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_domain_status_mapping() {
        assert_eq!(
            status_of(CoreError::PatientPinBlocked { blocked_until: Utc::now() }.into()),
            StatusCode::LOCKED
        );
        assert_eq!(
            status_of(CoreError::AppointmentNotFound(1).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                CoreError::AppointmentConflict {
                    professional_id: 1,
                    starts_at: Utc::now()
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CoreError::InvalidInput("x".into()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_store_failure_is_opaque() {
        let err = ApiError::from(CoreError::Store(DbError::QueryError(
            "no such table: patients".to_string(),
        )));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL");
        assert!(!message.contains("patients"));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }
}
