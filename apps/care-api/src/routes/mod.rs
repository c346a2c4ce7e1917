//! Roteador HTTP
//!
//! Grupos:
//! - público: `/health` e `/patient/login` (com limite de tentativas)
//! - paciente (sessão por PIN): `/patient/*`
//! - equipe (JWT): `/appointments`, `/patients/:id/*`, `/alerts`

use axum::middleware;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rate_limit::limit_login;
use crate::state::AppState;

pub mod alerts;
pub mod appointments;
pub mod health;
pub mod patient;
pub mod patients;

pub fn router(state: AppState, max_concurrency: usize) -> Router {
    let login = Router::new()
        .route("/patient/login", post(patient::login))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_login));

    Router::new()
        .route("/health", get(health::check))
        .merge(login)
        .route("/patient/logout", post(patient::logout))
        .route("/patient/appointments", get(patient::appointments))
        .route("/patient/appointments/:id/confirm", post(patient::confirm))
        .route("/patient/appointments/:id/decline", post(patient::decline))
        .route("/patient/symptoms", post(patient::report_symptom))
        .route(
            "/appointments",
            get(appointments::list).post(appointments::create),
        )
        .route("/appointments/:id", patch(appointments::update))
        .route("/appointments/:id/cancel", post(appointments::cancel))
        .route("/appointments/:id/status", post(appointments::update_status))
        .route(
            "/patients/:id/occurrences",
            get(patients::occurrences).post(patients::record_occurrence),
        )
        .route("/patients/:id/pin", put(patients::set_pin))
        .route("/alerts", get(alerts::list))
        .route("/alerts/:id/status", post(alerts::update_status))
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrency))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    use care_core::ManualClock;
    use common_db::crypto::hash_pin;
    use common_db::init_memory_pool;
    use common_db::models::CreatePatient;
    use common_db::repository::PatientStore;

    use crate::config::AppConfig;

    const CPF: &str = "11111111111";

    struct TestApp {
        router: Router,
        staff_token: String,
        patient_id: i64,
    }

    async fn app(extra_env: &[(&str, &str)]) -> TestApp {
        let mut vars: HashMap<String, String> = [
            ("CLINIC_SESSION_SECRET", "s3ss10n-s3cr3t-com-mais-de-32-caracteres"),
            ("CLINIC_STAFF_JWT_SECRET", "jwt-s3cr3t-da-equipe-com-32-caracteres!!"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.extend(extra_env.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        let pool = init_memory_pool().await.unwrap();
        let patient = PatientStore::new(pool.clone())
            .create(&CreatePatient {
                cpf: CPF.to_string(),
                name: "Maria da Silva".to_string(),
                pin_hash: Some(hash_pin("1234").unwrap()),
                professional_id: Some(10),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap(),
        ));
        let state = AppState::new(pool, &config, clock);
        let staff_token = state
            .staff_keys
            .issue(10, chrono::Duration::hours(1))
            .unwrap();

        TestApp {
            router: router(state, 16),
            staff_token,
            patient_id: patient.id,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn login(router: &Router, pin: &str) -> (StatusCode, Value) {
        send(
            router,
            request(
                "POST",
                "/patient/login",
                None,
                Some(json!({ "cpf": CPF, "pin": pin })),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(&[]).await;
        let (status, body) = send(&app.router, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_login_failures_do_not_reveal_which_field() {
        let app = app(&[]).await;

        let (status, wrong_pin) = login(&app.router, "0000").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, unknown) = send(
            &app.router,
            request(
                "POST",
                "/patient/login",
                None,
                Some(json!({ "cpf": "99999999999", "pin": "1234" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pin, unknown);
        assert_eq!(unknown["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_third_failure_locks_the_pin() {
        let app = app(&[]).await;

        assert_eq!(login(&app.router, "0000").await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(login(&app.router, "0000").await.0, StatusCode::UNAUTHORIZED);
        let (status, body) = login(&app.router, "0000").await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["error"]["code"], "PATIENT_PIN_BLOCKED");

        assert_eq!(login(&app.router, "1234").await.0, StatusCode::LOCKED);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = app(&[("CLINIC_LOGIN_RATE_LIMIT", "2")]).await;

        login(&app.router, "0000").await;
        login(&app.router, "0000").await;
        let response = app
            .router
            .clone()
            .oneshot(request(
                "POST",
                "/patient/login",
                None,
                Some(json!({ "cpf": CPF, "pin": "1234" })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_does_not_bypass_login_limit() {
        let app = app(&[("CLINIC_LOGIN_RATE_LIMIT", "2")]).await;

        let mut statuses = Vec::new();
        for i in 0..4 {
            let mut req = request(
                "POST",
                "/patient/login",
                None,
                Some(json!({ "cpf": "99999999999", "pin": "1234" })),
            );
            req.headers_mut().insert(
                "x-forwarded-for",
                format!("203.0.113.{}", i).parse().unwrap(),
            );
            statuses.push(send(&app.router, req).await.0);
        }

        assert_eq!(statuses[..2], [StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
        assert_eq!(statuses[2..], [StatusCode::TOO_MANY_REQUESTS, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let app = app(&[]).await;
        let (status, body) = login(&app.router, "12").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_patient_flow() {
        let app = app(&[]).await;
        let staff = Some(app.staff_token.as_str());

        let (status, created) = send(
            &app.router,
            request(
                "POST",
                "/appointments",
                staff,
                Some(json!({
                    "patient_id": app.patient_id,
                    "starts_at": "2024-05-20T14:00:00Z",
                    "type": "triage",
                    "notes": "  "
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "scheduled");
        assert_eq!(created["notes"], Value::Null);
        let appointment_id = created["id"].as_i64().unwrap();

        let (status, body) = login(&app.router, "1234").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patient"]["id"], app.patient_id);
        let token = body["token"].as_str().unwrap().to_string();
        let patient = Some(token.as_str());

        let (status, agenda) = send(
            &app.router,
            request("GET", "/patient/appointments", patient, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(agenda.as_array().unwrap().len(), 1);

        let confirm_uri = format!("/patient/appointments/{}/confirm", appointment_id);
        let (status, confirmed) = send(&app.router, request("POST", &confirm_uri, patient, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["status"], "confirmed");

        let (status, recorded) = send(
            &app.router,
            request(
                "POST",
                "/patient/symptoms",
                patient,
                Some(json!({ "kind": "Febre alta", "intensity": 9 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(recorded["occurrence"]["source"], "patient");
        assert_eq!(recorded["occurrence"]["professional_id"], 10);
        assert_eq!(recorded["alert"]["severity"], "high");

        let (status, alerts) = send(&app.router, request("GET", "/alerts?status=open", staff, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alerts["total"], 1);

        let (status, _) = send(&app.router, request("POST", "/patient/logout", patient, None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(
            &app.router,
            request("GET", "/patient/appointments", patient, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "SESSION_INVALID");
    }

    #[tokio::test]
    async fn test_staff_routes_require_jwt_and_report_conflicts() {
        let app = app(&[]).await;
        let booking = json!({
            "patient_id": app.patient_id,
            "starts_at": "2024-05-20T14:00:00Z",
            "type": "treatment"
        });

        let (status, _) = send(
            &app.router,
            request("POST", "/appointments", None, Some(booking.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let staff = Some(app.staff_token.as_str());
        let (status, _) = send(
            &app.router,
            request("POST", "/appointments", staff, Some(booking.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app.router,
            request("POST", "/appointments", staff, Some(booking)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "APPOINTMENT_CONFLICT");

        let (status, body) = send(
            &app.router,
            request("PATCH", "/appointments/999", staff, Some(json!({ "type": "return" }))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "APPOINTMENT_NOT_FOUND");
    }
}
