//! Care API - camada HTTP do núcleo de cuidado
//!
//! Traduz requisições em chamadas aos engines de `care-core` e os erros de
//! regra de negócio em status HTTP.

pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod telemetry;

/// Informações de build geradas pelo `build.rs`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use config::AppConfig;
pub use routes::router;
pub use state::AppState;
