use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use care_api::{built_info, router, telemetry, AppConfig, AppState};
use care_core::SystemClock;
use common_db::init_db_pool;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Configuração inválida")?;
    telemetry::init_tracing(config.log_json);

    info!(version = built_info::PKG_VERSION, "Iniciando care-api");

    let pool = init_db_pool(&config.db).await?;
    let state = AppState::new(pool.clone(), &config, Arc::new(SystemClock));
    let app = router(state, config.max_concurrency);

    info!(addr = %config.bind_addr, "Servidor HTTP escutando");
    axum::Server::try_bind(&config.bind_addr)
        .with_context(|| format!("Falha ao abrir {}", config.bind_addr))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Erro no servidor HTTP")?;

    pool.close().await;
    info!("care-api encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Falha ao aguardar sinal de encerramento");
    }
}
