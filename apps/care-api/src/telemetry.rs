use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "care_api=info,care_core=info,common_db=info,tower_http=info";

/// Inicializa o subscriber global; `RUST_LOG` tem precedência sobre o padrão
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
