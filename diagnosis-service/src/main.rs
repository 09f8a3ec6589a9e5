use diagnosis_flow::spawn_eviction;
use diagnosis_service::{ServiceConfig, build_router, create_app_state};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing(log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "diagnosis_service=debug,diagnosis_flow=info,tower_http=debug".into()
    });

    match log_format {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    init_tracing(&config.log_format);

    // Artifacts must load before the first request is accepted
    let app_state = match create_app_state(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to initialize diagnosis service");
            std::process::exit(1);
        }
    };

    if let Some(ttl) = config.session_ttl {
        info!(
            ttl_secs = ttl.as_secs(),
            sweep_secs = config.session_sweep.as_secs(),
            "Session expiry enabled"
        );
        spawn_eviction(app_state.sessions.clone(), config.session_sweep);
    }

    let app = build_router(app_state);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Diagnosis Service starting on {}", addr);
    info!("API Documentation available at http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
