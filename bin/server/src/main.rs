use frontgate_server::boot::{self, BootError};
use frontgate_server::config::ServerConfig;
use frontgate_server::router;
use rootcause::prelude::Report;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        context_root = %config.serve.context_root,
        non_functional_root = %config.serve.non_functional_root,
        "loaded configuration"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), Report<BootError>> {
    let state = boot::assemble(&config).await?;
    let sweeper = boot::spawn_session_sweeper(
        state.sessions.clone(),
        config.session.cleanup_interval(),
    );

    let address = config.serve.bind_addr();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| BootError::Bind {
            address: address.clone(),
            details: e.to_string(),
        })?;
    tracing::info!("listening on {}", config.serve.base_url());

    let app = router::build(state.clone());
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(boot::shutdown_signal())
        .await;

    sweeper.abort();
    if let Err(e) = state.repository.disconnect().await {
        tracing::warn!(error = %e, "failed to disconnect repository");
    }

    served.map_err(|e| BootError::Serve {
        details: e.to_string(),
    })?;
    tracing::info!("shut down");
    Ok(())
}
