mod server;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crm_core::{default_config_path, CrmConfig, EmailGateway, ProviderSettings};

use crate::server::{router, AppState, EMAIL_PATH};

const DEFAULT_ADDR: &str = "127.0.0.1:8787";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let addr: SocketAddr = std::env::var("AUTOCRM_GATEWAY_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("Invalid AUTOCRM_GATEWAY_ADDR")?;

    // The blocking HTTP client must not be created or dropped on a runtime thread
    let settings = ProviderSettings::from_config(&config.enrichment);
    if settings.api_key.is_none() {
        tracing::warn!(
            variable = settings.kind.api_key_env(),
            "no API key set; requests will fail with 500"
        );
    }
    let gateway = Arc::new(EmailGateway::new(settings)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let state = AppState {
        gateway: gateway.clone(),
    };
    runtime.block_on(serve(addr, state))?;

    drop(runtime);
    drop(gateway);
    Ok(())
}

fn load_config() -> Result<CrmConfig> {
    let path = default_config_path()?;
    let mut config = if path.exists() {
        CrmConfig::load(&path)?
    } else {
        CrmConfig::default()
    };
    config.apply_env()?;
    Ok(config)
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let provider = state.gateway.provider_kind();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(%addr, %provider, path = EMAIL_PATH, "gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
