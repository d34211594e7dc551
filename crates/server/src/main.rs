use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codesys_core::error::CoreError;
use codesys_core::tools::ProjectTools;
use codesys_server::cli::{Cli, LogFormat};
use codesys_server::stdio;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Tracing ---
    // stdout carries responses; all logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "codesys_server=info,codesys_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    // --- Configuration ---
    let config = cli.resolve_config().context("Invalid configuration")?;
    tracing::info!(
        codesys = %config.codesys_path.display(),
        profile = %config.profile_name,
        workspace = %config.workspace_dir.display(),
        timeout_secs = config.timeout.as_secs(),
        strategy = %config.launch_strategy,
        "Loaded configuration",
    );

    match tokio::fs::metadata(&config.codesys_path).await {
        Ok(meta) if meta.is_file() => tracing::info!("Confirmed CODESYS executable exists"),
        _ => return Err(CoreError::ExecutableNotFound(config.codesys_path.clone()).into()),
    }

    // --- Tools ---
    let tools = Arc::new(ProjectTools::from_config(&config));
    if let Err(e) = tools.templates().preload().await {
        tracing::warn!(error = %e, "Template preload failed; loading on demand");
    }

    // --- Serve ---
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tracing::info!("Serving requests on stdio");
    tokio::select! {
        result = stdio::serve(tools, stdin, stdout) => result?,
        _ = shutdown_signal() => tracing::info!("Shutdown signal received"),
    }

    tracing::info!("Server shut down");
    Ok(())
}

/// Wait for Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
