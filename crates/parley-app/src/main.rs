mod cli;
mod mcp;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use parley_ai::{engine_from_config, Generator, SessionManager, SessionStore};
use parley_config::{config_to_json, ParleyConfig};
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use crate::mcp::ParleyMcpServer;

/// Load environment variables from a .env file (KEY=VALUE lines).
///
/// Variables already present in the environment win.
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

/// Logs go to stderr; stdout carries the MCP transport.
fn init_logging(cli_level: Option<&str>, config: Option<&ParleyConfig>) {
    let level = config
        .map(|c| c.logging.level.as_directive())
        .unwrap_or("info");
    let default_directive = format!("warn,parley={level},parley_ai={level},parley_config={level}");

    let filter = match cli_level {
        Some(directive) => EnvFilter::try_new(expand_level(directive))
            .unwrap_or_else(|_| EnvFilter::new(&default_directive)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_directive)),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
}

/// A bare level applies to Parley's own crates; anything else is used as a
/// full directive.
fn expand_level(directive: &str) -> String {
    match directive {
        "trace" | "debug" | "info" | "warn" | "error" => {
            format!("warn,parley={directive},parley_ai={directive},parley_config={directive}")
        }
        other => other.to_string(),
    }
}

async fn run(config: ParleyConfig) -> Result<(), Box<dyn std::error::Error>> {
    // A missing or unloadable model is fatal before the transport opens.
    let model = engine_from_config(&config.model)?;

    let store = Arc::new(SessionStore::open(&config.session).await?);
    let generator = Generator::new(model, &config.streaming);
    let streaming = generator.is_streaming();
    let manager = Arc::new(SessionManager::new(
        store,
        generator,
        config.generation.clone(),
        config.session.max_messages,
    ));

    tracing::debug!("effective configuration: {}", config_to_json(&config));
    tracing::info!(
        backend = %config.model.backend,
        streaming = streaming,
        "serving MCP on stdio"
    );
    let running = ParleyMcpServer::new(manager)
        .serve(rmcp::transport::stdio())
        .await?;
    running.waiting().await?;
    tracing::info!("client disconnected, shutting down");
    Ok(())
}

fn main() -> ExitCode {
    // Load .env file before anything reads the environment
    load_dotenv();

    let args = cli::parse();
    let config = parley_config::load_config(args.config.as_deref().map(Path::new));
    init_logging(args.log_level.as_deref(), config.as_ref().ok());

    tracing::info!("Parley v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
