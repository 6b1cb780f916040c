//! scribe-gen - content transformation microservice
//!
//! **Module Identity:**
//! - Name: scribe-gen
//! - Default listen address: 127.0.0.1:5730
//!
//! Startup is fail-fast: configuration, directives and every backend credential
//! are resolved before the listener is bound.

use anyhow::{Context, Result};
use clap::Parser;
use scribe_common::config::{
    resolve_api_key, ConfigResolver, TomlConfig, CONFIG_ENV_VAR, GENERATION_KEY_ENV,
    REWRITE_KEY_ENV,
};
use scribe_gen::pipeline::directives::DirectiveTable;
use scribe_gen::pipeline::placeholders::PlaceholderResolver;
use scribe_gen::pipeline::{Pipeline, PipelineConfig};
use scribe_gen::services::{ChatClient, ImageSearchClient};
use scribe_gen::types::{MediaLookup, NoMedia, TextGenerator};
use scribe_gen::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line arguments for scribe-gen
#[derive(Parser, Debug)]
#[command(name = "scribe-gen")]
#[command(about = "Block-based content generation and rewrite service")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "SCRIBE_LISTEN")]
    listen: Option<String>,

    /// Log level filter (overrides config; RUST_LOG wins over both)
    #[arg(long, env = "SCRIBE_LOG_LEVEL")]
    log_level: Option<String>,
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Build the pipeline and its backends from validated configuration
fn build_pipeline(config: &TomlConfig) -> Result<Pipeline> {
    let directives = match &config.directives_path {
        Some(path) => {
            info!("Loading directives from {}", path.display());
            DirectiveTable::from_file(path)?
        }
        None => DirectiveTable::bundled()?,
    };

    let generation_key = resolve_api_key(&config.generation, GENERATION_KEY_ENV)
        .context("Generation backend credential")?;
    let generator: Arc<dyn TextGenerator> =
        Arc::new(ChatClient::new(&config.generation, generation_key)?);
    info!(
        base_url = %config.generation.base_url,
        model = %config.generation.model,
        "Generation backend configured"
    );

    let rewriter: Arc<dyn TextGenerator> = match &config.rewrite {
        Some(profile) => {
            let key = resolve_api_key(profile, REWRITE_KEY_ENV)
                .context("Rewrite backend credential")?;
            info!(base_url = %profile.base_url, model = %profile.model, "Rewrite backend configured");
            Arc::new(ChatClient::new(profile, key)?)
        }
        None => {
            info!("No [rewrite] profile; rewrites use the generation backend");
            Arc::clone(&generator)
        }
    };

    let media: Arc<dyn MediaLookup> = if config.media.enabled {
        Arc::new(ImageSearchClient::new(&config.media)?)
    } else {
        info!("Media lookup disabled; image placeholders will be removed");
        Arc::new(NoMedia)
    };

    let pipeline_config = PipelineConfig::from(&config.pipeline);
    let placeholders = PlaceholderResolver::new(
        media,
        Duration::from_secs(config.media.timeout_secs),
        pipeline_config.dispatch.max_concurrency,
    );

    Ok(Pipeline::new(
        Arc::new(directives),
        generator,
        rewriter,
        placeholders,
        pipeline_config,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config supplies the default log level, so it loads before the subscriber exists
    let config = ConfigResolver::new(args.config.clone()).load();
    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&level);

    info!(
        "Starting scribe-gen v{} [{}] ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let config = config.context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config)?;

    let state = AppState::new(Arc::new(pipeline));
    let app = build_router(state);

    let listen = args.listen.unwrap_or_else(|| config.listen.clone());
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("Listening on http://{}", listen);
    info!("Health check: http://{}/health", listen);

    axum::serve(listener, app).await?;

    Ok(())
}
