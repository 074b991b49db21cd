use chat_relay::ChatRelay;
use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use documents::ConfigResolver;
use documents::config::StoreConfig;
use gateway::{AccessKeyValidator, AppState};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod config;

const METRICS_PREFIX: &str = "assistant";

#[derive(Parser)]
#[command(about = "Access-key protected relay for the report assistant")]
enum CliCommand {
    /// Start the HTTP server
    Run(ConfigArgs),
    /// Load and validate the configuration, then print a summary
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Overrides `upstream.api_key` from the configuration file
    #[arg(long, env = "UPSTREAM_API_KEY", hide_env_values = true)]
    upstream_api_key: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config, ConfigError> {
        let mut config = Config::from_file(&self.config)?;
        if let Some(key) = &self.upstream_api_key {
            config.upstream.api_key = Some(key.clone());
        }
        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not open document store: {0}")]
    Store(#[from] documents::StoreError),
    #[error("could not build upstream client: {0}")]
    HttpClient(String),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let result = match &cli {
        CliCommand::Run(args) => args.load().map_err(CliError::from).and_then(run),
        CliCommand::CheckConfig(args) => args
            .load()
            .map(|config| print_summary(&config))
            .map_err(CliError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), CliError> {
    // Must outlive the runtime so pending events are flushed on exit.
    let _sentry = init_logging(&config.logging);
    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), CliError> {
    let resolver = ConfigResolver::from_config(&config.documents)?;
    let relay = ChatRelay::new(config.upstream.clone())
        .map_err(|e| CliError::HttpClient(e.to_string()))?;
    let validator = AccessKeyValidator::new(&config.access_keys);

    if !relay.api_key_configured() {
        tracing::warn!("Upstream API key is not configured, chat requests will be rejected");
    }
    tracing::info!(
        access_keys = validator.len(),
        store_configured = resolver.store_configured(),
        upstream = %config.upstream.url,
        model = %config.upstream.model,
        "Starting assistant"
    );

    let state = AppState::new(validator, resolver, relay);
    gateway::serve(&config.listener, state, shutdown_signal()).await?;
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    // The DSN has been validated with the rest of the configuration.
    let guard = config.dsn().ok().flatten().map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| CliError::Metrics("a recorder is already installed".into()))?;

    for defs in [
        gateway::metrics_defs::ALL_METRICS,
        documents::metrics_defs::ALL_METRICS,
        chat_relay::metrics_defs::ALL_METRICS,
    ] {
        shared::metrics_defs::describe_all(defs);
    }
    Ok(())
}

fn print_summary(config: &Config) {
    let store = match &config.documents.store {
        Some(StoreConfig::Sqlite { path }) => format!("sqlite ({})", path.display()),
        // The URL may carry credentials
        Some(StoreConfig::Mysql { .. }) => "mysql".to_string(),
        None => "none".to_string(),
    };
    let api_key = if config.upstream.api_key().is_some() {
        "configured"
    } else {
        "missing"
    };

    println!("listener:          {}", config.listener.addr());
    println!("access keys:       {}", AccessKeyValidator::new(&config.access_keys).len());
    println!("upstream:          {}", config.upstream.url);
    println!("model:             {}", config.upstream.model);
    println!("upstream api key:  {api_key}");
    println!("timeout:           {}s", config.upstream.timeout_secs);
    println!("context file:      {}", config.documents.context_file.display());
    println!("tools prompt file: {}", config.documents.tools_prompt_file.display());
    println!("store:             {store}");
    println!(
        "metrics:           {}",
        config
            .metrics
            .as_ref()
            .map(|m| format!("statsd {}:{}", m.statsd_host, m.statsd_port))
            .unwrap_or_else(|| "disabled".to_string())
    );
}
