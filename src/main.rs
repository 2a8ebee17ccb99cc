//! Confidant - Confidentiality-Preserving Remote Email Classification
//!
//! `serve` runs the remote classifier; `classify` runs the invocation
//! client against it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confidant::{
    config::{resolve_env_ref, ConfidantConfig, LogFormat},
    crypto::{self, ContentKey, TransportPublicKey, TransportSecret},
    hardening,
    protocol::KeyTransport,
    remote::{self, RemoteClassifier, RemoteState},
    secrets::Credential,
    InvocationClient,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "confidant")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Confidentiality-preserving remote email classification")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIDANT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_parser = ["pretty", "json"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remote classifier
    Serve {
        /// Address to bind to (overrides remote.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Classify one email through the remote classifier
    Classify {
        /// Read the email from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate an X25519 transport key pair for wrapped key transport
    Keygen,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Run diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ConfidantConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfidantConfig::default(),
    };

    // Initialize logging
    let format = match cli.log_format.as_deref() {
        Some("json") => LogFormat::Json,
        Some(_) => LogFormat::Pretty,
        None => config.logging.format,
    };
    let log_level = if cli.verbose { "debug" } else { "info" };
    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| format!("confidant={},tower_http={}", log_level, log_level));
    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    match cli.command {
        Commands::Serve { bind } => run_serve(config, bind).await?,
        Commands::Classify { file } => run_classify(&config, file).await?,
        Commands::Keygen => run_keygen(),
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::Doctor => run_doctor(&config),
    }

    Ok(())
}

async fn run_serve(config: ConfidantConfig, bind: Option<String>) -> Result<()> {
    hardening::disable_core_dumps().context("Failed to disable core dumps")?;

    let token = resolve_env_ref(&config.remote.invoke_token_ref).with_context(|| {
        format!(
            "Invoke token variable {} is not set",
            config.remote.invoke_token_ref
        )
    })?;
    let classifier = RemoteClassifier::from_config(&config)?;
    let state = RemoteState::new(Arc::new(classifier), &Credential::new(token));

    let addr = bind.unwrap_or_else(|| config.remote.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Starting remote classifier. Press Ctrl+C to stop.");
    remote::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
    })
    .await?;

    Ok(())
}

async fn run_classify(config: &ConfidantConfig, file: Option<PathBuf>) -> Result<()> {
    let content = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let client = InvocationClient::from_config(config)?;
    let classification = client.classify(&content).await?;

    println!(
        "{} {:.2} {}",
        classification.result.label.as_str(),
        classification.result.confidence,
        classification.path.as_str()
    );
    if let Some(detail) = &classification.result.detail {
        println!("{}", detail);
    }

    Ok(())
}

fn run_keygen() {
    let secret = TransportSecret::generate();
    println!("# Store the secret in the classifier's secret store (remote.transport_secret)");
    println!("secret = \"{}\"", secret.to_base64());
    println!("# Put the public key in the caller's config (client.remote_public_key)");
    println!("remote_public_key = \"{}\"", secret.public_key().to_base64());
}

fn show_config(config: Option<&ConfidantConfig>) -> Result<()> {
    let default = ConfidantConfig::default();
    let config = config.unwrap_or(&default);
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn check(ok: bool, what: &str) {
    if ok {
        println!("  ✓ {}", what);
    } else {
        println!("  ✗ {}", what);
    }
}

fn run_doctor(config: &ConfidantConfig) {
    println!("Confidant Doctor");
    println!();

    println!("Configuration:");
    check(config.validate().is_ok(), "configuration is valid");
    if let Ok(labels) = config.label_set() {
        println!("  labels: {}", labels.iter().collect::<Vec<_>>().join(", "));
    }

    println!();
    println!("Envelope:");
    let key = ContentKey::generate();
    let roundtrip = crypto::seal(b"doctor", &key)
        .and_then(|sealed| crypto::open(&sealed, &key))
        .map(|opened| opened.as_slice() == b"doctor")
        .unwrap_or(false);
    check(roundtrip, "AES-256-GCM seal/open round trip");

    println!();
    println!("Client:");
    check(
        resolve_env_ref(&config.client.invoke_token_ref).is_some(),
        &format!("invoke token ({})", config.client.invoke_token_ref),
    );
    if config.client.fallback_enabled {
        check(
            resolve_env_ref(&config.client.fallback_api_key_ref).is_some(),
            &format!("fallback credential ({})", config.client.fallback_api_key_ref),
        );
    } else {
        println!("  - fallback disabled");
    }
    if config.client.key_transport == KeyTransport::Wrapped {
        check(
            config
                .client
                .remote_public_key
                .as_deref()
                .map(|k| TransportPublicKey::from_base64(k).is_ok())
                .unwrap_or(false),
            "remote public key",
        );
    }

    println!();
    println!("Remote classifier:");
    check(
        resolve_env_ref(&config.remote.invoke_token_ref).is_some(),
        &format!("invoke token ({})", config.remote.invoke_token_ref),
    );
    println!(
        "  credential secret: {} ({})",
        config.remote.credential_secret.name(),
        match &config.remote.credential_secret {
            confidant::secrets::SecretSource::Env { .. } => "env",
            confidant::secrets::SecretSource::Http { .. } => "http",
        }
    );
    check(hardening::is_enabled(), "core dumps disabled at serve");
}
