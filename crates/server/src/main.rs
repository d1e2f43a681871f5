use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use farmgate_moderation::{
    BackgroundConfig, BackgroundProcessor, ImageThumbnailer, ModerationMetrics,
    NotificationDispatcher, PhotoService, ThumbnailWorker,
};
use farmgate_server::api::AppState;
use farmgate_server::auth::AuthProvider;
use farmgate_server::auth::api_key::hash_api_key;
use farmgate_server::config::FarmgateConfig;

/// Farm shop photo moderation HTTP server.
#[derive(Parser, Debug)]
#[command(name = "farmgate-server", about = "Standalone HTTP server for farmgate")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "farmgate.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations for the configured state backend, then exit.
    Migrate,
    /// Hash an API key for `[[auth.api_keys]]`. Reads the raw key from stdin.
    HashKey,
}

/// A spawned background task and the channel that stops it.
struct Task {
    name: &'static str,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::HashKey) = cli.command {
        return run_hash_key();
    }

    let config_path = Path::new(&cli.config);
    let config = FarmgateConfig::load(config_path)?;
    farmgate_server::telemetry::init(&config.logging);

    if !config_path.exists() {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    if let Some(Commands::Migrate) = cli.command {
        return run_migrate(&config).await;
    }

    let state_store = farmgate_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state store initialized");
    let blobs = farmgate_server::blob_factory::create_blob_store(
        &config.blob,
        config.moderation.max_image_bytes,
    )?;
    info!(backend = %config.blob.backend, "blob store initialized");

    let metrics = Arc::new(ModerationMetrics::default());
    let service = Arc::new(
        PhotoService::builder()
            .state(state_store)
            .blobs(blobs)
            .config(config.moderation.clone())
            .metrics(Arc::clone(&metrics))
            .build()?,
    );

    let email_backend = farmgate_server::email_factory::create_email_backend(&config.email)?;
    let notifier = Arc::new(NotificationDispatcher::new(
        email_backend,
        config.email.clone(),
        config.notifications.clone(),
        Arc::clone(&metrics),
    )?);

    let mut tasks = Vec::new();

    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Arc::clone(&notifier).run(service.subscribe(), shutdown_rx));
        tasks.push(Task {
            name: "notifications",
            shutdown_tx,
            handle,
        });
    }

    if config.background.enable_thumbnails {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let worker = ThumbnailWorker::new(
            Arc::clone(&service),
            Arc::new(ImageThumbnailer::default()),
        );
        let handle = tokio::spawn(worker.run(service.subscribe(), shutdown_rx));
        tasks.push(Task {
            name: "thumbnails",
            shutdown_tx,
            handle,
        });
    }

    if config.background.enable_cleanup {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let bg_config = BackgroundConfig {
            cleanup_interval: Duration::from_secs(config.background.cleanup_interval_seconds.max(1)),
            enable_cleanup: true,
        };
        let mut processor = BackgroundProcessor::new(bg_config, Arc::clone(&service), shutdown_rx);
        let handle = tokio::spawn(async move { processor.run().await });
        tasks.push(Task {
            name: "cleanup",
            shutdown_tx,
            handle,
        });
        info!(
            interval_secs = config.background.cleanup_interval_seconds,
            "cleanup sweep scheduled"
        );
    }

    let auth = AuthProvider::from_config(&config.auth)?.map(Arc::new);
    if auth.is_none() {
        warn!("admin authentication disabled, every caller is treated as admin");
    }

    let state = AppState {
        service,
        notifier,
        auth,
        max_body_bytes: config.server.max_body_bytes,
        cors_origins: config.server.cors_origins.clone(),
    };
    let app = farmgate_server::api::router(state);

    // CLI overrides take precedence.
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "farmgate-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    for task in tasks {
        // A task that already exited has dropped its receiver.
        let _ = task.shutdown_tx.send(()).await;
        match tokio::time::timeout(shutdown_timeout, task.handle).await {
            Ok(Ok(())) => info!(task = task.name, "background task stopped"),
            Ok(Err(e)) => warn!(task = task.name, error = %e, "background task panicked"),
            Err(_) => warn!(
                task = task.name,
                timeout_secs = config.server.shutdown_timeout_seconds,
                "background task did not stop in time"
            ),
        }
    }

    info!("farmgate-server shut down");
    Ok(())
}

/// Run the `migrate` subcommand: initialize the state schema and exit.
async fn run_migrate(config: &FarmgateConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.state.backend, "running state backend migrations...");
    let _store = farmgate_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state backend migrations complete");
    Ok(())
}

/// Run the `hash-key` subcommand: read a raw key from stdin, print its hash.
fn run_hash_key() -> Result<(), Box<dyn std::error::Error>> {
    let mut raw = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut raw)?;
    let raw = raw.trim_end_matches(['\r', '\n']);
    if raw.is_empty() {
        return Err("no key on stdin".into());
    }
    println!("{}", hash_api_key(raw));
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
