// # smsd - SMS Dispatch Daemon
//
// The smsd daemon is a thin integration layer around sms-core. It is
// responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and opening the store
// 4. Serving the HTTP API until SIGTERM/SIGINT
//
// All dispatch, failover and lifecycle logic lives in sms-core.
//
// ## Configuration
//
// ### Providers
// - `SMSD_PROVIDERS`: Comma-separated `url=ratio` entries (ratio 0-100, default 100)
// - `SMSD_CALLBACK_URL`: URL providers report delivery outcomes to
// - `SMSD_HTTP_TIMEOUT_SECS`: Timeout for one provider call
//
// ### Store
// - `SMSD_STORE_TYPE`: Type of store (memory, file)
// - `SMSD_STORE_PATH`: Path to store file (for file store)
//
// ### Daemon
// - `SMSD_BIND_ADDR`: Listen address (default 0.0.0.0:3000)
// - `SMSD_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export SMSD_PROVIDERS=https://provider1.example.com/send=30,https://provider2.example.com/send=70
// export SMSD_CALLBACK_URL=https://sms.example.com/delivery_status
// export SMSD_STORE_TYPE=file
// export SMSD_STORE_PATH=/var/lib/smsd/store.json
//
// smsd
// ```

mod api;
mod config;

use anyhow::Result;
use sms_core::config::StoreConfig;
use sms_core::traits::{MessageStore, PhoneDirectory};
use sms_core::{DispatchEngine, DispatchEvent, FileStore, MemoryStore, ProviderRegistry};
use sms_transport_http::HttpTransport;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SmsdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SmsdExitCode> for ExitCode {
    fn from(code: SmsdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SmsdExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SmsdExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(tracing::Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SmsdExitCode::ConfigError.into();
    }

    info!("Starting smsd daemon");
    info!("Configuration loaded: {} provider(s)", config.providers.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SmsdExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            SmsdExitCode::RuntimeError
        } else {
            SmsdExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let service = config.service_config();

    let registry = Arc::new(ProviderRegistry::from_config(&service.providers)?);
    for provider in registry.snapshot() {
        info!(
            "Registered {} at {} with call ratio {}",
            provider.id, provider.url, provider.call_ratio
        );
    }

    let transport = Arc::new(match config.http_timeout_secs {
        Some(secs) => HttpTransport::new(Duration::from_secs(secs))?,
        None => HttpTransport::with_default_timeout()?,
    });

    let (phones, messages) = open_store(&service.store).await?;

    let (engine, events) = DispatchEngine::new(
        registry,
        transport,
        phones,
        Arc::clone(&messages),
        &service.engine,
    )?;
    let events_task = tokio::spawn(log_events(events));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()?).await?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = ShutdownSignal::install()?;
    let app = api::router(Arc::new(engine));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal = shutdown.recv().await;
            info!("Received shutdown signal: {}", signal);
        })
        .await?;

    info!("Shutting down daemon");
    messages.flush().await?;

    // The router (and with it the engine's sender) is gone; the log task ends
    if tokio::time::timeout(Duration::from_secs(5), events_task)
        .await
        .is_err()
    {
        warn!("Event log task did not finish in time");
    }

    Ok(())
}

/// Open the configured store, shared as both phone directory and message store
async fn open_store(
    store: &StoreConfig,
) -> Result<(Arc<dyn PhoneDirectory>, Arc<dyn MessageStore>)> {
    match store {
        StoreConfig::Memory => {
            info!("Using in-memory store");
            let store = Arc::new(MemoryStore::new());
            let phones: Arc<dyn PhoneDirectory> = store.clone();
            let messages: Arc<dyn MessageStore> = store;
            Ok((phones, messages))
        }
        StoreConfig::File { path } => {
            info!("Using file store at {}", path);
            let store = Arc::new(FileStore::new(path).await?);
            let phones: Arc<dyn PhoneDirectory> = store.clone();
            let messages: Arc<dyn MessageStore> = store;
            Ok((phones, messages))
        }
    }
}

/// Log dispatch events until the engine is dropped
async fn log_events(mut events: mpsc::Receiver<DispatchEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            DispatchEvent::DispatchStarted {
                phone_number,
                providers,
            } => debug!("Dispatch to {} started ({} providers)", phone_number, providers),
            DispatchEvent::AttemptFailed {
                phone_number,
                provider,
                reason,
            } => debug!("{} failed for {}: {}", provider, phone_number, reason),
            DispatchEvent::MessageAccepted {
                message_id,
                provider,
            } => debug!("Message {} accepted by {}", message_id, provider),
            DispatchEvent::ProvidersExhausted {
                phone_number,
                attempts,
            } => warn!(
                "No provider accepted message to {} ({} attempts)",
                phone_number, attempts
            ),
            DispatchEvent::BlacklistRejected { phone_number } => {
                debug!("Rejected message to blacklisted {}", phone_number)
            }
            DispatchEvent::StatusUpdated {
                message_id,
                from,
                to,
            } => debug!("Message {}: {} -> {}", message_id, from, to),
            DispatchEvent::PhoneBlacklisted { phone_number } => {
                info!("Phone {} is now blacklisted", phone_number)
            }
        }
    }
}

/// SIGTERM/SIGINT listener, installed before the server starts
#[cfg(unix)]
struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for either signal and return its name
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C listener
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}
