// # uddnsd - uddns daemon
//
// Thin integration layer around `uddns-core`:
// 1. Parse the command line and install logging
// 2. Discover and validate the YAML configuration
// 3. Register the compiled-in backends and select one of each
// 4. Run the reconciliation loop until SIGINT/SIGTERM
//
// No reconciliation logic lives here.
//
// ## Example
//
// ```bash
// uddnsd -c /etc/uddns.yaml
// UDDNS_INTERVAL=5m UDDNS_LOG_LEVEL=debug uddnsd
// uddnsd --once   # single cycle, for cron
// ```

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use uddns_core::{
    ComponentRegistry, CycleOutcome, LoopEvent, ReconciliationLoop, UddnsConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UddnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure, or a failed `--once` cycle)
    RuntimeError = 2,
}

impl From<UddnsExitCode> for ExitCode {
    fn from(code: UddnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Dynamic DNS client: keeps A/AAAA records in sync with this host's address
#[derive(Debug, Parser)]
#[command(name = "uddnsd", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (overrides UDDNS_LOG_LEVEL)
    #[arg(short, long)]
    verbose: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

/// Resolve the log level from `-v` and `UDDNS_LOG_LEVEL`
fn log_level(verbose: bool, env_level: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    match env_level.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = log_level(cli.verbose, env::var("UDDNS_LOG_LEVEL").ok().as_deref());
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return UddnsExitCode::ConfigError.into();
    }

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return UddnsExitCode::ConfigError.into();
        }
    };

    info!("Starting uddnsd {}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return UddnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let (reconciler, events) = match assemble(&config) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return UddnsExitCode::ConfigError;
            }
        };

        let result = if cli.once {
            run_once(reconciler, events).await
        } else {
            run_daemon(reconciler, events).await
        };

        match result {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                UddnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Register every backend compiled into this binary
fn build_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    #[cfg(feature = "ip-service")]
    uddns_ip_service::register(&mut registry);

    #[cfg(feature = "netif")]
    uddns_ip_netif::register(&mut registry);

    #[cfg(feature = "routeros")]
    uddns_ip_routeros::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    uddns_updater_cloudflare::register(&mut registry);

    #[cfg(feature = "dyndns")]
    uddns_updater_dyndns::register(&mut registry);

    #[cfg(feature = "aliyun")]
    uddns_updater_aliyun::register(&mut registry);

    #[cfg(feature = "telegram")]
    uddns_notifier_telegram::register(&mut registry);

    debug!(
        "Registered providers: [{}], updaters: [{}], notifiers: [{}]",
        registry.list_providers().join(", "),
        registry.list_updaters().join(", "),
        registry.list_notifiers().join(", ")
    );
    registry
}

/// Select the configured backends and build the loop
fn assemble(config: &UddnsConfig) -> Result<(ReconciliationLoop, mpsc::Receiver<LoopEvent>)> {
    let registry = build_registry();

    let provider = registry
        .create_provider(&config.provider)
        .context("Failed to create address provider")?;
    info!("Address provider selected: {}", provider.provider_name());

    let updater = registry
        .create_updater(&config.updater)
        .context("Failed to create record updater")?;
    info!("Record updater selected: {}", updater.updater_name());

    let notifier = registry
        .create_notifier(config.notifier.as_ref())
        .context("Failed to create notifier")?;
    info!("Notifier selected: {}", notifier.notifier_name());

    let parts = ReconciliationLoop::new(provider, updater, notifier, config.loop_config())
        .context("Failed to create reconciliation loop")?;
    Ok(parts)
}

/// Log loop events until the loop drops its sender
async fn drain_events(mut events: mpsc::Receiver<LoopEvent>) {
    while let Some(event) = events.recv().await {
        match &event {
            LoopEvent::FamilyFailed { .. } | LoopEvent::NotifyFailed { .. } => {
                warn!("Loop event: {:?}", event)
            }
            _ => debug!("Loop event: {:?}", event),
        }
    }
}

/// Run a single cycle
///
/// Any failed family or resolution failure maps to a runtime error exit,
/// so a cron wrapper can tell the run did not reconcile.
async fn run_once(
    mut reconciler: ReconciliationLoop,
    events: mpsc::Receiver<LoopEvent>,
) -> Result<UddnsExitCode> {
    let drain = tokio::spawn(drain_events(events));
    let outcome = reconciler.run_cycle().await;
    drop(reconciler);
    drain.await.context("Event logger task failed")?;

    Ok(match outcome {
        CycleOutcome::Unchanged { .. } => UddnsExitCode::CleanShutdown,
        CycleOutcome::Reconciled { failed, .. } if failed.is_empty() => {
            UddnsExitCode::CleanShutdown
        }
        CycleOutcome::Reconciled { failed, .. } => {
            warn!("{} family update(s) failed", failed.len());
            UddnsExitCode::RuntimeError
        }
        CycleOutcome::ResolutionFailed { .. } => UddnsExitCode::RuntimeError,
    })
}

/// Run the loop until a shutdown signal arrives
async fn run_daemon(
    mut reconciler: ReconciliationLoop,
    events: mpsc::Receiver<LoopEvent>,
) -> Result<UddnsExitCode> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = ShutdownSignals::install()?;

    tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received shutdown signal: {}", name);
        // The loop finishes its current cycle and stops at the next sleep
        let _ = shutdown_tx.send(());
    });

    let drain = tokio::spawn(drain_events(events));

    info!("Ready to monitor IP changes");
    reconciler.run_with_shutdown(Some(shutdown_rx)).await;
    drop(reconciler);

    drain.await.context("Event logger task failed")?;
    info!("Shutting down uddnsd");
    Ok(UddnsExitCode::CleanShutdown)
}

/// SIGTERM/SIGINT listeners, installed before the first cycle
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
        let sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
        Ok(Self { sigterm, sigint })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C only on non-Unix platforms
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::try_parse_from(["uddnsd", "-c", "/etc/u.yaml", "-v", "--once"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/u.yaml")));
        assert!(cli.verbose);
        assert!(cli.once);

        let cli = Cli::try_parse_from(["uddnsd"]).unwrap();
        assert!(cli.config.is_none() && !cli.verbose && !cli.once);
    }

    #[test]
    fn log_level_resolution() {
        assert_eq!(log_level(false, None), Level::INFO);
        assert_eq!(log_level(false, Some("WARN")), Level::WARN);
        assert_eq!(log_level(false, Some("bogus")), Level::INFO);
        assert_eq!(log_level(true, Some("error")), Level::DEBUG);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(UddnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(UddnsExitCode::ConfigError as u8, 1);
        assert_eq!(UddnsExitCode::RuntimeError as u8, 2);
    }

    #[cfg(all(feature = "ip-service", feature = "cloudflare", feature = "telegram"))]
    #[test]
    fn default_build_registers_every_backend() {
        let registry = build_registry();
        assert!(registry.has_provider("ip_service"));
        assert!(registry.has_updater("cloudflare"));
        assert!(registry.has_notifier("telegram"));
    }

    #[test]
    fn unknown_factory_is_a_startup_error() {
        let config: UddnsConfig = serde_yaml::from_str(
            "provider:\n  type: custom\n  factory: nope\n  config: {}\nupdater:\n  type: duckdns\n  domain: home\n  token: t\n",
        )
        .unwrap();

        let err = assemble(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("Unknown provider type: nope"));
    }
}
