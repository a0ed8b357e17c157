// Copyright 2026 The Mongopilot Authors
// SPDX-License-Identifier: Apache-2.0

//! Mongopilot: per-node sidecar controller for MongoDB replica sets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mongopilot_api::{create_router, AppState};
use mongopilot_cluster::{
    Bootstrap, BootstrapTiming, ClusterError, HostsManager, HttpPeerClient, IdentityResolver,
    Reconciler, Recovery, RegistryClient, RemoteEngineProbe,
};
use mongopilot_core::config::LogFormat;
use mongopilot_core::Config;
use mongopilot_engine::{EngineControl, EngineError, MongoEngine};

mod cli;

use cli::{Cli, Commands};

/// Exit code signalling the supervisor that the data directory was wiped
/// and a fresh bootstrap (with a full resync) is required.
const EXIT_RESYNC_RESTART: i32 = 70;

/// How long to keep retrying the initial engine connection. The engine
/// container usually starts alongside this one and needs a moment.
const ENGINE_CONNECT_ATTEMPTS: u32 = 60;
const ENGINE_CONNECT_RETRY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_controller(args).await,
        Commands::Version => {
            println!("mongopilot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_controller(args: cli::ServeArgs) -> Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.api_port {
        config.api.port = port;
    }
    if let Some(interval) = args.reconcile_interval_ms {
        config.reconcile.interval_ms = interval;
    }

    init_logging(&config);
    print_banner(&config);

    let registry = RegistryClient::new(&config.app.registry_url, &config.app.name)
        .context("Failed to create registry client")?;
    let hosts = HostsManager::new(&config.hosts);
    let resolver = IdentityResolver::new(
        config.app.local_testing,
        config.identity.public_ip_override.clone(),
    )
    .context("Failed to create identity resolver")?;
    let peers = Arc::new(
        HttpPeerClient::new(config.api.external_port)
            .context("Failed to create peer client")?,
    );

    let engine: Arc<dyn EngineControl> =
        Arc::new(connect_engine(&config).await.context("Engine never became reachable")?);

    let credentials = match (&config.engine.username, &config.engine.password) {
        (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
        _ => None,
    };

    let bootstrap = Bootstrap {
        engine: engine.clone(),
        peers: peers.clone(),
        probe: Arc::new(RemoteEngineProbe::new(config.engine.port, credentials.clone())),
        registry: registry.clone(),
        hosts: hosts.clone(),
        resolver,
        recovery: Recovery::new(
            engine.clone(),
            peers.clone(),
            config.engine.data_dir.clone(),
        ),
        engine_port: config.engine.port,
        local_testing: config.app.local_testing,
        create_root: credentials,
        timing: BootstrapTiming::default(),
    };

    // Identity first: the admin API advertises it, and it must be serving
    // before the founder election's self-reachability probe loops back to
    // this very process through the derived hostname.
    let identity = bootstrap.resolve_identity().await.context("Identity resolution failed")?;

    let app_state = AppState {
        engine: engine.clone(),
        identity: identity.clone(),
        engine_port: config.engine.port,
        replica_set: config.engine.replica_set.clone(),
    };
    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener =
        TcpListener::bind(&bind_addr).await.context("Failed to bind admin API")?;
    info!(addr = %bind_addr, "Admin API listening");

    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, create_router(app_state)).await {
            error!(error = %err, "Admin API server error");
        }
    });

    let outcome = match bootstrap.run(&identity).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "Bootstrap failed");
            return Err(err.into());
        }
    };
    info!(address = %identity.address, outcome = ?outcome, "Controller bootstrapped");

    let reconciler = Reconciler {
        engine: engine.clone(),
        peers: peers.clone(),
        registry,
        hosts,
        recovery: Recovery::new(engine.clone(), peers, config.engine.data_dir.clone()),
        identity,
        engine_port: config.engine.port,
        interval: config.reconcile.interval(),
    };

    tokio::select! {
        result = reconciler.run() => {
            match result {
                Err(ClusterError::ResyncRestart(reason)) => {
                    warn!(reason = %reason, "Exiting for supervised resync restart");
                    std::process::exit(EXIT_RESYNC_RESTART);
                }
                Err(err) => {
                    error!(error = %err, "Reconciler failed");
                    return Err(err.into());
                }
                Ok(()) => {}
            }
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    server.abort();
    info!("Controller shutdown complete");
    Ok(())
}

/// Connects to the local engine, retrying while it starts up.
async fn connect_engine(config: &Config) -> Result<MongoEngine, EngineError> {
    let mut last_err = EngineError::Unreachable("no attempt made".to_string());
    for attempt in 1..=ENGINE_CONNECT_ATTEMPTS {
        match MongoEngine::connect(config.engine.clone()).await {
            Ok(engine) => return Ok(engine),
            Err(err) => {
                warn!(attempt = attempt, error = %err, "Engine not reachable yet");
                last_err = err;
                tokio::time::sleep(ENGINE_CONNECT_RETRY).await;
            }
        }
    }
    Err(last_err)
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }
}

fn print_banner(config: &Config) {
    println!(
        r"
  mongopilot v{}

  App:          {}
  Replica set:  {}
  Engine port:  {}
  Admin API:    0.0.0.0:{} (advertised :{})
  Reconcile:    every {}ms
",
        env!("CARGO_PKG_VERSION"),
        config.app.name,
        config.engine.replica_set,
        config.engine.port,
        config.api.port,
        config.api.external_port,
        config.reconcile.interval_ms,
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
