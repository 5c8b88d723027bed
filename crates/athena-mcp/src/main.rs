//! Athena MCP Server
//!
//! A Model Context Protocol server exposing Athena's persistent,
//! multi-layer memory substrate to AI agents over stdio.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use athena_core::config::Config;
use athena_core::storage::Namespace;

use athena_mcp::context::ServerContext;
use athena_mcp::protocol::stdio::StdioTransport;
use athena_mcp::server::McpServer;

/// Persistent, multi-layer memory substrate for AI agents, exposed over MCP.
#[derive(Parser)]
#[command(name = "athena-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server exposing Athena's memory core to agents over JSON-RPC/stdio")]
#[command(long_about = "ATHENA_STORAGE_BACKEND (embedded | clustered), ATHENA_DATABASE_PATH, and \
ATHENA_CONSOLIDATION_INTERVAL_SECS (default: 21600) are read from the environment; RUST_LOG \
controls log verbosity.")]
struct Args {
    /// TOML config file; env vars still override whatever it sets.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn spawn_background_tasks(executor: std::sync::Arc<athena_core::concurrency::TaskExecutor>, ctx: ServerContext) {
    let consolidation_interval = std::env::var("ATHENA_CONSOLIDATION_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(6 * 60 * 60));

    {
        let ctx = ctx.clone();
        let exec = executor.clone();
        tokio::spawn(async move {
            exec.spawn_periodic(consolidation_interval, move || {
                let ctx = ctx.clone();
                async move {
                    let Ok(project_ids) = ctx.backend.list_project_ids(Namespace::Episodic.as_str()).await else { return };
                    for project_id in project_ids {
                        match ctx.consolidation.run(project_id, 256).await {
                            Ok(run) => info!(%project_id, considered = run.events_considered, created = run.memories_created, "scheduled consolidation complete"),
                            Err(e) => warn!(%project_id, error = %e, "scheduled consolidation failed"),
                        }
                        ctx.metrics.incr(athena_core::observability::METRIC_CONSOLIDATION_RUNS);
                    }
                }
            })
            .await;
        });
    }

    {
        let ctx = ctx.clone();
        let exec = executor.clone();
        tokio::spawn(async move {
            exec.spawn_periodic(Duration::from_secs(5 * 60), move || {
                let ctx = ctx.clone();
                async move {
                    let Ok(project_ids) = ctx.backend.list_project_ids(Namespace::WorkingMemory.as_str()).await else { return };
                    for project_id in project_ids {
                        if let Err(e) = ctx.working_memory.sweep_decayed(project_id, 0.05).await {
                            warn!(%project_id, error = %e, "working-memory decay sweep failed");
                        }
                    }
                }
            })
            .await;
        });
    }

    {
        let ctx = ctx.clone();
        let exec = executor.clone();
        tokio::spawn(async move {
            exec.spawn_periodic(Duration::from_secs(10 * 60), move || {
                let ctx = ctx.clone();
                async move {
                    let Ok(project_ids) = ctx.backend.list_project_ids(Namespace::Session.as_str()).await else { return };
                    for project_id in project_ids {
                        match ctx.session.reap_idle(project_id, chrono::Duration::hours(1)).await {
                            Ok(reaped) if reaped > 0 => info!(%project_id, reaped, "reaped idle sessions"),
                            Ok(_) => {}
                            Err(e) => warn!(%project_id, error = %e, "session reaper failed"),
                        }
                    }
                }
            })
            .await;
        });
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("Athena MCP Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = match ServerContext::bootstrap(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to initialize server context: {}", e);
            std::process::exit(1);
        }
    };

    info!(backend = ?ctx.config.storage_backend, "storage backend initialized");

    let executor = std::sync::Arc::new(athena_core::concurrency::TaskExecutor::new());
    spawn_background_tasks(executor.clone(), ctx.clone());

    let server = McpServer::new(ctx);
    let transport = StdioTransport::new();

    info!("Starting MCP server on stdio...");

    let shutdown = {
        let executor = executor.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal, stopping background tasks");
            executor.shutdown().await;
        }
    };

    tokio::select! {
        result = transport.run(server) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = shutdown => {}
    }

    info!("Athena MCP Server shutting down");
}
