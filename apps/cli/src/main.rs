mod args;
mod dirs;
mod logging;
mod scheduler;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use http_api::HttpState;
use meter_app::{AppState, MeterConfig, QuotaUpdate, load_or_create};
use tracing::{info, warn};

use crate::args::{Cli, Command, ServeArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(dirs::default_config_path);
    let load = load_or_create(&config_path)?;
    logging::init_logging(&load.config.logging);
    if load.created {
        info!(path = %load.file.display(), "created default config");
    }

    let app_state = AppState::from_meter_config(&load.config)?;
    app_state
        .initialize()
        .map_err(|err| io::Error::other(format!("failed to initialize storage: {err}")))?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(app_state, &load.config, args).await?,
        Command::Scan => {
            let scan = app_state.services.scan.clone();
            let outcome = tokio::task::spawn_blocking(move || scan.run()).await??;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::SetQuota(args) => {
            let quota = app_state.services.quota.set(QuotaUpdate {
                tenant_id: args.tenant_id,
                total_limit_usd: args.total,
                daily_limit_usd: args.daily,
            })?;
            println!("{}", serde_json::to_string_pretty(&quota)?);
        }
        Command::CheckQuota(args) => {
            let decision = app_state.services.quota.evaluate(&args.tenant_id)?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::ForgetTenant(args) => {
            let removed = app_state.services.scan.forget_tenant(&args.tenant_id)?;
            println!("{}", serde_json::json!({ "tenant_id": args.tenant_id, "removed": removed }));
        }
    }
    Ok(())
}

async fn serve(
    app_state: AppState,
    config: &MeterConfig,
    args: ServeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = args.port.unwrap_or(config.server.port);

    if !args.no_scheduler && config.scan.interval_secs > 0 {
        scheduler::spawn(
            app_state.clone(),
            Duration::from_secs(config.scan.interval_secs),
        );
        info!(interval_secs = config.scan.interval_secs, "scan scheduler started");
    }

    let router = http_api::router(HttpState::new(app_state));
    let (listener, actual_port, used_fallback) = bind_port(port).await?;
    if used_fallback {
        warn!(configured = port, actual = actual_port, "configured port unavailable");
    }
    info!(url = %format!("http://127.0.0.1:{actual_port}"), "usage meter listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn bind_port(port: u16) -> Result<(tokio::net::TcpListener, u16, bool), io::Error> {
    if port == 0 {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let actual_port = listener.local_addr()?.port();
        return Ok((listener, actual_port, false));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => Ok((listener, port, false)),
        Err(_) => {
            let listener =
                tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
            let actual_port = listener.local_addr()?.port();
            Ok((listener, actual_port, true))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
