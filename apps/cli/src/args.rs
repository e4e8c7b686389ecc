use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Token usage metering and tenant quota service
#[derive(Debug, Parser)]
#[command(name = "usage-meter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file; created with defaults when missing
    #[arg(long, global = true, env = "USAGE_METER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API and the scan scheduler (default)
    Serve(ServeArgs),

    /// Run one scan cycle and print its statistics
    Scan,

    /// Set or clear a tenant's spending ceilings
    SetQuota(SetQuotaArgs),

    /// Evaluate a tenant's quota and print the decision
    CheckQuota(TenantArgs),

    /// Drop a tenant's scan cursors so its transcripts are rescanned
    ForgetTenant(TenantArgs),
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Override the configured port for this run only
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not start the periodic scan scheduler
    #[arg(long)]
    pub no_scheduler: bool,
}

#[derive(Debug, Args)]
pub struct SetQuotaArgs {
    pub tenant_id: String,

    /// Lifetime ceiling in USD; omit to clear
    #[arg(long)]
    pub total: Option<f64>,

    /// Per-day ceiling in USD; omit to clear
    #[arg(long)]
    pub daily: Option<f64>,
}

#[derive(Debug, Args)]
pub struct TenantArgs {
    pub tenant_id: String,
}
