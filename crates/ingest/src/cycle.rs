use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use meter_core::{PriceTable, format_ts, retention_cutoff};
use meter_db::Db;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::paths::{TenantDirectory, scan_state_path};
use crate::pipeline::scan_tenant;
use crate::types::{CycleOutcome, CycleStats, Result, ScanIssue, TenantScanStats};

/// Ensures at most one scan cycle is in flight per process.
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    running: AtomicBool,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claims the in-flight flag, or `None` when a cycle already holds it.
    pub fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: &self.running,
            })
    }
}

/// Releases the in-flight flag when dropped, including on panic.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub db_path: PathBuf,
    pub state_dir: PathBuf,
    /// Raw records older than this many days are pruned after the scan and
    /// never re-inserted by it.
    pub retention_days: u32,
}

fn scan_one(
    settings: &ScanSettings,
    pricing: &PriceTable,
    tenants: &dyn TenantDirectory,
    tenant_id: &str,
    retain_from: Option<DateTime<Utc>>,
) -> TenantScanStats {
    let mut db = match Db::open(&settings.db_path) {
        Ok(db) => db,
        Err(err) => {
            warn!(tenant = tenant_id, error = %err, "cannot open usage store");
            let mut stats = TenantScanStats::new(tenant_id);
            stats.issues.push(ScanIssue::tenant(tenant_id, err.to_string()));
            return stats;
        }
    };
    let root = tenants.tenant_root(tenant_id);
    let state_path = scan_state_path(&settings.state_dir, tenant_id);
    match scan_tenant(&mut db, pricing, tenant_id, &root, &state_path, retain_from) {
        Ok(stats) => stats,
        Err(err) => {
            warn!(tenant = tenant_id, error = %err, "tenant scan failed");
            let mut stats = TenantScanStats::new(tenant_id);
            stats.issues.push(ScanIssue::tenant(tenant_id, err.to_string()));
            stats
        }
    }
}

/// Runs one scan cycle: every tenant in parallel, then retention pruning.
/// Returns immediately when another cycle is in flight.
pub fn run_cycle(
    coordinator: &ScanCoordinator,
    settings: &ScanSettings,
    pricing: &PriceTable,
    tenants: &dyn TenantDirectory,
) -> Result<CycleOutcome> {
    let Some(_guard) = coordinator.try_begin() else {
        info!("scan cycle already running");
        return Ok(CycleOutcome::AlreadyRunning);
    };
    let started = Instant::now();
    let now = Utc::now();
    let retain_from = retention_cutoff(now, settings.retention_days);
    let mut stats = CycleStats {
        started_at: format_ts(now),
        ..CycleStats::default()
    };

    let tenant_ids = tenants.tenants()?;
    info!(tenants = tenant_ids.len(), "scan cycle started");
    let results = tenant_ids
        .par_iter()
        .map(|tenant_id| scan_one(settings, pricing, tenants, tenant_id, retain_from))
        .collect::<Vec<_>>();
    for tenant in results {
        stats.absorb(tenant);
    }

    let pruned = match retain_from {
        Some(cutoff) => Db::open(&settings.db_path).and_then(|db| db.prune_before(cutoff)),
        None => Ok(0),
    };
    match pruned {
        Ok(removed) => stats.records_pruned = removed,
        Err(err) => {
            warn!(error = %err, "retention prune failed");
            stats.issues.push(ScanIssue {
                tenant_id: None,
                file_path: None,
                message: format!("prune failed: {err}"),
            });
        }
    }

    stats.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        tenants = stats.tenants_scanned,
        files = stats.files_scanned,
        inserted = stats.records_inserted,
        duplicates = stats.duplicates_skipped,
        expired = stats.records_expired,
        pruned = stats.records_pruned,
        issues = stats.issues.len(),
        duration_ms = stats.duration_ms,
        "scan cycle finished"
    );
    Ok(CycleOutcome::Completed(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_flag_on_drop() {
        let coordinator = ScanCoordinator::new();
        {
            let guard = coordinator.try_begin();
            assert!(guard.is_some());
            assert!(coordinator.is_running());
            assert!(coordinator.try_begin().is_none());
        }
        assert!(!coordinator.is_running());
        assert!(coordinator.try_begin().is_some());
    }
}
