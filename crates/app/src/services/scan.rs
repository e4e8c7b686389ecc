use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use ingest::{
    CycleOutcome, ScanCoordinator, ScanSettings, TenantDirectory, is_safe_tenant_id, run_cycle,
    scan_state_path,
};
use meter_core::PriceTable;
use tracing::info;

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, require_tenant};

#[derive(Clone)]
pub struct ScanService {
    config: SharedConfig,
    pricing: Arc<PriceTable>,
    coordinator: Arc<ScanCoordinator>,
    tenants: Arc<dyn TenantDirectory>,
}

impl ScanService {
    pub(super) fn new(
        config: SharedConfig,
        pricing: Arc<PriceTable>,
        coordinator: Arc<ScanCoordinator>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            config,
            pricing,
            coordinator,
            tenants,
        }
    }

    fn settings(&self) -> ScanSettings {
        ScanSettings {
            db_path: self.config.db_path.clone(),
            state_dir: self.config.state_dir.clone(),
            retention_days: self.config.retention_days,
        }
    }

    /// Runs a scan cycle on the calling thread. Blocking.
    pub fn run(&self) -> Result<CycleOutcome> {
        Ok(run_cycle(
            &self.coordinator,
            &self.settings(),
            &self.pricing,
            self.tenants.as_ref(),
        )?)
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Drops a tenant's scan cursors. Returns whether a state file existed.
    pub fn forget_tenant(&self, tenant_id: &str) -> Result<bool> {
        let tenant_id = require_tenant(tenant_id)?;
        if !is_safe_tenant_id(tenant_id) {
            return Err(AppError::InvalidInput(format!(
                "invalid tenant id: {tenant_id}"
            )));
        }
        let path = scan_state_path(&self.config.state_dir, tenant_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(tenant = tenant_id, "scan state removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
