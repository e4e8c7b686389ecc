use meter_core::{DailyPoint, DateRange, GlobalRollup, ModelCost, TenantSummary};

use crate::error::Result;
use crate::services::{SharedConfig, open_db, require_tenant};

/// Tenants listed in the dashboard's top spender table.
pub const DASHBOARD_TOP_TENANTS: usize = 10;

#[derive(Clone)]
pub struct AnalyticsService {
    config: SharedConfig,
}

impl AnalyticsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    pub fn tenant_summary(&self, tenant_id: &str, range: &DateRange) -> Result<TenantSummary> {
        let tenant_id = require_tenant(tenant_id)?;
        Ok(open_db(&self.config)?.tenant_summary(tenant_id, range)?)
    }

    pub fn tenant_daily(&self, tenant_id: &str, range: &DateRange) -> Result<Vec<DailyPoint>> {
        let tenant_id = require_tenant(tenant_id)?;
        Ok(open_db(&self.config)?.tenant_daily(tenant_id, range)?)
    }

    pub fn tenant_models(&self, tenant_id: &str, range: &DateRange) -> Result<Vec<ModelCost>> {
        let tenant_id = require_tenant(tenant_id)?;
        Ok(open_db(&self.config)?.tenant_model_costs(tenant_id, range)?)
    }

    pub fn dashboard(&self, range: &DateRange) -> Result<GlobalRollup> {
        Ok(open_db(&self.config)?.global_rollup(range, DASHBOARD_TOP_TENANTS)?)
    }
}
