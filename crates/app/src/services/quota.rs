use meter_core::{QuotaDecision, TenantQuota, evaluate_quota, local_today};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db, require_tenant};

/// Administrative change to a tenant's ceilings. `None` clears a ceiling.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuotaUpdate {
    pub tenant_id: String,
    #[serde(default)]
    pub total_limit_usd: Option<f64>,
    #[serde(default)]
    pub daily_limit_usd: Option<f64>,
}

fn check_limit(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(limit) if !limit.is_finite() || limit < 0.0 => Err(AppError::InvalidInput(format!(
            "{name} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

/// Read-side quota checks. Never touches the scanner's in-flight flag.
#[derive(Clone)]
pub struct QuotaService {
    config: SharedConfig,
}

impl QuotaService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    pub fn get(&self, tenant_id: &str) -> Result<Option<TenantQuota>> {
        let tenant_id = require_tenant(tenant_id)?;
        Ok(open_db(&self.config)?.get_tenant_quota(tenant_id)?)
    }

    pub fn set(&self, update: QuotaUpdate) -> Result<TenantQuota> {
        let tenant_id = require_tenant(&update.tenant_id)?.to_string();
        check_limit("total_limit_usd", update.total_limit_usd)?;
        check_limit("daily_limit_usd", update.daily_limit_usd)?;
        let quota = TenantQuota {
            tenant_id,
            total_limit_usd: update.total_limit_usd,
            daily_limit_usd: update.daily_limit_usd,
        };
        open_db(&self.config)?.set_tenant_quota(&quota)?;
        info!(
            tenant = %quota.tenant_id,
            total_limit_usd = ?quota.total_limit_usd,
            daily_limit_usd = ?quota.daily_limit_usd,
            "tenant quota updated"
        );
        Ok(quota)
    }

    /// Compares spend to date and today's spend against the tenant's
    /// ceilings. Tenants without ceilings are allowed without further reads.
    pub fn evaluate(&self, tenant_id: &str) -> Result<QuotaDecision> {
        let tenant_id = require_tenant(tenant_id)?;
        let db = open_db(&self.config)?;
        let quota = match db.get_tenant_quota(tenant_id)? {
            Some(quota) if quota.has_limits() => quota,
            _ => return Ok(QuotaDecision::allow()),
        };
        let total = db.tenant_cost_total(tenant_id)?;
        let today = db.tenant_cost_on(tenant_id, local_today())?;
        Ok(evaluate_quota(&quota, total, today))
    }

    /// Request-layer check: an evaluation failure is logged and the request
    /// is allowed.
    pub fn check_or_allow(&self, tenant_id: &str) -> QuotaDecision {
        match self.evaluate(tenant_id) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(tenant = tenant_id, error = %err, "quota check failed, allowing request");
                QuotaDecision::allow()
            }
        }
    }
}
