mod analytics;
mod quota;
mod scan;
mod usage;

use std::sync::Arc;

use ingest::{ScanCoordinator, TenantDirectory};
use meter_core::PriceTable;
use meter_db::Db;

use crate::app::AppConfig;
use crate::error::{AppError, Result};

pub use analytics::AnalyticsService;
pub use quota::{QuotaService, QuotaUpdate};
pub use scan::ScanService;
pub use usage::{LiveUsageEvent, UsageService};

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub analytics: AnalyticsService,
    pub quota: QuotaService,
    pub scan: ScanService,
    pub usage: UsageService,
}

impl AppServices {
    pub fn new(
        config: SharedConfig,
        pricing: Arc<PriceTable>,
        coordinator: Arc<ScanCoordinator>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            analytics: AnalyticsService::new(config.clone()),
            quota: QuotaService::new(config.clone()),
            scan: ScanService::new(config.clone(), pricing.clone(), coordinator, tenants),
            usage: UsageService::new(config, pricing),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}

fn require_tenant(tenant_id: &str) -> Result<&str> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(AppError::InvalidInput("tenant_id is required".to_string()));
    }
    Ok(tenant_id)
}
