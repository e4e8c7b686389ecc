use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ingest::{FsTenantDirectory, ScanCoordinator, TenantDirectory};
use meter_core::PriceTable;
use meter_db::Db;

use crate::config::MeterConfig;
use crate::error::{AppError, Result};
use crate::pricing::load_price_table;
use crate::services::AppServices;

/// Locations and scan settings the services run with.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub state_dir: PathBuf,
    pub tenants_root: PathBuf,
    pub projects_subdir: PathBuf,
    pub retention_days: u32,
}

impl AppConfig {
    pub fn from_meter_config(config: &MeterConfig) -> Self {
        Self {
            db_path: config.storage.db_path.clone(),
            state_dir: config.storage.state_dir.clone(),
            tenants_root: config.scan.tenants_root.clone(),
            projects_subdir: config.scan.projects_subdir.clone(),
            retention_days: config.scan.retention_days,
        }
    }
}

/// Application state shared by the HTTP server, the scheduler and the CLI.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pricing: Arc<PriceTable>,
    pub coordinator: Arc<ScanCoordinator>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(config: AppConfig, pricing: PriceTable) -> Self {
        let tenants: Arc<dyn TenantDirectory> = Arc::new(FsTenantDirectory::new(
            config.tenants_root.clone(),
            config.projects_subdir.clone(),
        ));
        Self::with_tenants(config, pricing, tenants)
    }

    /// Builds the state around a custom tenant resolver.
    pub fn with_tenants(
        config: AppConfig,
        pricing: PriceTable,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        let config = Arc::new(config);
        let pricing = Arc::new(pricing);
        let coordinator = Arc::new(ScanCoordinator::new());
        let services = AppServices::new(
            config.clone(),
            pricing.clone(),
            coordinator.clone(),
            tenants,
        );
        Self {
            config,
            pricing,
            coordinator,
            services,
        }
    }

    pub fn from_meter_config(config: &MeterConfig) -> Result<Self> {
        let pricing = load_price_table(config.pricing.table_path.as_deref())?;
        Ok(Self::new(AppConfig::from_meter_config(config), pricing))
    }

    /// Creates the data directories and brings the schema up to date.
    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.config.state_dir)?;
        setup_db(&self.config.db_path)
            .map_err(|err| AppError::Message(format!("initialize db: {err}")))
    }

    pub fn open_db(&self) -> Result<Db> {
        Ok(Db::open(&self.config.db_path)?)
    }
}

pub fn setup_db(path: &Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
