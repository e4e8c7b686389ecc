use std::io;

use serde::Serialize;

/// Errors emitted by the scanner.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("db error: {0}")]
    Db(#[from] meter_db::DbError),
    #[error("scan state json: {0}")]
    StateJson(#[from] serde_json::Error),
    #[error("scan state version {found} is newer than supported version {supported}")]
    StateVersion { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Non-fatal problem recorded during a scan.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanIssue {
    pub tenant_id: Option<String>,
    pub file_path: Option<String>,
    pub message: String,
}

impl ScanIssue {
    pub(crate) fn tenant(tenant_id: &str, message: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.to_string()),
            file_path: None,
            message: message.into(),
        }
    }

    pub(crate) fn file(tenant_id: &str, file_path: &str, message: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.to_string()),
            file_path: Some(file_path.to_string()),
            message: message.into(),
        }
    }
}

/// Result of scanning one tenant's transcript tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TenantScanStats {
    pub tenant_id: String,
    pub files_scanned: usize,
    pub files_up_to_date: usize,
    pub files_skipped: usize,
    pub records_inserted: usize,
    pub duplicates_skipped: usize,
    pub lines_malformed: usize,
    /// Turns older than the retention window, left out of the store.
    pub records_expired: usize,
    pub cost_usd: f64,
    pub issues: Vec<ScanIssue>,
}

impl TenantScanStats {
    pub(crate) fn new(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            ..Self::default()
        }
    }
}

/// Summary of one full scan cycle across all tenants.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    pub started_at: String,
    pub duration_ms: u64,
    pub tenants_scanned: usize,
    pub files_scanned: usize,
    pub files_up_to_date: usize,
    pub files_skipped: usize,
    pub records_inserted: usize,
    pub duplicates_skipped: usize,
    pub lines_malformed: usize,
    pub records_expired: usize,
    pub records_pruned: usize,
    pub issues: Vec<ScanIssue>,
}

impl CycleStats {
    pub(crate) fn absorb(&mut self, tenant: TenantScanStats) {
        self.tenants_scanned += 1;
        self.files_scanned += tenant.files_scanned;
        self.files_up_to_date += tenant.files_up_to_date;
        self.files_skipped += tenant.files_skipped;
        self.records_inserted += tenant.records_inserted;
        self.duplicates_skipped += tenant.duplicates_skipped;
        self.lines_malformed += tenant.lines_malformed;
        self.records_expired += tenant.records_expired;
        self.issues.extend(tenant.issues);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleStats),
    AlreadyRunning,
}

impl CycleOutcome {
    pub fn is_already_running(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }
}
