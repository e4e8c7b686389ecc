mod cycle;
mod parser;
mod paths;
mod pipeline;
mod state;
mod types;

pub use cycle::{CycleGuard, ScanCoordinator, ScanSettings, run_cycle};
pub use parser::{TurnUsage, normalize_timestamp, parse_line, parse_turn};
pub use paths::{FsTenantDirectory, TenantDirectory, is_safe_tenant_id, scan_state_path};
pub use pipeline::scan_tenant;
pub use state::{SCAN_STATE_VERSION, ScanCursor, ScanState};
pub use types::{
    CycleOutcome, CycleStats, IngestError, Result, ScanIssue, TenantScanStats,
};
