#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use meter_app::{AppConfig, AppState, LiveUsageEvent};
use meter_core::PriceTable;
use tempfile::TempDir;

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestApp {
    pub fn tenant_projects(&self, tenant_id: &str) -> PathBuf {
        self.state
            .config
            .tenants_root
            .join(tenant_id)
            .join(&self.state.config.projects_subdir)
    }

    /// Writes `lines` as `<tenant>/<projects>/<project>/<session>.jsonl`.
    pub fn write_transcript(&self, tenant_id: &str, session: &str, lines: &[String]) {
        let dir = self.tenant_projects(tenant_id).join("proj");
        fs::create_dir_all(&dir).expect("project dir");
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(dir.join(format!("{session}.jsonl")), body).expect("write transcript");
    }
}

pub fn config_in(root: &std::path::Path) -> AppConfig {
    AppConfig {
        db_path: root.join("usage.sqlite"),
        state_dir: root.join("scan-state"),
        tenants_root: root.join("tenants"),
        projects_subdir: PathBuf::from(".claude/projects"),
        retention_days: 90,
    }
}

pub fn setup_app() -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = AppState::new(
        config_in(dir.path()),
        PriceTable::bundled().expect("bundled prices"),
    );
    state.initialize().expect("initialize");
    TestApp { dir, state }
}

pub fn live_event(tenant_id: &str, input_tokens: u64, timestamp: &str) -> LiveUsageEvent {
    LiveUsageEvent {
        tenant_id: tenant_id.to_string(),
        session_id: Some("sess-1".to_string()),
        model: "claude-sonnet-4-5-20250929".to_string(),
        input_tokens,
        timestamp: Some(timestamp.to_string()),
        ..LiveUsageEvent::default()
    }
}

pub fn transcript_turn(timestamp: &str, input_tokens: u64) -> String {
    format!(
        r#"{{"type":"assistant","sessionId":"sess-1","timestamp":"{timestamp}","message":{{"model":"claude-sonnet-4-5-20250929","usage":{{"input_tokens":{input_tokens},"output_tokens":0}}}}}}"#
    )
}
