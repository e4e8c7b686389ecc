#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use ingest::{ScanCursor, ScanState, TenantScanStats, scan_tenant};
use meter_core::PriceTable;
use meter_db::Db;
use tempfile::TempDir;

pub const SESSION: &str = "sess-1";

pub struct Workspace {
    pub dir: TempDir,
    pub db: Db,
    pub db_path: PathBuf,
    pub tenants_root: PathBuf,
    pub state_dir: PathBuf,
    pub pricing: PriceTable,
    /// Retention cutoff handed to each scan; `None` keeps every turn.
    pub retain_from: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("usage.sqlite");
        let mut db = Db::open(&db_path).expect("open db");
        db.migrate().expect("migrate db");
        let tenants_root = dir.path().join("tenants");
        let state_dir = dir.path().join("state");
        fs::create_dir_all(&tenants_root).expect("tenants root");
        Self {
            dir,
            db,
            db_path,
            tenants_root,
            state_dir,
            pricing: PriceTable::bundled().expect("bundled prices"),
            retain_from: None,
        }
    }

    pub fn tenant_root(&self, tenant_id: &str) -> PathBuf {
        self.tenants_root.join(tenant_id).join("projects")
    }

    pub fn state_path(&self, tenant_id: &str) -> PathBuf {
        self.state_dir.join(format!("{tenant_id}.json"))
    }

    /// Path of `<tenant>/projects/<project>/<session>.jsonl`.
    pub fn transcript(&self, tenant_id: &str, project: &str, session: &str) -> PathBuf {
        let dir = self.tenant_root(tenant_id).join(project);
        fs::create_dir_all(&dir).expect("project dir");
        dir.join(format!("{session}.jsonl"))
    }

    pub fn scan(&mut self, tenant_id: &str) -> TenantScanStats {
        let root = self.tenant_root(tenant_id);
        let state_path = self.state_path(tenant_id);
        scan_tenant(
            &mut self.db,
            &self.pricing,
            tenant_id,
            &root,
            &state_path,
            self.retain_from,
        )
        .expect("scan")
    }

    pub fn cursor(&self, tenant_id: &str, key: &str) -> Option<ScanCursor> {
        ScanState::load(&self.state_path(tenant_id))
            .expect("load state")
            .cursor(key)
    }
}

/// One assistant turn at `2025-06-15T12:00:<second>Z`.
pub fn turn(second: u32, input: u64, output: u64) -> String {
    turn_at(&format!("2025-06-15T12:00:{second:02}.000Z"), input, output)
}

pub fn turn_at(timestamp: &str, input: u64, output: u64) -> String {
    format!(
        r#"{{"type":"assistant","sessionId":"{SESSION}","timestamp":"{timestamp}","message":{{"model":"claude-sonnet-4-5-20250929","usage":{{"input_tokens":{input},"output_tokens":{output},"cache_read_input_tokens":0,"cache_creation_input_tokens":0}}}}}}"#
    )
}

pub fn user_line() -> String {
    r#"{"type":"user","sessionId":"sess-1","message":{"role":"user","content":"hi"}}"#.to_string()
}

pub fn write_lines(path: &Path, lines: &[String]) {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).expect("write transcript");
}

/// Moves the modification time forward so the next scan sees a change even
/// on filesystems with coarse timestamps.
pub fn bump_mtime(path: &Path, seconds: u64) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("open transcript");
    file.set_modified(SystemTime::now() + Duration::from_secs(seconds))
        .expect("set mtime");
}
