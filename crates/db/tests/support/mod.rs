#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use meter_core::{NewUsageRecord, TokenCounts, UsageSource};
use meter_db::Db;
use tempfile::TempDir;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn ts(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, hour, minute, second)
        .single()
        .expect("valid timestamp")
}

pub fn tokens(input: u64, output: u64) -> TokenCounts {
    TokenCounts {
        input,
        output,
        ..TokenCounts::default()
    }
}

pub fn make_record(
    tenant_id: &str,
    session_id: Option<&str>,
    model: &str,
    tokens: TokenCounts,
    ts: DateTime<Utc>,
) -> NewUsageRecord {
    NewUsageRecord {
        tenant_id: tenant_id.to_string(),
        session_id: session_id.map(str::to_string),
        model: model.to_string(),
        tokens,
        source: UsageSource::Rescan,
        ts,
    }
}
