use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use meter_core::{
    AggregateDelta, NewUsageRecord, PriceTable, UsageSource, canonical_model_id,
};
use meter_db::Db;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::parser::parse_line;
use crate::state::{ScanCursor, ScanState};
use crate::types::{IngestError, Result, ScanIssue, TenantScanStats};

fn is_transcript(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("jsonl")
}

/// State key for a transcript: its path below the tenant root, `/`-joined.
fn state_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn mtime_ms(metadata: &fs::Metadata) -> Option<i64> {
    metadata
        .modified()
        .ok()
        .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
}

/// Splits file content into lines. The flag is true when the last line has
/// no terminator yet and may still be growing.
fn split_lines(content: &str) -> (Vec<&str>, bool) {
    if content.is_empty() {
        return (Vec::new(), false);
    }
    let mut lines: Vec<&str> = content.split('\n').collect();
    let open_tail = !content.ends_with('\n');
    if !open_tail {
        lines.pop();
    }
    let lines = lines
        .into_iter()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    (lines, open_tail)
}

#[derive(Debug, Default)]
struct FileScan {
    next_line: u64,
    inserted: usize,
    duplicates: usize,
    malformed: usize,
    expired: usize,
    cost_usd: f64,
    first_commit: Option<(NaiveDate, String)>,
    failure: Option<IngestError>,
}

struct FileInput<'a> {
    tenant_id: &'a str,
    path: &'a Path,
    session_fallback: &'a str,
    start_line: u64,
    file_mtime: DateTime<Utc>,
    retain_from: Option<DateTime<Utc>>,
}

fn scan_lines(
    db: &mut Db,
    pricing: &PriceTable,
    input: &FileInput<'_>,
    content: &str,
) -> FileScan {
    let (lines, open_tail) = split_lines(content);
    let mut scan = FileScan {
        next_line: input.start_line,
        ..FileScan::default()
    };
    let last_index = lines.len().saturating_sub(1);
    let start = usize::try_from(input.start_line).unwrap_or(usize::MAX);

    for (index, line) in lines.iter().enumerate().skip(start) {
        let turn = match parse_line(line) {
            Ok(turn) => turn,
            Err(err) => {
                if open_tail && index == last_index {
                    // Incomplete tail; picked up once the writer finishes it.
                    break;
                }
                debug!(file = %input.path.display(), line = index, error = %err, "skipping malformed line");
                scan.malformed += 1;
                scan.next_line = index as u64 + 1;
                continue;
            }
        };
        if let Some(turn) = turn {
            let record = NewUsageRecord {
                tenant_id: input.tenant_id.to_string(),
                session_id: Some(
                    turn.session_id
                        .unwrap_or_else(|| input.session_fallback.to_string()),
                ),
                model: canonical_model_id(&turn.model),
                tokens: turn.tokens,
                source: UsageSource::Rescan,
                ts: turn.timestamp.unwrap_or(input.file_mtime),
            };
            if input.retain_from.is_some_and(|cutoff| record.ts < cutoff) {
                // Past retention; its raw copy may already be pruned and
                // would not be found as a duplicate.
                scan.expired += 1;
                scan.next_line = index as u64 + 1;
                continue;
            }
            match db.record_exists(&record.dedup_probe()) {
                Ok(true) => scan.duplicates += 1,
                Ok(false) => {
                    let cost = pricing.cost_usd(&record.model, &record.tokens);
                    if let Err(err) = db.commit_record(&record, cost, 0) {
                        scan.failure = Some(err.into());
                        break;
                    }
                    scan.inserted += 1;
                    scan.cost_usd += cost;
                    if scan.first_commit.is_none() {
                        scan.first_commit = Some((record.usage_date(), record.model.clone()));
                    }
                }
                Err(err) => {
                    scan.failure = Some(err.into());
                    break;
                }
            }
        }
        scan.next_line = index as u64 + 1;
    }
    scan
}

/// Scans every `<project>/<session>.jsonl` below `root` for one tenant,
/// resuming from the cursors in `state_path` and saving them at the end.
/// Turns stamped before `retain_from` are skipped.
pub fn scan_tenant(
    db: &mut Db,
    pricing: &PriceTable,
    tenant_id: &str,
    root: &Path,
    state_path: &Path,
    retain_from: Option<DateTime<Utc>>,
) -> Result<TenantScanStats> {
    let mut stats = TenantScanStats::new(tenant_id);
    if !root.is_dir() {
        debug!(tenant = tenant_id, root = %root.display(), "no transcript directory");
        return Ok(stats);
    }

    let mut state = match ScanState::load(state_path) {
        Ok(state) => state,
        Err(err @ IngestError::StateVersion { .. }) => return Err(err),
        Err(err) => {
            warn!(tenant = tenant_id, error = %err, "unreadable scan state, starting over");
            stats
                .issues
                .push(ScanIssue::tenant(tenant_id, format!("scan state reset: {err}")));
            ScanState::default()
        }
    };

    let walker = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                stats
                    .issues
                    .push(ScanIssue::file(tenant_id, &file_path, err.to_string()));
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_transcript(path) {
            continue;
        }
        let key = state_key(root, path);
        let previous = state.cursor(&key);

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(tenant = tenant_id, file = %key, error = %err, "cannot stat transcript");
                stats.files_skipped += 1;
                stats.issues.push(ScanIssue::file(tenant_id, &key, err.to_string()));
                continue;
            }
        };
        let mtime = mtime_ms(&metadata);
        if let Some(cursor) = previous
            && mtime.is_some()
            && cursor.mtime_ms == mtime
        {
            stats.files_up_to_date += 1;
            continue;
        }

        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                warn!(tenant = tenant_id, file = %key, error = %err, "cannot read transcript");
                stats.files_skipped += 1;
                stats.issues.push(ScanIssue::file(tenant_id, &key, err.to_string()));
                continue;
            }
        };
        stats.files_scanned += 1;

        let line_count = split_lines(&content).0.len() as u64;
        let mut start_line = previous.map(|cursor| cursor.last_line).unwrap_or(0);
        if start_line > line_count {
            info!(
                tenant = tenant_id,
                file = %key,
                cursor = start_line,
                lines = line_count,
                "transcript shrank, rescanning from the start"
            );
            start_line = 0;
        }

        let session_fallback = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| key.clone());
        let file_mtime = mtime
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let input = FileInput {
            tenant_id,
            path,
            session_fallback: &session_fallback,
            start_line,
            file_mtime,
            retain_from,
        };
        let scan = scan_lines(db, pricing, &input, &content);

        stats.records_inserted += scan.inserted;
        stats.duplicates_skipped += scan.duplicates;
        stats.lines_malformed += scan.malformed;
        stats.records_expired += scan.expired;
        stats.cost_usd += scan.cost_usd;

        // A file adds its session once, with the first turn it commits.
        let mut session_counted = previous.is_some_and(|cursor| cursor.session_counted);
        if !session_counted && let Some((date, model)) = scan.first_commit.as_ref() {
            let delta = AggregateDelta {
                session_count: 1,
                ..AggregateDelta::default()
            };
            match db.upsert_daily_aggregate(tenant_id, *date, model, &delta) {
                Ok(()) => session_counted = true,
                Err(err) => {
                    warn!(tenant = tenant_id, file = %key, error = %err, "session count not recorded");
                    stats.issues.push(ScanIssue::file(tenant_id, &key, err.to_string()));
                }
            }
        }

        let cursor = match scan.failure {
            Some(err) => {
                warn!(
                    tenant = tenant_id,
                    file = %key,
                    line = scan.next_line,
                    error = %err,
                    "persistence failed, file will be retried"
                );
                stats.issues.push(ScanIssue::file(tenant_id, &key, err.to_string()));
                ScanCursor {
                    mtime_ms: previous.and_then(|cursor| cursor.mtime_ms),
                    last_line: scan.next_line,
                    session_counted,
                }
            }
            None => ScanCursor {
                mtime_ms: mtime,
                last_line: scan.next_line,
                session_counted,
            },
        };
        debug!(
            tenant = tenant_id,
            file = %key,
            inserted = scan.inserted,
            duplicates = scan.duplicates,
            next_line = cursor.last_line,
            "transcript scanned"
        );
        state.set_cursor(&key, cursor);
    }

    if let Err(err) = state.save(state_path) {
        warn!(tenant = tenant_id, error = %err, "failed to save scan state");
        stats.issues.push(ScanIssue::tenant(tenant_id, err.to_string()));
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_marks_open_tail() {
        assert_eq!(split_lines(""), (Vec::new(), false));
        assert_eq!(split_lines("a\nb\n"), (vec!["a", "b"], false));
        assert_eq!(split_lines("a\r\nb"), (vec!["a", "b"], true));
    }

    #[test]
    fn state_key_is_relative_and_slash_joined() {
        let root = Path::new("/tenants/acme/projects");
        let path = root.join("proj-a").join("s1.jsonl");
        assert_eq!(state_key(root, &path), "proj-a/s1.jsonl");
    }
}
