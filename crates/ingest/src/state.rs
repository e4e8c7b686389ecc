use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{IngestError, Result};

pub const SCAN_STATE_VERSION: u32 = 1;

/// Progress through one transcript file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Modification time the file had when it was last fully processed.
    /// `None` forces a rescan.
    pub mtime_ms: Option<i64>,
    /// Index of the next line to process.
    pub last_line: u64,
    /// Set once a turn from this file has added its session to the totals.
    #[serde(default)]
    pub session_counted: bool,
}

/// Per-tenant scan progress keyed by `<project>/<file>.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    pub version: u32,
    #[serde(default)]
    pub files: BTreeMap<String, ScanCursor>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            version: SCAN_STATE_VERSION,
            files: BTreeMap::new(),
        }
    }
}

impl ScanState {
    /// A missing file is an empty state. A document written by a newer
    /// version is an error and must not be overwritten.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        let state: ScanState = serde_json::from_str(&data)?;
        if state.version > SCAN_STATE_VERSION {
            return Err(IngestError::StateVersion {
                found: state.version,
                supported: SCAN_STATE_VERSION,
            });
        }
        Ok(Self {
            version: SCAN_STATE_VERSION,
            files: state.files,
        })
    }

    /// Writes through a temp file and rename so readers never see a torn
    /// document.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn cursor(&self, key: &str) -> Option<ScanCursor> {
        self.files.get(key).copied()
    }

    pub fn set_cursor(&mut self, key: &str, cursor: ScanCursor) {
        self.files.insert(key.to_string(), cursor);
    }
}
