use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves tenant ids to the directory holding their transcripts.
pub trait TenantDirectory: Send + Sync {
    /// Tenants that currently have a home directory.
    fn tenants(&self) -> io::Result<Vec<String>>;

    /// Root of `<project>/<session>.jsonl` files for `tenant_id`. The
    /// directory may not exist.
    fn tenant_root(&self, tenant_id: &str) -> PathBuf;
}

/// Tenant homes laid out as `<base>/<tenant>/<projects_subdir>`.
#[derive(Debug, Clone)]
pub struct FsTenantDirectory {
    base: PathBuf,
    projects_subdir: PathBuf,
}

impl FsTenantDirectory {
    pub fn new(base: impl Into<PathBuf>, projects_subdir: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            projects_subdir: projects_subdir.into(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl TenantDirectory for FsTenantDirectory {
    fn tenants(&self) -> io::Result<Vec<String>> {
        if !self.base.is_dir() {
            return Ok(Vec::new());
        }
        let mut tenants = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_safe_tenant_id(name)
            {
                tenants.push(name.to_string());
            }
        }
        tenants.sort();
        Ok(tenants)
    }

    fn tenant_root(&self, tenant_id: &str) -> PathBuf {
        self.base.join(tenant_id).join(&self.projects_subdir)
    }
}

/// Tenant ids double as directory and state file names.
pub fn is_safe_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && !tenant_id.starts_with('.')
        && tenant_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '@'))
}

pub fn scan_state_path(state_dir: &Path, tenant_id: &str) -> PathBuf {
    state_dir.join(format!("{tenant_id}.json"))
}
