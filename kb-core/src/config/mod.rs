mod pool_config;
mod pragma_config;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use pool_config::PoolConfig;
pub use pragma_config::PragmaConfig;

use crate::errors::{StoreError, StoreResult};

/// Top-level configuration for the knowledge store.
///
/// Loadable from a TOML string via [`StoreConfig::from_toml`]; any field
/// missing from the source falls back to its `Default` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data source for single-project mode.
    pub dsn: String,
    /// Appended to non-`file:` DSNs as a query parameter.
    pub auth_token: String,
    /// If true, `dsn` is ignored and per-project files live under `projects_dir`.
    pub multi_project_mode: bool,
    /// Root directory for per-project files. Required when `multi_project_mode` is set.
    pub projects_dir: Option<PathBuf>,
    /// Intended vector width in dimensions (1..=65536).
    pub embedding_dims: u32,
    pub pool: PoolConfig,
    pub pragma: PragmaConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dsn: "file:./store.db".to_string(),
            auth_token: String::new(),
            multi_project_mode: false,
            projects_dir: None,
            embedding_dims: 4,
            pool: PoolConfig::default(),
            pragma: PragmaConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Validate the stated configuration constraints, independent of any I/O.
    pub fn validate(&self) -> StoreResult<()> {
        if self.multi_project_mode && self.projects_dir.is_none() {
            return Err(StoreError::BadConfig(
                "projects_dir is required when multi_project_mode is enabled".into(),
            ));
        }
        if self.embedding_dims == 0 || self.embedding_dims > 65536 {
            return Err(StoreError::BadConfig(format!(
                "embedding_dims must be in 1..=65536, got {}",
                self.embedding_dims
            )));
        }
        Ok(())
    }

    /// Resolve the on-disk path (or DSN string) for `project`.
    ///
    /// In multi-project mode this is `<projects_dir>/<project>/store.db`, created
    /// lazily by the caller; in single-project mode it is `dsn` unmodified and
    /// `project` must be `"default"`.
    pub fn resolve_project_dsn(&self, project: &str) -> StoreResult<String> {
        if self.multi_project_mode {
            if project.is_empty() {
                return Err(StoreError::BadConfig(
                    "project name must not be empty in multi-project mode".into(),
                ));
            }
            let dir = self
                .projects_dir
                .as_ref()
                .ok_or_else(|| StoreError::BadConfig("projects_dir is not set".into()))?
                .join(project);
            let path = dir.join("store.db");
            Ok(format!("file:{}", path.to_string_lossy()))
        } else {
            let mut dsn = self.dsn.clone();
            if !self.auth_token.is_empty() && !dsn.starts_with("file:") {
                let sep = if dsn.contains('?') { '&' } else { '?' };
                dsn = format!("{dsn}{sep}auth_token={}", self.auth_token);
            }
            Ok(dsn)
        }
    }
}
