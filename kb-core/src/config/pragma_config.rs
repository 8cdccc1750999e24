use serde::{Deserialize, Serialize};

/// Session-level SQLite pragmas applied after migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PragmaConfig {
    pub journal_mode: String,
    pub sync_mode: String,
    pub cache_size: i64,
    pub temp_store: String,
}

impl Default for PragmaConfig {
    fn default() -> Self {
        Self {
            journal_mode: "WAL".to_string(),
            sync_mode: "NORMAL".to_string(),
            cache_size: -64000,
            temp_store: "MEMORY".to_string(),
        }
    }
}
