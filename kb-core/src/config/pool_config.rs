use serde::{Deserialize, Serialize};

/// Connection pool sizing, applied by the pragma/pool tuner after migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_open: u32,
    pub max_idle: u32,
    pub idle_sec: u64,
    pub lifetime_sec: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 25,
            idle_sec: 300,
            lifetime_sec: 3600,
        }
    }
}

impl PoolConfig {
    /// Zero fields fall back to the documented defaults, as callers are allowed
    /// to supply a zeroed struct to mean "use the defaults".
    pub fn with_zeros_as_defaults(self) -> Self {
        let defaults = Self::default();
        Self {
            max_open: if self.max_open == 0 { defaults.max_open } else { self.max_open },
            max_idle: if self.max_idle == 0 { defaults.max_idle } else { self.max_idle },
            idle_sec: if self.idle_sec == 0 { defaults.idle_sec } else { self.idle_sec },
            lifetime_sec: if self.lifetime_sec == 0 {
                defaults.lifetime_sec
            } else {
                self.lifetime_sec
            },
        }
    }
}
