//! Sizing for the shared arenas and per-process tables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::page_arena::EXP_GROW_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Pages allocated by the first arena growth
    pub initial_pages: usize,
    /// Arena capacity (in pages) at which growth turns linear
    pub exp_grow_limit: usize,
    /// Open file slots shared by every process
    pub file_slots: usize,
    /// Descriptors available to each process beyond 0, 1 and 2
    pub max_descriptors: usize,
    /// Owner recorded on inodes created by new processes
    pub owner_id: u32,
    /// Group recorded on inodes created by new processes
    pub group_id: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_pages: 64,
            exp_grow_limit: EXP_GROW_LIMIT,
            file_slots: 1024,
            max_descriptors: 512,
            owner_id: 0,
            group_id: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("initial_pages", self.initial_pages),
            ("exp_grow_limit", self.exp_grow_limit),
            ("file_slots", self.file_slots),
            ("max_descriptors", self.max_descriptors),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Serialize to YAML bytes
    pub fn to_yaml_bytes(&self) -> std::result::Result<Vec<u8>, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self).map(|s| s.into_bytes())
    }

    /// Deserialize from YAML bytes. Missing fields take their defaults.
    pub fn from_yaml_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_slice(bytes)
    }
}
