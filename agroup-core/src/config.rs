use std::env;

use crate::error::{AgroupError, Result};

pub const DEFAULT_SPAWN_TOOL_NAME: &str = "Task";
pub const DEFAULT_POLL_TOOL_NAME: &str = "TaskOutput";
pub const DEFAULT_PARALLEL_THRESHOLD_MS: u64 = 2000;

pub const SPAWN_TOOL_ENV: &str = "AGROUP_SPAWN_TOOL";
pub const POLL_TOOL_ENV: &str = "AGROUP_POLL_TOOL";
pub const PARALLEL_THRESHOLD_ENV: &str = "AGROUP_PARALLEL_THRESHOLD_MS";

/// Sentinel tool names and the clustering window used by the grouping pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingOptions {
    pub spawn_tool_name: String,
    pub poll_tool_name: String,
    /// Spawns whose start lies within this many milliseconds of a cluster
    /// anchor join that anchor's cluster (inclusive).
    pub parallel_threshold_ms: u64,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            spawn_tool_name: DEFAULT_SPAWN_TOOL_NAME.to_string(),
            poll_tool_name: DEFAULT_POLL_TOOL_NAME.to_string(),
            parallel_threshold_ms: DEFAULT_PARALLEL_THRESHOLD_MS,
        }
    }
}

/// Explicit values (usually CLI flags) that win over the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingOverrides {
    pub spawn_tool_name: Option<String>,
    pub poll_tool_name: Option<String>,
    pub parallel_threshold_ms: Option<u64>,
}

impl GroupingOptions {
    pub fn from_env() -> Result<Self> {
        Self::resolve(GroupingOverrides::default())
    }

    /// Resolves each field from `overrides`, then the environment, then the
    /// defaults. An environment value shadowed by an override is never parsed.
    pub fn resolve(overrides: GroupingOverrides) -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), overrides)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        overrides: GroupingOverrides,
    ) -> Result<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        // Precedence:
        // 1) --spawn-tool
        // 2) AGROUP_SPAWN_TOOL
        // 3) "Task"
        let spawn_tool_name = overrides
            .spawn_tool_name
            .or_else(|| read(SPAWN_TOOL_ENV))
            .unwrap_or(defaults.spawn_tool_name);

        // Precedence:
        // 1) --poll-tool
        // 2) AGROUP_POLL_TOOL
        // 3) "TaskOutput"
        let poll_tool_name = overrides
            .poll_tool_name
            .or_else(|| read(POLL_TOOL_ENV))
            .unwrap_or(defaults.poll_tool_name);

        // Precedence:
        // 1) --threshold-ms
        // 2) AGROUP_PARALLEL_THRESHOLD_MS
        // 3) 2000
        let parallel_threshold_ms = match overrides.parallel_threshold_ms {
            Some(threshold_ms) => threshold_ms,
            None => match read(PARALLEL_THRESHOLD_ENV) {
                Some(raw) => parse_threshold(&raw)?,
                None => defaults.parallel_threshold_ms,
            },
        };

        Ok(Self {
            spawn_tool_name,
            poll_tool_name,
            parallel_threshold_ms,
        })
    }
}

pub fn parse_threshold(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AgroupError::InvalidConfig {
            key: PARALLEL_THRESHOLD_ENV.to_string(),
            value: raw.to_string(),
        })
}
