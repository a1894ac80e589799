//! Configuration loading from prefcnt.toml.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::refcnt::{RefcntOptions, DEFAULT_MAX_UNGUARDED_DEPTH};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "prefcnt.toml";

/// Main configuration structure for prefcnt.toml.
#[derive(Debug, Deserialize, Default)]
pub struct PrefcntConfig {
    /// Type names or patterns to leave out of the lost-type report.
    pub ignore: Option<Vec<String>>,
    /// Bound on consecutive unguarded edges during the walk.
    pub max_unguarded_depth: Option<usize>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

impl PrefcntConfig {
    pub fn refcnt_options(&self) -> RefcntOptions {
        RefcntOptions {
            max_unguarded_depth: self
                .max_unguarded_depth
                .unwrap_or(DEFAULT_MAX_UNGUARDED_DEPTH),
        }
    }

    pub fn ignore_patterns(&self) -> &[String] {
        self.ignore.as_deref().unwrap_or(&[])
    }

    pub fn wants_json(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|o| o.format.as_deref())
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

/// Loads configuration from prefcnt.toml in `dir` if it exists.
pub fn load_config(dir: &Path) -> Result<Option<PrefcntConfig>> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let cfg = toml::from_str(&content).context("Invalid prefcnt.toml")?;
    Ok(Some(cfg))
}
