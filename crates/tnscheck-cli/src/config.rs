//! KEY=VALUE configuration file.
//!
//! Lines are `KEY=VALUE`; blank lines and lines starting with `#` or `;` are
//! ignored, as are lines without `=`. Recognised keys: `SOURCE_JSON`,
//! `RESULTS_JSON`, `INVENTORY_CONN`, `SSH_USER`, `CNAME_TIMEOUT_SECS`,
//! `SCAN_TIMEOUT_SECS`, `INVENTORY_TIMEOUT_SECS`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Default)]
pub struct Config {
    entries: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// Missing file is not an error: every key has a usable default.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }

    fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !key.is_empty() {
                entries.insert(key.to_string(), value.trim().to_string());
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        self.get(key)?.parse().ok().map(Duration::from_secs)
    }
}
