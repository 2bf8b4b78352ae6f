// src/config/mod.rs
//! Config file resolution shared by the portal settings and the taxonomy tables.

pub mod portal;

pub use portal::PortalConfig;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a config file using env var + fallbacks:
/// 1) $`env_key` (must exist when set)
/// 2) config/<stem>.toml
/// 3) config/<stem>.json
///
/// Returns `Ok(None)` when nothing is configured.
pub(crate) fn resolve_path(env_key: &str, stem: &str) -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{env_key} points to non-existent path"));
    }
    let toml_p = PathBuf::from(format!("config/{stem}.toml"));
    if toml_p.exists() {
        return Ok(Some(toml_p));
    }
    let json_p = PathBuf::from(format!("config/{stem}.json"));
    if json_p.exists() {
        return Ok(Some(json_p));
    }
    Ok(None)
}

/// Read and deserialize a TOML or JSON file. The extension picks the first
/// parser to try; the other one is attempted as a fallback.
pub(crate) fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_str(&content, ext.as_str()).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn parse_str<T: DeserializeOwned>(s: &str, hint_ext: &str) -> Result<T> {
    if hint_ext == "json" {
        match serde_json::from_str(s) {
            Ok(v) => return Ok(v),
            Err(json_err) => {
                return toml::from_str(s)
                    .map_err(|_| anyhow!("unsupported config format: {json_err}"))
            }
        }
    }
    match toml::from_str(s) {
        Ok(v) => Ok(v),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported config format: {toml_err}")),
    }
}

/// Trim entries, drop empties and duplicates, keep first-seen order.
pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
