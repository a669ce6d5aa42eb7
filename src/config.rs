use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::{Error, Result};

/// Settings read from `revgraph.toml`; every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RevgraphConfig {
    /// Where the rolling snapshot and its lock live
    pub cache_dir: Option<PathBuf>,
    /// Fixed scratch directory; a temp dir is used when unset
    pub work_dir: Option<PathBuf>,
    /// Per-revision snapshot copies (`snapshot_<rev>.json`)
    pub snapshot_dir: Option<PathBuf>,
    /// JSON-lines change log
    pub changes_log: Option<PathBuf>,
}

impl RevgraphConfig {
    /// Apply `REVGRAPH_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var_os(name))
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        let apply = |field: &mut Option<PathBuf>, name: &str| {
            if let Some(value) = var(name).filter(|value| !value.is_empty()) {
                *field = Some(PathBuf::from(value));
            }
        };
        apply(&mut self.cache_dir, "REVGRAPH_CACHE_DIR");
        apply(&mut self.work_dir, "REVGRAPH_WORK_DIR");
        apply(&mut self.snapshot_dir, "REVGRAPH_SNAPSHOT_DIR");
        apply(&mut self.changes_log, "REVGRAPH_CHANGES_LOG");
        self
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn changes_log(&self) -> PathBuf {
        self.changes_log
            .clone()
            .unwrap_or_else(|| self.cache_dir().join("changes.jsonl"))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("revgraph.toml")
}

pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(".revgraph")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<RevgraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RevgraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Load the config file (if any) and layer the environment on top
pub fn resolve_config(path: Option<&Path>) -> Result<RevgraphConfig> {
    let config = load_config(path)?.unwrap_or_default();
    Ok(config.with_env_overrides())
}

pub fn write_config(path: &Path, config: &RevgraphConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::ConfigExists(path.to_path_buf()));
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("revgraph.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("revgraph.toml");
        let config = RevgraphConfig {
            cache_dir: Some(PathBuf::from("/var/cache/revgraph")),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        assert!(matches!(write_config(&path, &config, false), Err(Error::ConfigExists(_))));
        write_config(&path, &config, true).unwrap();
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("REVGRAPH_CACHE_DIR", "/tmp/cache"),
            ("REVGRAPH_CHANGES_LOG", ""),
        ]);
        let config = RevgraphConfig {
            cache_dir: Some(PathBuf::from("ignored")),
            changes_log: Some(PathBuf::from("kept.jsonl")),
            ..Default::default()
        }
        .with_overrides(|name| env.get(name).map(|value| std::ffi::OsString::from(*value)));

        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/cache"));
        assert_eq!(config.changes_log(), PathBuf::from("kept.jsonl"));
    }

    #[test]
    fn test_defaults() {
        let config = RevgraphConfig::default();
        assert_eq!(config.cache_dir(), PathBuf::from(".revgraph"));
        assert_eq!(config.changes_log(), PathBuf::from(".revgraph/changes.jsonl"));
    }
}
