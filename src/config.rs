use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONNECTION_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_DOCUMENT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_REFERENCES_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsifConfig {
    /// Directory holding the per-repository storage files
    pub storage_root: PathBuf,
    /// Path of the cross-repository index
    pub xrepo_database: PathBuf,
    pub per_commit_storage: bool,
    pub connection_cache_capacity: usize,
    pub document_cache_capacity: usize,
    pub references_page_size: u32,
}

impl Default for LsifConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("lsif-storage"),
            xrepo_database: PathBuf::from("lsif-storage").join("xrepo.db"),
            per_commit_storage: false,
            connection_cache_capacity: DEFAULT_CONNECTION_CACHE_CAPACITY,
            document_cache_capacity: DEFAULT_DOCUMENT_CACHE_CAPACITY,
            references_page_size: DEFAULT_REFERENCES_PAGE_SIZE,
        }
    }
}

impl LsifConfig {
    /// Apply `LSIF_*` overrides read through `var`. Values that do not parse
    /// as a positive integer are ignored.
    pub fn apply_env_with<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = positive(&var, "LSIF_CONNECTION_CACHE_CAPACITY") {
            self.connection_cache_capacity = value;
        }
        if let Some(value) = positive(&var, "LSIF_DOCUMENT_CACHE_CAPACITY") {
            self.document_cache_capacity = value;
        }
        if let Some(value) = positive::<u32, _>(&var, "LSIF_REFERENCES_PAGE_SIZE") {
            self.references_page_size = value;
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }
}

fn positive<T, F>(var: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            tracing::warn!(variable = name, value = %raw, "ignoring invalid override");
            None
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("lsif-xrepo.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<LsifConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: LsifConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}
