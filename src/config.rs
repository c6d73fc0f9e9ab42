use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::dataset::{BLOGCATALOG_NAME, DatasetSpec};
use crate::error::DatasetError;

pub const DEFAULT_CONFIG_FILE: &str = "graph-datasets.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub cache_subdir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub datasets: Vec<DatasetSpec>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub cache_dir: Option<Utf8PathBuf>,
    pub cache_subdir: Utf8PathBuf,
    pub datasets: Vec<DatasetSpec>,
}

impl ResolvedConfig {
    pub fn cache_config(
        &self,
        cache_dir: Option<Utf8PathBuf>,
    ) -> Result<CacheConfig, DatasetError> {
        let config = match cache_dir.or_else(|| self.cache_dir.clone()) {
            Some(root) => CacheConfig::new(root)?,
            None => CacheConfig::default_for_cwd()?,
        };
        Ok(config.with_subdir(self.cache_subdir.clone()))
    }

    pub fn dataset(&self, name: &str) -> Result<DatasetSpec, DatasetError> {
        if let Some(spec) = self
            .datasets
            .iter()
            .find(|spec| spec.name.as_str().eq_ignore_ascii_case(name))
        {
            return Ok(spec.clone());
        }
        if name.eq_ignore_ascii_case("blogcatalog") || name.eq_ignore_ascii_case(BLOGCATALOG_NAME)
        {
            return Ok(DatasetSpec::blogcatalog());
        }
        Err(DatasetError::UnknownDataset(name.to_string()))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `graph-datasets.json` in the current directory.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DatasetError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DatasetError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DatasetError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DatasetError> {
        let cache_subdir = config.cache_subdir.unwrap_or_default();
        if cache_subdir.is_absolute() {
            return Err(DatasetError::ConfigParse(format!(
                "cache_subdir must be relative: {cache_subdir}"
            )));
        }

        let mut seen = HashSet::new();
        for spec in &config.datasets {
            if !seen.insert(spec.name.as_str().to_lowercase()) {
                return Err(DatasetError::ConfigParse(format!(
                    "duplicate dataset name: {}",
                    spec.name
                )));
            }
            if spec.edges.is_absolute() || spec.labels.is_absolute() {
                return Err(DatasetError::ConfigParse(format!(
                    "dataset {} file paths must be relative to the archive",
                    spec.name
                )));
            }
        }

        Ok(ResolvedConfig {
            cache_dir: config.cache_dir,
            cache_subdir,
            datasets: config.datasets,
        })
    }
}
