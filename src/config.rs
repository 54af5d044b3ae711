use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::app::AppSettings;
use crate::cache::HttpCacheOptions;
use crate::domain::ExtractorKind;
use crate::error::IndexError;
use crate::merge::MANUAL_CSV_FILE_NAME;
use crate::rdf::DEFAULT_MAX_TRIPLES;

pub const DEFAULT_CONFIG_FILE: &str = "ontology-index.json";
pub const BIOPORTAL_API_KEY_ENV: &str = "BIOPORTAL_API_KEY";
const DATABASE_FILE_NAME: &str = "ontology-index.sqlite";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub var_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub manual_metadata_csv: Option<PathBuf>,
    #[serde(default)]
    pub extractors: Option<Vec<ExtractorKind>>,
    #[serde(default)]
    pub bioportal_api_key: Option<String>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub max_triples: Option<usize>,
    #[serde(default)]
    pub rapper: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Unset means cached responses never expire.
    #[serde(default)]
    pub response_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub var_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub manual_metadata_csv: Utf8PathBuf,
    pub extractors: Vec<ExtractorKind>,
    pub bioportal_api_key: Option<String>,
    pub http: HttpCacheOptions,
    pub max_triples: usize,
    pub rapper: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn database_path(&self) -> Utf8PathBuf {
        self.var_dir.join(DATABASE_FILE_NAME)
    }

    pub fn work_dir(&self) -> Utf8PathBuf {
        self.var_dir.join("work")
    }

    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            work_dir: self.work_dir(),
            output_dir: self.output_dir.clone(),
            manual_metadata_csv: self.manual_metadata_csv.clone(),
            bioportal_api_key: self.bioportal_api_key.clone(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `ontology-index.json` when present. Without any
    /// config file every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IndexError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| IndexError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| IndexError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IndexError> {
        let env_key = std::env::var(BIOPORTAL_API_KEY_ENV).ok();
        Self::resolve_config_with(config, env_key, default_var_dir()?)
    }

    /// Resolution without touching the environment.
    pub fn resolve_config_with(
        config: Config,
        env_api_key: Option<String>,
        default_var_dir: Utf8PathBuf,
    ) -> Result<ResolvedConfig, IndexError> {
        let var_dir = match config.var_dir {
            Some(dir) => utf8(dir)?,
            None => default_var_dir,
        };
        let output_dir = match config.output_dir {
            Some(dir) => utf8(dir)?,
            None => Utf8PathBuf::from("."),
        };
        let manual_metadata_csv = match config.manual_metadata_csv {
            Some(path) => utf8(path)?,
            None => Utf8PathBuf::from(MANUAL_CSV_FILE_NAME),
        };

        let mut extractors: Vec<ExtractorKind> = Vec::new();
        for kind in config
            .extractors
            .unwrap_or_else(|| ExtractorKind::DEFAULT_ORDER.to_vec())
        {
            if !extractors.contains(&kind) {
                extractors.push(kind);
            }
        }

        let bioportal_api_key = config
            .bioportal_api_key
            .or(env_api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let defaults = HttpCacheOptions::default();
        let http = HttpCacheOptions {
            connect_timeout: config
                .http
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            timeout: config
                .http
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            response_ttl: config.http.response_ttl_secs.map(Duration::from_secs),
        };

        let max_triples = config.max_triples.unwrap_or(DEFAULT_MAX_TRIPLES);
        if max_triples == 0 {
            return Err(IndexError::ConfigParse(
                "max_triples must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            var_dir,
            output_dir,
            manual_metadata_csv,
            extractors,
            bioportal_api_key,
            http,
            max_triples,
            rapper: config.rapper,
        })
    }
}

fn default_var_dir() -> Result<Utf8PathBuf, IndexError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("ontology-index")).ok()
        })
        .ok_or_else(|| IndexError::Filesystem("unable to resolve cache directory".to_string()))
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf, IndexError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| IndexError::ConfigParse(format!("non-UTF-8 path: {}", path.display())))
}
