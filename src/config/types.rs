use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::profiles::Filter;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    /// Transformation profiles keyed by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Holds the registry database and the blob tree
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("assetforged.db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    /// Hand transmission to the front web server via `X-Sendfile`
    #[serde(default)]
    pub passthrough: bool,

    /// Redirect requests to a statically served attachment cache
    #[serde(default)]
    pub cache: bool,

    /// URL prefix the static attachment cache is mounted under
    #[serde(default = "default_cache_url_prefix")]
    pub cache_url_prefix: String,
}

fn default_cache_url_prefix() -> String {
    "/attachment-cache".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            passthrough: false,
            cache: false,
            cache_url_prefix: default_cache_url_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process decoding and resizing
    #[default]
    Native,
    /// External ImageMagick CLI
    ImageMagick,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Explicit path to the ImageMagick binary (otherwise found on PATH)
    #[serde(default)]
    pub tool_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub filters: Vec<Filter>,
}
