//! Client configuration.
//!
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, Result},
    query::QueryOptions,
    retrieve::CheckMode,
};

/// Environment variable overriding `index_node`
pub const INDEX_NODE_VAR: &str = "ESGPULL_INDEX_NODE";

/// Environment variable overriding `esgpull_path`
pub const PATH_VAR: &str = "ESGPULL_PATH";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the local file store. Downloads land in its `data` directory.
    #[serde(default = "default_esgpull_path")]
    pub esgpull_path: PathBuf,

    /// Host name of the ESGF index node to search
    #[serde(default = "default_index_node")]
    pub index_node: String,

    /// Download attempts before giving up. Values below 1 count as 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Check the content of local copies, not just that they exist
    #[serde(default = "default_true")]
    pub check_files: bool,

    #[serde(default)]
    pub verify_ssl: bool,

    /// Cap on the number of files a query resolves to
    #[serde(default)]
    pub max_hits: Option<usize>,

    /// Keep files listed more than once by the catalog
    #[serde(default)]
    pub keep_duplicates: bool,

    /// Search every federated index node
    #[serde(default = "default_true")]
    pub distrib: bool,

    /// Only the latest version of each dataset
    #[serde(default = "default_true")]
    pub latest: bool,
}

fn default_esgpull_path() -> PathBuf {
    PathBuf::from("esgpull")
}

fn default_index_node() -> String {
    "esgf.ceda.ac.uk".to_string()
}

fn default_max_attempts() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            esgpull_path: default_esgpull_path(),
            index_node: default_index_node(),
            max_attempts: default_max_attempts(),
            check_files: true,
            verify_ssl: false,
            max_hits: None,
            keep_duplicates: false,
            distrib: true,
            latest: true,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| Error::Config {
            path: None,
            message: err.to_string(),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| Error::Config {
            path: Some(path.to_path_buf()),
            message: err.to_string(),
        })
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_vars(|name| env::var(name).ok())
    }

    /// Apply overrides looked up by variable name
    pub fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(index_node) = lookup(INDEX_NODE_VAR).filter(|value| !value.is_empty()) {
            self.index_node = index_node;
        }
        if let Some(path) = lookup(PATH_VAR).filter(|value| !value.is_empty()) {
            self.esgpull_path = PathBuf::from(path);
        }

        self
    }

    /// Where downloaded files are stored
    pub fn data_dir(&self) -> PathBuf {
        self.esgpull_path.join("data")
    }

    pub fn check_mode(&self) -> CheckMode {
        if self.check_files {
            CheckMode::Strict
        } else {
            CheckMode::Exists
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            distrib: self.distrib,
            latest: self.latest,
        }
    }
}
