//! A narrow interface for hosts that discover and call dataset backends by what they can open.
//!
use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    client::{Client, OpenOptions, Services},
    config::ClientConfig,
    dataset::Dataset,
    errors::{Error, Result},
    query::Selection,
};

/// Something a host wants opened as a dataset
///
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    /// Catalog search facets
    Selection(Selection),

    Path(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection(selection) => {
                let names: Vec<&str> = selection.keys().map(String::as_str).collect();
                write!(f, "selection on {}", names.join(", "))
            }
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    pub config: ClientConfig,
    pub open: OpenOptions,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this backend knows how to open `source`
    fn can_handle(&self, source: &Source) -> bool;

    async fn open(&self, source: &Source, options: &BackendOptions) -> Result<Dataset>;
}

/// Opens catalog selections, with a new `Client` for every call
///
pub struct EsgfBackend {
    services: Services,
}

impl EsgfBackend {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Backend for EsgfBackend {
    fn name(&self) -> &str {
        "esgf"
    }

    fn can_handle(&self, source: &Source) -> bool {
        matches!(source, Source::Selection(_))
    }

    async fn open(&self, source: &Source, options: &BackendOptions) -> Result<Dataset> {
        let selection = match source {
            Source::Selection(selection) => selection.clone(),
            other => return Err(Error::NoBackend(other.to_string())),
        };
        let client = Client::new(options.config.clone(), selection, self.services.clone());

        client.open_dataset(&options.open).await
    }
}

/// Backends in order of preference
///
#[derive(Default)]
pub struct Registry {
    backends: Vec<Box<dyn Backend>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// The first backend that can handle `source`
    pub fn find(&self, source: &Source) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|backend| backend.can_handle(source))
            .map(|backend| backend.as_ref())
    }

    pub async fn open(&self, source: &Source, options: &BackendOptions) -> Result<Dataset> {
        let backend = self
            .find(source)
            .ok_or_else(|| Error::NoBackend(source.to_string()))?;
        debug!(backend = backend.name(), source = %source, "opening");

        backend.open(source, options).await
    }
}
