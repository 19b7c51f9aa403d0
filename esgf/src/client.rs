use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::{
    chunks::{annotate, ChunkPolicy},
    combine::{check_dims, combine},
    concat::concat_group,
    config::ClientConfig,
    dataset::Dataset,
    errors::{Error, Result},
    expand::expand,
    file::{FileDescriptor, Location},
    identity::{DatasetIdentity, IdentityKey},
    load::{load_groups, LoadOptions, Sel},
    query::{Query, Selection},
    reconcile::reconcile,
    retrieve::Orchestrator,
    services::{Catalog, Checker, Reader, Retriever},
};

/// The collaborators a `Client` relies on
///
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn Catalog>,
    pub retriever: Arc<dyn Retriever>,
    pub checker: Arc<dyn Checker>,
    pub reader: Arc<dyn Reader>,
}

/// Options for `Client::open_dataset`
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Identity fields to turn into new dimensions, in order
    pub concat_dims: Vec<IdentityKey>,

    /// Variables to leave out of every file
    pub drop_variables: Vec<String>,

    /// Download missing files first, instead of opening them remotely
    pub download: bool,

    pub show_progress: bool,

    /// Label based selection applied to every file
    pub sel: Option<Sel>,

    /// Spatial coordinates to leave out of every file
    pub ignore_spatial_coords: Vec<String>,

    /// Require every group to have the same dimensions apart from `concat_dims`
    pub check_dims: bool,

    pub chunk_policy: ChunkPolicy,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            concat_dims: vec![],
            drop_variables: vec![],
            download: false,
            show_progress: true,
            sel: None,
            ignore_spatial_coords: vec![],
            check_dims: false,
            chunk_policy: ChunkPolicy::default(),
        }
    }
}

/// Finds, retrieves and assembles the files matching one selection
///
/// The query and the list of files it resolves to are worked out once, on first use, and kept
/// for the lifetime of the client. Make a new client to search again.
///
pub struct Client {
    config: ClientConfig,
    selection: Selection,
    services: Services,
    query: OnceLock<Query>,
    files: OnceCell<Vec<FileDescriptor>>,
}

impl Client {
    pub fn new(config: ClientConfig, selection: Selection, services: Services) -> Self {
        Self {
            config,
            selection,
            services,
            query: OnceLock::new(),
            files: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn query(&self) -> &Query {
        self.query
            .get_or_init(|| Query::new(self.selection.clone(), self.config.query_options()))
    }

    /// The files matching the selection, in catalog order
    pub async fn files(&self) -> Result<&[FileDescriptor]> {
        let files = self
            .files
            .get_or_try_init(|| async {
                let files = self
                    .services
                    .catalog
                    .files(
                        self.query(),
                        self.config.max_hits,
                        self.config.keep_duplicates,
                    )
                    .await?;
                info!(
                    files = files.len(),
                    index_node = %self.config.index_node,
                    "resolved selection"
                );

                Ok::<_, Error>(files)
            })
            .await?;

        Ok(files.as_slice())
    }

    /// Where a file lives once downloaded
    pub fn local_path(&self, file: &FileDescriptor) -> PathBuf {
        file.path_in(&self.config.data_dir())
    }

    fn orchestrator(&self, show_progress: bool) -> Orchestrator<'_> {
        Orchestrator::new(
            self.services.retriever.as_ref(),
            self.services.checker.as_ref(),
            self.config.check_mode(),
            show_progress,
        )
    }

    /// Files with no usable local copy
    pub async fn missing_files(&self) -> Result<Vec<FileDescriptor>> {
        let files = self.files().await?;
        Ok(self.orchestrator(false).missing(files).await)
    }

    /// Download every missing file, returning the files retrieved by this call
    pub async fn download(&self) -> Result<Vec<FileDescriptor>> {
        self.download_files(true).await
    }

    async fn download_files(&self, show_progress: bool) -> Result<Vec<FileDescriptor>> {
        let files = self.files().await?;
        self.orchestrator(show_progress)
            .download(files, self.config.max_attempts)
            .await
    }

    /// Open every matching file and assemble them into a single dataset
    ///
    /// Files are grouped by dataset id. The files of each group are concatenated along time and
    /// each group is given a dimension for each of `options.concat_dims`. Groups are then
    /// combined, requiring shared coordinates to match exactly.
    ///
    #[instrument(skip_all, fields(concat_dims = ?options.concat_dims, download = options.download))]
    pub async fn open_dataset(&self, options: &OpenOptions) -> Result<Dataset> {
        if options.download {
            self.download_files(options.show_progress).await?;
        }

        let files = self.files().await?;
        let missing: HashSet<String> = self
            .orchestrator(false)
            .missing(files)
            .await
            .iter()
            .map(FileDescriptor::file_id)
            .collect();
        let located = files.iter().map(|file| {
            let location = if missing.contains(&file.file_id()) {
                Location::Remote(file.url.clone())
            } else {
                Location::Local(self.local_path(file))
            };
            (file, location)
        });

        let load_options = LoadOptions {
            drop_variables: options.drop_variables.clone(),
            sel: options.sel.clone(),
            ignore_spatial_coords: options.ignore_spatial_coords.clone(),
        };
        let groups = load_groups(located, self.services.reader.as_ref(), &load_options)?;
        info!(groups = groups.len(), remote = missing.len(), "opened files");

        let mut prepared = Vec::with_capacity(groups.len());
        for (dataset_id, datasets) in groups {
            let identity: DatasetIdentity = dataset_id.parse()?;
            let members = datasets.len();
            let dataset = reconcile(&concat_group(datasets)?)?;
            let dataset = expand(&dataset, &identity, &options.concat_dims)?;
            debug!(dataset_id = %dataset_id, members, "prepared group");
            prepared.push((dataset_id, dataset));
        }

        if options.check_dims {
            check_dims(&prepared, &options.concat_dims)?;
        }
        let combined = combine(prepared, &options.concat_dims)?;

        Ok(annotate(&combined, options.chunk_policy, &options.concat_dims))
    }
}
