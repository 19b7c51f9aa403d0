use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// One remote array file, as resolved by a catalog
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Dotted identity of the dataset this file belongs to
    pub dataset_id: String,

    pub filename: String,

    /// Where the file can be downloaded from
    pub url: String,

    /// Directory, relative to the data root, the file is downloaded to
    pub local_path: PathBuf,

    /// Size in bytes
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub checksum_type: Option<String>,

    /// Search facets the catalog knows this file by, eg `variable_id = "tas"`
    #[serde(default)]
    pub facets: BTreeMap<String, String>,
}

impl FileDescriptor {
    pub fn file_id(&self) -> String {
        format!("{}.{}", self.dataset_id, self.filename)
    }

    /// Where the file lives once downloaded under `root`
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(&self.local_path).join(&self.filename)
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_id())
    }
}

/// Where to open a file from
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Remote(String),
    Local(PathBuf),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
