use std::{collections::HashSet, fs, path::Path};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    errors::Result,
    file::FileDescriptor,
    query::{Facet, Query},
    services::Catalog,
};

/// Free text facet, matched against file names and file ids
pub const QUERY_FACET: &str = "query";

/// A catalog over a fixed list of files, eg a manifest saved from an earlier search
///
pub struct MemoryCatalog {
    files: Vec<FileDescriptor>,
}

impl MemoryCatalog {
    pub fn new(files: Vec<FileDescriptor>) -> Self {
        Self { files }
    }

    /// Load from a JSON array of file descriptors
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn matches(file: &FileDescriptor, query: &Query) -> bool {
        query
            .selection
            .iter()
            .all(|(name, facet)| Self::matches_facet(file, name, facet))
    }

    fn matches_facet(file: &FileDescriptor, name: &str, facet: &Facet) -> bool {
        if name == QUERY_FACET {
            let file_id = file.file_id();
            facet.values().iter().any(|value| {
                let value = value.trim_matches('"');
                value == file.filename || value == file_id
            })
        } else {
            match file.facets.get(name) {
                Some(actual) => facet.values().iter().any(|value| value == actual),
                None => false,
            }
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn files(
        &self,
        query: &Query,
        max_hits: Option<usize>,
        keep_duplicates: bool,
    ) -> Result<Vec<FileDescriptor>> {
        let mut seen = HashSet::new();
        let files: Vec<FileDescriptor> = self
            .files
            .iter()
            .filter(|file| Self::matches(file, query))
            .filter(|file| keep_duplicates || seen.insert(file.file_id()))
            .take(max_hits.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        debug!(hits = files.len(), "resolved query");

        Ok(files)
    }
}
