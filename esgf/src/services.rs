//! The external collaborators the engine is built on.
//!
//! The engine never talks to the network or parses array files itself. A catalog resolves a
//! query to file descriptors, a retriever downloads files, a checker decides whether a local copy
//! is usable and a reader opens a file as a lazy `Dataset`.
//!
use async_trait::async_trait;

use crate::{
    batch::Batch,
    dataset::Dataset,
    errors::Result,
    file::{FileDescriptor, Location},
    query::Query,
};

/// Resolves queries to the files that satisfy them
///
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Files matching `query`, in catalog order
    ///
    /// At most `max_hits` files are returned, if given. Unless `keep_duplicates` is set, a file
    /// listed more than once (eg by replica nodes) is only returned once.
    ///
    async fn files(
        &self,
        query: &Query,
        max_hits: Option<usize>,
        keep_duplicates: bool,
    ) -> Result<Vec<FileDescriptor>>;
}

/// Downloads files to their local paths
///
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Download a batch of files
    ///
    /// Transfers may run concurrently. A failing transfer must not prevent the others from
    /// completing; every file is reported either as succeeded or in the batch's errors.
    ///
    async fn download(&self, files: &[FileDescriptor], show_progress: bool)
        -> Batch<FileDescriptor>;
}

/// Status of the local copy of a file
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Missing,
    Corrupt,
}

/// Checks local copies of files
///
#[async_trait]
pub trait Checker: Send + Sync {
    /// Full check of the local copy, including its content
    async fn check(&self, file: &FileDescriptor) -> FileStatus;

    /// Whether a local copy exists at all
    async fn exists(&self, file: &FileDescriptor) -> bool;
}

/// Opens array files
///
pub trait Reader: Send + Sync {
    /// Open a file as a lazy dataset
    ///
    /// No variable values should be read, apart from index coordinates. Variables named in
    /// `drop_variables` are left out.
    ///
    fn open(&self, location: &Location, drop_variables: &[String]) -> Result<Dataset>;
}
