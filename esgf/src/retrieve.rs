use std::collections::HashSet;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    batch::raise,
    errors::{Failure, Result},
    file::FileDescriptor,
    services::{Checker, FileStatus, Retriever},
};

/// How to decide whether a local copy of a file is usable
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Full content check
    #[default]
    Strict,

    /// The file only needs to exist
    Exists,
}

/// Drives a `Retriever` until every file is present locally or attempts run out
///
pub struct Orchestrator<'a> {
    retriever: &'a dyn Retriever,
    checker: &'a dyn Checker,
    mode: CheckMode,
    show_progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        retriever: &'a dyn Retriever,
        checker: &'a dyn Checker,
        mode: CheckMode,
        show_progress: bool,
    ) -> Self {
        Self {
            retriever,
            checker,
            mode,
            show_progress,
        }
    }

    async fn is_missing(&self, file: &FileDescriptor) -> bool {
        match self.mode {
            CheckMode::Strict => self.checker.check(file).await != FileStatus::Ok,
            CheckMode::Exists => !self.checker.exists(file).await,
        }
    }

    /// The files whose local copy doesn't pass the configured check, in the order given
    pub async fn missing(&self, files: &[FileDescriptor]) -> Vec<FileDescriptor> {
        let checks = join_all(files.iter().map(|file| self.is_missing(file))).await;

        files
            .iter()
            .zip(checks)
            .filter(|(_, missing)| *missing)
            .map(|(file, _)| file.clone())
            .collect()
    }

    /// Download whatever is missing, making up to `max_attempts` attempts
    ///
    /// Each attempt requests the whole set of files that are still missing at that point, not
    /// just the ones that failed in the previous attempt. Returns the files retrieved, each listed
    /// once, and one `Failure` per error encountered, over all attempts, for every file that was
    /// still not retrieved at the end.
    ///
    pub async fn fetch(
        &self,
        files: &[FileDescriptor],
        max_attempts: u32,
    ) -> (Vec<FileDescriptor>, Vec<Failure>) {
        let max_attempts = max_attempts.max(1);
        let mut retrieved: Vec<FileDescriptor> = vec![];
        let mut retrieved_ids: HashSet<String> = HashSet::new();
        let mut failures: Vec<Failure> = vec![];

        for attempt in 1..=max_attempts {
            let missing = self.missing(files).await;
            if missing.is_empty() {
                debug!(attempt, "nothing left to download");
                break;
            }

            info!(attempt, max_attempts, missing = missing.len(), "downloading");
            let batch = self.retriever.download(&missing, self.show_progress).await;
            let done = !batch.has_failures();
            let (succeeded, errors) = batch.into_parts();
            for failure in &errors {
                warn!(attempt, file = %failure.item, error = %failure.err, "download failed");
            }

            for file in succeeded {
                if retrieved_ids.insert(file.file_id()) {
                    retrieved.push(file);
                }
            }
            failures.extend(errors);

            if done {
                break;
            }
        }

        failures.retain(|failure| !retrieved_ids.contains(&failure.item));

        (retrieved, failures)
    }

    /// Like `fetch`, but raise a single composite error if any file could not be retrieved
    #[instrument(skip_all, fields(files = files.len(), max_attempts = max_attempts))]
    pub async fn download(
        &self,
        files: &[FileDescriptor],
        max_attempts: u32,
    ) -> Result<Vec<FileDescriptor>> {
        let (retrieved, failures) = self.fetch(files, max_attempts).await;
        raise(failures)?;

        info!(retrieved = retrieved.len(), "download complete");
        Ok(retrieved)
    }
}
