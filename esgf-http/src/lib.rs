//! Concrete implementations of the `esgf::Retriever` and `esgf::Checker` interfaces.
//!
//! Files are downloaded over HTTP into a local data directory, laid out by each file's local
//! path, and checked there.
//!
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future::join_all, StreamExt};
use sha2::{Digest, Sha256};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, info, warn};

use esgf::{Batch, Checker, ClientConfig, Error, FileDescriptor, FileStatus, Result, Retriever};

const READ_BUFFER_SIZE: usize = 1 << 16;

fn transfer_error<E>(file: &FileDescriptor) -> impl FnOnce(E) -> Error + '_
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| Error::Transfer {
        url: file.url.clone(),
        source: Box::new(err),
    }
}

/// Downloads files over HTTP, all files of a batch at once
///
pub struct HttpRetriever {
    client: reqwest::Client,
    data_root: PathBuf,
}

impl HttpRetriever {
    pub fn new<P: Into<PathBuf>>(data_root: P, verify_ssl: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|err| Error::Config {
                path: None,
                message: format!("cannot build HTTP client: {err}"),
            })?;

        Ok(Self {
            client,
            data_root: data_root.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.data_dir(), config.verify_ssl)
    }

    /// Download one file
    ///
    /// The body is streamed to a temporary file next to the destination, which is only renamed
    /// into place once the transfer is complete, and removed if it fails.
    ///
    async fn fetch(&self, file: &FileDescriptor) -> Result<u64> {
        let path = file.path_in(&self.data_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(&file.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(transfer_error(file))?;

        let partial = path.with_file_name(format!("{}.part", file.filename));
        let written = match write_body(response, &partial, file).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    debug!(path = %partial.display(), error = %cleanup, "cannot remove partial file");
                }
                return Err(err);
            }
        };
        fs::rename(&partial, &path).await?;

        Ok(written)
    }
}

async fn write_body(response: reqwest::Response, path: &Path, file: &FileDescriptor) -> Result<u64> {
    let mut out = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(transfer_error(file))?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;

    Ok(written)
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn download(&self, files: &[FileDescriptor], show_progress: bool) -> Batch<FileDescriptor> {
        let total = files.len();
        let results = join_all(files.iter().map(|file| async move {
            let result = self.fetch(file).await;
            if let Ok(bytes) = &result {
                if show_progress {
                    info!(file = %file, bytes, total, "downloaded");
                } else {
                    debug!(file = %file, bytes, "downloaded");
                }
            }
            (file, result)
        }))
        .await;

        let mut batch = Batch::new();
        for (file, result) in results {
            match result {
                Ok(_) => batch.push_ok(file.clone()),
                Err(err) => batch.push_err(file.clone(), Some(err)),
            }
        }

        batch
    }
}

/// Checks local copies of files under a data directory
///
pub struct LocalChecker {
    data_root: PathBuf,
}

impl LocalChecker {
    pub fn new<P: Into<PathBuf>>(data_root: P) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.data_dir())
    }
}

async fn sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[async_trait]
impl Checker for LocalChecker {
    async fn check(&self, file: &FileDescriptor) -> FileStatus {
        let path = file.path_in(&self.data_root);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return FileStatus::Missing,
        };
        if file.size > 0 && metadata.len() != file.size {
            debug!(file = %file, expected = file.size, found = metadata.len(), "size mismatch");
            return FileStatus::Corrupt;
        }

        let expected = match &file.checksum {
            Some(checksum) => checksum.to_lowercase(),
            None => return FileStatus::Ok,
        };
        match file.checksum_type.as_deref().map(str::to_uppercase).as_deref() {
            None | Some("SHA256") | Some("SHA-256") => {}
            Some(other) => {
                warn!(file = %file, checksum_type = other, "unsupported checksum type, not verified");
                return FileStatus::Ok;
            }
        }

        match sha256(&path).await {
            Ok(found) if found == expected => FileStatus::Ok,
            Ok(found) => {
                debug!(file = %file, expected = %expected, found = %found, "checksum mismatch");
                FileStatus::Corrupt
            }
            Err(err) => {
                warn!(file = %file, error = %err, "cannot read local copy");
                FileStatus::Corrupt
            }
        }
    }

    async fn exists(&self, file: &FileDescriptor) -> bool {
        fs::metadata(file.path_in(&self.data_root)).await.is_ok()
    }
}
