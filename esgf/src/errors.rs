use std::fmt;
use std::io;
use std::path::PathBuf;
use std::result;

use thiserror::Error;

use crate::array::Kind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("dataset id {id:?} has {found} fields, expected {expected}")]
    Parse {
        id: String,
        found: usize,
        expected: usize,
    },

    #[error("{} file(s) could not be retrieved: {}", .0.len(), Failures(.0))]
    Retrieval(Vec<Failure>),

    #[error("transfer of {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("dimension {dim:?} has size {found}, expected {expected}")]
    DimensionMismatch {
        dim: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot align on coordinate {name:?}: {detail}")]
    Alignment { name: String, detail: String },

    #[error("cannot combine datasets: {0}")]
    Combine(String),

    #[error("no dimension named {0:?}")]
    MissingDimension(String),

    #[error("dimension {0:?} has no index coordinate")]
    MissingCoordinate(String),

    #[error("expected {expected:?} values, found {found:?}")]
    Kind { expected: Kind, found: Kind },

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{0}")]
    Invalid(String),

    #[error("configuration error in {path:?}: {message}")]
    Config {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no backend can open {0}")]
    NoBackend(String),
}

/// One item of a batch that ended in an error.
///
#[derive(Debug)]
pub struct Failure {
    pub item: String,
    pub err: Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.err)
    }
}

struct Failures<'a>(&'a [Failure]);

impl fmt::Display for Failures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }

        Ok(())
    }
}

pub type Result<T> = result::Result<T, Error>;
