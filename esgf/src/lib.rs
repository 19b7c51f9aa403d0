mod array;
mod backend;
mod batch;
mod catalog;
mod chunks;
mod client;
mod combine;
mod concat;
mod config;
mod dataset;
mod errors;
mod expand;
mod file;
mod helpers;
mod identity;
mod load;
mod query;
mod reconcile;
mod retrieve;
mod services;

#[cfg(test)]
mod testing;

pub use array::{ArraySource, Kind, Label, LazyArray, Values};
pub use backend::{Backend, BackendOptions, EsgfBackend, Registry, Source};
pub use batch::{raise, Batch, ItemError};
pub use catalog::{MemoryCatalog, QUERY_FACET};
pub use chunks::{annotate, ChunkPolicy};
pub use client::{Client, OpenOptions, Services};
pub use combine::{check_dims, combine, COORDINATES, DATASET_IDS};
pub use concat::{concat, concat_group, drop_conflicts, Compat, TIME_DIM};
pub use config::{ClientConfig, INDEX_NODE_VAR, PATH_VAR};
pub use dataset::{AttrValue, Attrs, Dataset, Position, Variable};
pub use errors::{Error, Failure, Result};
pub use expand::expand;
pub use file::{FileDescriptor, Location};
pub use identity::{DatasetIdentity, IdentityKey};
pub use load::{load_groups, select, Groups, Indexer, LoadOptions, Sel};
pub use query::{Facet, Query, QueryOptions, Selection};
pub use reconcile::{reconcile, BOUNDS_DIMS};
pub use retrieve::{CheckMode, Orchestrator};
pub use services::{Catalog, Checker, FileStatus, Reader, Retriever};
