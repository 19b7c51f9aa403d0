//! Opening files and sorting the results into groups by dataset identity.
//!
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    array::Label,
    dataset::{Dataset, Position},
    errors::{Error, Result},
    file::{FileDescriptor, Location},
    helpers::rearrange,
    services::Reader,
};

/// Label based selection along one dimension
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Indexer {
    /// A single label. The dimension is dropped.
    Label(Label),

    /// Every label between two bounds, inclusive
    Range(Label, Label),
}

/// Sub-selection to apply to every opened file, by dimension name
pub type Sel = BTreeMap<String, Indexer>;

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Variables the reader should leave out
    pub drop_variables: Vec<String>,

    pub sel: Option<Sel>,

    /// Spatial coordinates to remove, where present
    pub ignore_spatial_coords: Vec<String>,
}

/// Opened datasets, by dataset id
pub type Groups = BTreeMap<String, Vec<Dataset>>;

/// Open every file and group the results by dataset id
///
/// Files are opened in the order given, so each group lists its members in catalog order.
/// Datasets that end up empty along some dimension after selection are skipped.
///
pub fn load_groups<'a, I>(files: I, reader: &dyn Reader, options: &LoadOptions) -> Result<Groups>
where
    I: IntoIterator<Item = (&'a FileDescriptor, Location)>,
{
    let mut groups = Groups::new();
    for (file, location) in files {
        match load(&location, reader, options)? {
            Some(dataset) => groups
                .entry(file.dataset_id.clone())
                .or_default()
                .push(dataset),
            None => debug!(file = %file, "nothing selected, skipping"),
        }
    }

    Ok(groups)
}

fn load(location: &Location, reader: &dyn Reader, options: &LoadOptions) -> Result<Option<Dataset>> {
    let mut dataset = reader.open(location, &options.drop_variables)?;

    dataset.encoding.clear();
    for (_, variable) in dataset.variables_mut() {
        variable.encoding.clear();
    }

    if let Some(sel) = &options.sel {
        dataset = select(&dataset, sel)?;
    }

    let spatial: Vec<&str> = options
        .ignore_spatial_coords
        .iter()
        .map(String::as_str)
        .filter(|name| dataset.contains(name))
        .collect();
    let dataset = dataset.drop_vars(&spatial);

    if dataset.dims().values().any(|size| *size == 0) {
        return Ok(None);
    }

    Ok(Some(dataset))
}

/// Apply a label based selection, ignoring dimensions the dataset doesn't have
pub fn select(dataset: &Dataset, sel: &Sel) -> Result<Dataset> {
    let mut dataset = dataset.clone();
    for (dim, indexer) in sel {
        if dataset.size_of(dim).is_none() {
            continue;
        }
        let labels = dataset
            .index(dim)?
            .ok_or_else(|| Error::MissingCoordinate(dim.clone()))?;
        let position = locate(&labels, indexer);
        dataset = dataset.isel(dim, &position)?;
    }

    Ok(dataset)
}

/// Translate a label based indexer to positions
///
/// A label that isn't there, or a range that matches nothing, selects no positions at all.
///
fn locate(labels: &[Label], indexer: &Indexer) -> Position {
    match indexer {
        Indexer::Label(label) => match labels.iter().position(|candidate| candidate == label) {
            Some(index) => Position::Index(index),
            None => Position::Range(0..0),
        },
        Indexer::Range(lower, upper) => {
            let (lower, upper) = rearrange(lower, upper);
            let mut matched = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| lower <= *label && *label <= upper)
                .map(|(index, _)| index);
            match matched.next() {
                None => Position::Range(0..0),
                Some(first) => {
                    let last = matched.last().unwrap_or(first);
                    Position::Range(first..last + 1)
                }
            }
        }
    }
}
