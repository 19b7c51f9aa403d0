//! Combining the datasets of every group into one, by their coordinates.
//!
//! Datasets holding the same data variables are first assembled into a hypercube along the
//! concat dimensions whose labels tell them apart. The resulting datasets are then merged. Labels
//! of any other index coordinate shared between datasets must match exactly throughout; nothing is
//! ever reindexed or filled in.
//!
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::{
    array::Label,
    concat::{concat, drop_conflicts, Compat},
    dataset::{AttrValue, Dataset},
    errors::{Error, Result},
    identity::IdentityKey,
};

/// Container attribute listing the identities of every combined group
pub const DATASET_IDS: &str = "dataset_ids";

/// Container attribute listing every coordinate name
pub const COORDINATES: &str = "coordinates";

/// Make sure every group has the same dimensions, apart from `concat_dims`
///
pub fn check_dims(groups: &[(String, Dataset)], concat_dims: &[IdentityKey]) -> Result<()> {
    let skip: BTreeSet<&str> = concat_dims.iter().map(IdentityKey::as_str).collect();
    let dims_of = |dataset: &Dataset| -> BTreeMap<String, usize> {
        dataset
            .dims()
            .into_iter()
            .filter(|(dim, _)| !skip.contains(dim.as_str()))
            .collect()
    };

    let mut groups = groups.iter();
    let expected = match groups.next() {
        Some((_, dataset)) => dims_of(dataset),
        None => return Ok(()),
    };
    for (id, dataset) in groups {
        let found = dims_of(dataset);
        let names: BTreeSet<&String> = expected.keys().chain(found.keys()).collect();
        for dim in names {
            let (a, b) = (
                expected.get(dim).copied().unwrap_or(0),
                found.get(dim).copied().unwrap_or(0),
            );
            if a != b {
                debug!(dataset_id = %id, dim = %dim, "dimensions differ");
                return Err(Error::DimensionMismatch {
                    dim: dim.clone(),
                    expected: a,
                    found: b,
                });
            }
        }
    }

    Ok(())
}

/// Combine the datasets of all groups into one
///
/// `groups` pairs each group's dataset id with its dataset. Only `concat_dims` may tell groups
/// holding the same data variables apart. The result records the sorted dataset ids in its
/// `dataset_ids` attribute and its sorted, space separated coordinate names in its `coordinates`
/// attribute. No groups at all make an empty dataset.
///
pub fn combine(groups: Vec<(String, Dataset)>, concat_dims: &[IdentityKey]) -> Result<Dataset> {
    if groups.is_empty() {
        debug!("nothing to combine");
        return Ok(Dataset::new()
            .with_attr(DATASET_IDS, AttrValue::List(vec![]))
            .with_attr(COORDINATES, ""));
    }

    let mut ids: Vec<String> = groups.iter().map(|(id, _)| id.clone()).collect();
    ids.sort();

    let mut sets: Vec<(Vec<String>, Vec<Dataset>)> = vec![];
    for (_, dataset) in groups {
        let vars: Vec<String> = dataset
            .data_var_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        match sets.iter_mut().find(|(set, _)| *set == vars) {
            Some((_, members)) => members.push(dataset),
            None => sets.push((vars, vec![dataset])),
        }
    }
    info!(groups = ids.len(), sets = sets.len(), "combining");

    let mut combined = vec![];
    for (vars, members) in sets {
        combined.push(combine_nd(&vars, members, concat_dims)?);
    }
    let mut combined = merge(combined)?;

    let coordinates: Vec<&str> = combined.coord_names();
    let coordinates = coordinates.join(" ");
    combined = combined
        .with_attr(DATASET_IDS, AttrValue::List(ids))
        .with_attr(COORDINATES, coordinates);

    Ok(combined)
}

/// Assemble datasets with the same data variables into a hypercube
fn combine_nd(
    vars: &[String],
    datasets: Vec<Dataset>,
    concat_dims: &[IdentityKey],
) -> Result<Dataset> {
    if datasets.len() == 1 {
        if let Some(dataset) = datasets.into_iter().next() {
            return Ok(dataset);
        }
        return Err(Error::Combine("nothing to combine".to_string()));
    }

    let (dims, misaligned): (Vec<String>, Vec<String>) = differing_dims(&datasets)?
        .into_iter()
        .partition(|dim| concat_dims.iter().any(|key| key.as_str() == dim));
    if let Some(name) = misaligned.into_iter().next() {
        return Err(Error::Alignment {
            name,
            detail: format!(
                "labels differ between {} datasets holding {vars:?}",
                datasets.len()
            ),
        });
    }
    if dims.is_empty() {
        return Err(Error::Combine(format!(
            "{} datasets hold {vars:?} and no dimension tells them apart",
            datasets.len()
        )));
    }
    debug!(vars = ?vars, dims = ?dims, "assembling hypercube");

    let mut tiles = vec![];
    let mut shape = vec![];
    let mut positions: Vec<Vec<usize>> = vec![vec![]; datasets.len()];
    for dim in &dims {
        let mut starts = vec![];
        for dataset in &datasets {
            let start = dataset
                .index(dim)?
                .and_then(|labels| labels.into_iter().next())
                .ok_or_else(|| Error::MissingCoordinate(dim.clone()))?;
            starts.push(start);
        }
        let mut distinct: Vec<Label> = vec![];
        for start in &starts {
            if !distinct.contains(start) {
                distinct.push(start.clone());
            }
        }
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for (position, start) in positions.iter_mut().zip(&starts) {
            position.push(
                distinct
                    .iter()
                    .position(|label| label == start)
                    .unwrap_or_default(),
            );
        }
        shape.push(distinct.len());
    }

    let unique: BTreeSet<&Vec<usize>> = positions.iter().collect();
    let cells: usize = shape.iter().product();
    if unique.len() != datasets.len() || cells != datasets.len() {
        return Err(Error::Combine(format!(
            "{} datasets holding {vars:?} don't form a complete hypercube over {dims:?}",
            datasets.len()
        )));
    }
    for (position, dataset) in positions.into_iter().zip(datasets) {
        tiles.push((position, dataset));
    }

    for (axis, dim) in dims.iter().enumerate().rev() {
        let mut rows: BTreeMap<Vec<usize>, Vec<(usize, Dataset)>> = BTreeMap::new();
        for (mut position, dataset) in tiles {
            let along = position.remove(axis);
            rows.entry(position).or_default().push((along, dataset));
        }

        tiles = vec![];
        for (position, mut row) in rows {
            row.sort_by_key(|(along, _)| *along);
            let row: Vec<Dataset> = row.into_iter().map(|(_, dataset)| dataset).collect();
            tiles.push((position, concat(&row, dim, Compat::Exact)?));
        }
    }

    tiles
        .into_iter()
        .next()
        .map(|(_, dataset)| dataset)
        .ok_or_else(|| Error::Combine("nothing to combine".to_string()))
}

/// Dimensions whose index labels differ between datasets
fn differing_dims(datasets: &[Dataset]) -> Result<Vec<String>> {
    let mut dims = vec![];
    for dim in datasets[0].dims().keys() {
        let mut indexes = vec![];
        for dataset in datasets {
            match dataset.index(dim)? {
                Some(labels) => indexes.push(labels),
                None => break,
            }
        }
        if indexes.len() != datasets.len() {
            continue;
        }
        if indexes.iter().any(|labels| *labels != indexes[0]) {
            dims.push(dim.clone());
        }
    }

    Ok(dims)
}

/// Merge datasets holding different variables
///
/// Shared dimensions must have the same size, and shared index coordinates the same labels.
/// Any other variable found in more than one dataset is taken from the first.
///
fn merge(datasets: Vec<Dataset>) -> Result<Dataset> {
    let mut datasets = datasets.into_iter();
    let mut merged = datasets
        .next()
        .ok_or_else(|| Error::Combine("nothing to merge".to_string()))?;

    for dataset in datasets {
        let dims = merged.dims();
        for (dim, size) in dataset.dims() {
            match dims.get(&dim) {
                Some(expected) if *expected != size => {
                    return Err(Error::Alignment {
                        name: dim,
                        detail: format!("sizes {expected} and {size} differ"),
                    });
                }
                Some(_) => {
                    if let (Some(a), Some(b)) = (merged.index(&dim)?, dataset.index(&dim)?) {
                        if a != b {
                            return Err(Error::Alignment {
                                name: dim,
                                detail: format!("labels {a:?} and {b:?} differ"),
                            });
                        }
                    }
                }
                None => {}
            }
        }

        for (name, variable) in dataset.variables() {
            if merged.contains(name) {
                continue;
            }
            merged = if dataset.is_coord(name) {
                merged.with_coord(name.as_str(), variable.clone())?
            } else {
                merged.with_data_var(name.as_str(), variable.clone())?
            };
        }
        merged.attrs = drop_conflicts([&merged.attrs, &dataset.attrs]);
    }

    Ok(merged)
}
