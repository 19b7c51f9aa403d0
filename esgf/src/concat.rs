//! Concatenation of datasets along an existing dimension.
//!
use std::{cmp::Ordering, collections::BTreeSet};

use tracing::debug;

use crate::{
    array::{Label, LazyArray},
    dataset::{Attrs, Dataset, Variable},
    errors::{Error, Result},
};

/// Name of the temporal dimension files of one dataset are split along
pub const TIME_DIM: &str = "time";

/// How to treat index coordinates of the other dimensions when concatenating
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compat {
    /// Take the first dataset's labels without looking at the others
    Override,

    /// Every dataset must have the same labels
    Exact,
}

/// Combine attributes, dropping any key whose values disagree
///
pub fn drop_conflicts<'a, I>(all: I) -> Attrs
where
    I: IntoIterator<Item = &'a Attrs>,
{
    let mut merged = Attrs::new();
    let mut conflicting = BTreeSet::new();
    for attrs in all {
        for (key, value) in attrs {
            if conflicting.contains(key) {
                continue;
            }
            match merged.get(key) {
                None => {
                    merged.insert(key.clone(), value.clone());
                }
                Some(existing) if existing != value => {
                    merged.remove(key);
                    conflicting.insert(key.clone());
                }
                Some(_) => {}
            }
        }
    }

    merged
}

/// Concatenate datasets along `dim`
///
/// Only variables that have `dim` are concatenated, and they must be present in every dataset.
/// Any other variable is taken from the first dataset in which it appears. With `Compat::Exact`,
/// index coordinates of other dimensions must carry the same labels in every dataset.
///
pub fn concat(datasets: &[Dataset], dim: &str, compat: Compat) -> Result<Dataset> {
    let first = datasets
        .first()
        .ok_or_else(|| Error::Invalid("nothing to concatenate".to_string()))?;
    for dataset in datasets {
        if dataset.size_of(dim).is_none() {
            return Err(Error::MissingDimension(dim.to_string()));
        }
    }

    let mut names: Vec<&String> = vec![];
    let mut seen = BTreeSet::new();
    for dataset in datasets {
        for (name, _) in dataset.variables() {
            if seen.insert(name) {
                names.push(name);
            }
        }
    }

    let mut concatenated = Dataset::new();
    for name in names {
        let (owner, variable) = datasets
            .iter()
            .find_map(|dataset| dataset.variable(name).map(|variable| (dataset, variable)))
            .ok_or_else(|| Error::Invalid(format!("variable {name:?} vanished")))?;
        let coord = owner.is_coord(name);

        let variable = if variable.has_dim(dim) {
            concat_variable(datasets, name, dim)?
        } else {
            if compat == Compat::Exact && owner.index_variable(name).is_some() {
                check_labels(datasets, name)?;
            }
            variable.clone()
        };

        concatenated = if coord {
            concatenated.with_coord(name.as_str(), variable)?
        } else {
            concatenated.with_data_var(name.as_str(), variable)?
        };
    }

    concatenated.attrs = drop_conflicts(datasets.iter().map(|dataset| &dataset.attrs));
    concatenated.encoding = first.encoding.clone();

    Ok(concatenated)
}

fn concat_variable(datasets: &[Dataset], name: &str, dim: &str) -> Result<Variable> {
    let mut members = vec![];
    for dataset in datasets {
        let variable = dataset.variable(name).ok_or_else(|| {
            Error::Combine(format!(
                "{name:?} varies along {dim:?} but is missing from some datasets"
            ))
        })?;
        members.push(variable);
    }

    let template = members[0];
    let axis = template
        .axis(dim)
        .ok_or_else(|| Error::MissingDimension(dim.to_string()))?;
    for member in &members {
        if member.dims != template.dims {
            return Err(Error::Combine(format!(
                "{name:?} has dimensions {:?} and {:?}",
                template.dims, member.dims
            )));
        }
    }

    let parts: Vec<LazyArray> = members.iter().map(|member| member.data.clone()).collect();
    let mut variable = Variable::new(template.dims.clone(), LazyArray::concat(&parts, axis)?)?;
    variable.attrs = drop_conflicts(members.iter().map(|member| &member.attrs));
    variable.encoding = template.encoding.clone();

    Ok(variable)
}

fn check_labels(datasets: &[Dataset], dim: &str) -> Result<()> {
    let mut expected: Option<Vec<Label>> = None;
    for dataset in datasets {
        let labels = match dataset.index(dim)? {
            Some(labels) => labels,
            None => continue,
        };
        if let Some(expected) = &expected {
            if *expected != labels {
                return Err(Error::Alignment {
                    name: dim.to_string(),
                    detail: format!("labels {expected:?} and {labels:?} differ"),
                });
            }
        } else {
            expected = Some(labels);
        }
    }

    Ok(())
}

/// Concatenate the datasets of one group along time
///
/// A single dataset is returned as is. Otherwise datasets are put in order of their first time
/// label, provided every one of them has a time index, and concatenated without checking that
/// the other coordinates agree.
///
pub fn concat_group(datasets: Vec<Dataset>) -> Result<Dataset> {
    if datasets.len() == 1 {
        if let Some(dataset) = datasets.into_iter().next() {
            return Ok(dataset);
        }
        return Err(Error::Invalid("nothing to concatenate".to_string()));
    }

    let mut keyed = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let start = dataset
            .index(TIME_DIM)?
            .and_then(|labels| labels.into_iter().next());
        keyed.push((start, dataset));
    }
    if keyed.iter().all(|(start, _)| start.is_some()) {
        keyed.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    } else {
        debug!("not every dataset has a time index, keeping catalog order");
    }

    let datasets: Vec<Dataset> = keyed.into_iter().map(|(_, dataset)| dataset).collect();
    concat(&datasets, TIME_DIM, Compat::Override)
}
