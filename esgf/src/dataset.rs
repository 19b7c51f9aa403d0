use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};

use serde::{Deserialize, Serialize};

use crate::{
    array::{Label, LazyArray, Values},
    errors::{Error, Result},
};

pub type Attrs = BTreeMap<String, AttrValue>;

/// The value of an attribute
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Label> for AttrValue {
    fn from(label: Label) -> Self {
        match label {
            Label::Int(value) => Self::Int(value),
            Label::Float(value) => Self::Float(value),
            Label::Text(value) => Self::Text(value),
        }
    }
}

/// A labeled, lazily evaluated array
///
#[derive(Clone, Debug)]
pub struct Variable {
    /// Names of the dimensions, one per axis of `data`
    pub dims: Vec<String>,

    pub data: LazyArray,

    pub attrs: Attrs,

    /// Metadata the reader attaches to describe how the variable was stored on disk
    pub encoding: Attrs,

    /// Advisory partitioning, block sizes per dimension
    pub preferred_chunks: BTreeMap<String, Vec<usize>>,
}

impl Variable {
    pub fn new<I, S>(dims: I, data: impl Into<LazyArray>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        let data = data.into();
        if dims.len() != data.ndim() {
            return Err(Error::Invalid(format!(
                "{} dimension names given for a {} dimensional array",
                dims.len(),
                data.ndim()
            )));
        }
        let unique: BTreeSet<&String> = dims.iter().collect();
        if unique.len() != dims.len() {
            return Err(Error::Invalid(format!("repeated dimension in {dims:?}")));
        }

        Ok(Self {
            dims,
            data,
            attrs: Attrs::new(),
            encoding: Attrs::new(),
            preferred_chunks: BTreeMap::new(),
        })
    }

    pub fn with_attr<K: Into<String>, V: Into<AttrValue>>(mut self, key: K, value: V) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_encoding<K: Into<String>, V: Into<AttrValue>>(mut self, key: K, value: V) -> Self {
        self.encoding.insert(key.into(), value.into());
        self
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|name| name == dim)
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis(dim).is_some()
    }

    pub fn sizes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.dims
            .iter()
            .map(String::as_str)
            .zip(self.data.shape().iter().copied())
    }
}

/// Select positions along one dimension
///
#[derive(Clone, Debug, PartialEq)]
pub enum Position {
    /// A single position. The dimension is dropped.
    Index(usize),

    /// A contiguous run of positions
    Range(Range<usize>),
}

/// A collection of labeled variables sharing dimensions
///
/// Variables are either coordinates or data variables. Dimension sizes are derived from the
/// variables, so a dimension exists exactly as long as some variable uses it. Every transforming
/// method returns a new `Dataset`, leaving the original untouched.
///
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
    coords: BTreeSet<String>,

    pub attrs: Attrs,

    /// Metadata the reader attaches to describe the file this came from
    pub encoding: Attrs,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coord<S: Into<String>>(self, name: S, variable: Variable) -> Result<Self> {
        self.insert(name.into(), variable, true)
    }

    pub fn with_data_var<S: Into<String>>(self, name: S, variable: Variable) -> Result<Self> {
        self.insert(name.into(), variable, false)
    }

    pub fn with_attr<K: Into<String>, V: Into<AttrValue>>(mut self, key: K, value: V) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    fn insert(mut self, name: String, variable: Variable, coord: bool) -> Result<Self> {
        let dims = self.dims_excluding(&name);
        for (dim, size) in variable.sizes() {
            if let Some(&expected) = dims.get(dim) {
                if expected != size {
                    return Err(Error::DimensionMismatch {
                        dim: dim.to_string(),
                        expected,
                        found: size,
                    });
                }
            }
        }

        if coord {
            self.coords.insert(name.clone());
        } else {
            self.coords.remove(&name);
        }
        self.variables.insert(name, variable);

        Ok(self)
    }

    /// Dimension sizes
    pub fn dims(&self) -> BTreeMap<String, usize> {
        self.dims_excluding("")
    }

    fn dims_excluding(&self, skip: &str) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for (name, variable) in &self.variables {
            if name == skip {
                continue;
            }
            for (dim, size) in variable.sizes() {
                dims.entry(dim.to_string()).or_insert(size);
            }
        }

        dims
    }

    pub fn size_of(&self, dim: &str) -> Option<usize> {
        self.variables.values().find_map(|variable| {
            variable
                .axis(dim)
                .map(|axis| variable.data.shape()[axis])
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    pub(crate) fn variables_mut(&mut self) -> impl Iterator<Item = (&String, &mut Variable)> {
        self.variables.iter_mut()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_coord(&self, name: &str) -> bool {
        self.coords.contains(name)
    }

    /// Names of coordinates, sorted
    pub fn coord_names(&self) -> Vec<&str> {
        self.coords.iter().map(String::as_str).collect()
    }

    /// Names of data variables, sorted
    pub fn data_var_names(&self) -> Vec<&str> {
        self.variables
            .keys()
            .filter(|name| !self.coords.contains(*name))
            .map(String::as_str)
            .collect()
    }

    /// The index coordinate of a dimension: the one dimensional coordinate named after it
    pub fn index_variable(&self, dim: &str) -> Option<&Variable> {
        self.variables
            .get(dim)
            .filter(|variable| self.coords.contains(dim) && variable.dims == [dim])
    }

    /// Labels of the index coordinate of a dimension, if it has one
    pub fn index(&self, dim: &str) -> Result<Option<Vec<Label>>> {
        match self.index_variable(dim) {
            None => Ok(None),
            Some(variable) => Ok(Some(variable.data.compute()?.labels())),
        }
    }

    /// Remove variables by name. Names that aren't present are ignored.
    pub fn drop_vars<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut dataset = self.clone();
        for name in names {
            dataset.variables.remove(name.as_ref());
            dataset.coords.remove(name.as_ref());
        }

        dataset
    }

    /// Reclassify variables as coordinates. Names that aren't present are ignored.
    pub fn set_coords<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut dataset = self.clone();
        for name in names {
            if dataset.variables.contains_key(name.as_ref()) {
                dataset.coords.insert(name.as_ref().to_string());
            }
        }

        dataset
    }

    /// Positional selection along one dimension, applied to every variable that has it
    pub fn isel(&self, dim: &str, position: &Position) -> Result<Self> {
        if self.size_of(dim).is_none() {
            return Err(Error::MissingDimension(dim.to_string()));
        }

        let mut dataset = self.clone();
        for variable in dataset.variables.values_mut() {
            if let Some(axis) = variable.axis(dim) {
                match position {
                    Position::Index(index) => {
                        variable.data = variable.data.index(axis, *index)?;
                        variable.dims.remove(axis);
                    }
                    Position::Range(range) => {
                        variable.data = variable.data.slice(axis, range.clone())?;
                    }
                }
                variable.preferred_chunks.clear();
            }
        }

        Ok(dataset)
    }

    /// Add new leading dimensions of length one, each labeled with a single value
    ///
    /// Every data variable gains the new axes, in the given order, ahead of its existing ones.
    /// Coordinates are left as they are. Each new dimension gets an index coordinate holding its
    /// label.
    ///
    pub fn expand_dims(&self, new: &[(String, Label)]) -> Result<Self> {
        let dims = self.dims();
        for (dim, _) in new {
            if dims.contains_key(dim) || self.variables.contains_key(dim) {
                return Err(Error::Invalid(format!("dimension {dim:?} already exists")));
            }
        }

        let mut dataset = self.clone();
        for (name, variable) in dataset.variables.iter_mut() {
            if self.coords.contains(name) {
                continue;
            }
            let mut dims = Vec::with_capacity(new.len() + variable.dims.len());
            let mut data = variable.data.clone();
            for (axis, (dim, _)) in new.iter().enumerate() {
                data = data.insert_axis(axis)?;
                dims.push(dim.clone());
            }
            dims.extend(variable.dims.drain(..));
            variable.dims = dims;
            variable.data = data;
        }

        for (dim, label) in new {
            let values = Values::from_labels(std::slice::from_ref(label))?;
            dataset = dataset.with_coord(dim.clone(), Variable::new([dim.as_str()], values)?)?;
        }

        Ok(dataset)
    }

    /// Compute every variable
    pub fn load(&self) -> Result<BTreeMap<String, Values>> {
        self.variables
            .iter()
            .map(|(name, variable)| Ok((name.clone(), variable.data.compute()?)))
            .collect()
    }
}
