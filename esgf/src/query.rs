use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The value of one search facet: a single value or any of several
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Facet {
    One(String),
    Many(Vec<String>),
}

impl Facet {
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl From<&str> for Facet {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<&str>> for Facet {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// What the caller is asking for, by facet name
pub type Selection = BTreeMap<String, Facet>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Search across every federated index node
    pub distrib: bool,

    /// Only the latest version of each dataset
    pub latest: bool,
}

/// A catalog query
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub selection: Selection,
    pub options: QueryOptions,
}

impl Query {
    pub fn new(selection: Selection, options: QueryOptions) -> Self {
        Self { selection, options }
    }
}
