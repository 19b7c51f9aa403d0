//! Typed n-dimensional values and the lazy computation graph built on top of them.
//!
//! A `LazyArray` knows its element kind, shape and block layout without reading anything. Values
//! are only produced when `compute` is called, at which point the graph is evaluated from its
//! leaves, reading from the `ArraySource` of each opened file as needed.
//!
use std::{cmp::Ordering, fmt, ops::Range, sync::Arc};

use ndarray::{concatenate, ArrayD, Axis, IxDyn, Slice};
use paste::paste;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// The kind of element stored in an array
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    F64,
    I64,
    Text,
}

/// Owned, materialized array values
///
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
    Text(ArrayD<String>),
}

/// Apply the same generic expression to whichever array a `Values` holds, rewrapping the result
/// in the same variant.
macro_rules! dispatch {
    ($values:expr, $array:ident => $body:expr) => {
        match $values {
            Values::F64($array) => Values::F64($body),
            Values::I64($array) => Values::I64($body),
            Values::Text($array) => Values::Text($body),
        }
    };
}

macro_rules! Typed {
    ($($variant:ident: $type:ty),*) => {
        paste! {
            impl Values {
                $(
                    pub fn [<from_ $variant:lower>](shape: &[usize], data: Vec<$type>) -> Result<Self> {
                        Ok(Self::$variant(ArrayD::from_shape_vec(IxDyn(shape), data)?))
                    }

                    pub fn [<as_ $variant:lower>](&self) -> Option<&ArrayD<$type>> {
                        match self {
                            Self::$variant(array) => Some(array),
                            _ => None,
                        }
                    }
                )*
            }
        }
    };
}

Typed!(F64: f64, I64: i64, Text: String);

impl Values {
    /// A zero dimensional array holding a single label
    pub fn scalar(label: Label) -> Self {
        match label {
            Label::Int(value) => Self::I64(ArrayD::from_elem(IxDyn(&[]), value)),
            Label::Float(value) => Self::F64(ArrayD::from_elem(IxDyn(&[]), value)),
            Label::Text(value) => Self::Text(ArrayD::from_elem(IxDyn(&[]), value)),
        }
    }

    /// A one dimensional array of labels, all of which must be of the same kind
    pub fn from_labels(labels: &[Label]) -> Result<Self> {
        let kind = match labels.first() {
            Some(label) => label.kind(),
            None => return Err(Error::Invalid("no labels given".to_string())),
        };
        let shape = [labels.len()];
        let mismatch = |found: Kind| Error::Kind {
            expected: kind,
            found,
        };
        match kind {
            Kind::F64 => Self::from_f64(
                &shape,
                labels
                    .iter()
                    .map(|label| match label {
                        Label::Float(value) => Ok(*value),
                        other => Err(mismatch(other.kind())),
                    })
                    .collect::<Result<_>>()?,
            ),
            Kind::I64 => Self::from_i64(
                &shape,
                labels
                    .iter()
                    .map(|label| match label {
                        Label::Int(value) => Ok(*value),
                        other => Err(mismatch(other.kind())),
                    })
                    .collect::<Result<_>>()?,
            ),
            Kind::Text => Self::from_text(
                &shape,
                labels
                    .iter()
                    .map(|label| match label {
                        Label::Text(value) => Ok(value.clone()),
                        other => Err(mismatch(other.kind())),
                    })
                    .collect::<Result<_>>()?,
            ),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::F64(_) => Kind::F64,
            Self::I64(_) => Kind::I64,
            Self::Text(_) => Kind::Text,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F64(array) => array.shape(),
            Self::I64(array) => array.shape(),
            Self::Text(array) => array.shape(),
        }
    }

    /// All elements as labels, in logical (row major) order
    pub fn labels(&self) -> Vec<Label> {
        match self {
            Self::F64(array) => array.iter().map(|value| Label::Float(*value)).collect(),
            Self::I64(array) => array.iter().map(|value| Label::Int(*value)).collect(),
            Self::Text(array) => array.iter().map(|value| Label::Text(value.clone())).collect(),
        }
    }

    fn slice(&self, axis: usize, range: &Range<usize>) -> Self {
        let slice = Slice::from(range.clone());
        dispatch!(self, array => array.slice_axis(Axis(axis), slice).to_owned())
    }

    fn index(&self, axis: usize, index: usize) -> Self {
        dispatch!(self, array => array.index_axis(Axis(axis), index).to_owned())
    }

    fn insert_axis(self, axis: usize) -> Self {
        dispatch!(self, array => array.insert_axis(Axis(axis)))
    }

    fn concatenate(parts: &[Values], axis: usize) -> Result<Self> {
        macro_rules! join {
            ($variant:ident) => {{
                let views = parts
                    .iter()
                    .map(|part| match part {
                        Values::$variant(array) => Ok(array.view()),
                        other => Err(Error::Kind {
                            expected: Kind::$variant,
                            found: other.kind(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Values::$variant(concatenate(Axis(axis), &views)?)
            }};
        }

        Ok(match parts.first() {
            None => return Err(Error::Invalid("nothing to concatenate".to_string())),
            Some(Values::F64(_)) => join!(F64),
            Some(Values::I64(_)) => join!(I64),
            Some(Values::Text(_)) => join!(Text),
        })
    }
}

/// A single coordinate label
///
/// Integers and floats compare numerically with each other. Text only compares with text.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Label {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::I64,
            Self::Float(_) => Kind::F64,
            Self::Text(_) => Kind::Text,
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Label {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// The reader's handle on one opened file.
///
/// Implementations read a named array in full. They are only ever called from
/// `LazyArray::compute`.
///
pub trait ArraySource: Send + Sync {
    fn read(&self, name: &str) -> Result<Values>;
}

/// An array whose values have not necessarily been read yet
///
#[derive(Clone)]
pub struct LazyArray {
    node: Arc<Node>,
    kind: Kind,
    shape: Vec<usize>,
    chunks: Vec<Vec<usize>>,
}

enum Node {
    Memory(Values),
    Source {
        source: Arc<dyn ArraySource>,
        name: String,
    },
    Slice {
        inner: LazyArray,
        axis: usize,
        range: Range<usize>,
    },
    Index {
        inner: LazyArray,
        axis: usize,
        index: usize,
    },
    Insert {
        inner: LazyArray,
        axis: usize,
    },
    Concat {
        parts: Vec<LazyArray>,
        axis: usize,
    },
}

impl LazyArray {
    /// Wrap values that are already in memory
    pub fn from_values(values: Values) -> Self {
        let shape = values.shape().to_vec();
        Self {
            kind: values.kind(),
            chunks: whole_blocks(&shape),
            shape,
            node: Arc::new(Node::Memory(values)),
        }
    }

    /// Refer to a named array in an opened file. Nothing is read until `compute` is called.
    pub fn from_source<S: Into<String>>(
        source: Arc<dyn ArraySource>,
        name: S,
        kind: Kind,
        shape: Vec<usize>,
    ) -> Self {
        Self {
            kind,
            chunks: whole_blocks(&shape),
            shape,
            node: Arc::new(Node::Source {
                source,
                name: name.into(),
            }),
        }
    }

    /// Replace the block layout, eg with the on-disk chunking reported by a reader
    pub fn with_chunks(self, chunks: Vec<Vec<usize>>) -> Result<Self> {
        if chunks.len() != self.shape.len() {
            return Err(Error::Invalid(format!(
                "{} block lists given for a {} dimensional array",
                chunks.len(),
                self.shape.len()
            )));
        }
        for (blocks, size) in chunks.iter().zip(&self.shape) {
            if blocks.iter().sum::<usize>() != *size {
                return Err(Error::Invalid(format!(
                    "blocks {blocks:?} do not cover an axis of size {size}"
                )));
            }
        }

        Ok(Self { chunks, ..self })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Block sizes along each axis
    pub fn chunks(&self) -> &[Vec<usize>] {
        &self.chunks
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(*self.node, Node::Memory(_))
    }

    pub fn slice(&self, axis: usize, range: Range<usize>) -> Result<Self> {
        let size = self.axis_size(axis)?;
        if range.start > range.end || range.end > size {
            return Err(Error::Invalid(format!(
                "range {range:?} out of bounds for axis of size {size}"
            )));
        }

        let mut shape = self.shape.clone();
        shape[axis] = range.len();
        let mut chunks = self.chunks.clone();
        chunks[axis] = slice_blocks(&self.chunks[axis], &range);

        Ok(Self {
            kind: self.kind,
            shape,
            chunks,
            node: Arc::new(Node::Slice {
                inner: self.clone(),
                axis,
                range,
            }),
        })
    }

    /// Select a single position along an axis, removing that axis
    pub fn index(&self, axis: usize, index: usize) -> Result<Self> {
        let size = self.axis_size(axis)?;
        if index >= size {
            return Err(Error::Invalid(format!(
                "index {index} out of bounds for axis of size {size}"
            )));
        }

        let mut shape = self.shape.clone();
        shape.remove(axis);
        let mut chunks = self.chunks.clone();
        chunks.remove(axis);

        Ok(Self {
            kind: self.kind,
            shape,
            chunks,
            node: Arc::new(Node::Index {
                inner: self.clone(),
                axis,
                index,
            }),
        })
    }

    /// Insert a new axis of length one
    pub fn insert_axis(&self, axis: usize) -> Result<Self> {
        if axis > self.shape.len() {
            return Err(Error::Invalid(format!(
                "cannot insert axis {axis} into a {} dimensional array",
                self.shape.len()
            )));
        }

        let mut shape = self.shape.clone();
        shape.insert(axis, 1);
        let mut chunks = self.chunks.clone();
        chunks.insert(axis, vec![1]);

        Ok(Self {
            kind: self.kind,
            shape,
            chunks,
            node: Arc::new(Node::Insert {
                inner: self.clone(),
                axis,
            }),
        })
    }

    /// Concatenate arrays along an existing axis
    ///
    /// All parts must share element kind and agree in size along every other axis. The block
    /// layout of the other axes is taken from the first part.
    ///
    pub fn concat(parts: &[LazyArray], axis: usize) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| Error::Invalid("nothing to concatenate".to_string()))?;
        first.axis_size(axis)?;

        let mut blocks = vec![];
        let mut length = 0;
        for part in parts {
            if part.kind != first.kind {
                return Err(Error::Kind {
                    expected: first.kind,
                    found: part.kind,
                });
            }
            if part.ndim() != first.ndim() {
                return Err(Error::Invalid(format!(
                    "cannot concatenate {} and {} dimensional arrays",
                    first.ndim(),
                    part.ndim()
                )));
            }
            for (i, (a, b)) in first.shape.iter().zip(&part.shape).enumerate() {
                if i != axis && a != b {
                    return Err(Error::Invalid(format!(
                        "cannot concatenate along axis {axis}: axis {i} has sizes {a} and {b}"
                    )));
                }
            }
            length += part.shape[axis];
            blocks.extend(part.chunks[axis].iter().copied().filter(|size| *size > 0));
        }
        if blocks.is_empty() {
            blocks.push(0);
        }

        let mut shape = first.shape.clone();
        shape[axis] = length;
        let mut chunks = first.chunks.clone();
        chunks[axis] = blocks;

        Ok(Self {
            kind: first.kind,
            shape,
            chunks,
            node: Arc::new(Node::Concat {
                parts: parts.to_vec(),
                axis,
            }),
        })
    }

    /// Evaluate the graph, reading from sources as needed
    pub fn compute(&self) -> Result<Values> {
        let values = match &*self.node {
            Node::Memory(values) => values.clone(),
            Node::Source { source, name } => source.read(name)?,
            Node::Slice { inner, axis, range } => inner.compute()?.slice(*axis, range),
            Node::Index { inner, axis, index } => inner.compute()?.index(*axis, *index),
            Node::Insert { inner, axis } => inner.compute()?.insert_axis(*axis),
            Node::Concat { parts, axis } => {
                let parts = parts
                    .iter()
                    .map(|part| part.compute())
                    .collect::<Result<Vec<_>>>()?;
                Values::concatenate(&parts, *axis)?
            }
        };

        if values.kind() != self.kind {
            return Err(Error::Kind {
                expected: self.kind,
                found: values.kind(),
            });
        }
        if values.shape() != self.shape.as_slice() {
            return Err(Error::Invalid(format!(
                "expected shape {:?}, read {:?}",
                self.shape,
                values.shape()
            )));
        }

        Ok(values)
    }

    fn axis_size(&self, axis: usize) -> Result<usize> {
        self.shape.get(axis).copied().ok_or_else(|| {
            Error::Invalid(format!(
                "axis {axis} out of bounds for a {} dimensional array",
                self.shape.len()
            ))
        })
    }
}

impl fmt::Debug for LazyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArray")
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl From<Values> for LazyArray {
    fn from(values: Values) -> Self {
        Self::from_values(values)
    }
}

fn whole_blocks(shape: &[usize]) -> Vec<Vec<usize>> {
    shape.iter().map(|size| vec![*size]).collect()
}

/// Intersect a list of block sizes with a range of positions
fn slice_blocks(blocks: &[usize], range: &Range<usize>) -> Vec<usize> {
    let mut sliced = vec![];
    let mut offset = 0;
    for size in blocks {
        let start = offset.max(range.start);
        let end = (offset + size).min(range.end);
        if end > start {
            sliced.push(end - start);
        }
        offset += size;
    }
    if sliced.is_empty() {
        sliced.push(0);
    }

    sliced
}
