use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{dataset::Dataset, identity::IdentityKey};

/// How to derive the preferred block sizes recorded on each variable
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// Whatever blocks assembling the dataset produced
    Produced,

    /// One element per block along each concat dimension, a single block along any other
    #[default]
    PerConcatDim,
}

/// Record a preferred block layout on every variable that isn't an index coordinate
///
/// Only `preferred_chunks` is touched. Values, and the lazy graph computing them, are left as
/// they are.
///
pub fn annotate(dataset: &Dataset, policy: ChunkPolicy, concat_dims: &[IdentityKey]) -> Dataset {
    let dims = dataset.dims();
    let concat_dims: Vec<&str> = concat_dims.iter().map(IdentityKey::as_str).collect();

    let mut annotated = dataset.clone();
    for (name, variable) in annotated.variables_mut() {
        if dims.contains_key(name) {
            continue;
        }

        let hints = variable
            .dims
            .iter()
            .zip(variable.data.shape())
            .zip(variable.data.chunks())
            .map(|((dim, size), blocks)| {
                let hint = match policy {
                    ChunkPolicy::Produced => blocks.clone(),
                    ChunkPolicy::PerConcatDim if concat_dims.contains(&dim.as_str()) => {
                        vec![1; *size]
                    }
                    ChunkPolicy::PerConcatDim => vec![*size],
                };
                (dim.clone(), hint)
            })
            .collect();
        variable.preferred_chunks = hints;
    }
    debug!(policy = ?policy, "annotated chunk hints");

    annotated
}
