use crate::{
    array::Label,
    dataset::Dataset,
    errors::Result,
    identity::{DatasetIdentity, IdentityKey},
};

/// Give a group's dataset a new length one dimension for each of `concat_dims`, labeled with
/// that field of the group's identity.
///
/// Dimensions are added in the order given. With no `concat_dims` the dataset is returned
/// unchanged.
///
pub fn expand(
    dataset: &Dataset,
    identity: &DatasetIdentity,
    concat_dims: &[IdentityKey],
) -> Result<Dataset> {
    if concat_dims.is_empty() {
        return Ok(dataset.clone());
    }

    let new: Vec<(String, Label)> = concat_dims
        .iter()
        .map(|key| (key.to_string(), Label::from(identity.get(*key))))
        .collect();

    dataset.expand_dims(&new)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        errors::Error,
        file::Location,
        reconcile::reconcile,
        services::Reader,
        testing::{text_labels, MemoryReader, TAS_585},
    };

    fn dataset() -> Result<Dataset> {
        let reader = MemoryReader::new();
        reader.insert_cmip("tas.nc", "tas", 2019)?;
        reconcile(&reader.open(&Location::Remote("tas.nc".to_string()), &[])?)
    }

    #[test]
    fn test_expand() -> Result<()> {
        let identity: DatasetIdentity = TAS_585.parse()?;
        let expanded = expand(
            &dataset()?,
            &identity,
            &[IdentityKey::ExperimentId, IdentityKey::SourceId],
        )?;

        let tas = expanded.variable("tas").unwrap();
        assert_eq!(tas.dims, vec!["experiment_id", "source_id", "time", "lat", "lon"]);
        assert_eq!(tas.data.shape(), &[1, 1, 12, 2, 3]);
        assert_eq!(expanded.index("experiment_id")?, Some(text_labels(&["ssp585"])));
        assert_eq!(expanded.index("source_id")?, Some(text_labels(&["EC-Earth3-CC"])));

        // Coordinates don't gain the new dimensions
        assert_eq!(expanded.variable("time_bnds").unwrap().dims, vec!["time", "bnds"]);

        Ok(())
    }

    #[test]
    fn test_nothing_to_expand() -> Result<()> {
        let identity: DatasetIdentity = TAS_585.parse()?;
        let dataset = dataset()?;
        let expanded = expand(&dataset, &identity, &[])?;
        assert_eq!(expanded.dims(), dataset.dims());

        Ok(())
    }

    #[test]
    fn test_dimension_already_there() -> Result<()> {
        let identity: DatasetIdentity = TAS_585.parse()?;
        let expanded = expand(&dataset()?, &identity, &[IdentityKey::ExperimentId])?;
        assert!(matches!(
            expand(&expanded, &identity, &[IdentityKey::ExperimentId]),
            Err(Error::Invalid(_))
        ));

        Ok(())
    }
}
