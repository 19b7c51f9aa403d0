use tracing::debug;

use crate::{
    concat::TIME_DIM,
    dataset::{AttrValue, Dataset},
    errors::{Error, Result},
};

/// Names used for the dimension that indexes the edges of a cell
pub const BOUNDS_DIMS: [&str; 7] = [
    "bnds",
    "bounds",
    "nbnd",
    "nbounds",
    "nv",
    "vertices",
    "axis_nbounds",
];

/// Sort out which variables of a group are coordinates
///
/// Cell bounds, and anything that doesn't vary in time, are made coordinates. Then every
/// dimensionless coordinate is copied into an attribute of each data variable and removed, so it
/// can't get in the way when groups are combined.
///
pub fn reconcile(dataset: &Dataset) -> Result<Dataset> {
    let structural: Vec<&str> = dataset
        .data_var_names()
        .into_iter()
        .filter(|name| {
            dataset.variable(name).map_or(false, |variable| {
                !variable.has_dim(TIME_DIM)
                    || variable
                        .dims
                        .iter()
                        .any(|dim| BOUNDS_DIMS.contains(&dim.as_str()))
            })
        })
        .collect();
    let mut dataset = dataset.set_coords(&structural);

    let scalars: Vec<String> = dataset
        .coord_names()
        .into_iter()
        .filter(|name| {
            dataset
                .variable(name)
                .map_or(false, |variable| variable.dims.is_empty())
        })
        .map(str::to_string)
        .collect();

    let mut hoisted = Vec::with_capacity(scalars.len());
    for name in &scalars {
        let variable = dataset
            .variable(name)
            .ok_or_else(|| Error::Invalid(format!("no variable named {name:?}")))?;
        let value = variable
            .data
            .compute()?
            .labels()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Invalid(format!("scalar {name:?} holds no value")))?;
        hoisted.push((name.clone(), AttrValue::from(value)));
    }

    let data_vars: Vec<String> = dataset
        .data_var_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    for (name, variable) in dataset.variables_mut() {
        if !data_vars.contains(name) {
            continue;
        }
        for (scalar, value) in &hoisted {
            variable.attrs.insert(scalar.clone(), value.clone());
        }
    }

    debug!(
        coords = structural.len(),
        scalars = scalars.len(),
        "reconciled coordinates"
    );

    Ok(dataset.drop_vars(&scalars))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        array::{Label, Values},
        dataset::{Position, Variable},
        file::Location,
        services::Reader,
        testing::MemoryReader,
    };

    fn open(filename: &str, variable: &str) -> Result<(MemoryReader, Dataset)> {
        let reader = MemoryReader::new();
        if variable == "areacella" {
            reader.insert_areacella(filename)?;
        } else {
            reader.insert_cmip(filename, variable, 2019)?;
        }
        let dataset = reader.open(&Location::Remote(filename.to_string()), &[])?;

        Ok((reader, dataset))
    }

    #[test]
    fn test_bounds_become_coordinates() -> Result<()> {
        let (reader, dataset) = open("tas.nc", "tas")?;
        assert_eq!(
            dataset.data_var_names(),
            vec!["lat_bnds", "lon_bnds", "tas", "time_bnds"]
        );

        let reconciled = reconcile(&dataset)?;
        assert_eq!(reconciled.data_var_names(), vec!["tas"]);
        assert_eq!(
            reconciled.coord_names(),
            vec!["lat", "lat_bnds", "lon", "lon_bnds", "time", "time_bnds"]
        );
        assert_eq!(reader.reads(), 0);

        Ok(())
    }

    #[test]
    fn test_scalars_are_hoisted() -> Result<()> {
        let (_, dataset) = open("tas.nc", "tas")?;
        let reconciled = reconcile(&dataset)?;

        assert!(!reconciled.contains("height"));
        let tas = reconciled.variable("tas").unwrap();
        assert_eq!(tas.attrs.get("height"), Some(&AttrValue::Float(2.0)));
        assert_eq!(tas.attrs.get("units"), Some(&AttrValue::from("K")));

        // Coordinates don't get the attribute
        let lat = reconciled.variable("lat").unwrap();
        assert!(!lat.attrs.contains_key("height"));

        Ok(())
    }

    #[test]
    fn test_selected_point_is_hoisted() -> Result<()> {
        let (_, dataset) = open("tas.nc", "tas")?;
        let point = dataset.isel("lat", &Position::Index(1))?;
        let reconciled = reconcile(&point)?;

        assert!(!reconciled.contains("lat"));
        assert_eq!(
            reconciled.variable("tas").unwrap().attrs.get("lat"),
            Some(&AttrValue::Float(45.0))
        );

        Ok(())
    }

    #[test]
    fn test_static_fields_become_coordinates() -> Result<()> {
        let (reader, dataset) = open("areacella.nc", "areacella")?;
        let reconciled = reconcile(&dataset)?;

        assert!(reconciled.data_var_names().is_empty());
        assert!(reconciled.is_coord("areacella"));
        assert_eq!(reader.reads(), 0);

        Ok(())
    }

    #[test]
    fn test_other_bounds_names() -> Result<()> {
        let time = Variable::new(["time"], Values::from_f64(&[2], vec![0.0, 1.0])?)?;
        let vertices = Variable::new(
            ["time", "vertices"],
            Values::from_i64(&[2, 4], vec![0; 8])?,
        )?;
        let label = Variable::new(Vec::<String>::new(), Values::scalar(Label::from("pressure")))?;
        let dataset = Dataset::new()
            .with_coord("time", time.clone())?
            .with_coord("level_type", label)?
            .with_data_var("cell", vertices)?
            .with_data_var("ua", time)?;

        let reconciled = reconcile(&dataset)?;
        assert!(reconciled.is_coord("cell"));
        assert_eq!(
            reconciled.variable("ua").unwrap().attrs.get("level_type"),
            Some(&AttrValue::from("pressure"))
        );

        Ok(())
    }
}
