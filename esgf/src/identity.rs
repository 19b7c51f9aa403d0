//! The ten field dotted identity naming one logical dataset, eg
//! `CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp245.r1i1p1f1.Amon.tas.gr.v20210113`
//!
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One field of a dataset identity
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    Project,
    ActivityId,
    InstitutionId,
    SourceId,
    ExperimentId,
    VariantLabel,
    TableId,
    VariableId,
    GridLabel,
    Version,
}

impl IdentityKey {
    /// All keys, in the order their values appear in a dataset id
    pub const ALL: [IdentityKey; 10] = [
        Self::Project,
        Self::ActivityId,
        Self::InstitutionId,
        Self::SourceId,
        Self::ExperimentId,
        Self::VariantLabel,
        Self::TableId,
        Self::VariableId,
        Self::GridLabel,
        Self::Version,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::ActivityId => "activity_id",
            Self::InstitutionId => "institution_id",
            Self::SourceId => "source_id",
            Self::ExperimentId => "experiment_id",
            Self::VariantLabel => "variant_label",
            Self::TableId => "table_id",
            Self::VariableId => "variable_id",
            Self::GridLabel => "grid_label",
            Self::Version => "version",
        }
    }

    fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityKey {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|key| key.as_str() == name)
            .copied()
            .ok_or_else(|| Error::Invalid(format!("unknown dataset id field: {name:?}")))
    }
}

/// A parsed dataset identity
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatasetIdentity {
    values: [String; 10],
}

impl DatasetIdentity {
    pub fn get(&self, key: IdentityKey) -> &str {
        &self.values[key.position()]
    }

    /// Iterate over `(key, value)` pairs in dataset id order
    pub fn iter(&self) -> impl Iterator<Item = (IdentityKey, &str)> {
        IdentityKey::ALL
            .iter()
            .zip(&self.values)
            .map(|(key, value)| (*key, value.as_str()))
    }
}

impl FromStr for DatasetIdentity {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let tokens: Vec<&str> = id.split('.').collect();
        let tokens: [&str; 10] = tokens.as_slice().try_into().map_err(|_| Error::Parse {
            id: id.to_string(),
            found: tokens.len(),
            expected: IdentityKey::ALL.len(),
        })?;

        Ok(Self {
            values: tokens.map(str::to_string),
        })
    }
}

impl fmt::Display for DatasetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAS: &str =
        "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp245.r1i1p1f1.Amon.tas.gr.v20210113";

    #[test]
    fn test_parse() -> Result<()> {
        let identity: DatasetIdentity = TAS.parse()?;
        assert_eq!(identity.get(IdentityKey::Project), "CMIP6");
        assert_eq!(identity.get(IdentityKey::ExperimentId), "ssp245");
        assert_eq!(identity.get(IdentityKey::VariableId), "tas");
        assert_eq!(identity.get(IdentityKey::Version), "v20210113");
        assert_eq!(identity.to_string(), TAS);

        let keys: Vec<&str> = identity.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys[4], "experiment_id");
        assert_eq!(keys.len(), 10);

        Ok(())
    }

    #[test]
    fn test_parse_wrong_field_count() {
        let short = "CMIP6.ScenarioMIP.EC-Earth-Consortium";
        match short.parse::<DatasetIdentity>() {
            Err(Error::Parse { found, expected, .. }) => {
                assert_eq!(found, 3);
                assert_eq!(expected, 10);
            }
            _ => panic!("expected a parse error"),
        }

        let long = format!("{TAS}.extra");
        assert!(matches!(
            long.parse::<DatasetIdentity>(),
            Err(Error::Parse { found: 11, .. })
        ));
    }

    #[test]
    fn test_key_names() -> Result<()> {
        for key in IdentityKey::ALL {
            assert_eq!(key.as_str().parse::<IdentityKey>()?, key);
        }
        assert!("experiment".parse::<IdentityKey>().is_err());
        assert_eq!(
            serde_json::to_string(&IdentityKey::ExperimentId)?,
            "\"experiment_id\""
        );

        Ok(())
    }
}
