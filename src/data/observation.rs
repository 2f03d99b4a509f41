use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MeasuredDataError;

/// The closed set of observation implementations the matrix builder knows
/// how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationType {
    General,
    Summary,
    Block,
}

impl ObservationType {
    pub fn name(&self) -> &'static str {
        match self {
            ObservationType::General => "GEN_OBS",
            ObservationType::Summary => "SUMMARY_OBS",
            ObservationType::Block => "BLOCK_OBS",
        }
    }
}

impl FromStr for ObservationType {
    type Err = MeasuredDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GEN_OBS" => Ok(ObservationType::General),
            "SUMMARY_OBS" => Ok(ObservationType::Summary),
            "BLOCK_OBS" => Ok(ObservationType::Block),
            other => Err(MeasuredDataError::UnsupportedObservationType {
                type_name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observed values and uncertainties at one step, one entry per data point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationNode {
    pub values: Vec<f64>,
    pub stds: Vec<f64>,
}

impl ObservationNode {
    pub fn new(values: Vec<f64>, stds: Vec<f64>) -> Self {
        Self { values, stds }
    }
}

/// A named observation as held by the observation catalog.
///
/// The declared type is kept as the catalog's raw string; it is only parsed
/// when the matrix builder dispatches on it, so an unknown type fails there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationVector {
    pub implementation_type: String,
    /// Response the observation is compared against (gen-data key or
    /// summary key). Unused by block observations.
    #[serde(default)]
    pub data_key: String,
    /// Report step (or time step) → observed data at that step.
    #[serde(default)]
    pub nodes: BTreeMap<usize, ObservationNode>,
}

impl ObservationVector {
    pub fn new(observation_type: ObservationType, data_key: impl Into<String>) -> Self {
        Self {
            implementation_type: observation_type.name().to_string(),
            data_key: data_key.into(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn with_node(mut self, step: usize, node: ObservationNode) -> Self {
        self.nodes.insert(step, node);
        self
    }

    pub fn observation_type(&self) -> Result<ObservationType, MeasuredDataError> {
        self.implementation_type.parse()
    }

    /// Steps in ascending order.
    pub fn step_list(&self) -> Vec<usize> {
        self.nodes.keys().copied().collect()
    }

    pub fn node(&self, step: usize) -> Option<&ObservationNode> {
        self.nodes.get(&step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_type_names() {
        for t in [
            ObservationType::General,
            ObservationType::Summary,
            ObservationType::Block,
        ] {
            assert_eq!(t.name().parse::<ObservationType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_name_is_reported() {
        let err = "CUSTOM_OBS".parse::<ObservationType>().unwrap_err();
        assert!(matches!(
            err,
            MeasuredDataError::UnsupportedObservationType { ref type_name } if type_name == "CUSTOM_OBS"
        ));
        assert_eq!(err.to_string(), "Unknown observation type: CUSTOM_OBS");
    }

    #[test]
    fn step_list_is_sorted() {
        let obs = ObservationVector::new(ObservationType::Block, "")
            .with_node(5, ObservationNode::default())
            .with_node(2, ObservationNode::default());
        assert_eq!(obs.step_list(), vec![2, 5]);
    }
}
