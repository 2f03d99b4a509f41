//! Capabilities the surrounding system supplies: observation catalog,
//! response collectors and the ensemble context tying them together.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::observation::ObservationVector;

/// Realization number → values (one per data point, or one per time index).
pub type RealizationValues = BTreeMap<usize, Vec<f64>>;

/// One observed value with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedPoint {
    pub value: f64,
    pub std: f64,
}

/// Failures reported by a data source. The matrix builder passes these
/// through untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("No observation named '{0}'")]
    UnknownObservation(String),

    #[error("Unknown case '{0}'")]
    UnknownCase(String),

    #[error("Observation '{key}' has no data at step {step}")]
    MissingStep { key: String, step: usize },

    #[error("No response '{key}' stored for case '{case}'")]
    UnknownResponse { case: String, key: String },

    #[error("Observation '{key}' is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

pub trait ObservationCatalog {
    fn observation(&self, key: &str) -> SourceResult<&ObservationVector>;
}

pub trait GenDataCollector {
    /// Per-realization values of `data_key` at `report_step`.
    fn load_gen_data(
        &self,
        case_name: &str,
        data_key: &str,
        report_step: usize,
    ) -> SourceResult<RealizationValues>;
}

pub trait SummaryCollector {
    /// Per-realization time series of `response_key`, indexed by time index.
    fn load_summary_data(&self, case_name: &str, response_key: &str)
        -> SourceResult<RealizationValues>;
}

pub trait SummaryObservationCollector {
    /// Observed value/uncertainty of `response_key` at every observed time index.
    fn load_summary_observations(
        &self,
        case_name: &str,
        response_key: &str,
    ) -> SourceResult<BTreeMap<usize, ObservedPoint>>;
}

pub trait BlockDataLoader {
    /// Per-realization simulated values at every spatial index of a block
    /// observation, for one report step.
    fn load_block_data(
        &self,
        case_name: &str,
        observation_key: &str,
        observation: &ObservationVector,
        report_step: usize,
    ) -> SourceResult<RealizationValues>;
}

/// Everything the matrix builder needs from the ensemble it reads.
pub trait EnsembleContext:
    ObservationCatalog
    + GenDataCollector
    + SummaryCollector
    + SummaryObservationCollector
    + BlockDataLoader
{
    fn ensemble_size(&self) -> usize;

    /// Case currently selected on the storage.
    fn case_name(&self) -> &str;
}
