use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use super::observation::{ObservationType, ObservationVector};
use super::source::{
    BlockDataLoader, EnsembleContext, GenDataCollector, ObservationCatalog, ObservedPoint, RealizationValues,
    SourceError, SourceResult, SummaryCollector, SummaryObservationCollector,
};

/// Realization → values, with `null` for a missing value (JSON has no NaN).
pub type StoredValues = BTreeMap<usize, Vec<Option<f64>>>;

// ---------------------------------------------------------------------------
// FixtureStore – one case of an ensemble, held in memory
// ---------------------------------------------------------------------------

/// An in-memory ensemble store serving every data source the matrix builder
/// reads. Usually loaded from JSON:
///
/// ```json
/// {
///   "case_name": "default",
///   "ensemble_size": 2,
///   "observations": {
///     "WOPR_OP1": {
///       "implementation_type": "GEN_OBS",
///       "data_key": "WOPR",
///       "nodes": { "1": { "values": [1.0, 2.0], "stds": [0.1, 0.2] } }
///     }
///   },
///   "gen_data": { "WOPR": { "1": { "0": [1.1, 2.1], "1": [0.9, null] } } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureStore {
    pub case_name: String,
    pub ensemble_size: usize,
    #[serde(default)]
    pub observations: BTreeMap<String, ObservationVector>,
    /// Gen-data key → report step → per-realization values.
    #[serde(default)]
    pub gen_data: BTreeMap<String, BTreeMap<usize, StoredValues>>,
    /// Summary key → per-realization time series.
    #[serde(default)]
    pub summary_data: BTreeMap<String, StoredValues>,
    /// Summary key → time index → observed point.
    #[serde(default)]
    pub summary_observations: BTreeMap<String, BTreeMap<usize, ObservedPoint>>,
    /// Block observation key → report step → per-realization values.
    #[serde(default)]
    pub block_data: BTreeMap<String, BTreeMap<usize, StoredValues>>,
}

impl FixtureStore {
    pub fn new(case_name: impl Into<String>, ensemble_size: usize) -> Self {
        Self {
            case_name: case_name.into(),
            ensemble_size,
            ..Default::default()
        }
    }

    pub fn with_observation(mut self, key: impl Into<String>, observation: ObservationVector) -> Self {
        self.observations.insert(key.into(), observation);
        self
    }

    pub fn with_gen_data(mut self, data_key: &str, report_step: usize, realization: usize, values: Vec<f64>) -> Self {
        self.gen_data
            .entry(data_key.to_string())
            .or_default()
            .entry(report_step)
            .or_default()
            .insert(realization, to_stored(values));
        self
    }

    pub fn with_summary_data(mut self, response_key: &str, realization: usize, series: Vec<f64>) -> Self {
        self.summary_data
            .entry(response_key.to_string())
            .or_default()
            .insert(realization, to_stored(series));
        self
    }

    pub fn with_summary_observation(mut self, response_key: &str, time_index: usize, point: ObservedPoint) -> Self {
        self.summary_observations
            .entry(response_key.to_string())
            .or_default()
            .insert(time_index, point);
        self
    }

    pub fn with_block_data(
        mut self,
        observation_key: &str,
        report_step: usize,
        realization: usize,
        values: Vec<f64>,
    ) -> Self {
        self.block_data
            .entry(observation_key.to_string())
            .or_default()
            .entry(report_step)
            .or_default()
            .insert(realization, to_stored(values));
        self
    }

    fn check_case(&self, case_name: &str) -> SourceResult<()> {
        if case_name != self.case_name {
            return Err(SourceError::UnknownCase(case_name.to_string()));
        }
        Ok(())
    }
}

fn to_stored(values: Vec<f64>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect()
}

fn from_stored(stored: &StoredValues) -> RealizationValues {
    stored
        .iter()
        .map(|(nr, values)| (*nr, values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
        .collect()
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

impl ObservationCatalog for FixtureStore {
    fn observation(&self, key: &str) -> SourceResult<&ObservationVector> {
        self.observations
            .get(key)
            .ok_or_else(|| SourceError::UnknownObservation(key.to_string()))
    }
}

impl GenDataCollector for FixtureStore {
    fn load_gen_data(&self, case_name: &str, data_key: &str, report_step: usize) -> SourceResult<RealizationValues> {
        self.check_case(case_name)?;
        let steps = self.gen_data.get(data_key).ok_or_else(|| SourceError::UnknownResponse {
            case: case_name.to_string(),
            key: data_key.to_string(),
        })?;
        let stored = steps.get(&report_step).ok_or_else(|| SourceError::MissingStep {
            key: data_key.to_string(),
            step: report_step,
        })?;
        Ok(from_stored(stored))
    }
}

impl SummaryCollector for FixtureStore {
    fn load_summary_data(&self, case_name: &str, response_key: &str) -> SourceResult<RealizationValues> {
        self.check_case(case_name)?;
        self.summary_data
            .get(response_key)
            .map(from_stored)
            .ok_or_else(|| SourceError::UnknownResponse {
                case: case_name.to_string(),
                key: response_key.to_string(),
            })
    }
}

impl SummaryObservationCollector for FixtureStore {
    fn load_summary_observations(
        &self,
        case_name: &str,
        response_key: &str,
    ) -> SourceResult<BTreeMap<usize, ObservedPoint>> {
        self.check_case(case_name)?;
        self.summary_observations
            .get(response_key)
            .cloned()
            .ok_or_else(|| SourceError::UnknownResponse {
                case: case_name.to_string(),
                key: response_key.to_string(),
            })
    }
}

impl BlockDataLoader for FixtureStore {
    fn load_block_data(
        &self,
        case_name: &str,
        observation_key: &str,
        observation: &ObservationVector,
        report_step: usize,
    ) -> SourceResult<RealizationValues> {
        self.check_case(case_name)?;
        let block = ObservationType::Block.name();
        if observation.implementation_type != block {
            return Err(SourceError::TypeMismatch {
                key: observation_key.to_string(),
                expected: block.to_string(),
                found: observation.implementation_type.clone(),
            });
        }
        let steps = self
            .block_data
            .get(observation_key)
            .ok_or_else(|| SourceError::UnknownResponse {
                case: case_name.to_string(),
                key: observation_key.to_string(),
            })?;
        let stored = steps.get(&report_step).ok_or_else(|| SourceError::MissingStep {
            key: observation_key.to_string(),
            step: report_step,
        })?;
        Ok(from_stored(stored))
    }
}

impl EnsembleContext for FixtureStore {
    fn ensemble_size(&self) -> usize {
        self.ensemble_size
    }

    fn case_name(&self) -> &str {
        &self.case_name
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Load a fixture store from a file.  Dispatch by extension; only `.json` is
/// understood.
pub fn load_file(path: &Path) -> anyhow::Result<FixtureStore> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json(path),
        other => bail!("Unsupported store file extension: .{other}"),
    }
}

fn load_json(path: &Path) -> anyhow::Result<FixtureStore> {
    let text = std::fs::read_to_string(path).context("reading JSON store")?;
    let store: FixtureStore = serde_json::from_str(&text).context("parsing JSON store")?;
    for (key, observation) in &store.observations {
        if let Err(e) = observation.observation_type() {
            log::warn!("{key}: {e}");
        }
    }
    log::info!(
        "Loaded case '{}' with {} realizations and {} observations",
        store.case_name,
        store.ensemble_size,
        store.observations.len()
    );
    Ok(store)
}

/// Write the store as pretty-printed JSON.
pub fn save_json(store: &FixtureStore, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, store).context("writing JSON store")?;
    Ok(())
}
