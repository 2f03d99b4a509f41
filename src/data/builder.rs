use log::{debug, info};
use ndarray::{concatenate, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::filter;
use super::loader::load_observation;
use super::model::{MeasuredMatrix, RowLabel};
use super::select::filter_on_column_index;
use super::source::EnsembleContext;
use crate::error::Result;

/// One observation key to load, optionally restricted to some of its
/// data-point positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub key: String,
    #[serde(default)]
    pub index_list: Option<Vec<usize>>,
}

impl ObservationRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            index_list: None,
        }
    }

    pub fn with_index_list(mut self, index_list: Vec<usize>) -> Self {
        self.index_list = Some(index_list);
        self
    }
}

// ---------------------------------------------------------------------------
// Column-block assembly
// ---------------------------------------------------------------------------

/// Collects per-key sub-tables and concatenates them once, in push order.
#[derive(Debug)]
struct MatrixAssembler {
    rows: Vec<RowLabel>,
    blocks: Vec<MeasuredMatrix>,
}

impl MatrixAssembler {
    fn new(ensemble_size: usize) -> Self {
        Self {
            rows: RowLabel::canonical(ensemble_size),
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, block: MeasuredMatrix) {
        assert_eq!(block.rows(), self.rows.as_slice(), "sub-table row index mismatch");
        self.blocks.push(block);
    }

    fn finish(self) -> MeasuredMatrix {
        if self.blocks.is_empty() {
            return MeasuredMatrix::empty(self.rows);
        }
        let columns = self
            .blocks
            .iter()
            .flat_map(|b| b.columns().iter().cloned())
            .collect();
        let views: Vec<ArrayView2<'_, f64>> = self.blocks.iter().map(|b| b.values()).collect();
        let values = concatenate(Axis(1), &views).expect("blocks share the row count");
        MeasuredMatrix::new(self.rows, columns, values)
    }
}

// ---------------------------------------------------------------------------
// MeasuredData
// ---------------------------------------------------------------------------

/// Observed and simulated data for a set of observation keys, ready to be
/// cleaned up for history matching.
#[derive(Debug, Clone)]
pub struct MeasuredData {
    data: MeasuredMatrix,
}

impl MeasuredData {
    /// Load `keys` in order. `index_lists`, when given, restricts the key at
    /// the same position; a shorter list leaves the remaining keys unrestricted.
    pub fn new<C, S>(ctx: &C, keys: &[S], index_lists: Option<&[Option<Vec<usize>>]>) -> Result<Self>
    where
        C: EnsembleContext + ?Sized,
        S: AsRef<str>,
    {
        let requests: Vec<ObservationRequest> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| ObservationRequest {
                key: key.as_ref().to_string(),
                index_list: index_lists.and_then(|lists| lists.get(i).cloned().flatten()),
            })
            .collect();
        Self::from_requests(ctx, &requests)
    }

    pub fn from_requests<C>(ctx: &C, requests: &[ObservationRequest]) -> Result<Self>
    where
        C: EnsembleContext + ?Sized,
    {
        let mut assembler = MatrixAssembler::new(ctx.ensemble_size());
        for request in requests {
            let key = request.key.as_str();
            let observation_type = ctx.observation(key)?.observation_type()?;
            debug!("{key}: loading {observation_type}");
            let sub_table = load_observation(ctx, observation_type, key)?;
            let sub_table = filter_on_column_index(sub_table, key, request.index_list.as_deref())?;
            assembler.push(sub_table);
        }
        let data = assembler.finish();
        info!(
            "Measured data for case '{}': {} data points over {} keys, {} realizations",
            ctx.case_name(),
            data.n_columns(),
            requests.len(),
            ctx.ensemble_size()
        );
        Ok(Self { data })
    }

    pub fn from_matrix(data: MeasuredMatrix) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &MeasuredMatrix {
        &self.data
    }

    pub fn into_matrix(self) -> MeasuredMatrix {
        self.data
    }

    /// The `OBS` and `STD` rows.
    pub fn observations(&self) -> MeasuredMatrix {
        let positions: Vec<usize> = [RowLabel::Obs, RowLabel::Std]
            .into_iter()
            .filter_map(|label| self.data.row_position(label))
            .collect();
        self.data.select_rows(&positions)
    }

    /// The realization rows.
    pub fn simulated(&self) -> MeasuredMatrix {
        self.data.select_rows(&self.data.realization_positions())
    }

    pub fn realizations(&self) -> Vec<usize> {
        self.data.realizations()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.data.keys()
    }

    /// [`remove_nan`](Self::remove_nan) followed by
    /// [`filter_out_outliers`](Self::filter_out_outliers).
    pub fn remove_nan_and_filter<S: AsRef<str>>(&mut self, keys: &[S], std_cutoff: f64, alpha: f64) -> Result<()> {
        self.remove_nan()?;
        self.filter_out_outliers(keys, std_cutoff, alpha);
        Ok(())
    }

    /// Drop failed realizations, then incomplete data points. On error the
    /// data is left as it was.
    pub fn remove_nan(&mut self) -> Result<()> {
        self.data = filter::remove_nan(&self.data)?;
        Ok(())
    }

    pub fn filter_out_outliers<S: AsRef<str>>(&mut self, keys: &[S], std_cutoff: f64, alpha: f64) {
        self.data = filter::filter_out_outliers(&self.data, keys, std_cutoff, alpha);
    }

    /// Only the spread half of the outlier filter.
    pub fn filter_ensemble_std<S: AsRef<str>>(&mut self, keys: &[S], std_cutoff: f64) {
        let mask = filter::ensemble_std_mask(&self.data, keys, std_cutoff);
        self.data = filter::apply_mask(&self.data, &mask);
    }

    /// Only the mismatch half of the outlier filter.
    pub fn filter_ensemble_mean_obs<S: AsRef<str>>(&mut self, keys: &[S], alpha: f64) {
        let mask = filter::ensemble_mean_obs_mask(&self.data, keys, alpha);
        self.data = filter::apply_mask(&self.data, &mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnKey;
    use crate::data::observation::{ObservationNode, ObservationType, ObservationVector};
    use crate::data::source::SourceError;
    use crate::data::store::FixtureStore;
    use crate::error::MeasuredDataError;

    fn store() -> FixtureStore {
        FixtureStore::new("default", 2)
            .with_observation(
                "GEN",
                ObservationVector::new(ObservationType::General, "GD")
                    .with_node(0, ObservationNode::new(vec![1.0, 2.0, 3.0], vec![0.1, 0.1, 0.1])),
            )
            .with_gen_data("GD", 0, 0, vec![1.1, 2.1, 3.1])
            .with_gen_data("GD", 0, 1, vec![0.9, 1.9, 2.9])
            .with_observation(
                "BLOCK",
                ObservationVector::new(ObservationType::Block, "")
                    .with_node(3, ObservationNode::new(vec![5.0], vec![0.5])),
            )
            .with_block_data("BLOCK", 3, 0, vec![5.5])
            .with_block_data("BLOCK", 3, 1, vec![4.5])
    }

    #[test]
    fn keys_are_concatenated_in_request_order() {
        let md = MeasuredData::new(&store(), &["BLOCK", "GEN"], None).unwrap();
        let m = md.data();
        assert_eq!(m.rows(), RowLabel::canonical(2).as_slice());
        assert_eq!(m.keys(), vec!["BLOCK", "GEN"]);
        assert_eq!(m.columns()[0], ColumnKey::new("BLOCK", 0));
        assert_eq!(m.get(RowLabel::Realization(1), 0), Some(4.5));
        assert_eq!(m.get(RowLabel::Obs, 3), Some(3.0));
    }

    #[test]
    fn index_lists_apply_per_key() {
        let lists = [None, Some(vec![2, 0])];
        let md = MeasuredData::new(&store(), &["BLOCK", "GEN"], Some(&lists[..])).unwrap();
        assert_eq!(
            md.data().columns(),
            &[ColumnKey::new("BLOCK", 0), ColumnKey::new("GEN", 2), ColumnKey::new("GEN", 0)]
        );
    }

    #[test]
    fn duplicate_keys_are_kept_side_by_side() {
        let md = MeasuredData::new(&store(), &["BLOCK", "BLOCK"], None).unwrap();
        assert_eq!(md.data().column_positions("BLOCK"), vec![0, 1]);
    }

    #[test]
    fn out_of_range_index_list_aborts_build() {
        let lists = [Some(vec![3])];
        let err = MeasuredData::new(&store(), &["GEN"], Some(&lists[..])).unwrap_err();
        assert!(matches!(
            err,
            MeasuredDataError::ColumnIndexOutOfRange { index: 3, available: 3, .. }
        ));
    }

    #[test]
    fn unsupported_type_names_the_type() {
        let mut obs = ObservationVector::new(ObservationType::General, "GD");
        obs.implementation_type = "CUSTOM_OBS".to_string();
        let store = store().with_observation("ODD", obs);
        let err = MeasuredData::new(&store, &["GEN", "ODD"], None).unwrap_err();
        assert_eq!(err.to_string(), "Unknown observation type: CUSTOM_OBS");
    }

    #[test]
    fn unknown_key_propagates_source_error() {
        let err = MeasuredData::new(&store(), &["NOPE"], None).unwrap_err();
        assert!(matches!(
            err,
            MeasuredDataError::Source(SourceError::UnknownObservation(ref k)) if k == "NOPE"
        ));
    }

    #[test]
    fn no_keys_gives_empty_matrix_with_full_row_index() {
        let keys: [&str; 0] = [];
        let md = MeasuredData::new(&store(), &keys, None).unwrap();
        assert!(md.data().is_empty());
        assert_eq!(md.data().n_rows(), 4);
    }

    #[test]
    fn accessors_split_observed_and_simulated_rows() {
        let md = MeasuredData::new(&store(), &["GEN"], None).unwrap();
        assert_eq!(md.observations().rows(), &[RowLabel::Obs, RowLabel::Std]);
        assert_eq!(md.simulated().n_rows(), 2);
        assert_eq!(md.realizations(), vec![0, 1]);
        assert_eq!(md.keys(), vec!["GEN"]);
    }
}
