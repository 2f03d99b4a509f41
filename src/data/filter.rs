use log::{debug, info, warn};
use ndarray::{Array1, Axis};

use super::model::{MeasuredMatrix, RowLabel};
use crate::error::{MeasuredDataError, Result};

// ---------------------------------------------------------------------------
// Column mask: which data points are discarded
// ---------------------------------------------------------------------------

/// One entry per matrix column; `true` marks the column for removal.
pub type ColumnFilterMask = Vec<bool>;

/// OR every mask together. Masks must all span `n_columns` columns.
pub fn combine_filters(filters: &[ColumnFilterMask], n_columns: usize) -> ColumnFilterMask {
    let mut combined = vec![false; n_columns];
    for filter in filters {
        assert_eq!(filter.len(), n_columns, "filter mask length mismatch");
        for (acc, discard) in combined.iter_mut().zip(filter) {
            *acc |= *discard;
        }
    }
    combined
}

// ---------------------------------------------------------------------------
// Completeness filter
// ---------------------------------------------------------------------------

/// Drop failed realizations, then every column that still has a missing cell.
///
/// * A realization row is dropped only when it is missing everywhere.
/// * A column is dropped when any remaining row (`OBS`/`STD` included) is
///   missing in it.
///
/// Fails with [`MeasuredDataError::EmptyDataset`] when no column survives.
pub fn remove_nan(matrix: &MeasuredMatrix) -> Result<MeasuredMatrix> {
    let failed: Vec<bool> = matrix
        .rows()
        .iter()
        .zip(matrix.values().rows())
        .map(|(label, row)| label.is_realization() && row.iter().all(|v| v.is_nan()))
        .collect();
    let n_failed = failed.iter().filter(|f| **f).count();
    if n_failed > 0 {
        warn!("Dropping {n_failed} realizations without any data");
    }
    let pruned = matrix.drop_rows(&failed);

    let incomplete: ColumnFilterMask = pruned
        .values()
        .columns()
        .into_iter()
        .map(|col| col.iter().any(|v| v.is_nan()))
        .collect();
    let pruned = pruned.drop_columns(&incomplete);

    if pruned.is_empty() {
        return Err(MeasuredDataError::EmptyDataset);
    }
    info!(
        "Removed missing data: {} of {} data points and {} realizations remain",
        pruned.n_columns(),
        matrix.n_columns(),
        pruned.realizations().len()
    );
    Ok(pruned)
}

// ---------------------------------------------------------------------------
// Outlier filter
// ---------------------------------------------------------------------------

/// Ensemble and observation statistics for the columns of one key.
#[derive(Debug, Clone)]
pub struct KeyStatistics {
    /// Matrix column positions the statistics refer to.
    pub positions: Vec<usize>,
    pub ensemble_mean: Array1<f64>,
    /// Sample standard deviation (N − 1 divisor).
    pub ensemble_std: Array1<f64>,
    pub obs_value: Array1<f64>,
    pub obs_std: Array1<f64>,
}

impl KeyStatistics {
    pub fn compute(matrix: &MeasuredMatrix, key: &str) -> Self {
        let positions = matrix.column_positions(key);
        let n = positions.len();
        let ens = matrix
            .values()
            .select(Axis(0), &matrix.realization_positions())
            .select(Axis(1), &positions);

        let ensemble_mean = ens
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::from_elem(n, f64::NAN));
        // A single realization has no sample spread.
        let ensemble_std = if ens.nrows() > 1 {
            ens.std_axis(Axis(0), 1.0)
        } else {
            Array1::from_elem(n, f64::NAN)
        };

        let row_at = |label: RowLabel| -> Array1<f64> {
            positions
                .iter()
                .map(|&p| matrix.get(label, p).unwrap_or(f64::NAN))
                .collect()
        };

        Self {
            obs_value: row_at(RowLabel::Obs),
            obs_std: row_at(RowLabel::Std),
            positions,
            ensemble_mean,
            ensemble_std,
        }
    }

    /// Too little ensemble spread to carry information: `ensemble_std < std_cutoff`.
    pub fn spread_filter(&self, std_cutoff: f64) -> Vec<bool> {
        self.ensemble_std.iter().map(|&s| s < std_cutoff).collect()
    }

    /// Observation inconsistent with the ensemble:
    /// `|obs - mean| > alpha * (ensemble_std + obs_std)`.
    pub fn mismatch_filter(&self, alpha: f64) -> Vec<bool> {
        self.obs_value
            .iter()
            .zip(&self.ensemble_mean)
            .zip(self.ensemble_std.iter().zip(&self.obs_std))
            .map(|((obs, mean), (ens_std, obs_std))| (obs - mean).abs() > alpha * (ens_std + obs_std))
            .collect()
    }

    /// Spread a per-key filter onto a full-width mask.
    fn scatter(&self, filter: &[bool], n_columns: usize) -> ColumnFilterMask {
        let mut mask = vec![false; n_columns];
        for (&pos, &discard) in self.positions.iter().zip(filter) {
            mask[pos] = discard;
        }
        mask
    }
}

/// Build one mask from per-key filters computed by `per_key`.
fn key_filters<S, F>(matrix: &MeasuredMatrix, keys: &[S], per_key: F) -> ColumnFilterMask
where
    S: AsRef<str>,
    F: Fn(&KeyStatistics) -> Vec<Vec<bool>>,
{
    let n_columns = matrix.n_columns();
    let mut filters = Vec::new();
    for key in keys {
        let key = key.as_ref();
        let stats = KeyStatistics::compute(matrix, key);
        if stats.positions.is_empty() {
            debug!("{key}: no columns to evaluate");
            continue;
        }
        for filter in per_key(&stats) {
            filters.push(stats.scatter(&filter, n_columns));
        }
    }
    combine_filters(&filters, n_columns)
}

/// Mask of columns whose ensemble spread is below `std_cutoff`.
pub fn ensemble_std_mask<S: AsRef<str>>(matrix: &MeasuredMatrix, keys: &[S], std_cutoff: f64) -> ColumnFilterMask {
    key_filters(matrix, keys, |stats| vec![stats.spread_filter(std_cutoff)])
}

/// Mask of columns whose observation lies too far from the ensemble mean.
pub fn ensemble_mean_obs_mask<S: AsRef<str>>(matrix: &MeasuredMatrix, keys: &[S], alpha: f64) -> ColumnFilterMask {
    key_filters(matrix, keys, |stats| vec![stats.mismatch_filter(alpha)])
}

/// Mask of columns failing either the spread or the mismatch test.
pub fn outlier_mask<S: AsRef<str>>(
    matrix: &MeasuredMatrix,
    keys: &[S],
    std_cutoff: f64,
    alpha: f64,
) -> ColumnFilterMask {
    key_filters(matrix, keys, |stats| {
        vec![stats.spread_filter(std_cutoff), stats.mismatch_filter(alpha)]
    })
}

/// Drop masked columns, logging how many went.
pub fn apply_mask(matrix: &MeasuredMatrix, mask: &[bool]) -> MeasuredMatrix {
    let n_dropped = mask.iter().filter(|m| **m).count();
    info!(
        "Filtered out {n_dropped} of {} data points",
        matrix.n_columns()
    );
    matrix.drop_columns(mask)
}

/// Remove columns of `keys` that are uninformative or outliers. Columns of
/// other keys are never touched. Expects a matrix without missing values.
pub fn filter_out_outliers<S: AsRef<str>>(
    matrix: &MeasuredMatrix,
    keys: &[S],
    std_cutoff: f64,
    alpha: f64,
) -> MeasuredMatrix {
    apply_mask(matrix, &outlier_mask(matrix, keys, std_cutoff, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnKey;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    const NAN: f64 = f64::NAN;

    fn matrix(columns: &[(&str, usize)], values: Array2<f64>) -> MeasuredMatrix {
        let n_real = values.nrows() - 2;
        MeasuredMatrix::new(
            RowLabel::canonical(n_real),
            columns.iter().map(|(k, i)| ColumnKey::new(*k, *i)).collect(),
            values,
        )
    }

    #[test]
    fn realization_pass_runs_before_column_pass() {
        // Realization 1 failed everywhere; without it every column is complete.
        let m = matrix(
            &[("A", 0), ("A", 1)],
            array![[1.0, 2.0], [0.1, 0.1], [1.0, 2.0], [NAN, NAN], [1.5, 2.5]],
        );
        let pruned = remove_nan(&m).unwrap();
        assert_eq!(pruned.n_columns(), 2);
        assert_eq!(pruned.realizations(), vec![0, 2]);
        assert!(!pruned.has_missing());
    }

    #[test]
    fn single_missing_cell_drops_column() {
        let m = matrix(
            &[("A", 0), ("A", 1), ("B", 0)],
            array![[1.0, 2.0, NAN], [0.1, 0.1, 0.1], [1.0, NAN, 3.0], [1.2, 2.2, 3.2]],
        );
        let pruned = remove_nan(&m).unwrap();
        assert_eq!(pruned.columns(), &[ColumnKey::new("A", 0)]);
        assert_eq!(pruned.realizations(), vec![0, 1]);
    }

    #[test]
    fn complete_matrix_is_untouched_and_filter_is_idempotent() {
        let m = matrix(&[("A", 0)], array![[1.0], [0.1], [1.0], [2.0]]);
        let once = remove_nan(&m).unwrap();
        assert_eq!(once, m);

        let dirty = matrix(
            &[("A", 0), ("A", 1)],
            array![[1.0, NAN], [0.1, 0.1], [NAN, NAN], [2.0, 3.0]],
        );
        let once = remove_nan(&dirty).unwrap();
        assert_eq!(remove_nan(&once).unwrap(), once);
    }

    #[test]
    fn all_columns_missing_is_empty_dataset() {
        let m = matrix(&[("A", 0)], array![[NAN], [0.1], [1.0], [2.0]]);
        assert!(matches!(remove_nan(&m), Err(MeasuredDataError::EmptyDataset)));
    }

    #[test]
    fn statistics_use_sample_std_over_realizations() {
        let m = matrix(&[("A", 0)], array![[2.4], [0.1], [1.0], [2.0], [3.0], [4.0]]);
        let stats = KeyStatistics::compute(&m, "A");
        assert_abs_diff_eq!(stats.ensemble_mean[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.ensemble_std[0], 1.2909944487358056, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.obs_value[0], 2.4);
        assert_abs_diff_eq!(stats.obs_std[0], 0.1);
    }

    #[test]
    fn flat_ensemble_is_discarded_whatever_the_observation() {
        let m = matrix(
            &[("A", 0), ("A", 1)],
            array![[1.0, 100.0], [0.1, 5.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]],
        );
        let stats = KeyStatistics::compute(&m, "A");
        assert_eq!(stats.spread_filter(0.1), vec![true, true]);
        let filtered = filter_out_outliers(&m, &["A"], 0.1, 3.0);
        assert!(filtered.is_empty());
    }

    #[test]
    fn consistent_observation_is_retained() {
        let m = matrix(&[("A", 0)], array![[2.4], [0.1], [1.0], [2.0], [3.0], [4.0]]);
        let stats = KeyStatistics::compute(&m, "A");
        assert_eq!(stats.spread_filter(0.1), vec![false]);
        assert_eq!(stats.mismatch_filter(3.0), vec![false]);
        assert_eq!(filter_out_outliers(&m, &["A"], 0.1, 3.0), m);
    }

    #[test]
    fn spread_equal_to_cutoff_is_kept() {
        // Sample std of [0, 2] is sqrt(2).
        let m = matrix(&[("A", 0)], array![[1.0], [1.0], [0.0], [2.0]]);
        let cutoff = 2.0_f64.sqrt();
        let stats = KeyStatistics::compute(&m, "A");
        assert_eq!(stats.ensemble_std[0], cutoff);
        assert_eq!(stats.spread_filter(cutoff), vec![false]);
    }

    #[test]
    fn distant_observation_is_an_outlier() {
        // mean 2.5, std ~1.29; |10 - 2.5| > 3 * (1.29 + 0.1)
        let m = matrix(&[("A", 0)], array![[10.0], [0.1], [1.0], [2.0], [3.0], [4.0]]);
        assert_eq!(outlier_mask(&m, &["A"], 0.1, 3.0), vec![true]);
        assert_eq!(ensemble_std_mask(&m, &["A"], 0.1), vec![false]);
        assert_eq!(ensemble_mean_obs_mask(&m, &["A"], 3.0), vec![true]);
    }

    #[test]
    fn only_requested_keys_are_evaluated() {
        let m = matrix(
            &[("A", 0), ("B", 0)],
            array![[1.0, 1.0], [0.1, 0.1], [1.0, 1.0], [1.0, 1.0]],
        );
        let filtered = filter_out_outliers(&m, &["B", "UNKNOWN"], 0.1, 3.0);
        assert_eq!(filtered.columns(), &[ColumnKey::new("A", 0)]);
    }

    #[test]
    fn single_realization_is_never_an_outlier() {
        let m = matrix(&[("A", 0)], array![[50.0], [0.1], [1.0]]);
        assert_eq!(outlier_mask(&m, &["A"], 0.1, 3.0), vec![false]);
    }

    #[test]
    fn combine_filters_is_elementwise_or() {
        let combined = combine_filters(&[vec![true, false, false], vec![false, false, true]], 3);
        assert_eq!(combined, vec![true, false, true]);
        assert_eq!(combine_filters(&[], 2), vec![false, false]);
    }
}
