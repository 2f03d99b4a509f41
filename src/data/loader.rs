use std::collections::BTreeSet;

use log::{debug, warn};
use ndarray::Array2;

use super::model::{ColumnKey, MeasuredMatrix, RowLabel};
use super::observation::{ObservationType, ObservationVector};
use super::source::{EnsembleContext, SourceError};
use crate::error::{MeasuredDataError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the sub-table for one observation key.  Dispatch by declared type.
///
/// The result has the row index `OBS, STD, 0..N` and its columns are filed
/// under `key` with data-point indices `0..n` in loader order.
pub fn load_observation<C>(ctx: &C, observation_type: ObservationType, key: &str) -> Result<MeasuredMatrix>
where
    C: EnsembleContext + ?Sized,
{
    match observation_type {
        ObservationType::General => load_general_data(ctx, key),
        ObservationType::Summary => load_summary_data(ctx, key),
        ObservationType::Block => load_block_data(ctx, key),
    }
}

// ---------------------------------------------------------------------------
// Row stacking
// ---------------------------------------------------------------------------

/// Accumulates labelled rows of possibly different widths; short rows are
/// padded with `NaN`.
#[derive(Debug, Default)]
struct RowStack {
    rows: Vec<(RowLabel, Vec<f64>)>,
}

impl RowStack {
    fn push(&mut self, label: RowLabel, values: Vec<f64>) {
        self.rows.push((label, values));
    }

    /// Lay the stacked rows out on the canonical row index. Realizations the
    /// source returned nothing for become all-`NaN` rows.
    fn into_matrix(self, key: &str, ensemble_size: usize) -> Result<MeasuredMatrix> {
        let width = self.rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let labels = RowLabel::canonical(ensemble_size);
        let mut values = Array2::from_elem((labels.len(), width), f64::NAN);
        let mut seen = BTreeSet::new();

        for (label, row) in self.rows {
            let pos = match label {
                RowLabel::Obs => 0,
                RowLabel::Std => 1,
                RowLabel::Realization(nr) if nr < ensemble_size => nr + 2,
                RowLabel::Realization(nr) => {
                    warn!("{key}: ignoring realization {nr} outside ensemble of {ensemble_size}");
                    continue;
                }
            };
            if !seen.insert(label) {
                return Err(MeasuredDataError::DuplicateRow {
                    key: key.to_string(),
                    label,
                });
            }
            for (j, v) in row.into_iter().enumerate() {
                values[[pos, j]] = v;
            }
        }

        let columns = (0..width).map(|j| ColumnKey::new(key, j)).collect();
        Ok(MeasuredMatrix::new(labels, columns, values))
    }
}

fn expect_type(key: &str, obs: &ObservationVector, expected: ObservationType) -> Result<()> {
    if obs.implementation_type != expected.name() {
        return Err(SourceError::TypeMismatch {
            key: key.to_string(),
            expected: expected.name().to_string(),
            found: obs.implementation_type.clone(),
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// General data
// ---------------------------------------------------------------------------

/// `OBS`/`STD` from the observation node of every step, one row per
/// realization from the gen-data collector. Rows of successive steps are
/// stacked, not merged.
fn load_general_data<C>(ctx: &C, key: &str) -> Result<MeasuredMatrix>
where
    C: EnsembleContext + ?Sized,
{
    let obs = ctx.observation(key)?;
    expect_type(key, obs, ObservationType::General)?;

    let mut stack = RowStack::default();
    for (&step, node) in &obs.nodes {
        let data = ctx.load_gen_data(ctx.case_name(), &obs.data_key, step)?;
        debug!(
            "{key}: gen data '{}' step {step}: {} points, {} realizations",
            obs.data_key,
            node.values.len(),
            data.len()
        );
        stack.push(RowLabel::Obs, node.values.clone());
        stack.push(RowLabel::Std, node.stds.clone());
        for (nr, values) in data {
            stack.push(RowLabel::Realization(nr), values);
        }
    }
    stack.into_matrix(key, ctx.ensemble_size())
}

// ---------------------------------------------------------------------------
// Summary data
// ---------------------------------------------------------------------------

/// Observed series on top of the simulated series, one column per time
/// index. Time indices without an observation keep `NaN` in `OBS`/`STD`.
fn load_summary_data<C>(ctx: &C, key: &str) -> Result<MeasuredMatrix>
where
    C: EnsembleContext + ?Sized,
{
    let obs = ctx.observation(key)?;
    expect_type(key, obs, ObservationType::Summary)?;

    let response_key = obs.data_key.as_str();
    let observed = ctx.load_summary_observations(ctx.case_name(), response_key)?;
    let simulated = ctx.load_summary_data(ctx.case_name(), response_key)?;

    let series_len = simulated.values().map(Vec::len).max().unwrap_or(0);
    let time_indices: BTreeSet<usize> = observed.keys().copied().chain(0..series_len).collect();
    debug!(
        "{key}: summary '{response_key}': {} observed of {} time indices",
        observed.len(),
        time_indices.len()
    );

    let mut stack = RowStack::default();
    stack.push(
        RowLabel::Obs,
        time_indices
            .iter()
            .map(|t| observed.get(t).map_or(f64::NAN, |p| p.value))
            .collect(),
    );
    stack.push(
        RowLabel::Std,
        time_indices
            .iter()
            .map(|t| observed.get(t).map_or(f64::NAN, |p| p.std))
            .collect(),
    );
    for (nr, series) in simulated {
        stack.push(
            RowLabel::Realization(nr),
            time_indices
                .iter()
                .map(|&t| series.get(t).copied().unwrap_or(f64::NAN))
                .collect(),
        );
    }
    stack.into_matrix(key, ctx.ensemble_size())
}

// ---------------------------------------------------------------------------
// Block data
// ---------------------------------------------------------------------------

/// For every report step: observed value/uncertainty per spatial index, then
/// each realization's simulated block values.
fn load_block_data<C>(ctx: &C, key: &str) -> Result<MeasuredMatrix>
where
    C: EnsembleContext + ?Sized,
{
    let obs = ctx.observation(key)?;
    expect_type(key, obs, ObservationType::Block)?;

    let ensemble_size = ctx.ensemble_size();
    let mut stack = RowStack::default();
    for (&report_step, block) in &obs.nodes {
        let mut block_data = ctx.load_block_data(ctx.case_name(), key, obs, report_step)?;
        debug!(
            "{key}: block step {report_step}: {} cells, {} realizations",
            block.values.len(),
            block_data.len()
        );
        stack.push(RowLabel::Obs, block.values.clone());
        stack.push(RowLabel::Std, block.stds.clone());
        for nr in 0..ensemble_size {
            if let Some(values) = block_data.remove(&nr) {
                stack.push(RowLabel::Realization(nr), values);
            }
        }
    }
    stack.into_matrix(key, ensemble_size)
}
