use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

// ---------------------------------------------------------------------------
// RowLabel – one row of the measured matrix
// ---------------------------------------------------------------------------

/// Row index of a [`MeasuredMatrix`]: the observed value, the observed
/// uncertainty, or one ensemble member's simulated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowLabel {
    Obs,
    Std,
    Realization(usize),
}

impl RowLabel {
    pub fn is_realization(&self) -> bool {
        matches!(self, RowLabel::Realization(_))
    }

    /// The fixed row index of a freshly built matrix: `OBS`, `STD`, `0..N`.
    pub fn canonical(ensemble_size: usize) -> Vec<RowLabel> {
        let mut rows = Vec::with_capacity(ensemble_size + 2);
        rows.push(RowLabel::Obs);
        rows.push(RowLabel::Std);
        rows.extend((0..ensemble_size).map(RowLabel::Realization));
        rows
    }
}

impl fmt::Display for RowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowLabel::Obs => write!(f, "OBS"),
            RowLabel::Std => write!(f, "STD"),
            RowLabel::Realization(nr) => write!(f, "{nr}"),
        }
    }
}

impl FromStr for RowLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OBS" => Ok(RowLabel::Obs),
            "STD" => Ok(RowLabel::Std),
            other => other
                .parse()
                .map(RowLabel::Realization)
                .map_err(|_| format!("'{other}' is not a row label")),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnKey – (observation key, data-point index)
// ---------------------------------------------------------------------------

/// Two-level column key. `index` is the data-point position the loader gave
/// the column and survives column selection unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
    pub key: String,
    pub index: usize,
}

impl ColumnKey {
    pub fn new(key: impl Into<String>, index: usize) -> Self {
        Self {
            key: key.into(),
            index,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key, self.index)
    }
}

/// Parses `key/index`; the key itself may contain `/`.
impl FromStr for ColumnKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, index) = s
            .rsplit_once('/')
            .ok_or_else(|| format!("'{s}' is not of the form key/index"))?;
        let index = index
            .parse()
            .map_err(|_| format!("'{s}' has a non-numeric data-point index"))?;
        Ok(ColumnKey::new(key, index))
    }
}

// ---------------------------------------------------------------------------
// MeasuredMatrix – labelled dense grid
// ---------------------------------------------------------------------------

/// Observed values, observed uncertainties and every realization's simulated
/// value, one column per data point. Missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredMatrix {
    rows: Vec<RowLabel>,
    columns: Vec<ColumnKey>,
    values: Array2<f64>,
}

impl MeasuredMatrix {
    /// Panics if the grid shape disagrees with the label counts.
    pub fn new(rows: Vec<RowLabel>, columns: Vec<ColumnKey>, values: Array2<f64>) -> Self {
        assert_eq!(
            values.dim(),
            (rows.len(), columns.len()),
            "value grid shape does not match row/column labels"
        );
        Self {
            rows,
            columns,
            values,
        }
    }

    /// A matrix with the given row index and no columns.
    pub fn empty(rows: Vec<RowLabel>) -> Self {
        let n_rows = rows.len();
        Self::new(rows, Vec::new(), Array2::zeros((n_rows, 0)))
    }

    pub fn rows(&self) -> &[RowLabel] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the matrix has no data points left.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn row_position(&self, label: RowLabel) -> Option<usize> {
        self.rows.iter().position(|r| *r == label)
    }

    pub fn row(&self, label: RowLabel) -> Option<ArrayView1<'_, f64>> {
        self.row_position(label)
            .map(|pos| self.values.index_axis(Axis(0), pos))
    }

    pub fn get(&self, label: RowLabel, column: usize) -> Option<f64> {
        self.row(label).and_then(|row| row.get(column).copied())
    }

    /// Positions of the realization rows, in row order.
    pub fn realization_positions(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, label)| label.is_realization())
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Realization numbers still present, in row order.
    pub fn realizations(&self) -> Vec<usize> {
        self.rows
            .iter()
            .filter_map(|label| match label {
                RowLabel::Realization(nr) => Some(*nr),
                _ => None,
            })
            .collect()
    }

    /// Positions of every column filed under `key`.
    pub fn column_positions(&self, key: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, col)| col.key == key)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Observation keys in first-appearance order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for col in &self.columns {
            if !keys.contains(&col.key.as_str()) {
                keys.push(&col.key);
            }
        }
        keys
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    /// Rows at `positions`, in the given order.
    pub fn select_rows(&self, positions: &[usize]) -> Self {
        Self {
            rows: positions.iter().map(|&p| self.rows[p]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), positions),
        }
    }

    /// Columns at `positions`, in the given order. Column keys travel with
    /// their data, so the data-point index is preserved.
    pub fn select_columns(&self, positions: &[usize]) -> Self {
        Self {
            rows: self.rows.clone(),
            columns: positions.iter().map(|&p| self.columns[p].clone()).collect(),
            values: self.values.select(Axis(1), positions),
        }
    }

    /// Drop every row whose mask entry is `true`.
    pub fn drop_rows(&self, mask: &[bool]) -> Self {
        assert_eq!(mask.len(), self.n_rows(), "row mask length mismatch");
        let keep: Vec<usize> = unmasked_positions(mask);
        self.select_rows(&keep)
    }

    /// Drop every column whose mask entry is `true`.
    pub fn drop_columns(&self, mask: &[bool]) -> Self {
        assert_eq!(mask.len(), self.n_columns(), "column mask length mismatch");
        let keep: Vec<usize> = unmasked_positions(mask);
        self.select_columns(&keep)
    }
}

fn unmasked_positions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, m)| !**m)
        .map(|(pos, _)| pos)
        .collect()
}

impl fmt::Display for MeasuredMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for col in &self.columns {
            write!(f, " {:>12}", col.to_string())?;
        }
        writeln!(f)?;
        for (label, row) in self.rows.iter().zip(self.values.rows()) {
            write!(f, "{:>8}", label.to_string())?;
            for v in row {
                write!(f, " {v:>12.4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> MeasuredMatrix {
        MeasuredMatrix::new(
            RowLabel::canonical(2),
            vec![
                ColumnKey::new("FOPR", 0),
                ColumnKey::new("FOPR", 1),
                ColumnKey::new("WPR", 0),
            ],
            array![
                [1.0, 2.0, 3.0],
                [0.1, 0.2, 0.3],
                [1.1, 2.1, 3.1],
                [0.9, f64::NAN, 2.9]
            ],
        )
    }

    #[test]
    fn canonical_rows_are_obs_std_then_realizations() {
        assert_eq!(
            RowLabel::canonical(3),
            vec![
                RowLabel::Obs,
                RowLabel::Std,
                RowLabel::Realization(0),
                RowLabel::Realization(1),
                RowLabel::Realization(2),
            ]
        );
        assert_eq!(RowLabel::Obs.to_string(), "OBS");
        assert_eq!(RowLabel::Realization(7).to_string(), "7");
        assert_eq!("STD".parse::<RowLabel>(), Ok(RowLabel::Std));
        assert_eq!("12".parse::<RowLabel>(), Ok(RowLabel::Realization(12)));
        assert!("r1".parse::<RowLabel>().is_err());
    }

    #[test]
    fn column_key_parses_from_last_separator() {
        assert_eq!("WOPR/OP1/3".parse::<ColumnKey>(), Ok(ColumnKey::new("WOPR/OP1", 3)));
        assert!("FOPR".parse::<ColumnKey>().is_err());
        assert!("FOPR/x".parse::<ColumnKey>().is_err());
    }

    #[test]
    fn keys_and_positions_follow_column_order() {
        let m = sample();
        assert_eq!(m.keys(), vec!["FOPR", "WPR"]);
        assert_eq!(m.column_positions("FOPR"), vec![0, 1]);
        assert_eq!(m.column_positions("WPR"), vec![2]);
        assert!(m.column_positions("MISSING").is_empty());
        assert_eq!(m.realization_positions(), vec![2, 3]);
        assert_eq!(m.get(RowLabel::Std, 2), Some(0.3));
    }

    #[test]
    fn select_columns_keeps_data_point_index() {
        let m = sample().select_columns(&[2, 0]);
        assert_eq!(m.columns()[0], ColumnKey::new("WPR", 0));
        assert_eq!(m.columns()[1], ColumnKey::new("FOPR", 0));
        assert_eq!(m.get(RowLabel::Obs, 0), Some(3.0));
    }

    #[test]
    fn drop_masks_remove_marked_entries() {
        let m = sample();
        assert!(m.has_missing());
        let m = m.drop_columns(&[false, true, false]);
        assert!(!m.has_missing());
        assert_eq!(m.n_columns(), 2);
        let m = m.drop_rows(&[false, false, true, false]);
        assert_eq!(m.realizations(), vec![1]);
    }

    #[test]
    #[should_panic(expected = "shape")]
    fn new_rejects_mismatched_shape() {
        MeasuredMatrix::new(RowLabel::canonical(1), vec![], Array2::zeros((3, 1)));
    }
}
