use super::model::MeasuredMatrix;
use crate::error::{MeasuredDataError, Result};

/// Restrict a sub-table to the columns at `index_list`, in that order.
///
/// `None` means no restriction and returns the sub-table as is; `Some(&[])`
/// selects nothing. Any position past the last column is an error for the
/// whole observation key.
pub fn filter_on_column_index(
    sub_table: MeasuredMatrix,
    key: &str,
    index_list: Option<&[usize]>,
) -> Result<MeasuredMatrix> {
    let Some(index_list) = index_list else {
        return Ok(sub_table);
    };
    let available = sub_table.n_columns();
    if let Some(&index) = index_list.iter().max().filter(|&&i| i >= available) {
        return Err(MeasuredDataError::ColumnIndexOutOfRange {
            key: key.to_string(),
            index,
            available,
        });
    }
    Ok(sub_table.select_columns(index_list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ColumnKey, RowLabel};
    use ndarray::array;

    fn three_columns() -> MeasuredMatrix {
        MeasuredMatrix::new(
            RowLabel::canonical(1),
            (0..3).map(|i| ColumnKey::new("KEY", i)).collect(),
            array![[1.0, 2.0, 3.0], [0.1, 0.2, 0.3], [1.5, 2.5, 3.5]],
        )
    }

    #[test]
    fn no_restriction_is_identity() {
        let m = three_columns();
        assert_eq!(filter_on_column_index(m.clone(), "KEY", None).unwrap(), m);
    }

    #[test]
    fn selects_by_position_in_given_order() {
        let m = three_columns();
        let picked = filter_on_column_index(m.clone(), "KEY", Some(&[0, 2][..])).unwrap();
        assert_eq!(picked, m.select_columns(&[0, 2]));
        assert_eq!(picked.columns()[1], ColumnKey::new("KEY", 2));

        let reversed = filter_on_column_index(m, "KEY", Some(&[2, 0][..])).unwrap();
        assert_eq!(reversed.get(RowLabel::Obs, 0), Some(3.0));
    }

    #[test]
    fn empty_restriction_selects_nothing() {
        let picked = filter_on_column_index(three_columns(), "KEY", Some(&[][..])).unwrap();
        assert!(picked.is_empty());
        assert_eq!(picked.n_rows(), 3);
    }

    #[test]
    fn position_past_last_column_fails() {
        let err = filter_on_column_index(three_columns(), "KEY", Some(&[0, 3][..])).unwrap_err();
        match err {
            MeasuredDataError::ColumnIndexOutOfRange {
                key,
                index,
                available,
            } => {
                assert_eq!(key, "KEY");
                assert_eq!(index, 3);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
