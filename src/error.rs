use thiserror::Error;

use crate::data::model::RowLabel;
use crate::data::source::SourceError;

/// Everything that can abort building or filtering a measured matrix.
///
/// Nothing here is retried or recovered internally: a failure always aborts
/// the whole operation so that no observation key or column is silently lost.
#[derive(Debug, Error)]
pub enum MeasuredDataError {
    #[error("Unknown observation type: {type_name}")]
    UnsupportedObservationType { type_name: String },

    #[error(
        "Index list is larger than observation data for '{key}', please check input, \
         max index list: {index} number of data points: {available}"
    )]
    ColumnIndexOutOfRange {
        key: String,
        index: usize,
        available: usize,
    },

    #[error("Empty dataset, all data has been filtered out")]
    EmptyDataset,

    #[error("Observation '{key}' produced row '{label}' more than once")]
    DuplicateRow { key: String, label: RowLabel },

    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type Result<T> = std::result::Result<T, MeasuredDataError>;
