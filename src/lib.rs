//! Pairs observed data points with every ensemble realization's simulated
//! value and filters out data points unfit for history matching.

pub mod config;
pub mod data;
pub mod error;

pub use data::builder::{MeasuredData, ObservationRequest};
pub use data::model::{ColumnKey, MeasuredMatrix, RowLabel};
pub use data::observation::{ObservationNode, ObservationType, ObservationVector};
pub use data::source::{EnsembleContext, ObservedPoint, SourceError};
pub use data::store::FixtureStore;
pub use error::{MeasuredDataError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
