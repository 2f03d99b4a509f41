/// Data layer: measured matrix, observation loading, and filtering.
///
/// Architecture:
/// ```text
///  observation catalog + response collectors (EnsembleContext)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  GEN_OBS / SUMMARY_OBS / BLOCK_OBS → sub-table per key
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  select   │  optional index list per key
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  builder  │  sub-tables side by side → MeasuredMatrix
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  remove_nan, then outlier filter
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  .csv / .parquet
///   └──────────┘
/// ```

pub mod builder;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod observation;
pub mod select;
pub mod source;
pub mod store;
