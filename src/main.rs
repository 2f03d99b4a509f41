use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use measured_data::config::JobConfig;
use measured_data::data::{export, store};
use measured_data::MeasuredData;

#[derive(Parser)]
#[command(name = "measured-data")]
#[command(about = "Build and filter the observed vs. simulated data matrix of an ensemble")]
#[command(version = measured_data::VERSION)]
struct Cli {
    /// JSON job configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ensemble store (.json)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Comma-separated observation keys (replaces the configured list)
    #[arg(long, value_delimiter = ',')]
    keys: Vec<String>,

    /// Minimum ensemble standard deviation for a data point to be kept
    #[arg(long)]
    std_cutoff: Option<f64>,

    /// Tolerance factor for observation vs. ensemble mean mismatch
    #[arg(long)]
    alpha: Option<f64>,

    /// Keep failed realizations and incomplete data points
    #[arg(long)]
    keep_nan: bool,

    /// Skip the outlier filter
    #[arg(long)]
    no_outlier_filter: bool,

    /// Write the matrix to .csv or .parquet instead of printing it
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<JobConfig> {
        let mut cfg = match &self.config {
            Some(path) => JobConfig::from_file(path)?,
            None => JobConfig::default(),
        };
        if self.store.is_some() {
            cfg.store = self.store;
        }
        if !self.keys.is_empty() {
            cfg.set_keys(&self.keys[..]);
        }
        if let Some(std_cutoff) = self.std_cutoff {
            cfg.std_cutoff = std_cutoff;
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }
        if self.keep_nan {
            cfg.remove_nan = false;
        }
        if self.no_outlier_filter {
            cfg.filter_outliers = false;
        }
        if self.output.is_some() {
            cfg.output = self.output;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cfg = Cli::parse().into_config()?;
    let store_path = cfg.store.as_deref().context("No ensemble store given (--store)")?;
    let store = store::load_file(store_path).with_context(|| format!("loading {}", store_path.display()))?;

    let mut measured = MeasuredData::from_requests(&store, &cfg.observations)?;
    let keys = cfg.keys();
    match (cfg.remove_nan, cfg.filter_outliers) {
        (true, true) => measured.remove_nan_and_filter(&keys[..], cfg.std_cutoff, cfg.alpha)?,
        (true, false) => measured.remove_nan()?,
        (false, true) => measured.filter_out_outliers(&keys[..], cfg.std_cutoff, cfg.alpha),
        (false, false) => {}
    }

    let matrix = measured.data();
    match &cfg.output {
        Some(path) => {
            export::write_file(matrix, path).with_context(|| format!("writing {}", path.display()))?;
            log::info!(
                "Wrote {} data points x {} rows to {}",
                matrix.n_columns(),
                matrix.n_rows(),
                path.display()
            );
        }
        None => print!("{matrix}"),
    }
    Ok(())
}
