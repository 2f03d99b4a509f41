use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::builder::ObservationRequest;

fn default_std_cutoff() -> f64 {
    1e-6
}

fn default_alpha() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

/// One measured-data job: where the ensemble lives, which observations to
/// load and how hard to filter them.
///
/// ```json
/// {
///   "store": "ensemble.json",
///   "observations": [{ "key": "WOPR_OP1", "index_list": [0, 2] }, { "key": "FOPR" }],
///   "std_cutoff": 0.001,
///   "alpha": 3.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub store: Option<PathBuf>,
    #[serde(default)]
    pub observations: Vec<ObservationRequest>,
    #[serde(default = "default_std_cutoff")]
    pub std_cutoff: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_true")]
    pub remove_nan: bool,
    #[serde(default = "default_true")]
    pub filter_outliers: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            store: None,
            observations: Vec::new(),
            std_cutoff: default_std_cutoff(),
            alpha: default_alpha(),
            remove_nan: true,
            filter_outliers: true,
            output: None,
        }
    }
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).context("parsing config JSON")
    }

    /// Replace the observation list with unrestricted requests for `keys`.
    pub fn set_keys<S: AsRef<str>>(&mut self, keys: &[S]) {
        self.observations = keys.iter().map(|k| ObservationRequest::new(k.as_ref())).collect();
    }

    pub fn keys(&self) -> Vec<&str> {
        self.observations.iter().map(|r| r.key.as_str()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.observations.is_empty() {
            bail!("No observation keys given");
        }
        if !(self.std_cutoff >= 0.0) {
            bail!("std_cutoff must be non-negative, got {}", self.std_cutoff);
        }
        if !(self.alpha >= 0.0) {
            bail!("alpha must be non-negative, got {}", self.alpha);
        }
        if self.filter_outliers && !self.remove_nan {
            log::warn!("Outlier filter without missing-value removal expects complete data");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: JobConfig = serde_json::from_str(r#"{ "observations": [{ "key": "FOPR" }] }"#).unwrap();
        assert_eq!(cfg.std_cutoff, 1e-6);
        assert_eq!(cfg.alpha, 3.0);
        assert!(cfg.remove_nan && cfg.filter_outliers);
        assert_eq!(cfg.observations, vec![ObservationRequest::new("FOPR")]);
        cfg.validate().unwrap();
    }

    #[test]
    fn index_lists_are_read_per_key() {
        let cfg: JobConfig = serde_json::from_str(
            r#"{ "observations": [{ "key": "A", "index_list": [2, 0] }, { "key": "B" }] }"#,
        )
        .unwrap();
        assert_eq!(cfg.observations[0].index_list, Some(vec![2, 0]));
        assert_eq!(cfg.observations[1].index_list, None);
        assert_eq!(cfg.keys(), vec!["A", "B"]);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let mut cfg = JobConfig::default();
        assert!(cfg.validate().is_err());

        cfg.set_keys(&["A"]);
        cfg.alpha = -1.0;
        assert!(cfg.validate().is_err());

        cfg.alpha = 3.0;
        cfg.std_cutoff = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
