//! Pipeline configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides. In tests, use PipelineConfig::default_test().

use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PORTFOLIO_FILE:  &str = "portfolio.json";
pub const PROFILE_FILE:    &str = "profile.json";
pub const TRANSCRIPT_FILE: &str = "transcript.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputPaths {
    pub portfolio:  String,
    pub profile:    String,
    pub transcript: String,
}

impl InputPaths {
    pub fn in_dir(data_dir: &str) -> Self {
        let dir = data_dir.trim_end_matches('/');
        Self {
            portfolio:  format!("{dir}/{PORTFOLIO_FILE}"),
            profile:    format!("{dir}/{PROFILE_FILE}"),
            transcript: format!("{dir}/{TRANSCRIPT_FILE}"),
        }
    }
}

impl Default for InputPaths {
    fn default() -> Self {
        Self::in_dir("./data")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinningConfig {
    /// Fixed, right-closed age bin edges.
    pub age_edges: Vec<f64>,
    /// Quantiles used for income and membership-duration bins.
    pub quantiles: Vec<f64>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            age_edges: vec![17.0, 40.0, 60.0, 80.0, 102.0],
            quantiles: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParamGrid {
    pub max_depth:         Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf:  Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            max_depth:         vec![1, 2, 4, 8],
            min_samples_split: vec![2, 6, 8, 15],
            min_samples_leaf:  vec![2, 4, 8],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainerConfig {
    /// Share of rows held out for the final evaluation.
    pub test_fraction: f64,
    pub cv_folds:      usize,
    pub grid:          ParamGrid,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            cv_folds:      5,
            grid:          ParamGrid::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub inputs:         InputPaths,
    /// Membership durations are measured up to this date.
    pub reference_date: NaiveDate,
    pub seed:           u64,
    pub binning:        BinningConfig,
    pub trainer:        TrainerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs:         InputPaths::default(),
            reference_date: default_reference_date(),
            seed:           0,
            binning:        BinningConfig::default(),
            trainer:        TrainerConfig::default(),
        }
    }
}

fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 12, 1).unwrap_or_default()
}

impl PipelineConfig {
    /// Load from a JSON config file. Fields not present keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with inputs read from `data_dir`.
    pub fn for_data_dir(data_dir: &str) -> Self {
        Self {
            inputs: InputPaths::in_dir(data_dir),
            ..Self::default()
        }
    }

    /// A small grid and fewer folds so tests stay fast.
    pub fn default_test() -> Self {
        Self {
            seed: 7,
            trainer: TrainerConfig {
                test_fraction: 0.25,
                cv_folds:      3,
                grid: ParamGrid {
                    max_depth:         vec![1, 2, 4],
                    min_samples_split: vec![2, 6],
                    min_samples_leaf:  vec![2],
                },
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let t = &self.trainer;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "trainer.test_fraction must be in (0, 1), got {}",
                t.test_fraction
            )));
        }
        if t.cv_folds < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "trainer.cv_folds must be at least 2, got {}",
                t.cv_folds
            )));
        }
        if t.grid.max_depth.is_empty()
            || t.grid.min_samples_split.is_empty()
            || t.grid.min_samples_leaf.is_empty()
        {
            return Err(PipelineError::InvalidConfig(
                "trainer.grid must list at least one value per parameter".into(),
            ));
        }
        if t.grid.min_samples_split.iter().any(|&s| s < 2) {
            return Err(PipelineError::InvalidConfig(
                "trainer.grid.min_samples_split values must be >= 2".into(),
            ));
        }
        if t.grid.min_samples_leaf.iter().any(|&l| l == 0) {
            return Err(PipelineError::InvalidConfig(
                "trainer.grid.min_samples_leaf values must be >= 1".into(),
            ));
        }

        let b = &self.binning;
        if b.age_edges.len() < 2 || b.age_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidConfig(
                "binning.age_edges must hold at least two strictly increasing edges".into(),
            ));
        }
        if b.quantiles.len() < 2
            || b.quantiles.windows(2).any(|w| w[0] >= w[1])
            || b.quantiles.iter().any(|q| !(0.0..=1.0).contains(q))
        {
            return Err(PipelineError::InvalidConfig(
                "binning.quantiles must be strictly increasing values in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
        PipelineConfig::default_test().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"seed": 9, "trainer": {"cv_folds": 4}}"#).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.trainer.cv_folds, 4);
        assert_eq!(config.trainer.test_fraction, 0.25);
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2021, 12, 1).unwrap());
        assert_eq!(config.binning, BinningConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut c = PipelineConfig::default();
        c.trainer.test_fraction = 1.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.trainer.cv_folds = 1;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.binning.age_edges = vec![17.0, 60.0, 40.0];
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.trainer.grid.min_samples_leaf = vec![];
        assert!(c.validate().is_err());
    }

    #[test]
    fn data_dir_inputs() {
        let inputs = PipelineConfig::for_data_dir("/tmp/data/").inputs;
        assert_eq!(inputs.portfolio, "/tmp/data/portfolio.json");
        assert_eq!(inputs.transcript, "/tmp/data/transcript.json");
    }
}
