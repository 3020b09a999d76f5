use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Result;

/// Settings for a single analysis run, read from a TOML file.
///
/// Every field has a default so a partial file (or none at all) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub analysis: AnalysisSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub options_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Seed for the scatter-plot sample.
    pub random_seed: u64,
    /// Reference date for days-to-expiry. Today when unset.
    pub as_of: Option<NaiveDate>,
    pub risk_free_rate: f32,
    pub liquidity: LiquiditySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiquiditySettings {
    /// Rows whose high-low spread exceeds this are dropped while loading.
    pub max_spread_bps: f64,
    pub top_underlyings: usize,
    pub top_expiries: usize,
    pub moneyness_bin: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub outputs_dir: PathBuf,
    pub figures_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            options_file: PathBuf::from("data/fo_bhavcopy.csv"),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            random_seed: 42,
            as_of: None,
            risk_free_rate: 0.0,
            liquidity: LiquiditySettings::default(),
        }
    }
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        Self {
            max_spread_bps: 10_000.0,
            top_underlyings: 20,
            top_expiries: 10,
            moneyness_bin: 0.05,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            outputs_dir: PathBuf::from("outputs"),
            figures_dir: PathBuf::from("figures"),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn as_of(&self) -> NaiveDate {
        self.analysis
            .as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let settings = Settings::parse(
            r#"
            [analysis]
            random_seed = 7

            [analysis.liquidity]
            max_spread_bps = 500.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.analysis.random_seed, 7);
        assert_eq!(settings.analysis.liquidity.max_spread_bps, 500.0);
        assert_eq!(settings.analysis.liquidity.top_underlyings, 20);
        assert_eq!(settings.output.outputs_dir, PathBuf::from("outputs"));
        assert!(settings.analysis.as_of.is_none());
    }

    #[test]
    fn as_of_is_read_as_a_date() {
        let settings = Settings::parse(
            r#"
            [data]
            options_file = "snap.csv"

            [analysis]
            as_of = "2025-08-26"
            "#,
        )
        .unwrap();

        assert_eq!(settings.data.options_file, PathBuf::from("snap.csv"));
        assert_eq!(
            settings.as_of(),
            NaiveDate::from_ymd_opt(2025, 8, 26).unwrap()
        );
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let err = Settings::parse("[analysis\nrandom_seed = ").unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
