use chrono::NaiveDate;
use polars::prelude::*;
use tracing::info;

use crate::{
    error::Result,
    helper::fno,
    liquidity::{self, GroupLiquidity},
};

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub total_records: usize,
    /// Null percentage per column, in frame order.
    pub missing_data: Vec<(String, f64)>,
    pub data_issues: Vec<String>,
    pub quality_score: f64,
}

#[derive(Debug, Clone)]
pub struct DataSummary {
    pub overview: Overview,
    pub options_distribution: OptionsDistribution,
    pub volume_analysis: VolumeAnalysis,
    pub price_analysis: PriceAnalysis,
}

#[derive(Debug, Clone)]
pub struct Overview {
    pub total_records: usize,
    pub unique_underlyings: usize,
    pub unique_expiries: usize,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct OptionsDistribution {
    pub call_options: usize,
    pub put_options: usize,
    pub call_put_ratio: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VolumeAnalysis {
    pub total_volume: f64,
    /// Sum of reported notional value; `None` when the input had none.
    pub total_turnover: Option<f64>,
    pub avg_volume_per_contract: Option<f64>,
    pub top_underlyings: Vec<GroupLiquidity>,
}

#[derive(Debug, Clone, Default)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PriceAnalysis {
    pub close: Range,
    pub strike: Range,
}

impl Range {
    fn of(values: &Series) -> Self {
        Self {
            min: values.min(),
            max: values.max(),
            mean: values.mean(),
            median: values.median(),
        }
    }
}

pub fn validate_data_quality(df: &DataFrame) -> Result<ValidationReport> {
    info!("Validating data quality");
    let height = df.height();

    let missing_data: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|s| {
            let pct = if height == 0 {
                0.0
            } else {
                s.null_count() as f64 / height as f64 * 100.0
            };
            (s.name().to_owned(), pct)
        })
        .collect();

    let mut issues = Vec::new();

    if let Ok(close) = df.column("close") {
        let negative = close.f64()?.lt(0.0).sum().unwrap_or(0);
        if negative > 0 {
            issues.push(format!("Found {negative} negative prices"));
        }
    }

    if let Ok(volume) = df.column("volume") {
        let zero = volume.f64()?.equal(0.0).sum().unwrap_or(0);
        if zero > 0 {
            issues.push(format!("Found {zero} zero volumes"));
        }
    }

    let duplicates = height - df.column("symbol")?.n_unique()?;
    if duplicates > 0 {
        issues.push(format!("Found {duplicates} duplicate symbols"));
    }

    let mean_missing = missing_data.iter().map(|(_, pct)| *pct).sum::<f64>()
        / missing_data.len().max(1) as f64;
    let missing_score = 1.0 - mean_missing / 100.0;
    let issue_score = 1.0 - issues.len() as f64 / 10.0;
    let quality_score = ((missing_score + issue_score) / 2.0).max(0.0);

    info!("Data quality score: {quality_score:.2}");
    Ok(ValidationReport {
        total_records: height,
        missing_data,
        data_issues: issues,
        quality_score,
    })
}

pub fn get_data_summary(df: &DataFrame, as_of: NaiveDate) -> Result<DataSummary> {
    info!("Generating data summary");

    let option_types = fno::labels(df, "option_type")?;
    let volume = df.column("volume")?;
    let notional = df.column("notional_value")?;

    let count_of = |code: &str| {
        option_types
            .iter()
            .filter(|t| t.as_deref() == Some(code))
            .count()
    };
    let call_options = count_of("CE");
    let put_options = count_of("PE");

    let turnover = liquidity::turnover(df)?;

    Ok(DataSummary {
        overview: Overview {
            total_records: df.height(),
            unique_underlyings: distinct(df, "underlying")?,
            unique_expiries: distinct(df, "expiry")?,
            as_of,
        },
        options_distribution: OptionsDistribution {
            call_options,
            put_options,
            call_put_ratio: (put_options > 0).then(|| call_options as f64 / put_options as f64),
        },
        volume_analysis: VolumeAnalysis {
            total_volume: volume.sum::<f64>().unwrap_or(0.0),
            total_turnover: (notional.null_count() < notional.len())
                .then(|| notional.sum::<f64>().unwrap_or(0.0)),
            avg_volume_per_contract: volume.mean(),
            top_underlyings: liquidity::rank_by(df, "underlying", &turnover.values, Some(5))?,
        },
        price_analysis: PriceAnalysis {
            close: Range::of(df.column("close")?),
            strike: Range {
                median: None,
                ..Range::of(df.column("strike")?)
            },
        },
    })
}

fn distinct(df: &DataFrame, name: &str) -> PolarsResult<usize> {
    df.column(name)?.drop_nulls().n_unique()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fixtures::load_sample;

    #[test]
    fn clean_sample_has_no_issues() {
        let df = load_sample();
        let report = validate_data_quality(&df).unwrap();

        assert_eq!(report.total_records, 4);
        assert!(report.data_issues.is_empty());
        assert!((0.0..=1.0).contains(&report.quality_score));
        assert_eq!(report.missing_data.len(), df.width());
    }

    #[test]
    fn issues_lower_the_score() {
        let df = df!(
            "symbol" => &["A", "A", "B"],
            "close" => &[-1.0, 2.0, 3.0],
            "volume" => &[0.0, 5.0, 5.0]
        )
        .unwrap();
        let report = validate_data_quality(&df).unwrap();

        assert_eq!(
            report.data_issues,
            vec![
                "Found 1 negative prices".to_owned(),
                "Found 1 zero volumes".to_owned(),
                "Found 1 duplicate symbols".to_owned(),
            ]
        );
        assert!((report.quality_score - 0.85).abs() < 1e-12);
    }

    #[test]
    fn calls_and_puts_cover_every_row() {
        let df = load_sample();
        let summary = get_data_summary(&df, NaiveDate::from_ymd_opt(2025, 8, 26).unwrap()).unwrap();
        let dist = &summary.options_distribution;

        assert_eq!(dist.call_options + dist.put_options, summary.overview.total_records);
        assert_eq!(dist.call_put_ratio, Some(1.0));
        assert_eq!(summary.overview.unique_underlyings, 3);
        assert_eq!(summary.overview.unique_expiries, 2);
    }

    #[test]
    fn summary_totals_volume_and_ranks_underlyings() {
        let df = load_sample();
        let summary = get_data_summary(&df, NaiveDate::from_ymd_opt(2025, 8, 26).unwrap()).unwrap();
        let volume = &summary.volume_analysis;

        assert_eq!(volume.total_volume, 108_200.0);
        assert_eq!(volume.total_turnover, Some(7_600.0));
        let names: Vec<&str> = volume.top_underlyings.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(names, vec!["NIFTY", "RELIANCE", "ABB"]);
        assert_eq!(summary.price_analysis.close.min, Some(11.5));
        assert_eq!(summary.price_analysis.strike.max, Some(24_500.0));
    }
}
