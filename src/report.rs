use std::{fmt::Write as _, fs::File, path::Path};

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::info;

use crate::{
    error::Result,
    liquidity::LiquidityMetrics,
    quality::{DataSummary, ValidationReport},
};

pub const PROCESSED_FILE: &str = "processed_options_data.csv";
pub const SUMMARY_FILE: &str = "data_summary.csv";
pub const REPORT_FILE: &str = "analysis_report.md";

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_owned(), |v| format!("{v:.precision$}"))
}

pub fn save_processed_data(df: &mut DataFrame, dir: &Path) -> Result<()> {
    let path = dir.join(PROCESSED_FILE);
    info!(path = %path.display(), rows = df.height(), "Saving processed data");
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(df)?;
    Ok(())
}

pub fn save_data_summary(
    summary: &DataSummary,
    validation: &ValidationReport,
    dir: &Path,
) -> Result<()> {
    let rows: [(&str, f64); 7] = [
        ("total_records", summary.overview.total_records as f64),
        ("unique_underlyings", summary.overview.unique_underlyings as f64),
        ("unique_expiries", summary.overview.unique_expiries as f64),
        ("total_volume", summary.volume_analysis.total_volume),
        ("call_options", summary.options_distribution.call_options as f64),
        ("put_options", summary.options_distribution.put_options as f64),
        ("data_quality_score", validation.quality_score),
    ];
    let mut df = df!(
        "metric" => rows.iter().map(|(m, _)| *m).collect::<Vec<_>>(),
        "value" => rows.iter().map(|(_, v)| *v).collect::<Vec<_>>()
    )?;

    let mut file = File::create(dir.join(SUMMARY_FILE))?;
    CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
    Ok(())
}

pub fn render_report(
    summary: &DataSummary,
    validation: &ValidationReport,
    metrics: &LiquidityMetrics,
    generated_at: NaiveDateTime,
) -> Result<String> {
    let overview = &summary.overview;
    let dist = &summary.options_distribution;
    let volume = &summary.volume_analysis;
    let spread = &metrics.spread_metrics;

    let mut out = String::new();
    writeln!(out, "# NSE Options Market Analysis Report")?;
    writeln!(out, "*Generated on: {}*\n", generated_at.format("%Y-%m-%d %H:%M:%S"))?;

    writeln!(out, "## Executive Summary\n")?;
    writeln!(
        out,
        "Liquidity analysis of the NSE options market snapshot as of {}.\n",
        overview.as_of
    )?;

    writeln!(out, "## Data Overview\n")?;
    writeln!(out, "### Dataset Statistics")?;
    writeln!(out, "- **Total Records**: {}", overview.total_records)?;
    writeln!(out, "- **Unique Underlyings**: {}", overview.unique_underlyings)?;
    writeln!(out, "- **Unique Expiries**: {}", overview.unique_expiries)?;
    writeln!(out, "- **Data Quality Score**: {:.2}\n", validation.quality_score)?;

    writeln!(out, "### Options Distribution")?;
    writeln!(out, "- **Call Options**: {}", dist.call_options)?;
    writeln!(out, "- **Put Options**: {}", dist.put_options)?;
    writeln!(out, "- **Call-Put Ratio**: {}\n", fmt_opt(dist.call_put_ratio, 2))?;

    writeln!(out, "### Volume Analysis")?;
    writeln!(
        out,
        "- **Total Volume**: {:.1}M contracts",
        volume.total_volume / 1e6
    )?;
    writeln!(
        out,
        "- **Average Volume per Contract**: {}",
        fmt_opt(volume.avg_volume_per_contract, 0)
    )?;
    writeln!(
        out,
        "- **Reported Turnover**: {}\n",
        fmt_opt(volume.total_turnover, 2)
    )?;

    let close = &summary.price_analysis.close;
    let strike = &summary.price_analysis.strike;
    writeln!(out, "### Price Analysis")?;
    writeln!(
        out,
        "- **Close**: min {}, max {}, mean {}, median {}",
        fmt_opt(close.min, 2),
        fmt_opt(close.max, 2),
        fmt_opt(close.mean, 2),
        fmt_opt(close.median, 2)
    )?;
    writeln!(
        out,
        "- **Strike**: min {}, max {}, mean {}\n",
        fmt_opt(strike.min, 2),
        fmt_opt(strike.max, 2),
        fmt_opt(strike.mean, 2)
    )?;

    writeln!(out, "## Liquidity Analysis\n")?;
    writeln!(out, "### Spread Metrics")?;
    writeln!(out, "- **Median Spread**: {} bps", fmt_opt(spread.median_spread_bps, 1))?;
    writeln!(out, "- **Mean Spread**: {} bps", fmt_opt(spread.mean_spread_bps, 1))?;
    writeln!(
        out,
        "- **95th Percentile Spread**: {} bps",
        fmt_opt(spread.spread_95th_percentile, 1)
    )?;
    writeln!(
        out,
        "- **99th Percentile Spread**: {} bps\n",
        fmt_opt(spread.spread_99th_percentile, 1)
    )?;

    writeln!(out, "| Spread bucket | Contracts |")?;
    writeln!(out, "|---|---|")?;
    for bucket in &spread.spread_distribution {
        writeln!(out, "| {} | {} |", bucket.label, bucket.count)?;
    }

    let depth = &metrics.depth_metrics;
    writeln!(out, "\n### Depth Metrics (volume proxy)")?;
    writeln!(out, "- **Median Depth**: {}", fmt_opt(depth.median_depth, 0))?;
    writeln!(out, "- **Mean Depth**: {}\n", fmt_opt(depth.mean_depth, 0))?;
    writeln!(out, "| Depth bucket | Contracts |")?;
    writeln!(out, "|---|---|")?;
    for bucket in &depth.depth_distribution {
        writeln!(out, "| {} | {} |", bucket.label, bucket.count)?;
    }
    writeln!(out)?;

    writeln!(out, "### Top Underlyings by Volume")?;
    for (i, group) in metrics.liquidity_rankings.top_underlyings.iter().take(10).enumerate() {
        writeln!(
            out,
            "- **{}. {}**: {:.1}M contracts",
            i + 1,
            group.key,
            group.volume / 1e6
        )?;
    }

    writeln!(out, "\n## Data Quality Assessment\n")?;
    writeln!(out, "### Validation Results")?;
    writeln!(out, "- **Quality Score**: {:.2}", validation.quality_score)?;
    writeln!(out, "- **Total Records**: {}", validation.total_records)?;
    writeln!(out, "- **Data Issues**: {}\n", validation.data_issues.len())?;

    writeln!(out, "### Missing Data Analysis")?;
    for (column, pct) in validation.missing_data.iter().filter(|(_, pct)| *pct > 0.0) {
        writeln!(out, "- **{column}**: {pct:.1}% missing")?;
    }

    if !validation.data_issues.is_empty() {
        writeln!(out, "\n### Data Issues Found")?;
        for issue in &validation.data_issues {
            writeln!(out, "- {issue}")?;
        }
    }

    out.push_str(
        "
## Recommendations

### For Market Participants
1. **Focus on Liquid Instruments**: Prioritize options with high volume and tight spreads
2. **Monitor Spread Dynamics**: Track spread changes across different expiries and moneyness levels
3. **Risk Management**: Use proper position sizing based on liquidity metrics

### For Further Analysis
1. **Microstructure Analysis**: Investigate intraday patterns and order flow
2. **Volatility Surface**: Build implied volatility surfaces for pricing models
3. **Event Studies**: Analyze market behavior around expiry and regulatory events
",
    );

    writeln!(out, "\n## Technical Notes\n")?;
    writeln!(out, "- **Analysis Date**: {}", generated_at.format("%Y-%m-%d"))?;
    writeln!(out, "- **Data Source**: NSE Options Market Data")?;
    writeln!(out, "- **Processing**: Automated pipeline with quality validation")?;
    writeln!(
        out,
        "- **Spread Proxy**: (high - low) / close in basis points; no bid/ask data is available"
    )?;
    Ok(out)
}

pub fn write_report(report: &str, dir: &Path) -> Result<()> {
    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, report)?;
    info!(path = %path.display(), "Final report generated");
    Ok(())
}

pub fn print_key_findings(
    summary: &DataSummary,
    validation: &ValidationReport,
    metrics: &LiquidityMetrics,
    outputs_dir: &Path,
    figures_dir: &Path,
) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("NSE OPTIONS MARKET ANALYSIS - KEY FINDINGS");
    println!("{rule}");
    println!("Total Records: {}", summary.overview.total_records);
    println!("Unique Underlyings: {}", summary.overview.unique_underlyings);
    println!("Unique Expiries: {}", summary.overview.unique_expiries);
    println!("Call Options: {}", summary.options_distribution.call_options);
    println!("Put Options: {}", summary.options_distribution.put_options);
    println!(
        "Total Volume: {:.1}M contracts",
        summary.volume_analysis.total_volume / 1e6
    );
    let leaders: Vec<&str> = summary
        .volume_analysis
        .top_underlyings
        .iter()
        .map(|g| g.key.as_str())
        .collect();
    println!("Top Underlyings: {}", leaders.join(", "));
    println!("Data Quality Score: {:.2}", validation.quality_score);
    println!(
        "Median Spread: {} bps",
        fmt_opt(metrics.spread_metrics.median_spread_bps, 1)
    );
    println!("\nResults saved to: {}", outputs_dir.display());
    println!("Figures saved to: {}", figures_dir.display());
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        liquidity::LiquidityAnalyzer,
        loader::fixtures::{load_sample, settings},
        quality::{get_data_summary, validate_data_quality},
    };

    fn inputs() -> (DataFrame, DataSummary, ValidationReport, LiquidityMetrics) {
        let df = load_sample();
        let as_of = NaiveDate::from_ymd_opt(2025, 8, 26).unwrap();
        let summary = get_data_summary(&df, as_of).unwrap();
        let validation = validate_data_quality(&df).unwrap();
        let metrics = LiquidityAnalyzer::new(&settings())
            .compute_liquidity_metrics(&df)
            .unwrap();
        (df, summary, validation, metrics)
    }

    #[test]
    fn report_lists_totals_and_top_underlyings() {
        let (_, summary, validation, metrics) = inputs();
        let generated_at = NaiveDate::from_ymd_opt(2025, 8, 27)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let report = render_report(&summary, &validation, &metrics, generated_at).unwrap();

        assert!(report.contains("*Generated on: 2025-08-27 09:15:00*"));
        assert!(report.contains("as of 2025-08-26"));
        assert!(report.contains("- **Total Records**: 4"));
        assert!(report.contains("- **Call-Put Ratio**: 1.00"));
        assert!(report.contains("- **1. NIFTY**: 0.1M contracts"));
        assert!(report.contains("- **3. ABB**"));
    }

    #[test]
    fn summary_csv_has_seven_metrics() {
        let (mut df, summary, validation, _) = inputs();
        let dir = tempfile::tempdir().unwrap();

        save_data_summary(&summary, &validation, dir.path()).unwrap();
        save_processed_data(&mut df, dir.path()).unwrap();

        let csv = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "metric,value");
        assert_eq!(lines.len(), 8);
        assert!(lines[1].starts_with("total_records,4"));

        let processed = std::fs::read_to_string(dir.path().join(PROCESSED_FILE)).unwrap();
        assert_eq!(processed.lines().count(), 5);
    }
}
