use std::{
    fs::File,
    path::{Path, PathBuf},
};

use polars::prelude::*;
use tracing::info;

use crate::{
    config::Settings,
    contract::parse_expiry,
    error::Result,
    helper::fno,
    stats::{self, Bucket},
};

const SPREAD_EDGES: [f64; 4] = [10.0, 25.0, 50.0, 100.0];
const SPREAD_LABELS: [&str; 5] = ["0-10_bps", "10-25_bps", "25-50_bps", "50-100_bps", "100+_bps"];
const DEPTH_EDGES: [f64; 4] = [1_000.0, 10_000.0, 100_000.0, 1_000_000.0];
const DEPTH_LABELS: [&str; 5] = ["0-1K", "1K-10K", "10K-100K", "100K-1M", "1M+"];
const TURNOVER: &str = "turnover";
const MONEYNESS_BUCKET: &str = "moneyness_bucket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnoverSource {
    /// Taken from the exchange's notional value column.
    Reported,
    /// Volume times close, used when no notional value was reported.
    Estimated,
}

/// Per-row turnover, aligned with the frame's rows. Missing values count as zero.
#[derive(Debug, Clone)]
pub struct Turnover {
    pub source: TurnoverSource,
    pub values: Series,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupLiquidity {
    pub key: String,
    pub volume: f64,
    pub notional_value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Concentration {
    pub top_10_pct_share: Option<f64>,
    pub top_25_pct_share: Option<f64>,
    pub top_50_pct_share: Option<f64>,
}

impl Concentration {
    fn of(values: &Series) -> Self {
        Self {
            top_10_pct_share: stats::top_share(values, 0.10),
            top_25_pct_share: stats::top_share(values, 0.25),
            top_50_pct_share: stats::top_share(values, 0.50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpreadMetrics {
    pub median_spread_bps: Option<f64>,
    pub mean_spread_bps: Option<f64>,
    pub spread_95th_percentile: Option<f64>,
    pub spread_99th_percentile: Option<f64>,
    pub spread_distribution: Vec<Bucket>,
}

/// Volume stands in for book depth.
#[derive(Debug, Clone)]
pub struct DepthMetrics {
    pub median_depth: Option<f64>,
    pub mean_depth: Option<f64>,
    pub depth_95th_percentile: Option<f64>,
    pub depth_99th_percentile: Option<f64>,
    pub depth_distribution: Vec<Bucket>,
}

#[derive(Debug, Clone)]
pub struct VolumeMetrics {
    pub total_volume: f64,
    pub total_contracts: usize,
    pub avg_volume_per_contract: Option<f64>,
    pub median_volume_per_contract: Option<f64>,
    pub volume_concentration: Concentration,
}

#[derive(Debug, Clone)]
pub struct TurnoverMetrics {
    pub source: TurnoverSource,
    pub total_turnover: f64,
    pub avg_turnover_per_contract: Option<f64>,
    pub median_turnover_per_contract: Option<f64>,
    pub turnover_concentration: Concentration,
}

#[derive(Debug, Clone)]
pub struct LiquidityRankings {
    pub top_underlyings: Vec<GroupLiquidity>,
    pub top_expiries: Vec<GroupLiquidity>,
    pub option_type_ranking: Vec<GroupLiquidity>,
}

#[derive(Debug, Clone)]
pub struct LiquidityMetrics {
    pub spread_metrics: SpreadMetrics,
    pub depth_metrics: DepthMetrics,
    pub volume_metrics: VolumeMetrics,
    pub turnover_metrics: TurnoverMetrics,
    pub liquidity_rankings: LiquidityRankings,
}

impl LiquidityMetrics {
    /// Scalar metrics as `(metric, value, category)` rows.
    pub fn scalars(&self) -> Vec<(&'static str, Option<f64>, &'static str)> {
        let spread = &self.spread_metrics;
        let depth = &self.depth_metrics;
        let volume = &self.volume_metrics;
        let turnover = &self.turnover_metrics;
        let total_turnover = match turnover.source {
            TurnoverSource::Reported => "total_turnover",
            TurnoverSource::Estimated => "estimated_total_turnover",
        };

        vec![
            ("median_spread_bps", spread.median_spread_bps, "spread"),
            ("mean_spread_bps", spread.mean_spread_bps, "spread"),
            ("spread_95th_percentile", spread.spread_95th_percentile, "spread"),
            ("spread_99th_percentile", spread.spread_99th_percentile, "spread"),
            ("median_depth", depth.median_depth, "depth"),
            ("mean_depth", depth.mean_depth, "depth"),
            ("depth_95th_percentile", depth.depth_95th_percentile, "depth"),
            ("depth_99th_percentile", depth.depth_99th_percentile, "depth"),
            ("total_volume", Some(volume.total_volume), "volume"),
            ("total_contracts", Some(volume.total_contracts as f64), "volume"),
            ("avg_volume_per_contract", volume.avg_volume_per_contract, "volume"),
            ("median_volume_per_contract", volume.median_volume_per_contract, "volume"),
            ("volume_top_10_pct_share", volume.volume_concentration.top_10_pct_share, "volume"),
            ("volume_top_25_pct_share", volume.volume_concentration.top_25_pct_share, "volume"),
            ("volume_top_50_pct_share", volume.volume_concentration.top_50_pct_share, "volume"),
            (total_turnover, Some(turnover.total_turnover), "turnover"),
            ("avg_turnover_per_contract", turnover.avg_turnover_per_contract, "turnover"),
            ("median_turnover_per_contract", turnover.median_turnover_per_contract, "turnover"),
            ("turnover_top_10_pct_share", turnover.turnover_concentration.top_10_pct_share, "turnover"),
            ("turnover_top_25_pct_share", turnover.turnover_concentration.top_25_pct_share, "turnover"),
            ("turnover_top_50_pct_share", turnover.turnover_concentration.top_50_pct_share, "turnover"),
        ]
    }
}

/// Expiry by moneyness-bucket table behind the heatmaps.
#[derive(Debug, Clone, Default)]
pub struct MoneynessPivot {
    /// Row labels, earliest expiry first.
    pub expiries: Vec<String>,
    /// Lower edge of each moneyness bucket.
    pub buckets: Vec<f64>,
    pub volume: Vec<Vec<f64>>,
    pub mean_spread_bps: Vec<Vec<Option<f64>>>,
}

pub struct LiquidityAnalyzer {
    top_underlyings: usize,
    top_expiries: usize,
    moneyness_bin: f64,
}

impl LiquidityAnalyzer {
    pub fn new(settings: &Settings) -> Self {
        let liquidity = &settings.analysis.liquidity;
        Self {
            top_underlyings: liquidity.top_underlyings,
            top_expiries: liquidity.top_expiries,
            moneyness_bin: liquidity.moneyness_bin,
        }
    }

    pub fn compute_liquidity_metrics(&self, df: &DataFrame) -> Result<LiquidityMetrics> {
        info!("Computing liquidity metrics");
        let turnover = turnover(df)?;

        Ok(LiquidityMetrics {
            spread_metrics: spread_metrics(df)?,
            depth_metrics: depth_metrics(df)?,
            volume_metrics: volume_metrics(df)?,
            turnover_metrics: turnover_metrics(&turnover),
            liquidity_rankings: self.liquidity_rankings(df, &turnover)?,
        })
    }

    fn liquidity_rankings(&self, df: &DataFrame, turnover: &Turnover) -> Result<LiquidityRankings> {
        info!("Computing liquidity rankings");
        Ok(LiquidityRankings {
            top_underlyings: rank_by(df, "underlying", &turnover.values, Some(self.top_underlyings))?,
            top_expiries: rank_by(df, "expiry", &turnover.values, Some(self.top_expiries))?,
            option_type_ranking: rank_by(df, "option_type", &turnover.values, None)?,
        })
    }

    pub fn moneyness_pivot(&self, df: &DataFrame) -> Result<MoneynessPivot> {
        moneyness_pivot(df, self.moneyness_bin)
    }
}

fn spread_metrics(df: &DataFrame) -> Result<SpreadMetrics> {
    info!("Computing spread metrics");
    let spread = df.column("spread_bps")?;
    Ok(SpreadMetrics {
        median_spread_bps: spread.median(),
        mean_spread_bps: spread.mean(),
        spread_95th_percentile: stats::quantile(spread, 0.95)?,
        spread_99th_percentile: stats::quantile(spread, 0.99)?,
        spread_distribution: stats::bucketize(
            &fno::present(df, "spread_bps")?,
            &SPREAD_EDGES,
            &SPREAD_LABELS,
        ),
    })
}

fn depth_metrics(df: &DataFrame) -> Result<DepthMetrics> {
    info!("Computing depth metrics");
    let volume = df.column("volume")?;
    Ok(DepthMetrics {
        median_depth: volume.median(),
        mean_depth: volume.mean(),
        depth_95th_percentile: stats::quantile(volume, 0.95)?,
        depth_99th_percentile: stats::quantile(volume, 0.99)?,
        depth_distribution: stats::bucketize(&fno::present(df, "volume")?, &DEPTH_EDGES, &DEPTH_LABELS),
    })
}

fn volume_metrics(df: &DataFrame) -> Result<VolumeMetrics> {
    info!("Computing volume metrics");
    let volume = df.column("volume")?;
    Ok(VolumeMetrics {
        total_volume: volume.sum::<f64>().unwrap_or(0.0),
        total_contracts: df.height(),
        avg_volume_per_contract: volume.mean(),
        median_volume_per_contract: volume.median(),
        volume_concentration: Concentration::of(volume),
    })
}

fn turnover_metrics(turnover: &Turnover) -> TurnoverMetrics {
    info!(source = ?turnover.source, "Computing turnover metrics");
    let values = &turnover.values;
    TurnoverMetrics {
        source: turnover.source,
        total_turnover: values.sum::<f64>().unwrap_or(0.0),
        avg_turnover_per_contract: values.mean(),
        median_turnover_per_contract: values.median(),
        turnover_concentration: Concentration::of(values),
    }
}

/// Reported notional value when the frame has any, volume times close otherwise.
pub fn turnover(df: &DataFrame) -> Result<Turnover> {
    let (source, expr) = if df.column("notional_value")?.null_count() < df.height() {
        (TurnoverSource::Reported, col("notional_value"))
    } else {
        (TurnoverSource::Estimated, col("volume") * col("close"))
    };

    let values = df
        .clone()
        .lazy()
        .select([expr.fill_null(lit(0.0)).alias(TURNOVER)])
        .collect()?
        .column(TURNOVER)?
        .clone();
    Ok(Turnover { source, values })
}

/// Sums volume and turnover per value of `key`, largest volume first.
/// Equal volumes are ordered by key.
pub fn rank_by(
    df: &DataFrame,
    key: &str,
    turnover: &Series,
    limit: Option<usize>,
) -> Result<Vec<GroupLiquidity>> {
    let mut turnover = turnover.clone();
    turnover.rename(TURNOVER);
    let mut frame = df.select([key, "volume"])?;
    frame.with_column(turnover)?;

    let mut ranked = frame
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg([col("volume").sum(), col(TURNOVER).sum().alias("notional_value")])
        .sort_by_exprs([col("volume"), col(key)], [true, false], false, false);
    if let Some(limit) = limit {
        ranked = ranked.limit(limit as IdxSize);
    }
    let ranked = ranked.collect()?;

    let groups = fno::labels(&ranked, key)?
        .into_iter()
        .zip(fno::numbers(&ranked, "volume")?)
        .zip(fno::numbers(&ranked, "notional_value")?)
        .filter_map(|((key, volume), notional_value)| {
            Some(GroupLiquidity {
                key: key?,
                volume: volume.unwrap_or(0.0),
                notional_value: notional_value.unwrap_or(0.0),
            })
        })
        .collect();
    Ok(groups)
}

/// Index of the moneyness bucket holding each row. The ratio is rounded
/// before flooring so that values on an edge open the upper bucket.
fn moneyness_bucket(bin_width: f64) -> Expr {
    (col("moneyness") / lit(bin_width))
        .round(9)
        .floor()
        .cast(DataType::Int64)
        .alias(MONEYNESS_BUCKET)
}

pub fn moneyness_pivot(df: &DataFrame, bin_width: f64) -> Result<MoneynessPivot> {
    let cells = df
        .select(["expiry", "moneyness", "volume", "spread_bps"])?
        .lazy()
        .filter(
            col("expiry")
                .is_not_null()
                .and(col("moneyness").is_not_null())
                .and(col("moneyness").is_finite()),
        )
        .with_column(moneyness_bucket(bin_width))
        .group_by([col("expiry"), col(MONEYNESS_BUCKET)])
        .agg([col("volume").sum(), col("spread_bps").mean()])
        .collect()?;

    let bucket_keys: Vec<i64> = cells
        .column(MONEYNESS_BUCKET)?
        .unique()?
        .sort(false)
        .i64()?
        .into_iter()
        .flatten()
        .collect();

    let cell_expiry = fno::labels(&cells, "expiry")?;
    let mut expiries: Vec<String> = cell_expiry.iter().flatten().cloned().collect();
    expiries.sort_by(|a, b| parse_expiry(a).cmp(&parse_expiry(b)).then_with(|| a.cmp(b)));
    expiries.dedup();

    let mut pivot = MoneynessPivot {
        buckets: bucket_keys.iter().map(|b| *b as f64 * bin_width).collect(),
        volume: vec![vec![0.0; bucket_keys.len()]; expiries.len()],
        mean_spread_bps: vec![vec![None; bucket_keys.len()]; expiries.len()],
        ..MoneynessPivot::default()
    };

    let cell_bucket = cells.column(MONEYNESS_BUCKET)?.i64()?;
    let cell_volume = fno::numbers(&cells, "volume")?;
    let cell_spread = fno::numbers(&cells, "spread_bps")?;
    for (((e, b), v), spread) in cell_expiry
        .iter()
        .zip(cell_bucket.into_iter())
        .zip(cell_volume)
        .zip(cell_spread)
    {
        let row = expiries.iter().position(|x| Some(x) == e.as_ref());
        let column = b.and_then(|b| bucket_keys.binary_search(&b).ok());
        if let (Some(row), Some(column)) = (row, column) {
            pivot.volume[row][column] = v.unwrap_or(0.0);
            pivot.mean_spread_bps[row][column] = spread;
        }
    }
    pivot.expiries = expiries;
    Ok(pivot)
}

fn csv_path(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}_{suffix}.csv", prefix.display()))
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(df)?;
    Ok(())
}

fn ranking_frame(key: &str, ranking: &[GroupLiquidity]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(key, ranking.iter().map(|g| g.key.as_str()).collect::<Vec<_>>()),
        Series::new("volume", ranking.iter().map(|g| g.volume).collect::<Vec<_>>()),
        Series::new(
            "notional_value",
            ranking.iter().map(|g| g.notional_value).collect::<Vec<_>>(),
        ),
    ])
}

/// Writes `{prefix}_summary.csv` and one CSV per ranking.
pub fn export_liquidity_tables(metrics: &LiquidityMetrics, prefix: &Path) -> Result<()> {
    info!(prefix = %prefix.display(), "Exporting liquidity tables");

    let scalars = metrics.scalars();
    let mut summary = df!(
        "metric" => scalars.iter().map(|(m, _, _)| *m).collect::<Vec<_>>(),
        "value" => scalars.iter().map(|(_, v, _)| *v).collect::<Vec<_>>(),
        "category" => scalars.iter().map(|(_, _, c)| *c).collect::<Vec<_>>()
    )?;
    write_csv(&mut summary, &csv_path(prefix, "summary"))?;

    let rankings = &metrics.liquidity_rankings;
    for (suffix, key, ranking) in [
        ("top_underlyings", "underlying", &rankings.top_underlyings),
        ("top_expiries", "expiry", &rankings.top_expiries),
        ("option_types", "option_type", &rankings.option_type_ranking),
    ] {
        write_csv(&mut ranking_frame(key, ranking)?, &csv_path(prefix, suffix))?;
    }
    Ok(())
}
