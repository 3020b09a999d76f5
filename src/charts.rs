use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::{
    error::Result,
    helper::fno,
    liquidity::{self, GroupLiquidity, MoneynessPivot},
    stats,
};

const SCATTER_POINTS: usize = 10_000;
const SPREAD_BINS: usize = 50;

/// Series plotted on the liquidity dashboard.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "charts"), allow(dead_code))]
pub struct DashboardData {
    pub top_underlyings: Vec<GroupLiquidity>,
    pub spread_histogram: Vec<(f64, usize)>,
    pub spread_bin_width: f64,
    pub median_spread_bps: Option<f64>,
    pub option_types: Vec<GroupLiquidity>,
    pub expiries: Vec<GroupLiquidity>,
    /// (volume in millions, spread bps) for a seeded sample of rows.
    pub scatter: Vec<(f64, f64)>,
    /// Cumulative share of total volume in percent, largest contracts first.
    pub cumulative_volume: Vec<f64>,
}

impl DashboardData {
    pub fn from_frame(df: &DataFrame, seed: u64) -> Result<Self> {
        let turnover = liquidity::turnover(df)?;
        let spread = fno::present(df, "spread_bps")?;
        let spread_histogram = stats::histogram(&spread, SPREAD_BINS);
        let spread_bin_width = match spread_histogram.as_slice() {
            [first, second, ..] => second.0 - first.0,
            _ => 1.0,
        };

        let volume = fno::numbers(df, "volume")?;
        let spread_rows = fno::numbers(df, "spread_bps")?;
        let scatter = stats::sample_indices(df.height(), SCATTER_POINTS, seed)
            .into_iter()
            .filter_map(|i| Some((volume[i]? / 1e6, spread_rows[i]?)))
            .collect();

        let sorted = df.column("volume")?.drop_nulls().sort(true);
        let total = sorted.sum::<f64>().unwrap_or(0.0);
        let cumulative_volume = sorted
            .f64()?
            .into_no_null_iter()
            .scan(0.0, |acc, v| {
                *acc += v;
                Some(if total > 0.0 { *acc / total * 100.0 } else { 0.0 })
            })
            .collect();

        Ok(Self {
            top_underlyings: liquidity::rank_by(df, "underlying", &turnover.values, Some(15))?,
            spread_histogram,
            spread_bin_width,
            median_spread_bps: df.column("spread_bps")?.median(),
            option_types: liquidity::rank_by(df, "option_type", &turnover.values, None)?,
            expiries: liquidity::rank_by(df, "expiry", &turnover.values, None)?,
            scatter,
            cumulative_volume,
        })
    }
}

pub fn create_liquidity_dashboard(data: &DashboardData, path: &Path) -> Result<()> {
    info!("Creating liquidity dashboard");
    #[cfg(feature = "charts")]
    {
        render::dashboard(data, path).map_err(|e| crate::error::Error::Chart(e.to_string()))?;
        info!(path = %path.display(), "Liquidity dashboard saved");
    }
    #[cfg(not(feature = "charts"))]
    {
        let _ = data;
        warn!(path = %path.display(), "Built without the `charts` feature, skipping dashboard");
    }
    Ok(())
}

pub fn create_liquidity_heatmaps(pivot: &MoneynessPivot, path: &Path) -> Result<()> {
    info!("Creating liquidity heatmaps");
    if pivot.expiries.is_empty() || pivot.buckets.is_empty() {
        warn!("Cannot create heatmaps: missing moneyness or expiry data");
        return Ok(());
    }
    #[cfg(feature = "charts")]
    {
        render::heatmaps(pivot, path).map_err(|e| crate::error::Error::Chart(e.to_string()))?;
        info!(path = %path.display(), "Liquidity heatmaps saved");
    }
    #[cfg(not(feature = "charts"))]
    warn!(path = %path.display(), "Built without the `charts` feature, skipping heatmaps");
    Ok(())
}

#[cfg(feature = "charts")]
mod render {
    use std::{error::Error, path::Path};

    use plotters::{coord::Shift, prelude::*};

    use super::DashboardData;
    use crate::liquidity::{GroupLiquidity, MoneynessPivot};

    type DrawResult = Result<(), Box<dyn Error>>;

    const FONT: &str = "sans-serif";

    pub fn dashboard(data: &DashboardData, path: &Path) -> DrawResult {
        let root = BitMapBackend::new(path, (2000, 1200)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled("NSE Options Liquidity Dashboard", (FONT, 32))?;
        let panels = root.split_evenly((2, 3));

        bars(&panels[0], "Top 15 Underlyings by Volume", &data.top_underlyings)?;
        spread_histogram(&panels[1], data)?;
        bars(&panels[2], "Volume by Option Type", &data.option_types)?;
        bars(&panels[3], "Volume by Expiry", &data.expiries)?;
        scatter(&panels[4], &data.scatter)?;
        cumulative(&panels[5], &data.cumulative_volume)?;

        root.present()?;
        Ok(())
    }

    fn bars<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        title: &str,
        groups: &[GroupLiquidity],
    ) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        let n = groups.len().max(1);
        let top = groups.iter().map(|g| g.volume / 1e6).fold(0.0, f64::max);

        let mut chart = ChartBuilder::on(area)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((0..n).into_segmented(), 0.0..(top * 1.1).max(1e-6))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|x| match x {
                SegmentValue::CenterOf(i) => groups.get(*i).map(|g| g.key.clone()).unwrap_or_default(),
                _ => String::new(),
            })
            .y_desc("Volume (Millions)")
            .draw()?;

        chart.draw_series(groups.iter().enumerate().map(|(i, g)| {
            Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), g.volume / 1e6)],
                BLUE.mix(0.7).filled(),
            )
        }))?;
        Ok(())
    }

    fn spread_histogram<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        data: &DashboardData,
    ) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        let bins = &data.spread_histogram;
        let lo = bins.first().map_or(0.0, |b| b.0);
        let hi = bins.last().map_or(1.0, |b| b.0) + data.spread_bin_width;
        let top = bins.iter().map(|b| b.1).max().unwrap_or(1) as f64;

        let mut chart = ChartBuilder::on(area)
            .caption("Spread Distribution", (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(lo..hi, 0.0..top * 1.1)?;
        chart
            .configure_mesh()
            .x_desc("Spread (bps)")
            .y_desc("Frequency")
            .draw()?;

        chart.draw_series(bins.iter().map(|(start, count)| {
            Rectangle::new(
                [(*start, 0.0), (*start + data.spread_bin_width, *count as f64)],
                BLUE.mix(0.7).filled(),
            )
        }))?;

        if let Some(median) = data.median_spread_bps {
            chart
                .draw_series(LineSeries::new(vec![(median, 0.0), (median, top * 1.1)], RED))?
                .label(format!("Median: {median:.1} bps"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
            chart
                .configure_series_labels()
                .border_style(BLACK)
                .background_style(WHITE.mix(0.8))
                .draw()?;
        }
        Ok(())
    }

    fn scatter<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, points: &[(f64, f64)]) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        let x_max = points.iter().map(|p| p.0).fold(0.0, f64::max).max(1e-6);
        let y_max = points.iter().map(|p| p.1).fold(0.0, f64::max).max(1e-6);

        let mut chart = ChartBuilder::on(area)
            .caption("Spread vs Volume", (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max * 1.05, 0.0..y_max * 1.05)?;
        chart
            .configure_mesh()
            .x_desc("Volume (Millions)")
            .y_desc("Spread (bps)")
            .draw()?;

        chart.draw_series(
            points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 2, BLUE.mix(0.5).filled())),
        )?;
        Ok(())
    }

    fn cumulative<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, shares: &[f64]) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        let mut chart = ChartBuilder::on(area)
            .caption("Cumulative Volume Distribution", (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0..shares.len().max(1), 0.0..100.0)?;
        chart
            .configure_mesh()
            .x_desc("Contract Rank")
            .y_desc("Cumulative Volume (%)")
            .draw()?;

        chart.draw_series(LineSeries::new(
            shares.iter().enumerate().map(|(i, s)| (i, *s)),
            BLUE,
        ))?;
        Ok(())
    }

    pub fn heatmaps(pivot: &MoneynessPivot, path: &Path) -> DrawResult {
        let root = BitMapBackend::new(path, (1600, 800)).into_drawing_area();
        root.fill(&WHITE)?;
        let (left, right) = root.split_horizontally(800);

        let volume: Vec<Vec<Option<f64>>> = pivot
            .volume
            .iter()
            .map(|row| row.iter().map(|v| Some(*v)).collect())
            .collect();
        heatmap(&left, "Volume by Expiry and Moneyness", pivot, &volume)?;
        heatmap(
            &right,
            "Average Spread (bps) by Expiry and Moneyness",
            pivot,
            &pivot.mean_spread_bps,
        )?;

        root.present()?;
        Ok(())
    }

    fn heatmap<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        title: &str,
        pivot: &MoneynessPivot,
        cells: &[Vec<Option<f64>>],
    ) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        let cols = pivot.buckets.len();
        let rows = pivot.expiries.len();
        let (lo, hi) = cells
            .iter()
            .flatten()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let span = if hi > lo { hi - lo } else { 1.0 };

        let mut chart = ChartBuilder::on(area)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(100)
            .build_cartesian_2d(0..cols, 0..rows)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Moneyness")
            .y_desc("Expiry")
            .x_label_formatter(&|i| pivot.buckets.get(*i).map(|b| format!("{b:.2}")).unwrap_or_default())
            .y_label_formatter(&|j| pivot.expiries.get(*j).cloned().unwrap_or_default())
            .draw()?;

        chart.draw_series(cells.iter().enumerate().flat_map(|(j, row)| {
            row.iter().enumerate().map(move |(i, cell)| {
                let color = match cell {
                    Some(v) => {
                        let t = ((v - lo) / span).clamp(0.0, 1.0);
                        RGBColor(255, (230.0 * (1.0 - t)) as u8, 0).filled()
                    }
                    None => RGBColor(235, 235, 235).filled(),
                };
                Rectangle::new([(i, j), (i + 1, j + 1)], color)
            })
        }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fixtures::load_sample;

    #[test]
    fn dashboard_series_from_sample() {
        let data = DashboardData::from_frame(&load_sample(), 42).unwrap();

        assert_eq!(data.top_underlyings.len(), 3);
        assert_eq!(data.option_types.len(), 2);
        assert_eq!(data.scatter.len(), 4);
        assert_eq!(
            data.spread_histogram.iter().map(|b| b.1).sum::<usize>(),
            4
        );
        let last = *data.cumulative_volume.last().unwrap();
        assert!((last - 100.0).abs() < 1e-9);
        assert!(data.cumulative_volume.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_pivot_skips_heatmaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmaps.png");
        create_liquidity_heatmaps(&MoneynessPivot::default(), &path).unwrap();
        assert!(!path.exists());
    }
}
