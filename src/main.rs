use std::{
    fs,
    io::{self, Write},
    time::Instant,
};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod calendar;
mod charts;
mod cli;
mod config;
mod contract;
mod error;
mod helper;
mod liquidity;
mod loader;
mod quality;
mod report;
mod stats;

use crate::{
    charts::DashboardData,
    cli::{Args, Command},
    config::Settings,
    error::Result,
    liquidity::LiquidityAnalyzer,
    loader::NseDataLoader,
};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // time the entire program
    let start = Instant::now();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let command = args.command.unwrap_or(Command::Analyze {
        input: None,
        outputs: None,
        figures: None,
    });
    dispatch(command, settings, &mut io::stdout().lock())?;

    info!(elapsed = ?start.elapsed(), "Finished");
    Ok(())
}

/// Runs one subcommand; listings are written to `out`.
fn dispatch(command: Command, mut settings: Settings, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Analyze {
            input,
            outputs,
            figures,
        } => {
            if let Some(input) = input {
                settings.data.options_file = input;
            }
            if let Some(outputs) = outputs {
                settings.output.outputs_dir = outputs;
            }
            if let Some(figures) = figures {
                settings.output.figures_dir = figures;
            }
            if let Err(e) = run_analysis(&settings) {
                error!(error = %e, "Analysis pipeline failed");
                return Err(e);
            }
        }
        Command::Expiries { year, monthly } => {
            let expiries = if monthly {
                calendar::monthly_expiries(year)
            } else {
                calendar::expiries_for_year(year)
            };
            info!(year, count = expiries.len(), "Expiry calendar");
            for expiry in expiries {
                writeln!(out, "{}", expiry.format("%d-%b-%Y"))?;
            }
        }
        Command::Strikes { spot, step, band } => {
            if let Some(atm) = calendar::atm_strike(spot, step) {
                info!(atm, "At-the-money strike");
            }
            for strike in calendar::strike_ladder(spot, step, band) {
                writeln!(out, "{strike}")?;
            }
        }
    }
    Ok(())
}

fn run_analysis(settings: &Settings) -> Result<()> {
    info!("Starting NSE options market analysis pipeline");
    info!(seed = settings.analysis.random_seed, "Random seed set");

    let outputs_dir = &settings.output.outputs_dir;
    let figures_dir = &settings.output.figures_dir;
    fs::create_dir_all(outputs_dir)?;
    fs::create_dir_all(figures_dir)?;

    let loader = NseDataLoader::new(settings);
    let mut df = loader.load_options_data(&settings.data.options_file)?;

    let validation = quality::validate_data_quality(&df)?;
    let summary = quality::get_data_summary(&df, loader.as_of())?;

    let analyzer = LiquidityAnalyzer::new(settings);
    let metrics = analyzer.compute_liquidity_metrics(&df)?;

    let dashboard = DashboardData::from_frame(&df, settings.analysis.random_seed)?;
    charts::create_liquidity_dashboard(&dashboard, &figures_dir.join("liquidity_dashboard.png"))?;
    charts::create_liquidity_heatmaps(
        &analyzer.moneyness_pivot(&df)?,
        &figures_dir.join("liquidity_heatmaps.png"),
    )?;

    liquidity::export_liquidity_tables(&metrics, &outputs_dir.join("liquidity_metrics"))?;
    report::save_processed_data(&mut df, outputs_dir)?;
    report::save_data_summary(&summary, &validation, outputs_dir)?;

    let text = report::render_report(
        &summary,
        &validation,
        &metrics,
        chrono::Local::now().naive_local(),
    )?;
    report::write_report(&text, outputs_dir)?;

    info!("Analysis pipeline completed");
    report::print_key_findings(&summary, &validation, &metrics, outputs_dir, figures_dir);
    Ok(())
}
