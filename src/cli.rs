use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Program to analyse liquidity of NSE options
#[derive(Parser, Debug)]
#[command(author = "F&O", version = "0.1.0", about = "Liquidity statistics for an NSE F&O options snapshot.", long_about = None)]
pub struct Args {
    /// Settings file (TOML). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, validate and analyse an options CSV
    Analyze {
        /// Options CSV, overrides `data.options_file`
        input: Option<PathBuf>,
        #[arg(long)]
        outputs: Option<PathBuf>,
        #[arg(long)]
        figures: Option<PathBuf>,
    },
    /// List expiry dates of a year
    Expiries {
        #[arg(long)]
        year: i32,
        /// Only the last-Thursday monthly expiries
        #[arg(long)]
        monthly: bool,
    },
    /// List strikes around a spot price
    Strikes {
        #[arg(long)]
        spot: f64,
        #[arg(long, default_value_t = 50.0, value_parser = positive)]
        step: f64,
        #[arg(long, default_value_t = 1000.0)]
        band: f64,
    },
}

fn positive(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Ok(v),
        Ok(_) => Err(format!("`{value}` must be a positive number")),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_is_optional() {
        let args = Args::try_parse_from(["fno-liquidity"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn parses_strike_defaults() {
        let args = Args::try_parse_from(["fno-liquidity", "strikes", "--spot", "24430"]).unwrap();
        match args.command {
            Some(Command::Strikes { spot, step, band }) => {
                assert_eq!((spot, step, band), (24_430.0, 50.0, 1000.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_step() {
        for step in ["0", "-50", "abc"] {
            let parsed =
                Args::try_parse_from(["fno-liquidity", "strikes", "--spot", "24430", "--step", step]);
            assert!(parsed.is_err(), "step {step} was accepted");
        }
    }

    #[test]
    fn config_is_global() {
        let args = Args::try_parse_from([
            "fno-liquidity",
            "analyze",
            "snap.csv",
            "--config",
            "run.toml",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("run.toml")));
        assert!(matches!(
            args.command,
            Some(Command::Analyze { input: Some(_), .. })
        ));
    }
}
