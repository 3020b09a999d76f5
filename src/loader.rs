use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    config::Settings,
    contract::{days_to_expiry, ContractDetails, OptionKind},
    error::{Error, Result},
    helper::fno,
};

/// NSE bhavcopy headers and the names the rest of the pipeline uses.
pub const SCHEMA_MAPPING: [(&str, &str); 14] = [
    ("CONTRACT_D", "symbol"),
    ("PREVIOUS_S", "prev_close"),
    ("OPEN_PRICE", "open"),
    ("HIGH_PRICE", "high"),
    ("LOW_PRICE", "low"),
    ("CLOSE_PRIC", "close"),
    ("SETTLEMENT", "settlement"),
    ("NET_CHANGE", "net_change"),
    ("OI_NO_CON", "open_interest"),
    ("TRADED_QUA", "volume"),
    ("TRD_NO_CON", "trades"),
    ("UNDRLNG_ST", "underlying_price"),
    ("NOTIONAL_V", "notional_value"),
    ("PREMIUM_TR", "premium_traded"),
];

const REQUIRED_COLUMNS: [&str; 6] = ["symbol", "open", "high", "low", "close", "volume"];

const NUMERIC_COLUMNS: [&str; 13] = [
    "prev_close",
    "open",
    "high",
    "low",
    "close",
    "settlement",
    "net_change",
    "open_interest",
    "volume",
    "trades",
    "underlying_price",
    "notional_value",
    "premium_traded",
];

pub struct NseDataLoader {
    max_spread_bps: f64,
    as_of: NaiveDate,
    risk_free_rate: f32,
}

impl NseDataLoader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            max_spread_bps: settings.analysis.liquidity.max_spread_bps,
            as_of: settings.as_of(),
            risk_free_rate: settings.analysis.risk_free_rate,
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn load_options_data(&self, path: &Path) -> Result<DataFrame> {
        info!(path = %path.display(), "Loading options data");

        let mut df = fno::read_data(path)?.collect()?;
        info!(records = df.height(), "Loaded raw records");

        apply_schema(&mut df)?;
        self.extract_option_details(&mut df)?;

        let df = self.clean_data(df)?;
        if df.height() == 0 {
            return Err(Error::EmptyDataset(path.display().to_string()));
        }
        let df = self.add_derived_fields(df)?;

        info!(records = df.height(), "Final dataset");
        Ok(df)
    }

    fn extract_option_details(&self, df: &mut DataFrame) -> Result<()> {
        info!("Extracting option details from contract descriptions");

        let details: Vec<ContractDetails> = df
            .column("symbol")?
            .utf8()?
            .into_iter()
            .map(|contract| contract.map(ContractDetails::parse).unwrap_or_default())
            .collect();

        let unparsed = details.iter().filter(|d| d.option_type.is_none()).count();
        debug!(unparsed, "Contracts without an option type");

        let underlying: Vec<Option<&str>> =
            details.iter().map(|d| d.underlying.as_deref()).collect();
        let expiry: Vec<Option<&str>> = details.iter().map(|d| d.expiry.as_deref()).collect();
        let strike: Vec<Option<f64>> = details.iter().map(|d| d.strike).collect();
        let option_type: Vec<Option<&str>> = details
            .iter()
            .map(|d| d.option_type.map(OptionKind::code))
            .collect();
        let dte: Vec<Option<i64>> = details
            .iter()
            .map(|d| {
                d.expiry
                    .as_deref()
                    .and_then(|label| days_to_expiry(label, self.as_of))
            })
            .collect();

        for series in [
            Series::new("underlying", underlying),
            Series::new("expiry", expiry),
            Series::new("strike", strike),
            Series::new("option_type", option_type),
            Series::new("days_to_expiry", dte),
        ] {
            df.with_column(series)?;
        }
        Ok(())
    }

    fn clean_data(&self, df: DataFrame) -> Result<DataFrame> {
        info!("Cleaning and validating data");
        let before = df.height();

        let df = df
            .lazy()
            .filter(
                col("open")
                    .is_not_null()
                    .and(col("close").is_not_null())
                    .and(col("underlying").is_not_null())
                    .and(col("option_type").is_not_null()),
            )
            .with_columns([cols(NUMERIC_COLUMNS).cast(DataType::Float64)])
            .filter(
                col("close")
                    .gt(lit(0.0))
                    .and(col("open").gt(lit(0.0)))
                    .and(col("volume").gt(lit(0.0))),
            )
            .with_column((col("high") - col("low")).alias("bid_ask_spread"))
            .with_column((col("bid_ask_spread") / col("close") * lit(10_000.0)).alias("spread_bps"))
            .filter(col("spread_bps").lt_eq(lit(self.max_spread_bps)))
            .collect()?;

        info!(dropped = before - df.height(), "Removed invalid rows");
        Ok(df)
    }

    fn add_derived_fields(&self, df: DataFrame) -> Result<DataFrame> {
        info!("Adding derived fields");

        let mut df = df
            .lazy()
            .with_columns([
                (col("bid_ask_spread") / lit(2.0)).alias("effective_spread"),
                ((col("close") - col("prev_close")) / col("prev_close")).alias("return"),
                (col("underlying_price") / col("strike")).alias("moneyness"),
            ])
            .collect()?;

        df.with_column(fno::fetch_iv_series(&df, self.risk_free_rate)?)?;
        Ok(df)
    }
}

/// Renames known NSE headers, checks the required ones and pads absent
/// optional columns with nulls.
fn apply_schema(df: &mut DataFrame) -> Result<()> {
    for (raw, name) in SCHEMA_MAPPING {
        if has_column(df, raw) && !has_column(df, name) {
            df.rename(raw, name)?;
        }
    }

    for name in REQUIRED_COLUMNS {
        if !has_column(df, name) {
            return Err(Error::MissingColumn(name.to_owned()));
        }
    }

    let height = df.height();
    for name in NUMERIC_COLUMNS {
        if !has_column(df, name) {
            debug!(column = name, "Adding empty column");
            df.with_column(Series::full_null(name, height, &DataType::Utf8))?;
        }
    }
    Ok(())
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn to_csv(df: &mut DataFrame) -> String {
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf).has_header(true).finish(df).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn keeps_only_valid_contracts() {
        let df = load_sample();
        assert_eq!(df.height(), 4);

        let underlyings = fno::labels(&df, "underlying").unwrap();
        assert_eq!(
            underlyings,
            vec![
                Some("RELIANCE".to_owned()),
                Some("RELIANCE".to_owned()),
                Some("NIFTY".to_owned()),
                Some("ABB".to_owned()),
            ]
        );
        assert!(fno::present(&df, "close").unwrap().iter().all(|c| *c > 0.0));
        assert!(fno::present(&df, "volume").unwrap().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn spread_is_high_low_over_close_in_bps() {
        let df = load_sample();
        let high = fno::present(&df, "high").unwrap();
        let low = fno::present(&df, "low").unwrap();
        let close = fno::present(&df, "close").unwrap();
        let spread = fno::present(&df, "spread_bps").unwrap();

        for i in 0..df.height() {
            let expected = (high[i] - low[i]) / close[i] * 10_000.0;
            assert!((spread[i] - expected).abs() < 1e-9);
            assert!(spread[i] >= 0.0);
        }
    }

    #[test]
    fn derives_return_moneyness_and_expiry_days() {
        let df = load_sample();
        let ret = fno::numbers(&df, "return").unwrap();
        let moneyness = fno::numbers(&df, "moneyness").unwrap();
        let dte: Vec<Option<i64>> = df
            .column("days_to_expiry")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();

        assert!((ret[0].unwrap() - 0.15).abs() < 1e-9);
        assert!((moneyness[0].unwrap() - 2950.0 / 3000.0).abs() < 1e-9);
        assert_eq!(dte, vec![Some(2), Some(2), Some(2), Some(30)]);
        assert!(df.column("implied_volatility").is_ok());
    }

    #[test]
    fn tight_spread_limit_drops_wide_rows() {
        let mut settings = settings();
        settings.analysis.liquidity.max_spread_bps = 1500.0;
        let file = write_csv(SAMPLE_CSV);
        let df = NseDataLoader::new(&settings)
            .load_options_data(file.path())
            .unwrap();

        // RELIANCE CE sits at ~1739 bps
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn loading_twice_is_identical() {
        let mut first = load_sample();
        let mut second = load_sample();
        assert_eq!(to_csv(&mut first), to_csv(&mut second));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let file = write_csv("CONTRACT_D,OPEN_PRICE,HIGH_PRICE,LOW_PRICE,CLOSE_PRIC\nX,1,1,1,1\n");
        let err = NseDataLoader::new(&settings())
            .load_options_data(file.path())
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "volume"));
    }

    #[test]
    fn semantic_headers_and_missing_optionals_are_accepted() {
        let file = write_csv(
            "symbol,open,high,low,close,volume\n\
             OPTSTKSBIN-28-AUG-2025-800PE,5,6,4,5,1000\n",
        );
        let df = NseDataLoader::new(&settings())
            .load_options_data(file.path())
            .unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(df.column("notional_value").unwrap().null_count(), 1);
        assert_eq!(df.column("moneyness").unwrap().null_count(), 1);
    }

    #[test]
    fn nothing_valid_is_an_empty_dataset() {
        let file = write_csv(
            "symbol,open,high,low,close,volume\n\
             OPTSTKSBIN-28-AUG-2025-800PE,5,6,4,5,0\n",
        );
        let err = NseDataLoader::new(&settings())
            .load_options_data(file.path())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }

    #[cfg(unix)]
    #[test]
    fn reads_from_a_non_utf8_path() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"bhav\xff.csv"));
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let df = NseDataLoader::new(&settings())
            .load_options_data(&path)
            .unwrap();
        assert_eq!(df.height(), 4);
    }
}
