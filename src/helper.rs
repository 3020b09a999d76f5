pub mod fno {
    use std::path::Path;

    use blackscholes::{ImpliedVolatility, Inputs, OptionType};
    use polars::prelude::*;

    use crate::contract::OptionKind;

    /// Reads every column as text; numeric coercion happens after renaming.
    pub fn read_data(path: impl AsRef<Path>) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(path)
            .with_infer_schema_length(Some(0))
            .truncate_ragged_lines(true)
            .has_header(true)
            .finish()
    }

    pub fn numbers(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
        Ok(df.column(name)?.f64()?.into_iter().collect())
    }

    /// Non-null values of a float column.
    pub fn present(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
        Ok(df.column(name)?.f64()?.into_iter().flatten().collect())
    }

    pub fn labels(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
        Ok(df
            .column(name)?
            .utf8()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect())
    }

    pub fn iv_calc(kind: OptionKind, s: f32, k: f32, p: f32, r: f32, t: f32) -> Option<f64> {
        let option_type = match kind {
            OptionKind::Call => OptionType::Call,
            OptionKind::Put => OptionType::Put,
        };
        let inputs = Inputs {
            option_type,
            s,
            k,
            p: Some(p),
            r,
            q: 0.0,
            t,
            sigma: None,
        };
        inputs
            .calc_rational_iv()
            .ok()
            .filter(|iv| iv.is_finite() && *iv > 0.0)
    }

    /// Implied volatility per row from premium, spot, strike and days to expiry.
    pub fn fetch_iv_series(df: &DataFrame, rate: f32) -> PolarsResult<Series> {
        let opt_typs = df.column("option_type")?.utf8()?;
        let spots = df.column("underlying_price")?.f64()?;
        let strike_prs = df.column("strike")?.f64()?;
        let opt_prs = df.column("close")?.f64()?;
        let dtes = df.column("days_to_expiry")?.i64()?;

        let out: Float64Chunked = opt_typs
            .into_iter()
            .zip(spots.into_iter())
            .zip(strike_prs.into_iter())
            .zip(opt_prs.into_iter())
            .zip(dtes.into_iter())
            .map(|((((opt_typ, s), k), p), dte)| {
                let kind = OptionKind::from_code(opt_typ?)?;
                let (s, k, p, dte) = (s?, k?, p?, dte?);
                if dte <= 0 || s <= 0.0 || k <= 0.0 {
                    return None;
                }
                let t = dte as f32 / 365.0;
                iv_calc(kind, s as f32, k as f32, p as f32, rate, t)
            })
            .collect();

        let mut iv = out.into_series();
        iv.rename("implied_volatility");
        Ok(iv)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn recovers_volatility_of_a_fair_price() {
            // ATM call, 30 days, priced at roughly 20% vol with zero rates.
            let iv = iv_calc(OptionKind::Call, 100.0, 100.0, 2.29, 0.0, 30.0 / 365.0).unwrap();
            assert!((iv - 0.20).abs() < 0.01, "iv = {iv}");
        }

        #[test]
        fn rows_without_time_value_get_no_iv() {
            let df = df!(
                "option_type" => &[Some("CE"), Some("PE"), None],
                "underlying_price" => &[Some(100.0), Some(100.0), Some(100.0)],
                "strike" => &[Some(100.0), Some(100.0), Some(100.0)],
                "close" => &[Some(2.29), Some(2.29), Some(2.29)],
                "days_to_expiry" => &[Some(30i64), Some(0i64), Some(30i64)]
            )
            .unwrap();

            let iv = fetch_iv_series(&df, 0.0).unwrap();
            let iv: Vec<Option<f64>> = iv.f64().unwrap().into_iter().collect();
            assert!(iv[0].is_some());
            assert!(iv[1].is_none());
            assert!(iv[2].is_none());
        }
    }
}
