use chrono::NaiveDate;

const INSTRUMENT_PREFIXES: [&str; 2] = ["OPTSTK", "OPTIDX"];
const EXPIRY_FORMATS: [&str; 3] = ["%d-%b-%Y", "%d%b%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    pub fn code(self) -> &'static str {
        match self {
            OptionKind::Call => "CE",
            OptionKind::Put => "PE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CE" => Some(OptionKind::Call),
            "PE" => Some(OptionKind::Put),
            _ => None,
        }
    }
}

/// Fields recovered from an NSE contract description such as
/// `OPTSTKRELIANCE-28-AUG-2025-3000CE`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractDetails {
    pub underlying: Option<String>,
    pub expiry: Option<String>,
    pub strike: Option<f64>,
    pub option_type: Option<OptionKind>,
}

impl ContractDetails {
    pub fn parse(description: &str) -> Self {
        let parts: Vec<&str> = description.trim().split('-').collect();
        if parts.len() < 3 {
            return Self::default();
        }

        let underlying = INSTRUMENT_PREFIXES
            .iter()
            .find_map(|prefix| parts[0].strip_prefix(prefix))
            .filter(|name| !name.is_empty())
            .map(str::to_owned);

        // `28-AUG-2025` is itself dash separated, so the label may span three parts.
        let (expiry, rest) = match parts.get(1..4).map(|p| p.join("-")) {
            Some(label) if parts.len() > 4 && parse_expiry(&label).is_some() => {
                (label, &parts[4..])
            }
            _ => (parts[1].to_owned(), &parts[2..]),
        };

        let mut details = Self {
            underlying,
            expiry: Some(expiry),
            ..Self::default()
        };

        for part in rest {
            let kind = if part.contains("CE") {
                OptionKind::Call
            } else if part.contains("PE") {
                OptionKind::Put
            } else {
                continue;
            };
            match part.replace(kind.code(), "").parse::<f64>() {
                Ok(strike) => {
                    details.strike = Some(strike);
                    details.option_type = Some(kind);
                }
                Err(e) => {
                    tracing::debug!(contract = description, error = %e, "Unparseable strike");
                }
            }
            break;
        }

        details
    }
}

pub fn parse_expiry(label: &str) -> Option<NaiveDate> {
    EXPIRY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt).ok())
}

/// Whole days from `as_of` to the expiry, clamped at zero for expired contracts.
pub fn days_to_expiry(label: &str, as_of: NaiveDate) -> Option<i64> {
    parse_expiry(label).map(|expiry| (expiry - as_of).num_days().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stock_option_with_dashed_expiry() {
        let details = ContractDetails::parse("OPTSTKRELIANCE-28-AUG-2025-3000CE");
        assert_eq!(details.underlying.as_deref(), Some("RELIANCE"));
        assert_eq!(details.expiry.as_deref(), Some("28-AUG-2025"));
        assert_eq!(details.strike, Some(3000.0));
        assert_eq!(details.option_type, Some(OptionKind::Call));
    }

    #[test]
    fn parses_index_option_with_compact_expiry() {
        let details = ContractDetails::parse("OPTIDXNIFTY-28AUG2025-24500.5PE");
        assert_eq!(details.underlying.as_deref(), Some("NIFTY"));
        assert_eq!(details.expiry.as_deref(), Some("28AUG2025"));
        assert_eq!(details.strike, Some(24500.5));
        assert_eq!(details.option_type, Some(OptionKind::Put));
    }

    #[test]
    fn unknown_prefix_keeps_other_fields() {
        let details = ContractDetails::parse("FUTSTKABB-28AUG2025-5000CE");
        assert!(details.underlying.is_none());
        assert_eq!(details.option_type, Some(OptionKind::Call));
    }

    #[test]
    fn bad_strike_leaves_option_type_empty() {
        let details = ContractDetails::parse("OPTSTKABB-28AUG2025-XCE");
        assert_eq!(details.underlying.as_deref(), Some("ABB"));
        assert!(details.strike.is_none());
        assert!(details.option_type.is_none());
    }

    #[test]
    fn short_description_yields_nothing() {
        assert_eq!(ContractDetails::parse("OPTSTKABB-28AUG2025"), ContractDetails::default());
        assert_eq!(ContractDetails::parse(""), ContractDetails::default());
    }

    #[test]
    fn days_to_expiry_is_clamped() {
        let as_of = NaiveDate::from_ymd_opt(2025, 8, 26).unwrap();
        assert_eq!(days_to_expiry("28-AUG-2025", as_of), Some(2));
        assert_eq!(days_to_expiry("31JUL2025", as_of), Some(0));
        assert_eq!(days_to_expiry("2025-09-25", as_of), Some(30));
        assert_eq!(days_to_expiry("AUG", as_of), None);
    }
}
