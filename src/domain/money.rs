use std::fmt;

/// Prices, costs and the register balance are integer cents.
pub type Cents = i64;

/// Format cents as a decimal string: 5000 -> "50.00", -1234 -> "-12.34".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into cents.
/// "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000. Extra decimals are truncated.
/// Only ASCII digits are accepted on either side of the point, with at most one
/// leading minus sign.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, input) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };

    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (units_str.is_empty() && decimal_str.is_empty())
        || !all_digits(units_str)
        || !all_digits(decimal_str)
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // ASCII only from here, so byte slicing is safe
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => i64::from(decimal_str.as_bytes()[0] - b'0') * 10,
        _ => decimal_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::InvalidFormat)?;
    Ok(if negative { -cents } else { cents })
}

/// Split a per-carton price into a per-single price, rounding half up.
///
/// `per_carton` must be non-negative and `item_per_cartoon` positive; callers
/// validate both before getting here.
pub fn per_single_price(per_carton: Cents, item_per_cartoon: i64) -> Cents {
    (per_carton * 2 + item_per_cartoon) / (item_per_cartoon * 2)
}

/// Value of `quantity` singles at `unit_price` each.
pub fn line_total(quantity: i64, unit_price: Cents) -> Cents {
    quantity * unit_price
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-1234), "-12.34");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-3.10"), Ok(-310));
        assert_eq!(parse_cents("100.999"), Ok(10099));
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("1.2.3").is_err());
        assert!(parse_cents(".").is_err());
        assert!(parse_cents("").is_err());
        assert!(parse_cents("-").is_err());
        assert!(parse_cents("--5").is_err());
        assert!(parse_cents("+5").is_err());
    }

    #[test]
    fn test_parse_cents_rejects_non_ascii_decimals() {
        assert_eq!(parse_cents("1.€"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.5€"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("€.50"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.٣"), Err(ParseCentsError::InvalidFormat));
    }

    #[test]
    fn test_parse_cents_rejects_sign_in_decimals() {
        assert_eq!(parse_cents("1.-5"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.+5"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.5-"), Err(ParseCentsError::InvalidFormat));
    }

    #[test]
    fn test_parse_cents_rejects_overflow() {
        // fits as units but not once scaled to cents
        assert_eq!(
            parse_cents("92233720368547758.07"),
            Ok(9_223_372_036_854_775_807)
        );
        assert_eq!(
            parse_cents("92233720368547758.08"),
            Err(ParseCentsError::InvalidFormat)
        );
        assert_eq!(
            parse_cents("1000000000000000000"),
            Err(ParseCentsError::InvalidFormat)
        );
        assert_eq!(
            parse_cents("99999999999999999999999"),
            Err(ParseCentsError::InvalidFormat)
        );
    }

    #[test]
    fn test_per_single_price_exact() {
        assert_eq!(per_single_price(12_000, 12), 1_000);
        assert_eq!(per_single_price(0, 6), 0);
    }

    #[test]
    fn test_per_single_price_rounds_half_up() {
        // 10.00 over 12 singles = 83.33.. cents
        assert_eq!(per_single_price(1_000, 12), 83);
        // 0.05 over 2 singles = 2.5 cents
        assert_eq!(per_single_price(5, 2), 3);
        assert_eq!(per_single_price(1_000, 3), 333);
    }
}
