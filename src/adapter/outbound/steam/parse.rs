//! Market price text parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parse a formatted market price such as `$1,234.56`, `R$ 10,25` or `5,99€`.
///
/// Everything except digits and separators is dropped. Real and euro prices use
/// `.` for grouping and `,` as the decimal separator; everything else drops
/// every `,`. Returns `None` when the remainder is not a number.
pub fn parse_price_text(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let comma_decimal = text.contains("R$") || text.contains('€');
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = if comma_decimal {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };

    Decimal::from_str(&normalized).ok()
}
