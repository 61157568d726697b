use crate::models::{DailyBar, RawCsvRow};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse price: strip everything except digits, dot, minus.
/// "$1,234.56" → 1234.56 | "163.00" → 163.0
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Parse volume with K/M/B suffixes.
/// "1.2M" → 1,200,000 | "345K" → 345,000 | "12345" → 12345
pub fn parse_volume_shorthand(s: &str) -> Option<i64> {
    let s = s.trim().to_uppercase().replace(',', "");

    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }

    let (num_str, multiplier) = if s.ends_with('B') {
        (s.trim_end_matches('B'), 1_000_000_000.0)
    } else if s.ends_with('M') {
        (s.trim_end_matches('M'), 1_000_000.0)
    } else if s.ends_with('K') {
        (s.trim_end_matches('K'), 1_000.0)
    } else {
        // No suffix — just a plain integer
        let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        return cleaned.parse().ok();
    };

    let num: f64 = num_str.trim().parse().ok()?;
    Some((num * multiplier) as i64)
}

/// Parse dates: "Feb 20, 2024" (investing.com) or ISO
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    for format in ["%b %d, %Y", "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(d);
        }
    }

    None
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

// ── History CSV → DailyBar ────────────────────────────────────────────────────

/// A bar is only usable with its full OHLC set: pivot arithmetic needs all
/// three price components, so partial rows are dropped here, not zero-filled.
pub fn csv_row_to_bar(symbol: &str, row: &RawCsvRow, now: NaiveDateTime) -> Option<DailyBar> {
    let date_str = row.date.as_deref()?.trim();
    let date = parse_date(date_str)?;

    let close = parse_price(row.price.as_deref()?)?;
    let open = parse_price(row.open.as_deref()?)?;
    let high = parse_price(row.high.as_deref()?)?;
    let low = parse_price(row.low.as_deref()?)?;

    if close <= 0.0 || high < low {
        warn!("Invalid bar for {} on {}: close={} high={} low={}", symbol, date, close, high, low);
        return None;
    }

    Some(DailyBar {
        symbol: normalise_symbol(symbol),
        date,
        open,
        high,
        low,
        close,
        volume: row.volume.as_deref().and_then(parse_volume_shorthand),
        fetched_at: now,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,234.56"), Some(1234.56));
        assert_eq!(parse_price("163.00"), Some(163.0));
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("—"), None);
    }

    #[test]
    fn test_parse_volume_shorthand() {
        assert_eq!(parse_volume_shorthand("1.2M"), Some(1_200_000));
        assert_eq!(parse_volume_shorthand("345K"), Some(345_000));
        assert_eq!(parse_volume_shorthand("1.5B"), Some(1_500_000_000));
        assert_eq!(parse_volume_shorthand("12345"), Some(12345));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        assert_eq!(parse_date("Feb 20, 2024"), Some(expected));
        assert_eq!(parse_date("2024-02-20"), Some(expected));
        assert_eq!(parse_date("20/02/2024"), Some(expected));
    }

    #[test]
    fn test_partial_rows_are_dropped() {
        let now = Utc::now().naive_utc();
        let row = RawCsvRow {
            date: Some("Feb 20, 2024".into()),
            price: Some("163.00".into()),
            open: None, // missing open — unusable for pivot arithmetic
            high: Some("165.00".into()),
            low: Some("161.00".into()),
            ..RawCsvRow::default()
        };
        assert_eq!(csv_row_to_bar("QCOM", &row, now), None);
    }

    #[test]
    fn test_full_row_parses() {
        let now = Utc::now().naive_utc();
        let row = RawCsvRow {
            date: Some("Feb 20, 2024".into()),
            price: Some("163.00".into()),
            open: Some("161.50".into()),
            high: Some("165.00".into()),
            low: Some("160.75".into()),
            volume: Some("8.2M".into()),
        };
        let bar = csv_row_to_bar("qcom", &row, now).unwrap();
        assert_eq!(bar.symbol, "QCOM");
        assert_eq!(bar.close, 163.0);
        assert_eq!(bar.volume, Some(8_200_000));
    }
}
