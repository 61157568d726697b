//! Pivot-point and recent-range support/resistance.

use crate::models::{DailyBar, TechnicalLevels};

/// Policy minimum before recent-range levels are reported at all.
pub const MIN_BARS_FOR_RANGE: usize = 5;

/// Trailing window for the recent high/low scan.
pub const RANGE_LOOKBACK: usize = 20;

/// Compute technical levels from a chronological bar sequence.
///
/// Pivot family needs only the most recent completed day:
/// `P = (H + L + C) / 3`, `S1 = 2P − H`, `S2 = P − (H − L)`,
/// `R1 = 2P − L`, `R2 = P + (H − L)`.
///
/// Recent-range levels scan the trailing [`RANGE_LOOKBACK`] bars (or all bars
/// when fewer) and require at least [`MIN_BARS_FOR_RANGE`] bars; below that
/// they stay `None` rather than being fabricated from thin data.
pub fn compute_levels(bars: &[DailyBar]) -> TechnicalLevels {
    let mut levels = TechnicalLevels::default();

    let Some(last) = bars.last() else {
        return levels;
    };

    let (high, low, close) = (last.high, last.low, last.close);
    let pivot = (high + low + close) / 3.0;

    levels.pivot_point = Some(pivot);
    levels.support_1 = Some(2.0 * pivot - high);
    levels.support_2 = Some(pivot - (high - low));
    levels.resistance_1 = Some(2.0 * pivot - low);
    levels.resistance_2 = Some(pivot + (high - low));

    if bars.len() >= MIN_BARS_FOR_RANGE {
        let start = bars.len().saturating_sub(RANGE_LOOKBACK);
        let window = &bars[start..];
        levels.recent_support = window
            .iter()
            .map(|b| b.low)
            .min_by(f64::total_cmp);
        levels.recent_resistance = window
            .iter()
            .map(|b| b.high)
            .max_by(f64::total_cmp);
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> DailyBar {
        DailyBar {
            symbol: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: Some(1_000_000),
            fetched_at: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(21, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn pivot_formula_uses_most_recent_bar() {
        let bars = vec![bar(1, 10.0, 12.0, 8.0, 9.0), bar(2, 100.0, 110.0, 90.0, 105.0)];
        let levels = compute_levels(&bars);

        let p = (110.0 + 90.0 + 105.0) / 3.0;
        assert_eq!(levels.pivot_point, Some(p));
        assert_eq!(levels.support_1, Some(2.0 * p - 110.0));
        assert_eq!(levels.support_2, Some(p - 20.0));
        assert_eq!(levels.resistance_1, Some(2.0 * p - 90.0));
        assert_eq!(levels.resistance_2, Some(p + 20.0));
    }

    #[test]
    fn support_resistance_bracket_pivot() {
        // For any bar with high >= low: S2 <= S1 <= P <= R1 <= R2.
        let bars = vec![bar(1, 50.0, 55.5, 48.25, 51.0)];
        let l = compute_levels(&bars);
        let p = l.pivot_point.unwrap();
        assert!(l.support_2.unwrap() <= l.support_1.unwrap());
        assert!(l.support_1.unwrap() <= p);
        assert!(p <= l.resistance_1.unwrap());
        assert!(l.resistance_1.unwrap() <= l.resistance_2.unwrap());
    }

    #[test]
    fn recent_range_unavailable_below_policy_minimum() {
        let bars: Vec<DailyBar> = (1..=4).map(|d| bar(d, 10.0, 11.0, 9.0, 10.5)).collect();
        let levels = compute_levels(&bars);

        // Pivot levels still present from the most recent bar.
        assert!(levels.pivot_point.is_some());
        assert!(levels.recent_support.is_none());
        assert!(levels.recent_resistance.is_none());
    }

    #[test]
    fn recent_range_scans_trailing_twenty_bars() {
        // 25 bars; the extreme high/low sit inside the last 20 only.
        let mut bars: Vec<DailyBar> = (1..=25)
            .map(|d| bar(d, 10.0, 11.0 + d as f64 * 0.01, 9.0 - d as f64 * 0.01, 10.5))
            .collect();
        // Bar 3 is outside the trailing window; give it wild extremes.
        bars[2].high = 500.0;
        bars[2].low = 0.5;

        let levels = compute_levels(&bars);
        assert!(levels.recent_resistance.unwrap() < 500.0);
        assert!(levels.recent_support.unwrap() > 0.5);
    }

    #[test]
    fn empty_input_yields_all_unavailable() {
        let levels = compute_levels(&[]);
        assert_eq!(levels, TechnicalLevels::default());
    }

    #[test]
    fn idempotent_on_identical_input() {
        let bars: Vec<DailyBar> = (1..=10).map(|d| bar(d, 20.0, 22.0, 19.0, 21.0)).collect();
        assert_eq!(compute_levels(&bars), compute_levels(&bars));
    }
}
