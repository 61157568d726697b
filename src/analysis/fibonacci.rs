//! Fibonacci retracement levels and the derived risk prices.

use crate::analysis::AnalysisError;
use crate::models::{DailyBar, FibonacciLevels};

/// Retracement levels for a downtrend interpretation of the swing:
/// `level = swing_high − (swing_high − swing_low) × ratio`.
///
/// Fails with [`AnalysisError::InvalidRange`] when the swing is inverted —
/// that points at a bug in the upstream swing detection, not at bad market
/// data, so it is surfaced rather than masked.
pub fn compute_fibonacci(
    swing_high: f64,
    swing_low: f64,
) -> Result<FibonacciLevels, AnalysisError> {
    if swing_high < swing_low {
        return Err(AnalysisError::InvalidRange {
            high: swing_high,
            low: swing_low,
        });
    }

    let range = swing_high - swing_low;
    let level = |ratio: f64| swing_high - range * ratio;

    Ok(FibonacciLevels {
        swing_high,
        swing_low,
        level_23_6: level(0.236),
        level_38_2: level(0.382),
        level_50_0: level(0.500),
        level_61_8: level(0.618),
    })
}

/// Stop-loss 2% below the tighter of the two supports.
pub fn stop_loss(support: f64, level_38_2: f64) -> f64 {
    support.min(level_38_2) * 0.98
}

/// Target at the more optimistic of the two resistances.
pub fn target(resistance: f64, level_50_0: f64) -> f64 {
    resistance.max(level_50_0)
}

/// Swing extremes over the trailing window: highest high and lowest low.
/// Returns `None` when there are no bars to scan.
pub fn detect_swing(bars: &[DailyBar]) -> Option<(f64, f64)> {
    let high = bars.iter().map(|b| b.high).max_by(f64::total_cmp)?;
    let low = bars.iter().map(|b| b.low).min_by(f64::total_cmp)?;
    Some((high, low))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(a: f64, b: f64) {
        assert!((a - b).abs() < 0.01, "{a} !~ {b}");
    }

    #[test]
    fn documented_retracement_case() {
        // Swing 182.00 / 121.00, as recorded in the project notes for QCOM.
        let fib = compute_fibonacci(182.00, 121.00).unwrap();
        close_to(fib.level_38_2, 158.70);
        close_to(fib.level_50_0, 151.50);
        close_to(fib.level_61_8, 144.30);
    }

    #[test]
    fn documented_risk_levels() {
        let fib = compute_fibonacci(182.00, 121.00).unwrap();
        close_to(stop_loss(163.00, fib.level_38_2), 155.53);
        close_to(target(178.00, fib.level_50_0), 178.00);
    }

    #[test]
    fn levels_stay_inside_swing_and_descend() {
        let fib = compute_fibonacci(90.0, 60.0).unwrap();
        for level in [fib.level_23_6, fib.level_38_2, fib.level_50_0, fib.level_61_8] {
            assert!(level >= fib.swing_low && level <= fib.swing_high);
        }
        assert!(fib.level_23_6 >= fib.level_38_2);
        assert!(fib.level_38_2 >= fib.level_50_0);
        assert!(fib.level_50_0 >= fib.level_61_8);
    }

    #[test]
    fn inverted_swing_is_rejected() {
        let err = compute_fibonacci(100.0, 150.0).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidRange {
                high: 100.0,
                low: 150.0
            }
        );
    }

    #[test]
    fn degenerate_swing_collapses_to_a_point() {
        let fib = compute_fibonacci(42.0, 42.0).unwrap();
        assert_eq!(fib.level_23_6, 42.0);
        assert_eq!(fib.level_61_8, 42.0);
    }
}
