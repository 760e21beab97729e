//! Aggregate evolution engine.
//!
//! # Responsibility
//! - Compute trend and depth-transition effects of a proposed core level.
//! - Stay pure and deterministic: the caller supplies the proposed level and
//!   the clock; nothing here touches storage, network or randomness.
//!
//! # Invariants
//! - Levels are clamped to [0.0, 1.0] before any comparison.
//! - Trend uses the `TREND_EPSILON` band so float noise never flips it.
//! - A depth transition is reported iff the band index changes.

use crate::model::core::Trend;

/// Dead band around zero delta; within it the trend is `Stable`.
pub const TREND_EPSILON: f64 = 0.001;

/// Level thresholds that partition [0.0, 1.0] into depth bands.
///
/// Crossing any of these in either direction is a depth transition and is
/// logged as an audit event. Quartiles by default; tunable in one place.
pub const DEPTH_BOUNDARIES: [f64; 3] = [0.25, 0.5, 0.75];

/// Depth-band crossing detected by [`evolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTransition {
    pub from_depth: u8,
    pub to_depth: u8,
}

/// Result of evolving one core level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evolution {
    /// The pre-evolution level, persisted as `previous_level`.
    pub previous_level: f64,
    /// The clamped proposed level, persisted as `current_level`.
    pub current_level: f64,
    pub trend: Trend,
    pub transition: Option<DepthTransition>,
    /// Clock value to persist as `last_updated`.
    pub updated_at: i64,
}

/// Clamps a level into [0.0, 1.0]. Non-finite input collapses to 0.0.
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 1.0)
}

/// Classifies the trend between two consecutive levels.
///
/// `delta > +EPSILON` is rising, `delta < -EPSILON` is declining, anything
/// inside the band (boundary values included) is stable.
pub fn classify_trend(previous_level: f64, current_level: f64) -> Trend {
    let delta = clamp_level(current_level) - clamp_level(previous_level);
    if delta > TREND_EPSILON {
        Trend::Rising
    } else if delta < -TREND_EPSILON {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Returns the depth band index for a level: the count of boundaries at or
/// below it, so 0.0..0.25 is band 0 and 0.75..=1.0 is band 3.
pub fn depth_band(level: f64) -> u8 {
    let level = clamp_level(level);
    DEPTH_BOUNDARIES
        .iter()
        .filter(|boundary| level >= **boundary)
        .count() as u8
}

/// Evolves one core from its stored level to a proposed level.
///
/// Pure: same inputs always yield the same output. The storage layer persists
/// the result inside the same transaction as the journal write that supplied
/// the proposed level.
pub fn evolve(current_level: f64, proposed_level: f64, now_ms: i64) -> Evolution {
    let previous_level = clamp_level(current_level);
    let new_level = clamp_level(proposed_level);
    let from_depth = depth_band(previous_level);
    let to_depth = depth_band(new_level);

    Evolution {
        previous_level,
        current_level: new_level,
        trend: classify_trend(previous_level, new_level),
        transition: (from_depth != to_depth).then_some(DepthTransition {
            from_depth,
            to_depth,
        }),
        updated_at: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_level, classify_trend, depth_band, evolve, TREND_EPSILON};
    use crate::model::core::Trend;

    #[test]
    fn trend_respects_epsilon_boundaries() {
        assert_eq!(classify_trend(0.5, 0.5), Trend::Stable);
        assert_eq!(classify_trend(0.5, 0.5 + TREND_EPSILON), Trend::Stable);
        assert_eq!(classify_trend(0.5, 0.5 - TREND_EPSILON), Trend::Stable);
        assert_eq!(classify_trend(0.5, 0.5 + TREND_EPSILON * 2.0), Trend::Rising);
        assert_eq!(
            classify_trend(0.5, 0.5 - TREND_EPSILON * 2.0),
            Trend::Declining
        );
    }

    #[test]
    fn trend_rising_for_small_gain() {
        assert_eq!(classify_trend(0.58, 0.62), Trend::Rising);
    }

    #[test]
    fn clamp_bounds_and_nan() {
        assert_eq!(clamp_level(-0.3), 0.0);
        assert_eq!(clamp_level(1.7), 1.0);
        assert_eq!(clamp_level(f64::NAN), 0.0);
        assert_eq!(clamp_level(0.42), 0.42);
    }

    #[test]
    fn depth_bands_are_quartiles() {
        assert_eq!(depth_band(0.0), 0);
        assert_eq!(depth_band(0.24), 0);
        assert_eq!(depth_band(0.25), 1);
        assert_eq!(depth_band(0.5), 2);
        assert_eq!(depth_band(0.74), 2);
        assert_eq!(depth_band(0.75), 3);
        assert_eq!(depth_band(1.0), 3);
    }

    #[test]
    fn evolve_reports_transition_only_on_band_change() {
        let same_band = evolve(0.30, 0.35, 1);
        assert_eq!(same_band.transition, None);
        assert_eq!(same_band.trend, Trend::Rising);

        let crossed = evolve(0.48, 0.52, 2);
        let transition = crossed.transition.expect("band boundary was crossed");
        assert_eq!(transition.from_depth, 1);
        assert_eq!(transition.to_depth, 2);

        let dropped = evolve(0.52, 0.20, 3);
        let transition = dropped.transition.expect("two bands down");
        assert_eq!(transition.from_depth, 2);
        assert_eq!(transition.to_depth, 0);
    }

    #[test]
    fn evolve_clamps_proposed_level_before_everything_else() {
        let result = evolve(0.9, 1.4, 7);
        assert_eq!(result.current_level, 1.0);
        assert_eq!(result.previous_level, 0.9);
        assert_eq!(result.trend, Trend::Rising);
        assert_eq!(result.updated_at, 7);
    }

    #[test]
    fn evolve_is_deterministic() {
        assert_eq!(evolve(0.33, 0.41, 99), evolve(0.33, 0.41, 99));
    }
}
