//! Aggregate personality-core domain model.
//!
//! # Responsibility
//! - Define the fixed six-member core enumeration and its record shape.
//! - Define the trend classification and transition audit event types.
//!
//! # Invariants
//! - `current_level` and `previous_level` stay within [0.0, 1.0].
//! - `trend` is always derivable from (previous_level, current_level).
//! - `related_cores` never contains the core's own id.

use crate::model::journal::EntryId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Closed enumeration of the six aggregate cores.
///
/// These are seeded exactly once at first store initialization and are never
/// deleted individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreId {
    Resilience,
    Curiosity,
    Empathy,
    Discipline,
    Creativity,
    Authenticity,
}

/// All cores in stable id order, used for seeding and full listings.
pub const ALL_CORES: [CoreId; 6] = [
    CoreId::Resilience,
    CoreId::Curiosity,
    CoreId::Empathy,
    CoreId::Discipline,
    CoreId::Creativity,
    CoreId::Authenticity,
];

impl CoreId {
    /// Stable string id used in storage and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resilience => "resilience",
            Self::Curiosity => "curiosity",
            Self::Empathy => "empathy",
            Self::Discipline => "discipline",
            Self::Creativity => "creativity",
            Self::Authenticity => "authenticity",
        }
    }

    /// Parses the stable string id. Returns `None` for unknown ids.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resilience" => Some(Self::Resilience),
            "curiosity" => Some(Self::Curiosity),
            "empathy" => Some(Self::Empathy),
            "discipline" => Some(Self::Discipline),
            "creativity" => Some(Self::Creativity),
            "authenticity" => Some(Self::Authenticity),
            _ => None,
        }
    }

    /// Human-facing display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Resilience => "Resilience",
            Self::Curiosity => "Curiosity",
            Self::Empathy => "Empathy",
            Self::Discipline => "Discipline",
            Self::Creativity => "Creativity",
            Self::Authenticity => "Authenticity",
        }
    }
}

impl Display for CoreId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rising/stable/declining classification between two consecutive levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rising" => Some(Self::Rising),
            "stable" => Some(Self::Stable),
            "declining" => Some(Self::Declining),
            _ => None,
        }
    }
}

/// One aggregate personality-trend record.
///
/// Only the level, trend, timestamp and evidence fields mutate after seeding,
/// and always inside the same transaction as the journal write that caused
/// the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCoreRecord {
    pub id: CoreId,
    pub name: String,
    pub description: String,
    /// Current level, clamped to [0.0, 1.0].
    pub current_level: f64,
    /// Level before the most recent evolution, clamped to [0.0, 1.0].
    pub previous_level: f64,
    /// Unix epoch milliseconds of the last evolution.
    pub last_updated: i64,
    /// Unix epoch milliseconds of the last depth transition, if any.
    pub last_transition_date: Option<i64>,
    /// Contributing entries since the last depth transition.
    pub entries_at_current_depth: u32,
    pub trend: Trend,
    /// Display color, `#rrggbb`.
    pub color: String,
    pub icon_path: String,
    /// Free-text insight produced by the external analysis step.
    pub insight: String,
    /// Related core ids; never contains `id` itself.
    pub related_cores: Vec<CoreId>,
    pub transition_signals: Option<String>,
    pub supporting_evidence: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Audit record of one depth-level transition.
///
/// Append-only; removed only by full wipe. `contributing_entry_id` is cleared
/// (not cascaded) when its source journal entry is deleted, so transition
/// history survives deletion of the entry that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTransitionEvent {
    /// Storage-assigned row id. Zero for not-yet-persisted events.
    pub id: i64,
    pub core_id: CoreId,
    /// Depth band index before the transition.
    pub from_depth: u8,
    /// Depth band index after the transition.
    pub to_depth: u8,
    /// Unix epoch milliseconds.
    pub transition_date: i64,
    pub contributing_entry_id: Option<EntryId>,
    pub transition_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{CoreId, Trend, ALL_CORES};

    #[test]
    fn core_ids_round_trip_through_string_form() {
        for core in ALL_CORES {
            assert_eq!(CoreId::parse(core.as_str()), Some(core));
        }
        assert_eq!(CoreId::parse("wisdom"), None);
    }

    #[test]
    fn all_cores_has_no_duplicates() {
        let mut ids: Vec<&str> = ALL_CORES.iter().map(|c| c.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ALL_CORES.len());
    }

    #[test]
    fn trend_round_trips_through_string_form() {
        for trend in [Trend::Rising, Trend::Stable, Trend::Declining] {
            assert_eq!(Trend::parse(trend.as_str()), Some(trend));
        }
    }
}
