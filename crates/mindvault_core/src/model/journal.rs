//! Journal entry domain model.
//!
//! # Responsibility
//! - Define the canonical journal record persisted by the store.
//! - Validate caller-supplied records against a closed mood vocabulary.
//!
//! # Invariants
//! - `id` is stable and never reused for another entry.
//! - `content` is non-empty and capped at `MAX_CONTENT_CHARS`.
//! - `moods` holds at least one tag from the closed vocabulary.
//! - `updated_at` is never earlier than `created_at`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Maximum journal content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 20_000;

/// Stable identifier for a journal entry.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntryId = Uuid;

/// Closed mood vocabulary for journal entries.
///
/// Upstream callers pick from this fixed set; free-form mood strings are
/// rejected at validation time rather than silently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodTag {
    Joyful,
    Grateful,
    Calm,
    Reflective,
    Resilient,
    Hopeful,
    Inspired,
    Content,
    Anxious,
    Sad,
    Angry,
    Tired,
}

impl MoodTag {
    /// Stable string form used in storage and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Joyful => "joyful",
            Self::Grateful => "grateful",
            Self::Calm => "calm",
            Self::Reflective => "reflective",
            Self::Resilient => "resilient",
            Self::Hopeful => "hopeful",
            Self::Inspired => "inspired",
            Self::Content => "content",
            Self::Anxious => "anxious",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Tired => "tired",
        }
    }

    /// Parses the stable string form. Returns `None` for unknown tags.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "joyful" => Some(Self::Joyful),
            "grateful" => Some(Self::Grateful),
            "calm" => Some(Self::Calm),
            "reflective" => Some(Self::Reflective),
            "resilient" => Some(Self::Resilient),
            "hopeful" => Some(Self::Hopeful),
            "inspired" => Some(Self::Inspired),
            "content" => Some(Self::Content),
            "anxious" => Some(Self::Anxious),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            "tired" => Some(Self::Tired),
            _ => None,
        }
    }
}

impl Display for MoodTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Editable, not yet committed by the user.
    Draft,
    /// Committed entry; the normal resting state.
    Finalized,
    /// Kept for history but hidden from default views.
    Archived,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "finalized" => Some(Self::Finalized),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Validation failure for caller-supplied journal records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalValidationError {
    /// Content is empty or whitespace-only.
    EmptyContent,
    /// Content exceeds `MAX_CONTENT_CHARS`.
    ContentTooLong { chars: usize, max: usize },
    /// Mood set is empty.
    NoMoods,
    /// Mood string outside the closed vocabulary (pre-parse inputs).
    UnknownMood(String),
    /// `updated_at` is earlier than `created_at`.
    TimestampOrder { created_at: i64, updated_at: i64 },
    /// Entry date is not `YYYY-MM-DD`.
    InvalidDate(String),
}

impl Display for JournalValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "journal content must not be empty"),
            Self::ContentTooLong { chars, max } => {
                write!(f, "journal content has {chars} chars, max is {max}")
            }
            Self::NoMoods => write!(f, "journal entry requires at least one mood tag"),
            Self::UnknownMood(value) => write!(f, "unknown mood tag `{value}`"),
            Self::TimestampOrder {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at {updated_at} precedes created_at {created_at}"
            ),
            Self::InvalidDate(value) => write!(f, "invalid entry date `{value}`, want YYYY-MM-DD"),
        }
    }
}

impl Error for JournalValidationError {}

/// Canonical journal record.
///
/// The store receives fully-formed records from the host application and owns
/// their on-disk representation; callers always get owned copies back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Stable global ID used for linking and transition-history references.
    pub id: EntryId,
    /// Owning user. The store is single-user but keeps the column for exports.
    pub user_id: String,
    /// Calendar date of the entry, `YYYY-MM-DD`.
    pub entry_date: String,
    /// Free-text body.
    pub content: String,
    /// At least one tag from the closed vocabulary.
    pub moods: Vec<MoodTag>,
    /// Display label, e.g. `Monday`. Derived upstream, stored verbatim.
    pub day_of_week: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Never earlier than `created_at`.
    pub updated_at: i64,
    /// Whether an external sync target has seen this revision.
    pub is_synced: bool,
    /// Open key/value map for caller annotations.
    pub metadata: BTreeMap<String, String>,
    /// Crash-recovery buffer for unsaved edits.
    pub draft_content: Option<String>,
    /// Lifecycle state.
    pub status: EntryStatus,
}

impl JournalRecord {
    /// Creates a new record with a generated id and caller clock.
    ///
    /// # Invariants
    /// - `created_at == updated_at` at creation.
    /// - `status` starts as `Finalized`; draft flows set it explicitly.
    pub fn new(
        user_id: impl Into<String>,
        entry_date: impl Into<String>,
        content: impl Into<String>,
        moods: Vec<MoodTag>,
        day_of_week: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            entry_date: entry_date.into(),
            content: content.into(),
            moods,
            day_of_week: day_of_week.into(),
            created_at: now_ms,
            updated_at: now_ms,
            is_synced: false,
            metadata: BTreeMap::new(),
            draft_content: None,
            status: EntryStatus::Finalized,
        }
    }

    /// Checks record-level invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant; write paths must call this before
    /// any SQL mutation so that rejected records leave no trace in storage.
    pub fn validate(&self) -> Result<(), JournalValidationError> {
        if self.content.trim().is_empty() {
            return Err(JournalValidationError::EmptyContent);
        }
        let chars = self.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(JournalValidationError::ContentTooLong {
                chars,
                max: MAX_CONTENT_CHARS,
            });
        }
        if self.moods.is_empty() {
            return Err(JournalValidationError::NoMoods);
        }
        if self.updated_at < self.created_at {
            return Err(JournalValidationError::TimestampOrder {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        if !is_iso_date(&self.entry_date) {
            return Err(JournalValidationError::InvalidDate(self.entry_date.clone()));
        }
        Ok(())
    }
}

/// Checks the `YYYY-MM-DD` shape without pulling in a calendar dependency.
fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits_ok = |range: std::ops::Range<usize>| {
        bytes[range].iter().all(|b| b.is_ascii_digit())
    };
    if !(digits_ok(0..4) && digits_ok(5..7) && digits_ok(8..10)) {
        return false;
    }
    let month: u32 = value[5..7].parse().unwrap_or(0);
    let day: u32 = value[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::{is_iso_date, EntryStatus, JournalRecord, JournalValidationError, MoodTag};

    fn sample() -> JournalRecord {
        JournalRecord::new(
            "user-1",
            "2025-03-14",
            "Today was hard but I grew from it",
            vec![MoodTag::Reflective, MoodTag::Resilient],
            "Friday",
            1_700_000_000_000,
        )
    }

    #[test]
    fn new_record_validates() {
        let record = sample();
        assert!(record.validate().is_ok());
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.status, EntryStatus::Finalized);
    }

    #[test]
    fn empty_content_is_rejected() {
        let mut record = sample();
        record.content = "   ".to_string();
        assert_eq!(
            record.validate(),
            Err(JournalValidationError::EmptyContent)
        );
    }

    #[test]
    fn oversize_content_is_rejected() {
        let mut record = sample();
        record.content = "x".repeat(super::MAX_CONTENT_CHARS + 1);
        assert!(matches!(
            record.validate(),
            Err(JournalValidationError::ContentTooLong { .. })
        ));
    }

    #[test]
    fn empty_mood_set_is_rejected() {
        let mut record = sample();
        record.moods.clear();
        assert_eq!(record.validate(), Err(JournalValidationError::NoMoods));
    }

    #[test]
    fn updated_before_created_is_rejected() {
        let mut record = sample();
        record.updated_at = record.created_at - 1;
        assert!(matches!(
            record.validate(),
            Err(JournalValidationError::TimestampOrder { .. })
        ));
    }

    #[test]
    fn mood_tags_round_trip_through_string_form() {
        for tag in [MoodTag::Reflective, MoodTag::Resilient, MoodTag::Angry] {
            assert_eq!(MoodTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(MoodTag::parse("euphoric"), None);
    }

    #[test]
    fn iso_date_shape_is_checked() {
        assert!(is_iso_date("2025-12-31"));
        assert!(!is_iso_date("2025-13-01"));
        assert!(!is_iso_date("2025/12/31"));
        assert!(!is_iso_date("25-12-31"));
    }
}
