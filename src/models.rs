// Data models for the review-history export

use serde::{Deserialize, Serialize, Serializer};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Answer button pressed for a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    /// Decode the revlog `ease` column (1-4). Zero marks a manual reschedule.
    pub fn from_ease(ease: i64) -> Option<Self> {
        match ease {
            1 => Some(Grade::Again),
            2 => Some(Grade::Hard),
            3 => Some(Grade::Good),
            4 => Some(Grade::Easy),
            _ => None,
        }
    }
}

/// Scheduling phase the card was in when reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Learning,
    Review,
    Relearning,
    Filtered,
}

impl ReviewType {
    /// Decode the revlog `type` column. Codes 4+ are manual or rescheduled entries.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReviewType::Learning),
            1 => Some(ReviewType::Review),
            2 => Some(ReviewType::Relearning),
            3 => Some(ReviewType::Filtered),
            _ => None,
        }
    }
}

/// Interval as stored in the revlog: days when positive, seconds when negative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval(pub i64);

impl Interval {
    pub fn days(self) -> f64 {
        if self.0 >= 0 {
            self.0 as f64
        } else {
            -(self.0 as f64) / SECONDS_PER_DAY
        }
    }

    /// True when the interval is a sub-day learning step
    pub fn is_learning_step(self) -> bool {
        self.0 < 0
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_learning_step() {
            serializer.serialize_f64(self.days())
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

/// One grading action from the review log
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewEvent {
    /// Revlog primary key; also the review time in epoch milliseconds
    pub id: i64,
    pub card_id: i64,
    pub grade: Grade,
    pub interval: Interval,
    pub prior_interval: Interval,
    /// Ease factor in permille; 0 when the scheduler did not record one
    pub ease_factor: i64,
    pub elapsed_ms: i64,
    pub review_type: ReviewType,
}

impl ReviewEvent {
    pub fn timestamp_ms(&self) -> i64 {
        self.id
    }
}

/// Snapshot of a card's current scheduling state
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: i64,
    pub note_id: i64,
    /// Deck the card currently sits in (may be a filtered deck)
    pub deck_id: i64,
    /// Home deck when the card is borrowed by a filtered deck
    pub original_deck_id: Option<i64>,
    /// Template ordinal within the note type
    pub template_ord: i64,
    pub due: i64,
    pub interval_days: i64,
    pub lapses: i64,
}

impl Card {
    /// Deck the card belongs to outside of any filtered deck
    pub fn home_deck_id(&self) -> i64 {
        self.original_deck_id.unwrap_or(self.deck_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

/// Note content as it is now, not as it was at review time
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: i64,
    pub notetype_id: i64,
    /// Lowercased tags
    pub tags: Vec<String>,
    pub fields: Vec<NoteField>,
}

impl Note {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub id: i64,
    /// Full hierarchical name, components joined with `::`
    pub name: String,
}

/// A review event denormalized with its card, note, and deck
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub event: ReviewEvent,
    pub card: Card,
    pub note: Note,
    pub deck: Deck,
    /// Name of the card template that produced the card
    pub card_type: String,
}
