// Predicate over joined review records

use crate::models::JoinedRecord;
use std::collections::BTreeSet;

const DECK_SEPARATOR: &str = "::";

/// Which records an export keeps
///
/// Empty sets mean "no restriction". Bounds are inclusive. Built once with
/// the `with_*` methods and not changed afterwards. Matching on decks, card
/// types and tags ignores case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    earliest_ms: Option<i64>,
    latest_ms: Option<i64>,
    decks: BTreeSet<String>,
    card_types: BTreeSet<String>,
    tags: BTreeSet<String>,
    min_interval_days: Option<i64>,
}

fn normalized<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_range(mut self, earliest_ms: Option<i64>, latest_ms: Option<i64>) -> Self {
        self.earliest_ms = earliest_ms;
        self.latest_ms = latest_ms;
        self
    }

    /// Keep reviews from these decks and their subdecks
    pub fn with_decks<I, S>(mut self, decks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.decks = normalized(decks);
        self
    }

    pub fn with_card_types<I, S>(mut self, card_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.card_types = normalized(card_types);
        self
    }

    /// Keep reviews whose note carries at least one of these tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalized(tags);
        self
    }

    /// Keep reviews whose resulting interval is at least this many days
    pub fn with_min_interval(mut self, days: Option<i64>) -> Self {
        self.min_interval_days = days;
        self
    }

    pub fn earliest_ms(&self) -> Option<i64> {
        self.earliest_ms
    }

    pub fn latest_ms(&self) -> Option<i64> {
        self.latest_ms
    }

    /// Bounds that can never match anything
    pub fn is_empty_range(&self) -> bool {
        matches!((self.earliest_ms, self.latest_ms), (Some(from), Some(to)) if from > to)
    }

    /// Where an ordered sweep can start without missing a match
    pub fn lower_bound(&self) -> Option<i64> {
        self.earliest_ms
    }

    /// True once a timestamp-ordered sweep can stop
    pub fn is_past_upper_bound(&self, timestamp_ms: i64) -> bool {
        self.latest_ms.is_some_and(|to| timestamp_ms > to)
    }

    pub fn accepts(&self, record: &JoinedRecord) -> bool {
        accepts(record, self)
    }

    fn accepts_time(&self, timestamp_ms: i64) -> bool {
        self.earliest_ms.is_none_or(|from| timestamp_ms >= from) && self.latest_ms.is_none_or(|to| timestamp_ms <= to)
    }

    fn accepts_deck(&self, deck_name: &str) -> bool {
        if self.decks.is_empty() {
            return true;
        }
        let deck_name = deck_name.to_lowercase();
        self.decks.iter().any(|selector| {
            deck_name == *selector
                || deck_name
                    .strip_prefix(selector.as_str())
                    .is_some_and(|rest| rest.starts_with(DECK_SEPARATOR))
        })
    }

    fn accepts_card_type(&self, card_type: &str) -> bool {
        self.card_types.is_empty() || self.card_types.contains(&card_type.to_lowercase())
    }

    fn accepts_tags(&self, note_tags: &[String]) -> bool {
        self.tags.is_empty() || note_tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Pure predicate: does `record` pass every restriction in `spec`
pub fn accepts(record: &JoinedRecord, spec: &FilterSpec) -> bool {
    spec.accepts_time(record.event.timestamp_ms())
        && spec.accepts_deck(&record.deck.name)
        && spec.accepts_card_type(&record.card_type)
        && spec.accepts_tags(&record.note.tags)
        && spec
            .min_interval_days
            .is_none_or(|min| record.event.interval.days() >= min as f64)
}
