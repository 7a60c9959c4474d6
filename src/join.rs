// Resolve each review event's card, note, and deck

use crate::error::Result;
use crate::models::{Deck, JoinedRecord, ReviewEvent};
use crate::store::Store;
use serde::Serialize;
use tracing::debug;

/// Why a review event produced no output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DanglingCard,
    DanglingNote,
    DanglingDeck,
    /// Field content that cannot be encoded as JSON text
    Unencodable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DanglingCard => write!(f, "dangling card"),
            SkipReason::DanglingNote => write!(f, "dangling note"),
            SkipReason::DanglingDeck => write!(f, "dangling deck"),
            SkipReason::Unencodable => write!(f, "unencodable"),
        }
    }
}

/// Per-reason skip tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub dangling_card: u64,
    pub dangling_note: u64,
    pub dangling_deck: u64,
    pub unencodable: u64,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::DanglingCard => self.dangling_card += 1,
            SkipReason::DanglingNote => self.dangling_note += 1,
            SkipReason::DanglingDeck => self.dangling_deck += 1,
            SkipReason::Unencodable => self.unencodable += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.dangling_card + self.dangling_note + self.dangling_deck + self.unencodable
    }
}

/// Outcome of joining one event
#[derive(Debug, Clone, PartialEq)]
pub enum Joined {
    Record(Box<JoinedRecord>),
    Skipped(SkipReason),
}

/// Join a review event with its card, note, and deck
///
/// Note fields are read as they are now. The store keeps no history of
/// field edits, so an edited note exports its edited text for old reviews.
pub fn join(event: ReviewEvent, store: &Store) -> Result<Joined> {
    let Some(card) = store.lookup_card(event.card_id)? else {
        debug!(event_id = event.id, card_id = event.card_id, "Skipping review: card no longer exists");
        return Ok(Joined::Skipped(SkipReason::DanglingCard));
    };

    let Some(note_row) = store.lookup_note(card.note_id)? else {
        debug!(event_id = event.id, note_id = card.note_id, "Skipping review: note no longer exists");
        return Ok(Joined::Skipped(SkipReason::DanglingNote));
    };

    let deck_id = card.home_deck_id();
    let Some(deck_name) = store.lookup_deck_name(deck_id)? else {
        debug!(event_id = event.id, deck_id, "Skipping review: deck no longer exists");
        return Ok(Joined::Skipped(SkipReason::DanglingDeck));
    };

    let field_names = store.field_names(note_row.notetype_id)?;
    let note = match note_row.into_note(&field_names) {
        Ok(note) => note,
        Err(e) => {
            debug!(event_id = event.id, error = %e, "Skipping review: note fields are not valid UTF-8");
            return Ok(Joined::Skipped(SkipReason::Unencodable));
        }
    };

    let card_type = card_type_name(&store.template_names(note.notetype_id)?, card.template_ord);

    Ok(Joined::Record(Box::new(JoinedRecord {
        event,
        card,
        note,
        deck: Deck {
            id: deck_id,
            name: deck_name,
        },
        card_type,
    })))
}

/// Template name for a card ordinal
///
/// Cloze note types have one template shared by every ordinal.
fn card_type_name(templates: &[(i64, String)], ord: i64) -> String {
    if let Some((_, name)) = templates.iter().find(|(t_ord, _)| *t_ord == ord) {
        return name.clone();
    }
    match templates {
        [(_, only)] => only.clone(),
        _ => format!("Card {}", ord + 1),
    }
}
