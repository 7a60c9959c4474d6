// Read-only access to an Anki collection file

use crate::error::{ExportError, Result};
use crate::models::{Card, Grade, Interval, Note, NoteField, ReviewEvent, ReviewType};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const REVIEW_BATCH_SIZE: usize = 512;
const FIELD_SEPARATOR: char = '\x1f';
const STORED_DECK_SEPARATOR: char = '\x1f';
const DECK_SEPARATOR: &str = "::";
const REQUIRED_TABLES: [&str; 3] = ["revlog", "cards", "notes"];
const MODERN_CATALOG_TABLES: [&str; 4] = ["decks", "notetypes", "fields", "templates"];

/// Which layout the collection keeps deck and note-type metadata in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Dedicated `decks`/`notetypes`/`fields`/`templates` tables
    Modern,
    /// JSON blobs in the `col` table
    Legacy,
}

/// Row counts reported by `check`
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub schema: SchemaKind,
    pub review_entries: i64,
    pub cards: i64,
    pub notes: i64,
    pub decks: i64,
}

/// Raw note row; field text is decoded by the joiner
#[derive(Debug, Clone)]
pub struct NoteRow {
    pub id: i64,
    pub notetype_id: i64,
    pub tags: String,
    pub fields: Vec<u8>,
}

impl NoteRow {
    /// Split and name the fields. Fails when the stored text is not UTF-8.
    pub fn into_note(self, field_names: &[String]) -> std::result::Result<Note, std::string::FromUtf8Error> {
        let text = String::from_utf8(self.fields)?;
        let fields = if text.is_empty() {
            Vec::new()
        } else {
            text.split(FIELD_SEPARATOR)
                .enumerate()
                .map(|(i, value)| NoteField {
                    name: field_names.get(i).cloned().unwrap_or_else(|| format!("field_{}", i)),
                    value: value.to_string(),
                })
                .collect()
        };

        let tags = self.tags.split_whitespace().map(|t| t.to_lowercase()).collect();

        Ok(Note {
            id: self.id,
            notetype_id: self.notetype_id,
            tags,
            fields,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LegacyDeck {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LegacyOrdName {
    name: String,
    #[serde(default)]
    ord: i64,
}

#[derive(Debug, Deserialize)]
struct LegacyNotetype {
    #[serde(default)]
    flds: Vec<LegacyOrdName>,
    #[serde(default)]
    tmpls: Vec<LegacyOrdName>,
}

#[derive(Debug, Default)]
struct LegacyCatalog {
    decks: HashMap<i64, String>,
    notetypes: HashMap<i64, LegacyNotetype>,
}

enum Catalog {
    Modern,
    Legacy(LegacyCatalog),
}

/// Read-only handle on a collection
///
/// The connection is opened with `SQLITE_OPEN_READ_ONLY` and `query_only`,
/// and never waits on a lock held by the host application.
pub struct Store {
    path: PathBuf,
    db: Connection,
    catalog: Catalog,
}

impl Store {
    /// Open a collection for reading
    ///
    /// Fails with `StoreUnavailable` when the file is missing, `StoreLocked`
    /// when another process holds a conflicting lock, and `StoreCorrupt` when
    /// the file is not a readable collection.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let metadata = fs::metadata(&path).map_err(|e| ExportError::StoreUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(ExportError::StoreUnavailable {
                path,
                reason: "not a regular file".to_string(),
            });
        }

        let db = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ExportError::from_sqlite(&path, e))?;

        // Fail fast instead of waiting on the host application's lock
        db.busy_timeout(Duration::ZERO)
            .map_err(|e| ExportError::from_sqlite(&path, e))?;
        db.pragma_update(None, "query_only", true)
            .map_err(|e| ExportError::from_sqlite(&path, e))?;

        // First real read; this is where a held lock or a non-database file shows up
        db.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| ExportError::from_sqlite(&path, e))?;

        Self::check_integrity(&db, &path)?;
        let catalog = Self::load_catalog(&db, &path)?;

        let store = Self { path, db, catalog };
        info!(path = ?store.path, schema = ?store.schema(), "Opened collection read-only");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> SchemaKind {
        match self.catalog {
            Catalog::Modern => SchemaKind::Modern,
            Catalog::Legacy(_) => SchemaKind::Legacy,
        }
    }

    fn check_integrity(db: &Connection, path: &Path) -> Result<()> {
        let mut stmt = db
            .prepare("PRAGMA quick_check")
            .map_err(|e| ExportError::from_sqlite(path, e))?;
        let problems: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ExportError::from_sqlite(path, e))?
            .collect::<rusqlite::Result<_>>()
            .map_err(|e| ExportError::from_sqlite(path, e))?;

        match problems.as_slice() {
            [only] if only == "ok" => Ok(()),
            _ => Err(ExportError::StoreCorrupt {
                path: path.to_path_buf(),
                reason: format!("integrity check failed: {}", problems.join("; ")),
            }),
        }
    }

    fn load_catalog(db: &Connection, path: &Path) -> Result<Catalog> {
        let corrupt = |reason: String| ExportError::StoreCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let tables: HashSet<String> = {
            let mut stmt = db
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
                .map_err(|e| ExportError::from_sqlite(path, e))?;
            stmt.query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| ExportError::from_sqlite(path, e))?
                .collect::<rusqlite::Result<_>>()
                .map_err(|e| ExportError::from_sqlite(path, e))?
        };

        if let Some(missing) = REQUIRED_TABLES.iter().find(|t| !tables.contains(**t)) {
            return Err(corrupt(format!("not a collection: missing table '{}'", missing)));
        }

        if MODERN_CATALOG_TABLES.iter().all(|t| tables.contains(*t)) {
            return Ok(Catalog::Modern);
        }

        if !tables.contains("col") {
            return Err(corrupt("not a collection: no deck catalog".to_string()));
        }

        debug!("Loading legacy deck and note type catalog");
        let (decks_json, models_json): (String, String) = db
            .query_row("SELECT decks, models FROM col LIMIT 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()
            .map_err(|e| ExportError::from_sqlite(path, e))?
            .ok_or_else(|| corrupt("collection metadata row is missing".to_string()))?;

        let raw_decks: HashMap<String, LegacyDeck> =
            serde_json::from_str(&decks_json).map_err(|e| corrupt(format!("unreadable deck catalog: {}", e)))?;
        let raw_notetypes: HashMap<String, LegacyNotetype> = serde_json::from_str(&models_json)
            .map_err(|e| corrupt(format!("unreadable note type catalog: {}", e)))?;

        let mut catalog = LegacyCatalog::default();
        for (id, deck) in raw_decks {
            let id = id
                .parse::<i64>()
                .map_err(|_| corrupt(format!("invalid deck id '{}'", id)))?;
            catalog.decks.insert(id, deck.name);
        }
        for (id, mut notetype) in raw_notetypes {
            let id = id
                .parse::<i64>()
                .map_err(|_| corrupt(format!("invalid note type id '{}'", id)))?;
            notetype.flds.sort_by_key(|f| f.ord);
            notetype.tmpls.sort_by_key(|t| t.ord);
            catalog.notetypes.insert(id, notetype);
        }

        Ok(Catalog::Legacy(catalog))
    }

    fn sqlite_err(&self, err: rusqlite::Error) -> ExportError {
        ExportError::from_sqlite(&self.path, err)
    }

    // ========================================================================
    // Review log sweep
    // ========================================================================

    /// All review events, oldest first
    pub fn review_events(&self) -> ReviewEvents<'_> {
        ReviewEvents::new(self, i64::MIN)
    }

    /// Review events at or after `since_ms`, oldest first
    pub fn review_events_since(&self, since_ms: i64) -> ReviewEvents<'_> {
        ReviewEvents::new(self, since_ms.saturating_sub(1))
    }

    /// Next page of grading actions with an id greater than `after_id`
    fn fetch_review_batch(&self, after_id: i64, limit: usize) -> Result<Vec<ReviewEvent>> {
        let mut stmt = self
            .db
            .prepare_cached(
                "SELECT id, cid, ease, ivl, lastIvl, factor, time, type
                 FROM revlog
                 WHERE id > ?1 AND type BETWEEN 0 AND 3 AND ease BETWEEN 1 AND 4
                 ORDER BY id
                 LIMIT ?2",
            )
            .map_err(|e| self.sqlite_err(e))?;

        let rows = stmt
            .query_map(params![after_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .map_err(|e| self.sqlite_err(e))?;

        let mut events = Vec::with_capacity(limit);
        for row in rows {
            let (id, card_id, ease, ivl, last_ivl, factor, time, kind) = row.map_err(|e| self.sqlite_err(e))?;
            let (Some(grade), Some(review_type)) = (Grade::from_ease(ease), ReviewType::from_code(kind)) else {
                continue;
            };
            events.push(ReviewEvent {
                id,
                card_id,
                grade,
                interval: Interval(ivl),
                prior_interval: Interval(last_ivl),
                ease_factor: factor,
                elapsed_ms: time,
                review_type,
            });
        }

        Ok(events)
    }

    // ========================================================================
    // Point lookups
    // ========================================================================

    pub fn lookup_card(&self, card_id: i64) -> Result<Option<Card>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT id, nid, did, odid, ord, due, ivl, lapses FROM cards WHERE id = ?1")
            .map_err(|e| self.sqlite_err(e))?;

        stmt.query_row([card_id], |row| {
            let original_deck_id: i64 = row.get(3)?;
            Ok(Card {
                id: row.get(0)?,
                note_id: row.get(1)?,
                deck_id: row.get(2)?,
                original_deck_id: (original_deck_id != 0).then_some(original_deck_id),
                template_ord: row.get(4)?,
                due: row.get(5)?,
                interval_days: row.get(6)?,
                lapses: row.get(7)?,
            })
        })
        .optional()
        .map_err(|e| self.sqlite_err(e))
    }

    pub fn lookup_note(&self, note_id: i64) -> Result<Option<NoteRow>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT id, mid, tags, flds FROM notes WHERE id = ?1")
            .map_err(|e| self.sqlite_err(e))?;

        stmt.query_row([note_id], |row| {
            Ok(NoteRow {
                id: row.get(0)?,
                notetype_id: row.get(1)?,
                tags: row.get(2)?,
                // Raw bytes so a bad encoding becomes a per-record skip, not a store error
                fields: match row.get_ref(3)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
                    _ => Vec::new(),
                },
            })
        })
        .optional()
        .map_err(|e| self.sqlite_err(e))
    }

    /// Full deck name with `::` between hierarchy levels
    pub fn lookup_deck_name(&self, deck_id: i64) -> Result<Option<String>> {
        match &self.catalog {
            Catalog::Legacy(catalog) => Ok(catalog.decks.get(&deck_id).cloned()),
            Catalog::Modern => {
                let mut stmt = self
                    .db
                    .prepare_cached("SELECT name FROM decks WHERE id = ?1")
                    .map_err(|e| self.sqlite_err(e))?;
                let name: Option<String> = stmt
                    .query_row([deck_id], |row| row.get(0))
                    .optional()
                    .map_err(|e| self.sqlite_err(e))?;
                Ok(name.map(|n| n.replace(STORED_DECK_SEPARATOR, DECK_SEPARATOR)))
            }
        }
    }

    /// Field names of a note type, in field order
    pub fn field_names(&self, notetype_id: i64) -> Result<Vec<String>> {
        match &self.catalog {
            Catalog::Legacy(catalog) => Ok(catalog
                .notetypes
                .get(&notetype_id)
                .map(|nt| nt.flds.iter().map(|f| f.name.clone()).collect())
                .unwrap_or_default()),
            Catalog::Modern => {
                let mut stmt = self
                    .db
                    .prepare_cached("SELECT name FROM fields WHERE ntid = ?1 ORDER BY ord")
                    .map_err(|e| self.sqlite_err(e))?;
                stmt.query_map([notetype_id], |row| row.get::<_, String>(0))
                    .map_err(|e| self.sqlite_err(e))?
                    .collect::<rusqlite::Result<_>>()
                    .map_err(|e| self.sqlite_err(e))
            }
        }
    }

    /// Card templates of a note type as `(ord, name)`, in template order
    pub fn template_names(&self, notetype_id: i64) -> Result<Vec<(i64, String)>> {
        match &self.catalog {
            Catalog::Legacy(catalog) => Ok(catalog
                .notetypes
                .get(&notetype_id)
                .map(|nt| nt.tmpls.iter().map(|t| (t.ord, t.name.clone())).collect())
                .unwrap_or_default()),
            Catalog::Modern => {
                let mut stmt = self
                    .db
                    .prepare_cached("SELECT ord, name FROM templates WHERE ntid = ?1 ORDER BY ord")
                    .map_err(|e| self.sqlite_err(e))?;
                stmt.query_map([notetype_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
                    .map_err(|e| self.sqlite_err(e))?
                    .collect::<rusqlite::Result<_>>()
                    .map_err(|e| self.sqlite_err(e))
            }
        }
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<i64> {
            self.db
                .query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
                .map_err(|e| self.sqlite_err(e))
        };

        let decks = match &self.catalog {
            Catalog::Modern => count("decks")?,
            Catalog::Legacy(catalog) => catalog.decks.len() as i64,
        };

        Ok(StoreStats {
            schema: self.schema(),
            review_entries: count("revlog")?,
            cards: count("cards")?,
            notes: count("notes")?,
            decks,
        })
    }
}

/// Lazy, ordered sweep over the review log
///
/// Pages through the primary key so no statement is held between batches.
/// Finite and not restartable; ask the store for a new sweep instead.
pub struct ReviewEvents<'a> {
    store: &'a Store,
    after_id: i64,
    buffer: VecDeque<ReviewEvent>,
    exhausted: bool,
}

impl<'a> ReviewEvents<'a> {
    fn new(store: &'a Store, after_id: i64) -> Self {
        Self {
            store,
            after_id,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Iterator for ReviewEvents<'_> {
    type Item = Result<ReviewEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.store.fetch_review_batch(self.after_id, REVIEW_BATCH_SIZE) {
                Ok(batch) => {
                    if batch.len() < REVIEW_BATCH_SIZE {
                        self.exhausted = true;
                    }
                    if let Some(last) = batch.last() {
                        self.after_id = last.id;
                    }
                    self.buffer.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{BASIC_NOTETYPE, CLOZE_NOTETYPE, Fixture, Flavour, spanish_verbs};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let result = Store::open(temp.path().join("nope.anki2"));
        assert!(matches!(result, Err(ExportError::StoreUnavailable { .. })));
    }

    #[test]
    fn test_open_directory_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let result = Store::open(temp.path());
        assert!(matches!(result, Err(ExportError::StoreUnavailable { .. })));
    }

    #[test]
    fn test_open_garbage_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("collection.anki2");
        fs::write(&path, vec![0x42u8; 8192]).unwrap();

        let result = Store::open(&path);
        assert!(matches!(result, Err(ExportError::StoreCorrupt { .. })));
    }

    #[test]
    fn test_open_database_without_collection_tables_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("other.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .unwrap();
        drop(conn);

        let result = Store::open(&path);
        match result {
            Err(ExportError::StoreCorrupt { reason, .. }) => assert!(reason.contains("revlog")),
            other => panic!("expected StoreCorrupt, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_locked_store_fails_fast() {
        let fixture = spanish_verbs(Flavour::Modern);

        let holder = Connection::open(&fixture.path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let result = Store::open(&fixture.path);
        assert!(matches!(result, Err(ExportError::StoreLocked { .. })));

        holder.execute_batch("COMMIT;").unwrap();
        assert!(Store::open(&fixture.path).is_ok());
    }

    #[test]
    fn test_open_does_not_modify_store() {
        let fixture = spanish_verbs(Flavour::Modern);
        let before = fs::read(&fixture.path).unwrap();

        let store = Store::open(&fixture.path).unwrap();
        let events: Vec<_> = store.review_events().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 3);
        drop(store);

        let after = fs::read(&fixture.path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_review_events_ordered_by_time() {
        let fixture = Fixture::modern();
        fixture
            .add_deck(1, "Default")
            .add_note(1, BASIC_NOTETYPE, &["a", "b"], "")
            .add_card(1, 1, 1, 0)
            .add_review(300, 1, 3, 1, 0, 1)
            .add_review(100, 1, 3, 1, 0, 1)
            .add_review(200, 1, 2, 1, 0, 1);

        let store = Store::open(&fixture.path).unwrap();
        let ids: Vec<i64> = store.review_events().map(|e| e.unwrap().id).collect();
        assert_eq!(ids, vec![100, 200, 300]);
    }

    #[test]
    fn test_review_events_span_multiple_batches() {
        let fixture = Fixture::modern();
        fixture.add_deck(1, "Default");
        fixture.execute("BEGIN;");
        for id in 1..=(REVIEW_BATCH_SIZE as i64 * 2 + 7) {
            fixture.add_review(id, 1, 3, 1, 0, 1);
        }
        fixture.execute("COMMIT;");

        let store = Store::open(&fixture.path).unwrap();
        let ids: Vec<i64> = store.review_events().map(|e| e.unwrap().id).collect();
        assert_eq!(ids.len(), REVIEW_BATCH_SIZE * 2 + 7);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_review_events_since_starts_at_bound() {
        let fixture = spanish_verbs(Flavour::Modern);
        let store = Store::open(&fixture.path).unwrap();

        let ids: Vec<i64> = store.review_events_since(200).map(|e| e.unwrap().id).collect();
        assert_eq!(ids, vec![200, 300]);
    }

    #[test]
    fn test_manual_reschedules_are_not_review_events() {
        let fixture = spanish_verbs(Flavour::Modern);
        // type 4 = manual, ease 0 = rescheduled without grading
        fixture.execute(
            "INSERT INTO revlog VALUES (400, 1, 0, 0, 10, 4, 2500, 0, 4);
             INSERT INTO revlog VALUES (500, 1, 0, 0, 10, 4, 2500, 0, 1);",
        );

        let store = Store::open(&fixture.path).unwrap();
        let ids: Vec<i64> = store.review_events().map(|e| e.unwrap().id).collect();
        assert_eq!(ids, vec![100, 200, 300]);
    }

    #[test]
    fn test_review_event_decoding() {
        let fixture = spanish_verbs(Flavour::Modern);
        let store = Store::open(&fixture.path).unwrap();

        let first = store.review_events().next().unwrap().unwrap();
        assert_eq!(first.id, 100);
        assert_eq!(first.timestamp_ms(), 100);
        assert_eq!(first.card_id, 1);
        assert_eq!(first.grade, Grade::Good);
        assert_eq!(first.interval, Interval(-600));
        assert_eq!(first.ease_factor, 2500);
        assert_eq!(first.elapsed_ms, 4200);
        assert_eq!(first.review_type, ReviewType::Learning);
    }

    #[test]
    fn test_lookups_modern_and_legacy() {
        for flavour in [Flavour::Modern, Flavour::Legacy] {
            let fixture = spanish_verbs(flavour);
            let store = Store::open(&fixture.path).unwrap();

            let card = store.lookup_card(1).unwrap().unwrap();
            assert_eq!(card.note_id, 500);
            assert_eq!(card.deck_id, 11);
            assert_eq!(card.original_deck_id, None);
            assert!(store.lookup_card(999).unwrap().is_none());

            assert_eq!(store.lookup_deck_name(11).unwrap().as_deref(), Some("Spanish::Verbs"));
            assert!(store.lookup_deck_name(12345).unwrap().is_none());

            let note = store.lookup_note(500).unwrap().unwrap();
            assert_eq!(note.notetype_id, BASIC_NOTETYPE);
            assert!(store.lookup_note(501).unwrap().is_none());

            assert_eq!(store.field_names(BASIC_NOTETYPE).unwrap(), vec!["Front", "Back"]);
            assert_eq!(
                store.template_names(CLOZE_NOTETYPE).unwrap(),
                vec![(0, "Cloze".to_string())]
            );
            assert!(store.template_names(42).unwrap().is_empty());
        }
    }

    #[test]
    fn test_schema_detection() {
        let modern = spanish_verbs(Flavour::Modern);
        assert_eq!(Store::open(&modern.path).unwrap().schema(), SchemaKind::Modern);

        let legacy = spanish_verbs(Flavour::Legacy);
        assert_eq!(Store::open(&legacy.path).unwrap().schema(), SchemaKind::Legacy);
    }

    #[test]
    fn test_stats() {
        let fixture = spanish_verbs(Flavour::Modern);
        let stats = Store::open(&fixture.path).unwrap().stats().unwrap();
        assert_eq!(stats.review_entries, 3);
        assert_eq!(stats.cards, 1);
        assert_eq!(stats.notes, 1);
        assert_eq!(stats.decks, 3);
    }

    #[test]
    fn test_note_row_into_note() {
        let row = NoteRow {
            id: 1,
            notetype_id: 2,
            tags: " Verbs spanish ".to_string(),
            fields: "hablar\x1fto speak\x1fextra".as_bytes().to_vec(),
        };
        let names = vec!["Front".to_string(), "Back".to_string()];

        let note = row.into_note(&names).unwrap();
        assert_eq!(note.tags, vec!["verbs", "spanish"]);
        let named: Vec<(&str, &str)> = note
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            named,
            vec![("Front", "hablar"), ("Back", "to speak"), ("field_2", "extra")]
        );
    }

    #[test]
    fn test_note_row_invalid_utf8() {
        let row = NoteRow {
            id: 1,
            notetype_id: 2,
            tags: String::new(),
            fields: vec![0x66, 0xff, 0xfe],
        };
        assert!(row.into_note(&[]).is_err());
    }
}
