// Builders for small Anki collections used by the unit tests

use rusqlite::{Connection, params};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

pub const BASIC_NOTETYPE: i64 = 1000;
pub const CLOZE_NOTETYPE: i64 = 2000;

const COMMON_TABLES: &str = r#"
    CREATE TABLE col (
        id integer PRIMARY KEY, crt integer NOT NULL, mod integer NOT NULL,
        scm integer NOT NULL, ver integer NOT NULL, dty integer NOT NULL,
        usn integer NOT NULL, ls integer NOT NULL, conf text NOT NULL,
        models text NOT NULL, decks text NOT NULL, dconf text NOT NULL, tags text NOT NULL
    );
    CREATE TABLE notes (
        id integer PRIMARY KEY, guid text NOT NULL, mid integer NOT NULL,
        mod integer NOT NULL, usn integer NOT NULL, tags text NOT NULL,
        flds text NOT NULL, sfld integer NOT NULL, csum integer NOT NULL,
        flags integer NOT NULL, data text NOT NULL
    );
    CREATE TABLE cards (
        id integer PRIMARY KEY, nid integer NOT NULL, did integer NOT NULL,
        ord integer NOT NULL, mod integer NOT NULL, usn integer NOT NULL,
        type integer NOT NULL, queue integer NOT NULL, due integer NOT NULL,
        ivl integer NOT NULL, factor integer NOT NULL, reps integer NOT NULL,
        lapses integer NOT NULL, left integer NOT NULL, odue integer NOT NULL,
        odid integer NOT NULL, flags integer NOT NULL, data text NOT NULL
    );
    CREATE TABLE revlog (
        id integer PRIMARY KEY, cid integer NOT NULL, usn integer NOT NULL,
        ease integer NOT NULL, ivl integer NOT NULL, lastIvl integer NOT NULL,
        factor integer NOT NULL, time integer NOT NULL, type integer NOT NULL
    );
"#;

const MODERN_TABLES: &str = r#"
    CREATE TABLE decks (
        id integer PRIMARY KEY NOT NULL, name text NOT NULL, mtime_secs integer NOT NULL,
        usn integer NOT NULL, common blob NOT NULL, kind blob NOT NULL
    );
    CREATE TABLE notetypes (
        id integer NOT NULL PRIMARY KEY, name text NOT NULL, mtime_secs integer NOT NULL,
        usn integer NOT NULL, config blob NOT NULL
    );
    CREATE TABLE fields (
        ntid integer NOT NULL, ord integer NOT NULL, name text NOT NULL, config blob NOT NULL,
        PRIMARY KEY (ntid, ord)
    ) WITHOUT ROWID;
    CREATE TABLE templates (
        ntid integer NOT NULL, ord integer NOT NULL, name text NOT NULL, mtime_secs integer NOT NULL,
        usn integer NOT NULL, config blob NOT NULL, PRIMARY KEY (ntid, ord)
    ) WITHOUT ROWID;
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavour {
    Modern,
    Legacy,
}

/// A collection file in a temp directory, writable by the test
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    pub flavour: Flavour,
    conn: Connection,
}

impl Fixture {
    pub fn modern() -> Self {
        Self::create(Flavour::Modern)
    }

    pub fn create(flavour: Flavour) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collection.anki2");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(COMMON_TABLES).unwrap();

        match flavour {
            Flavour::Modern => {
                conn.execute_batch(MODERN_TABLES).unwrap();
                conn.execute(
                    "INSERT INTO col VALUES (1, 0, 0, 0, 18, 0, 0, 0, '', '', '', '', '')",
                    [],
                )
                .unwrap();
                let fixture = Self {
                    dir,
                    path,
                    flavour,
                    conn,
                };
                fixture.add_modern_notetype(BASIC_NOTETYPE, "Basic", &["Front", "Back"], &["Card 1", "Card 2"]);
                fixture.add_modern_notetype(CLOZE_NOTETYPE, "Cloze", &["Text", "Back Extra"], &["Cloze"]);
                fixture
            }
            Flavour::Legacy => {
                let models = json!({
                    BASIC_NOTETYPE.to_string(): {
                        "id": BASIC_NOTETYPE,
                        "name": "Basic",
                        "type": 0,
                        "flds": [{"name": "Front", "ord": 0}, {"name": "Back", "ord": 1}],
                        "tmpls": [{"name": "Card 1", "ord": 0}, {"name": "Card 2", "ord": 1}],
                    },
                    CLOZE_NOTETYPE.to_string(): {
                        "id": CLOZE_NOTETYPE,
                        "name": "Cloze",
                        "type": 1,
                        "flds": [{"name": "Text", "ord": 0}, {"name": "Back Extra", "ord": 1}],
                        "tmpls": [{"name": "Cloze", "ord": 0}],
                    },
                });
                conn.execute(
                    "INSERT INTO col VALUES (1, 0, 0, 0, 11, 0, 0, 0, '{}', ?1, '{}', '{}', '{}')",
                    params![models.to_string()],
                )
                .unwrap();
                Self {
                    dir,
                    path,
                    flavour,
                    conn,
                }
            }
        }
    }

    fn add_modern_notetype(&self, id: i64, name: &str, fields: &[&str], templates: &[&str]) {
        self.conn
            .execute(
                "INSERT INTO notetypes VALUES (?1, ?2, 0, 0, x'')",
                params![id, name],
            )
            .unwrap();
        for (ord, field) in fields.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO fields VALUES (?1, ?2, ?3, x'')",
                    params![id, ord as i64, field],
                )
                .unwrap();
        }
        for (ord, template) in templates.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO templates VALUES (?1, ?2, ?3, 0, 0, x'')",
                    params![id, ord as i64, template],
                )
                .unwrap();
        }
    }

    /// Add a deck; `name` uses `::` between hierarchy levels
    pub fn add_deck(&self, id: i64, name: &str) -> &Self {
        match self.flavour {
            Flavour::Modern => {
                let stored = name.replace("::", "\x1f");
                self.conn
                    .execute(
                        "INSERT INTO decks VALUES (?1, ?2, 0, 0, x'', x'')",
                        params![id, stored],
                    )
                    .unwrap();
            }
            Flavour::Legacy => {
                let raw: String = self.conn.query_row("SELECT decks FROM col", [], |r| r.get(0)).unwrap();
                let mut decks: serde_json::Value = serde_json::from_str(&raw).unwrap();
                decks[id.to_string()] = json!({"id": id, "name": name, "dyn": 0});
                self.conn
                    .execute("UPDATE col SET decks = ?1", params![decks.to_string()])
                    .unwrap();
            }
        }
        self
    }

    pub fn add_note(&self, id: i64, notetype_id: i64, fields: &[&str], tags: &str) -> &Self {
        let flds = fields.join("\x1f");
        self.conn
            .execute(
                "INSERT INTO notes VALUES (?1, 'guid', ?2, 0, 0, ?3, ?4, '', 0, 0, '')",
                params![id, notetype_id, tags, flds],
            )
            .unwrap();
        self
    }

    pub fn add_card(&self, id: i64, note_id: i64, deck_id: i64, ord: i64) -> &Self {
        self.conn
            .execute(
                "INSERT INTO cards VALUES (?1, ?2, ?3, ?4, 0, 0, 2, 2, 100, 7, 2500, 3, 1, 0, 0, 0, 0, '')",
                params![id, note_id, deck_id, ord],
            )
            .unwrap();
        self
    }

    /// Add a review: `ease` 1-4, `kind` 0=learn 1=review 2=relearn 3=filtered
    pub fn add_review(&self, id: i64, card_id: i64, ease: i64, ivl: i64, last_ivl: i64, kind: i64) -> &Self {
        self.conn
            .execute(
                "INSERT INTO revlog VALUES (?1, ?2, 0, ?3, ?4, ?5, 2500, 4200, ?6)",
                params![id, card_id, ease, ivl, last_ivl, kind],
            )
            .unwrap();
        self
    }

    pub fn execute(&self, sql: &str) {
        self.conn.execute_batch(sql).unwrap();
    }

    /// Path for output files next to the collection
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Card 1 in deck "Spanish::Verbs" reviewed at 100, 200, 300 ms with good, again, easy
pub fn spanish_verbs(flavour: Flavour) -> Fixture {
    let fixture = Fixture::create(flavour);
    fixture
        .add_deck(1, "Default")
        .add_deck(10, "Spanish")
        .add_deck(11, "Spanish::Verbs")
        .add_note(500, BASIC_NOTETYPE, &["hablar", "<b>to speak</b>"], " verbs spanish ")
        .add_card(1, 500, 11, 0)
        .add_review(100, 1, 3, -600, 0, 0)
        .add_review(200, 1, 1, -60, -600, 0)
        .add_review(300, 1, 4, 4, -60, 0);
    fixture
}
