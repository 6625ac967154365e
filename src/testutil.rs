//! Temporary Anki-shaped collections for tests.

use crate::collection::{self, Access, Collection};
use crate::config::CollectionConfig;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;

pub const DEFAULT_DECK_ID: i64 = 1;
pub const INBOX_DECK_ID: i64 = 1_700_000_000_001;
pub const ARCHIVE_DECK_ID: i64 = 1_700_000_000_002;
pub const BASIC_MODEL_ID: i64 = 1_600_000_000_000;

const SCHEMA: &str = r#"
CREATE TABLE notes (
    id integer primary key, guid text not null, mid integer not null,
    mod integer not null, usn integer not null, tags text not null,
    flds text not null, sfld integer not null, csum integer not null,
    flags integer not null, data text not null
);
CREATE TABLE cards (
    id integer primary key, nid integer not null, did integer not null,
    ord integer not null, mod integer not null, usn integer not null,
    type integer not null, queue integer not null, due integer not null,
    ivl integer not null, factor integer not null, reps integer not null,
    lapses integer not null, left integer not null, odue integer not null,
    odid integer not null, flags integer not null, data text not null
);
CREATE TABLE revlog (
    id integer primary key, cid integer not null, usn integer not null,
    ease integer not null, ivl integer not null, lastIvl integer not null,
    factor integer not null, time integer not null, type integer not null
);
CREATE TABLE decks (
    id integer primary key not null, name text not null collate unicase,
    mtime_secs integer not null, usn integer not null,
    common blob not null, kind blob not null
);
CREATE UNIQUE INDEX idx_decks_name ON decks (name);
CREATE TABLE notetypes (
    id integer primary key not null, name text not null collate unicase,
    mtime_secs integer not null, usn integer not null, config blob not null
);
CREATE TABLE fields (
    ntid integer not null, ord integer not null, name text not null collate unicase,
    config blob not null, PRIMARY KEY (ntid, ord)
) without rowid;
"#;

pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    /// Collection with "Default", "ai_inbox" and "to_delete" decks and a
    /// two-field "Basic" note-type.
    pub fn new() -> Self {
        let fixture = Self::without_archive_deck();
        fixture.add_deck(ARCHIVE_DECK_ID, "to_delete");
        fixture
    }

    pub fn without_archive_deck() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.anki2");
        {
            let conn = Connection::open(&path).unwrap();
            collection::register_collations(&conn).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO notetypes VALUES (?1, 'Basic', 0, 0, x'')",
                [BASIC_MODEL_ID],
            )
            .unwrap();
            for (ord, name) in ["Front", "Back"].iter().enumerate() {
                conn.execute(
                    "INSERT INTO fields VALUES (?1, ?2, ?3, x'')",
                    params![BASIC_MODEL_ID, ord as i64, name],
                )
                .unwrap();
            }
        }
        let fixture = Fixture { _dir: dir, path };
        fixture.add_deck(DEFAULT_DECK_ID, "Default");
        fixture.add_deck(INBOX_DECK_ID, "ai_inbox");
        fixture
    }

    pub fn collection(&self) -> Collection {
        Collection::new(CollectionConfig::with_path(&self.path))
    }

    pub fn conn(&self) -> Connection {
        collection::open(&self.path, Access::ReadWrite).unwrap()
    }

    pub fn add_deck(&self, id: i64, name: &str) {
        self.conn()
            .execute(
                "INSERT INTO decks VALUES (?1, ?2, 0, 0, x'', x'')",
                params![id, name],
            )
            .unwrap();
    }

    /// Inserts a Basic note with one card in the given queue.
    pub fn add_note(&self, note_id: i64, card_id: i64, deck_id: i64, fields: &str, queue: i64) {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notes VALUES (?1, ?2, ?3, 0, 0, '', ?4, '', 0, 0, '')",
            params![note_id, format!("g{}", note_id), BASIC_MODEL_ID, fields],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cards VALUES (?1, ?2, ?3, 0, 0, 0, ?4, ?4, 0, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            params![card_id, note_id, deck_id, queue],
        )
        .unwrap();
    }

    pub fn add_review(&self, id: i64, card_id: i64, ease: i64, time: i64) {
        self.conn()
            .execute(
                "INSERT INTO revlog VALUES (?1, ?2, 0, ?3, 0, 0, 0, ?4, 1)",
                params![id, card_id, ease, time],
            )
            .unwrap();
    }

    pub fn card_deck(&self, card_id: i64) -> i64 {
        self.conn()
            .query_row("SELECT did FROM cards WHERE id = ?1", [card_id], |row| {
                row.get(0)
            })
            .unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        self.conn()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }
}
