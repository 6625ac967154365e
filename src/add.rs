use crate::collection::{require_deck_id, Collection};
use crate::error::Result;
use crate::fields::{join_fields, NoteType};
use crate::models::AddedCard;
use chrono::Utc;
use rusqlite::{params, Connection};
use sha1::{Digest, Sha1};
use tracing::info;

const GUID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Content of a note to add. Deck and note-type fall back to the configured
/// inbox deck and default model.
#[derive(Clone, Debug, Default)]
pub struct NewNote {
    pub deck: Option<String>,
    pub model: Option<String>,
    /// `(field name, value)` pairs; `front`/`back` also resolve by position.
    pub fields: Vec<(String, String)>,
}

impl NewNote {
    pub fn basic(front: impl Into<String>, back: impl Into<String>) -> Self {
        NewNote {
            deck: None,
            model: None,
            fields: vec![
                ("Front".to_string(), front.into()),
                ("Back".to_string(), back.into()),
            ],
        }
    }
}

impl Collection {
    /// Creates one note and one new, never-reviewed card for it. Both rows are
    /// written in a single transaction.
    pub fn add_card(&self, note: &NewNote) -> Result<AddedCard> {
        let config = self.config();
        let deck = note.deck.as_deref().unwrap_or(&config.inbox_deck);
        let model = note.model.as_deref().unwrap_or(&config.default_model);
        self.write(|conn| {
            let tx = conn.transaction()?;
            let note_type = NoteType::load(&tx, model)?;
            let deck_id = require_deck_id(&tx, deck)?;
            let values = note_type.pack(&note.fields)?;
            let added = insert_note(&tx, &note_type, deck_id, &values, IdAllocator::from_clock())?;
            tx.commit()?;
            info!(note_id = added.note_id, card_id = added.card_id, deck, model, "added card");
            Ok(added)
        })
    }
}

fn insert_note(
    conn: &Connection,
    note_type: &NoteType,
    deck_id: i64,
    values: &[String],
    ids: IdAllocator,
) -> Result<AddedCard> {
    let (note_id, card_id) = ids.allocate(conn)?;
    let flds = join_fields(values);
    let sort_field = values.first().map(String::as_str).unwrap_or("");
    let mtime = Utc::now().timestamp();

    conn.execute(
        "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
         VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
        params![
            note_id,
            new_guid(),
            note_type.id,
            mtime,
            flds,
            sort_field,
            field_checksum(sort_field)
        ],
    )?;
    conn.execute(
        "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps,
                            lapses, left, odue, odid, flags, data)
         VALUES (?1, ?2, ?3, 0, ?4, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, '')",
        params![card_id, note_id, deck_id, mtime],
    )?;
    Ok(AddedCard { note_id, card_id })
}

/// Hands out note/card id pairs. Ids are epoch milliseconds like Anki's own,
/// but bumped past the largest existing note and card ids so two adds within
/// the same millisecond don't collide. The card id is always note id + 1.
#[derive(Clone, Copy, Debug)]
pub struct IdAllocator {
    seed: i64,
}

impl IdAllocator {
    pub fn from_clock() -> Self {
        Self::with_seed(Utc::now().timestamp_millis())
    }

    pub fn with_seed(seed: i64) -> Self {
        IdAllocator { seed }
    }

    pub fn allocate(&self, conn: &Connection) -> Result<(i64, i64)> {
        let (max_note, max_card): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT (SELECT MAX(id) FROM notes), (SELECT MAX(id) FROM cards)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut note_id = self.seed;
        if let Some(max) = max_note {
            note_id = note_id.max(max + 1);
        }
        if let Some(max) = max_card {
            note_id = note_id.max(max);
        }
        Ok((note_id, note_id + 1))
    }
}

/// Random 64-bit value in Anki's base91 guid alphabet.
fn new_guid() -> String {
    let mut n: u64 = rand::random();
    let base = GUID_ALPHABET.len() as u64;
    let mut guid = Vec::new();
    loop {
        guid.push(GUID_ALPHABET[(n % base) as usize]);
        n /= base;
        if n == 0 {
            break;
        }
    }
    guid.reverse();
    String::from_utf8_lossy(&guid).into_owned()
}

/// First 32 bits of the SHA-1 of the sort field, used by Anki for duplicate checks.
fn field_checksum(text: &str) -> i64 {
    let digest = Sha1::digest(text.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as i64
}

#[cfg(test)]
use crate::error::CollectionError;
#[cfg(test)]
use crate::search::SearchOptions;
#[cfg(test)]
use crate::testutil::{Fixture, DEFAULT_DECK_ID, INBOX_DECK_ID};

#[test]
fn test_add_then_search_returns_card() {
    let fixture = Fixture::new();
    let collection = fixture.collection();
    let added = collection.add_card(&NewNote::basic("Q", "A")).unwrap();
    assert_eq!(added.card_id, added.note_id + 1);

    let options = SearchOptions {
        keyword: Some("Q".to_string()),
        ..SearchOptions::default()
    };
    let cards = collection.search(&options).unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].card_id, added.card_id);
    assert_eq!(cards[0].deck_name, "ai_inbox");
    assert_eq!(cards[0].review_count, 0);
    assert_eq!(cards[0].fields["front"], Some("Q".to_string()));
    assert_eq!(cards[0].fields["back"], Some("A".to_string()));
    assert_eq!(fixture.card_deck(added.card_id), INBOX_DECK_ID);
}

#[test]
fn test_new_card_is_unseen() {
    let fixture = Fixture::new();
    let added = fixture.collection().add_card(&NewNote::basic("front", "back")).unwrap();
    let (queue, ivl, reps, sfld, csum): (i64, i64, i64, String, i64) = fixture
        .conn()
        .query_row(
            "SELECT c.queue, c.ivl, c.reps, n.sfld, n.csum
             FROM cards c JOIN notes n ON n.id = c.nid WHERE c.id = ?1",
            [added.card_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .unwrap();
    assert_eq!((queue, ivl, reps), (0, 0, 0));
    assert_eq!(sfld, "front");
    assert_eq!(csum, field_checksum("front"));
}

#[test]
fn test_add_to_missing_deck_fails_without_writing() {
    let fixture = Fixture::new();
    let note = NewNote {
        deck: Some("nowhere".to_string()),
        ..NewNote::basic("Q", "A")
    };
    let err = fixture.collection().add_card(&note).unwrap_err();
    assert_eq!(err.to_string(), "deck \"nowhere\" not found");
    assert_eq!(fixture.count("notes"), 0);
    assert_eq!(fixture.count("cards"), 0);
}

#[test]
fn test_add_with_missing_model_fails() {
    let fixture = Fixture::new();
    let note = NewNote {
        model: Some("Cloze".to_string()),
        ..NewNote::basic("Q", "A")
    };
    let err = fixture.collection().add_card(&note).unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { kind: "note type", .. }));
}

#[test]
fn test_rapid_adds_get_distinct_ids() {
    let fixture = Fixture::new();
    let collection = fixture.collection();
    let first = collection.add_card(&NewNote::basic("a", "b")).unwrap();
    let second = collection.add_card(&NewNote::basic("c", "d")).unwrap();
    assert!(second.note_id > first.note_id);
    assert!(second.card_id > first.card_id);
    assert_eq!(fixture.count("cards"), 2);
}

#[test]
fn test_allocator_skips_existing_ids() {
    let fixture = Fixture::new();
    fixture.add_note(100, 205, DEFAULT_DECK_ID, "x", 0);
    let conn = fixture.conn();
    assert_eq!(IdAllocator::with_seed(50).allocate(&conn).unwrap(), (205, 206));
    assert_eq!(IdAllocator::with_seed(500).allocate(&conn).unwrap(), (500, 501));
}

#[test]
fn test_guid_uses_anki_alphabet() {
    let guid = new_guid();
    assert!(!guid.is_empty() && guid.len() <= 10);
    assert!(guid.bytes().all(|b| GUID_ALPHABET.contains(&b)));
}

#[test]
fn test_failed_card_insert_rolls_back_note() {
    let fixture = Fixture::new();
    fixture
        .conn()
        .execute_batch(
            "CREATE TRIGGER reject_cards BEFORE INSERT ON cards
             BEGIN SELECT RAISE(ABORT, 'cards are read-only'); END;",
        )
        .unwrap();
    let err = fixture
        .collection()
        .add_card(&NewNote::basic("Q", "A"))
        .unwrap_err();
    assert!(matches!(err, CollectionError::Storage(_)));
    assert!(err.to_string().contains("cards are read-only"));
    assert_eq!(fixture.count("notes"), 0);
    assert_eq!(fixture.count("cards"), 0);
}
