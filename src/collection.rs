use crate::config::CollectionConfig;
use crate::error::{CollectionError, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Accessor for an Anki collection file. Holds no connection itself: every
/// logical operation opens one, runs its queries and drops it again, on error
/// paths included.
pub struct Collection {
    config: CollectionConfig,
}

impl Collection {
    pub fn new(config: CollectionConfig) -> Self {
        Collection { config }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Runs `f` on a read-only connection.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = open(&self.config.db_path, Access::ReadOnly)?;
        f(&conn)
    }

    /// Runs `f` on a read-write connection.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = open(&self.config.db_path, Access::ReadWrite)?;
        f(&mut conn)
    }
}

/// Opens the collection without ever creating it; the schema belongs to Anki.
pub fn open(path: &Path, access: Access) -> Result<Connection> {
    let mode = match access {
        Access::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        Access::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
    };
    let flags = mode | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    debug!(path = %path.display(), ?access, "opening collection");
    let conn = Connection::open_with_flags(path, flags)?;
    register_collations(&conn)?;
    Ok(conn)
}

/// Anki declares deck and note-type names with `COLLATE unicase`, which plain
/// SQLite doesn't know. Any comparison against those columns fails without it.
pub(crate) fn register_collations(conn: &Connection) -> Result<()> {
    conn.create_collation("unicase", |a: &str, b: &str| {
        a.to_lowercase().cmp(&b.to_lowercase())
    })?;
    Ok(())
}

pub(crate) fn find_deck_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM decks WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

pub(crate) fn require_deck_id(conn: &Connection, name: &str) -> Result<i64> {
    find_deck_id(conn, name)?.ok_or_else(|| CollectionError::not_found("deck", name))
}

pub(crate) fn require_note_type_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM notetypes WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| CollectionError::not_found("note type", name))
}

#[test]
fn test_read_only_connection_rejects_writes() {
    let fixture = crate::testutil::Fixture::new();
    let collection = fixture.collection();
    let result = collection.read(|conn| {
        conn.execute("DELETE FROM cards", [])?;
        Ok(())
    });
    assert!(matches!(result, Err(CollectionError::Storage(_))));
}

#[test]
fn test_open_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = open(&dir.path().join("missing.anki2"), Access::ReadOnly);
    assert!(matches!(result, Err(CollectionError::Storage(_))));
}

#[test]
fn test_deck_lookup_is_case_insensitive() {
    let fixture = crate::testutil::Fixture::new();
    let id = fixture
        .collection()
        .read(|conn| require_deck_id(conn, "AI_INBOX"))
        .unwrap();
    assert_eq!(id, crate::testutil::INBOX_DECK_ID);
}

#[test]
fn test_missing_note_type_is_not_found() {
    let fixture = crate::testutil::Fixture::new();
    let err = fixture
        .collection()
        .read(|conn| require_note_type_id(conn, "Cloze"))
        .unwrap_err();
    assert_eq!(err.to_string(), "note type \"Cloze\" not found");
}
