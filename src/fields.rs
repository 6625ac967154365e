use crate::collection::require_note_type_id;
use crate::error::{CollectionError, Result};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};

/// Separates field values inside `notes.flds`.
pub const FIELD_SEPARATOR: char = '\x1f';

/// Field names assumed when a note-type has no rows in `fields`.
const FALLBACK_FIELDS: &[&str] = &["Front", "Back"];

/// A note-type and its ordered field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteType {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
}

impl NoteType {
    pub fn load(conn: &Connection, name: &str) -> Result<NoteType> {
        let id = require_note_type_id(conn, name)?;
        let mut stmt = conn.prepare("SELECT name FROM fields WHERE ntid = ?1 ORDER BY ord")?;
        let mut fields = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            fields = FALLBACK_FIELDS.iter().map(|f| f.to_string()).collect();
        }
        Ok(NoteType {
            id,
            name: name.to_string(),
            fields,
        })
    }

    /// Orders the given `(field, value)` pairs by this note-type's schema.
    /// Unassigned fields stay empty; naming an unknown field is an error.
    pub fn pack(&self, assignments: &[(String, String)]) -> Result<Vec<String>> {
        let mut values = vec![String::new(); self.fields.len()];
        for (field, value) in assignments {
            let i = field_index(&self.fields, field).ok_or_else(|| {
                CollectionError::not_found("field", format!("{} (note type {})", field, self.name))
            })?;
            values[i] = value.clone();
        }
        Ok(values)
    }
}

/// Resolves a requested field to its position: by name, case-insensitively,
/// then by the `front`/`back` positional convention.
pub fn field_index(names: &[String], requested: &str) -> Option<usize> {
    if let Some(i) = names.iter().position(|n| n.eq_ignore_ascii_case(requested)) {
        return Some(i);
    }
    let i = match requested.to_lowercase().as_str() {
        "front" => 0,
        "back" => 1,
        _ => return None,
    };
    if names.is_empty() || i < names.len() {
        Some(i)
    } else {
        None
    }
}

pub fn join_fields(values: &[String]) -> String {
    values.join(&FIELD_SEPARATOR.to_string())
}

pub fn split_fields(raw: &str) -> Vec<&str> {
    raw.split(FIELD_SEPARATOR).collect()
}

/// Picks the requested fields out of a raw field string. A field the note
/// doesn't have maps to `None`.
pub fn decompose(
    raw: &str,
    names: &[String],
    requested: &[String],
) -> BTreeMap<String, Option<String>> {
    let parts = split_fields(raw);
    requested
        .iter()
        .map(|field| {
            let value = field_index(names, field)
                .and_then(|i| parts.get(i))
                .map(|v| v.to_string());
            (field.clone(), value)
        })
        .collect()
}

/// Field names of every note-type in the collection, keyed by note-type id.
pub fn load_field_schemas(conn: &Connection) -> Result<HashMap<i64, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT ntid, name FROM fields ORDER BY ntid, ord")?;
    let mut rows = stmt.query([])?;
    let mut schemas: HashMap<i64, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        schemas.entry(row.get(0)?).or_default().push(row.get(1)?);
    }
    Ok(schemas)
}

#[cfg(test)]
fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

#[test]
fn test_decompose_missing_back_is_none() {
    let fields = decompose("only front", &names(&["Front", "Back"]), &names(&["front", "back"]));
    assert_eq!(fields["front"], Some("only front".to_string()));
    assert_eq!(fields["back"], None);
}

#[test]
fn test_decompose_by_schema_name() {
    let schema = names(&["Text", "Extra", "Source"]);
    let raw = join_fields(&names(&["t", "e", "s"]));
    let fields = decompose(&raw, &schema, &names(&["source", "front"]));
    assert_eq!(fields["source"], Some("s".to_string()));
    assert_eq!(fields["front"], Some("t".to_string()));
}

#[test]
fn test_decompose_without_schema_uses_positions() {
    let fields = decompose("q\x1fa", &[], &names(&["front", "back", "extra"]));
    assert_eq!(fields["front"], Some("q".to_string()));
    assert_eq!(fields["back"], Some("a".to_string()));
    assert_eq!(fields["extra"], None);
}

#[test]
fn test_pack_orders_by_schema() {
    let note_type = NoteType {
        id: 1,
        name: "Basic (and reversed)".to_string(),
        fields: names(&["Front", "Back", "Notes"]),
    };
    let packed = note_type
        .pack(&[
            ("notes".to_string(), "n".to_string()),
            ("Front".to_string(), "f".to_string()),
        ])
        .unwrap();
    assert_eq!(packed, names(&["f", "", "n"]));
    assert_eq!(join_fields(&packed), "f\x1f\x1fn");
}

#[test]
fn test_pack_rejects_unknown_field() {
    let note_type = NoteType {
        id: 1,
        name: "Basic".to_string(),
        fields: names(&["Front", "Back"]),
    };
    let err = note_type
        .pack(&[("Hint".to_string(), "h".to_string())])
        .unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { kind: "field", .. }));
}

#[test]
fn test_load_note_type_reads_field_order() {
    let fixture = crate::testutil::Fixture::new();
    let note_type = fixture
        .collection()
        .read(|conn| NoteType::load(conn, "basic"))
        .unwrap();
    assert_eq!(note_type.id, crate::testutil::BASIC_MODEL_ID);
    assert_eq!(note_type.fields, names(&["Front", "Back"]));
}
