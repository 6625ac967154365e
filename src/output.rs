use crate::models::{
    AddedCard, ArchiveResult, CardRecord, DeckDetails, Overview, ReviewMetrics,
};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use struct_field_names_as_array::FieldNamesAsArray;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Something that can be written as rows of a CSV table.
pub trait Tabular: Serialize + Sized {
    fn header(rows: &[Self]) -> Vec<String>;

    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.serialize(self)
    }
}

macro_rules! flat_tabular {
    ($($t:ty),*) => {
        $(impl Tabular for $t {
            fn header(_: &[Self]) -> Vec<String> {
                <$t>::FIELD_NAMES_AS_ARRAY.iter().map(|f| f.to_string()).collect()
            }
        })*
    };
}

flat_tabular!(AddedCard, ArchiveResult, ReviewMetrics, Overview, DeckDetails);

impl Tabular for CardRecord {
    /// Fixed columns followed by the requested note fields of the first row.
    fn header(rows: &[Self]) -> Vec<String> {
        let mut header: Vec<String> = CardRecord::FIELD_NAMES_AS_ARRAY
            .iter()
            .filter(|f| **f != "fields")
            .map(|f| f.to_string())
            .collect();
        if let Some(first) = rows.first() {
            header.extend(first.fields.keys().cloned());
        }
        header
    }

    fn write_row<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        let mut record = vec![
            self.note_id.to_string(),
            self.card_id.to_string(),
            self.deck_name.clone(),
            self.note_fields.clone(),
            self.review_count.to_string(),
            optional(self.avg_review_time),
            optional(self.last_review_time),
            optional(self.last_ease_factor),
        ];
        record.extend(self.fields.values().map(|v| v.clone().unwrap_or_default()));
        writer.write_record(&record)
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes a single result: a JSON object or a one-row table.
pub fn render_one<T, W>(value: &T, format: OutputFormat, out: W) -> Result<()>
where
    T: Tabular,
    W: Write,
{
    match format {
        OutputFormat::Json => write_json(value, out),
        OutputFormat::Csv => write_csv(std::slice::from_ref(value), out),
    }
}

/// Writes a list of results: a JSON array or a table.
pub fn render_many<T, W>(values: &[T], format: OutputFormat, out: W) -> Result<()>
where
    T: Tabular,
    W: Write,
{
    match format {
        OutputFormat::Json => write_json(&values, out),
        OutputFormat::Csv => write_csv(values, out),
    }
}

fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn write_csv<T: Tabular, W: Write>(rows: &[T], out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(T::header(rows))?;
    for row in rows {
        row.write_row(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
fn card() -> CardRecord {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("back".to_string(), None);
    fields.insert("front".to_string(), Some("Q".to_string()));
    CardRecord {
        note_id: 1,
        card_id: 2,
        deck_name: "ai_inbox".to_string(),
        note_fields: "Q".to_string(),
        review_count: 0,
        avg_review_time: None,
        last_review_time: None,
        last_ease_factor: None,
        fields,
    }
}

#[test]
fn test_card_json_flattens_fields() {
    let mut out = Vec::new();
    render_many(&[card()], OutputFormat::Json, &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value[0]["front"], "Q");
    assert!(value[0]["back"].is_null());
    assert_eq!(value[0]["card_id"], 2);
}

#[test]
fn test_card_csv_header_and_row() {
    let mut out = Vec::new();
    render_many(&[card()], OutputFormat::Csv, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "note_id,card_id,deck_name,note_fields,review_count,avg_review_time,\
         last_review_time,last_ease_factor,back,front\n\
         1,2,ai_inbox,Q,0,,,,,Q\n"
    );
}

#[test]
fn test_added_card_json_is_camel_case() {
    let mut out = Vec::new();
    let added = AddedCard {
        note_id: 10,
        card_id: 11,
    };
    render_one(&added, OutputFormat::Json, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "{\n  \"noteId\": 10,\n  \"cardId\": 11\n}\n"
    );
}

#[test]
fn test_overview_csv_single_row() {
    let mut out = Vec::new();
    let overview = Overview {
        total_cards: 3,
        total_decks: 2,
        total_notes: 3,
        total_reviews: 4,
    };
    render_one(&overview, OutputFormat::Csv, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "total_cards,total_decks,total_notes,total_reviews\n3,2,3,4\n"
    );
}
