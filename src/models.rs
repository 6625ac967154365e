use serde::Serialize;
use std::collections::BTreeMap;
use struct_field_names_as_array::FieldNamesAsArray;

/// A card as returned by `search` and `find`: identifiers, deck, review
/// aggregates and the requested subset of decomposed note fields.
#[derive(Debug, Clone, Serialize, FieldNamesAsArray)]
pub struct CardRecord {
    pub note_id: i64,
    pub card_id: i64,
    pub deck_name: String,
    pub note_fields: String,
    pub review_count: i64,
    pub avg_review_time: Option<f64>,
    pub last_review_time: Option<i64>,
    pub last_ease_factor: Option<i64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FieldNamesAsArray)]
#[serde(rename_all = "camelCase")]
pub struct AddedCard {
    pub note_id: i64,
    pub card_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FieldNamesAsArray)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResult {
    pub card_id: i64,
    pub deck_id: i64,
    pub changes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, FieldNamesAsArray)]
pub struct ReviewMetrics {
    pub total_reviews: i64,
    pub avg_review_time: Option<f64>,
    pub avg_ease_factor: Option<f64>,
    pub first_review: Option<i64>,
    pub last_review: Option<i64>,
    pub again_count: i64,
    pub hard_count: i64,
    pub good_count: i64,
    pub easy_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FieldNamesAsArray)]
pub struct Overview {
    pub total_cards: i64,
    pub total_decks: i64,
    pub total_notes: i64,
    pub total_reviews: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FieldNamesAsArray)]
pub struct DeckDetails {
    pub id: i64,
    pub name: String,
    pub total_cards: i64,
    pub new_cards: i64,
    pub learning_cards: i64,
    pub review_cards: i64,
}
