use crate::collection::Collection;
use crate::error::{CollectionError, Result};
use crate::fields::{decompose, load_field_schemas};
use crate::models::CardRecord;
use crate::query::QueryBuilder;
use crate::utils::like_pattern;
use rusqlite::Connection;
use serde::Serialize;
use struct_field_names_as_array::FieldNamesAsArray;
use tracing::debug;

/// Per-card review aggregates. Cards without reviews get a count of 0 and
/// NULL for everything else.
const CARD_STATS: &str = "
    WITH card_stats AS (
        SELECT
            c.id AS card_id,
            COUNT(r.id) AS review_count,
            AVG(r.time) AS avg_review_time,
            MAX(r.id) AS last_review_time,
            (SELECT r2.ease FROM revlog r2 WHERE r2.cid = c.id
             ORDER BY r2.id DESC LIMIT 1) AS last_ease_factor
        FROM cards c
        LEFT JOIN revlog r ON r.cid = c.id
        GROUP BY c.id
    )
    SELECT
        n.id, c.id, n.mid, n.flds, d.name,
        cs.review_count, cs.avg_review_time, cs.last_review_time, cs.last_ease_factor
    FROM notes n
    JOIN cards c ON n.id = c.nid
    JOIN decks d ON c.did = d.id
    JOIN card_stats cs ON cs.card_id = c.id";

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    ReviewCount,
    AvgReviewTime,
    #[default]
    LastReviewTime,
    LastEase,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::ReviewCount => "cs.review_count",
            SortKey::AvgReviewTime => "cs.avg_review_time",
            SortKey::LastReviewTime => "cs.last_review_time",
            SortKey::LastEase => "cs.last_ease_factor",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub keyword: Option<String>,
    pub deck: Option<String>,
    pub sort_by: SortKey,
    pub order: SortOrder,
    /// Falls back to the configured search limit.
    pub limit: Option<u32>,
    pub min_review_count: u32,
    pub ease: Option<i64>,
    pub fields: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            keyword: None,
            deck: None,
            sort_by: SortKey::default(),
            order: SortOrder::default(),
            limit: None,
            min_review_count: 0,
            ease: None,
            fields: default_fields(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FindOptions {
    pub keyword: String,
    pub deck: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub case_sensitive: bool,
    pub fields: Vec<String>,
}

impl FindOptions {
    pub fn new(keyword: impl Into<String>) -> Self {
        FindOptions {
            keyword: keyword.into(),
            deck: None,
            limit: None,
            offset: 0,
            case_sensitive: false,
            fields: default_fields(),
        }
    }
}

pub fn default_fields() -> Vec<String> {
    vec!["front".to_string(), "back".to_string()]
}

impl Collection {
    /// Cards joined with their deck and review aggregates, most recently (or
    /// most, per `sort_by`) reviewed first. Cards never reviewed always come last.
    pub fn search(&self, options: &SearchOptions) -> Result<Vec<CardRecord>> {
        check_requested_fields(&options.fields)?;
        let mut query = QueryBuilder::new();
        if let Some(keyword) = options.keyword.as_deref().filter(|k| !k.is_empty()) {
            query.filter("n.flds LIKE ? ESCAPE '\\'", like_pattern(keyword));
        }
        query.filter_opt("d.name = ?", options.deck.clone());
        if options.min_review_count > 0 {
            query.filter("cs.review_count >= ?", options.min_review_count);
        }
        query.filter_opt("cs.last_ease_factor = ?", options.ease);
        query.bind(options.limit.unwrap_or(self.config().search_limit));

        let direction = match options.order {
            SortOrder::Desc => "DESC",
            SortOrder::Asc => "ASC",
        };
        let sql = format!(
            "{} {} ORDER BY cs.review_count = 0, {} {}, c.id LIMIT ?",
            CARD_STATS,
            query.where_clause(),
            options.sort_by.column(),
            direction
        );
        self.read(|conn| fetch_cards(conn, &sql, &query, &options.fields))
    }

    /// Paginated substring search over note fields, ordered by card id.
    pub fn find_cards_by_keyword(&self, options: &FindOptions) -> Result<Vec<CardRecord>> {
        check_requested_fields(&options.fields)?;
        let mut query = QueryBuilder::new();
        if options.case_sensitive {
            query.filter("instr(n.flds, ?) > 0", options.keyword.clone());
        } else {
            query.filter("n.flds LIKE ? ESCAPE '\\'", like_pattern(&options.keyword));
        }
        query.filter_opt("d.name = ?", options.deck.clone());
        query
            .bind(options.limit.unwrap_or(self.config().find_limit))
            .bind(options.offset);

        let sql = format!(
            "{} {} ORDER BY c.id LIMIT ? OFFSET ?",
            CARD_STATS,
            query.where_clause()
        );
        self.read(|conn| fetch_cards(conn, &sql, &query, &options.fields))
    }
}

/// Note fields are flattened next to the record's own columns, so they can't
/// reuse a column name.
fn check_requested_fields(requested: &[String]) -> Result<()> {
    let clash = requested.iter().find(|field| {
        CardRecord::FIELD_NAMES_AS_ARRAY
            .iter()
            .any(|column| column.eq_ignore_ascii_case(field))
    });
    match clash {
        Some(field) => Err(CollectionError::InvalidArgument(format!(
            "field name {:?} clashes with a card record column",
            field
        ))),
        None => Ok(()),
    }
}

fn fetch_cards(
    conn: &Connection,
    sql: &str,
    query: &QueryBuilder,
    requested: &[String],
) -> Result<Vec<CardRecord>> {
    debug!(sql, params = query.params().len(), "querying cards");
    let schemas = load_field_schemas(conn)?;
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(query.params().as_slice())?;
    let mut cards = Vec::new();
    while let Some(row) = rows.next()? {
        let model_id: i64 = row.get(2)?;
        let note_fields: String = row.get(3)?;
        let names = schemas.get(&model_id).map(Vec::as_slice).unwrap_or(&[]);
        cards.push(CardRecord {
            note_id: row.get(0)?,
            card_id: row.get(1)?,
            fields: decompose(&note_fields, names, requested),
            note_fields,
            deck_name: row.get(4)?,
            review_count: row.get(5)?,
            avg_review_time: row.get(6)?,
            last_review_time: row.get(7)?,
            last_ease_factor: row.get(8)?,
        });
    }
    debug!(count = cards.len(), "cards found");
    Ok(cards)
}

#[cfg(test)]
use crate::testutil::{Fixture, DEFAULT_DECK_ID, INBOX_DECK_ID};

#[cfg(test)]
fn fixture_with_reviews() -> Fixture {
    let fixture = Fixture::new();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "apple\x1fApfel", 2);
    fixture.add_note(20, 21, DEFAULT_DECK_ID, "pear\x1fBirne", 2);
    fixture.add_note(30, 31, INBOX_DECK_ID, "plum", 0);
    fixture.add_review(1000, 11, 3, 4000);
    fixture.add_review(3000, 11, 1, 2000);
    fixture.add_review(2000, 21, 4, 1000);
    fixture
}

#[cfg(test)]
fn card_ids(cards: &[CardRecord]) -> Vec<i64> {
    cards.iter().map(|c| c.card_id).collect()
}

#[test]
fn test_empty_collection_returns_nothing() {
    let fixture = Fixture::new();
    let options = SearchOptions {
        keyword: Some("anything".to_string()),
        ..SearchOptions::default()
    };
    assert!(fixture.collection().search(&options).unwrap().is_empty());
}

#[test]
fn test_aggregates_per_card() {
    let fixture = fixture_with_reviews();
    let cards = fixture.collection().search(&SearchOptions::default()).unwrap();
    assert_eq!(card_ids(&cards), vec![11, 21, 31]);

    let apple = &cards[0];
    assert_eq!(apple.review_count, 2);
    assert_eq!(apple.avg_review_time, Some(3000.0));
    assert_eq!(apple.last_review_time, Some(3000));
    // ease of the latest review, not the highest ease
    assert_eq!(apple.last_ease_factor, Some(1));
    assert_eq!(apple.fields["front"], Some("apple".to_string()));
    assert_eq!(apple.fields["back"], Some("Apfel".to_string()));

    let plum = &cards[2];
    assert_eq!(plum.review_count, 0);
    assert_eq!(plum.last_review_time, None);
    assert_eq!(plum.deck_name, "ai_inbox");
    assert_eq!(plum.fields["back"], None);
}

#[test]
fn test_unreviewed_cards_last_in_both_orders() {
    let fixture = fixture_with_reviews();
    let options = SearchOptions {
        order: SortOrder::Asc,
        ..SearchOptions::default()
    };
    let cards = fixture.collection().search(&options).unwrap();
    assert_eq!(card_ids(&cards), vec![21, 11, 31]);

    let options = SearchOptions {
        sort_by: SortKey::ReviewCount,
        order: SortOrder::Asc,
        ..SearchOptions::default()
    };
    let cards = fixture.collection().search(&options).unwrap();
    assert_eq!(card_ids(&cards), vec![21, 11, 31]);
}

#[test]
fn test_filters_combine() {
    let fixture = fixture_with_reviews();
    let collection = fixture.collection();

    let by_keyword = SearchOptions {
        keyword: Some("PEAR".to_string()),
        ..SearchOptions::default()
    };
    assert_eq!(card_ids(&collection.search(&by_keyword).unwrap()), vec![21]);

    let by_deck = SearchOptions {
        deck: Some("ai_inbox".to_string()),
        ..SearchOptions::default()
    };
    assert_eq!(card_ids(&collection.search(&by_deck).unwrap()), vec![31]);

    let by_reviews = SearchOptions {
        min_review_count: 2,
        ..SearchOptions::default()
    };
    assert_eq!(card_ids(&collection.search(&by_reviews).unwrap()), vec![11]);

    let by_ease = SearchOptions {
        ease: Some(4),
        ..SearchOptions::default()
    };
    assert_eq!(card_ids(&collection.search(&by_ease).unwrap()), vec![21]);
}

#[test]
fn test_limit_and_field_subset() {
    let fixture = fixture_with_reviews();
    let options = SearchOptions {
        limit: Some(1),
        fields: vec!["back".to_string()],
        ..SearchOptions::default()
    };
    let cards = fixture.collection().search(&options).unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].fields.len(), 1);
    assert_eq!(cards[0].fields["back"], Some("Apfel".to_string()));
}

#[test]
fn test_keyword_wildcards_are_literal() {
    let fixture = Fixture::new();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "100%\x1fall", 0);
    fixture.add_note(20, 21, DEFAULT_DECK_ID, "1000\x1fsome", 0);
    let options = SearchOptions {
        keyword: Some("0%".to_string()),
        ..SearchOptions::default()
    };
    let cards = fixture.collection().search(&options).unwrap();
    assert_eq!(card_ids(&cards), vec![11]);
}

#[test]
fn test_find_case_sensitivity() {
    let fixture = fixture_with_reviews();
    let collection = fixture.collection();

    let mut options = FindOptions::new("APPLE");
    assert_eq!(card_ids(&collection.find_cards_by_keyword(&options).unwrap()), vec![11]);

    options.case_sensitive = true;
    assert!(collection.find_cards_by_keyword(&options).unwrap().is_empty());

    options.keyword = "Apfel".to_string();
    let cards = collection.find_cards_by_keyword(&options).unwrap();
    assert!(cards.iter().all(|c| c.note_fields.contains("Apfel")));
    assert_eq!(card_ids(&cards), vec![11]);
}

#[test]
fn test_find_paginates() {
    let fixture = fixture_with_reviews();
    let collection = fixture.collection();
    let mut options = FindOptions::new("p");
    options.limit = Some(2);
    assert_eq!(card_ids(&collection.find_cards_by_keyword(&options).unwrap()), vec![11, 21]);

    options.offset = 2;
    assert_eq!(card_ids(&collection.find_cards_by_keyword(&options).unwrap()), vec![31]);

    options.deck = Some("Default".to_string());
    options.offset = 0;
    assert_eq!(card_ids(&collection.find_cards_by_keyword(&options).unwrap()), vec![11, 21]);
}

#[test]
fn test_field_names_cannot_shadow_columns() {
    let fixture = fixture_with_reviews();
    let collection = fixture.collection();
    let options = SearchOptions {
        fields: vec!["front".to_string(), "card_id".to_string()],
        ..SearchOptions::default()
    };
    let err = collection.search(&options).unwrap_err();
    assert!(matches!(err, CollectionError::InvalidArgument(_)));

    let mut options = FindOptions::new("apple");
    options.fields = vec!["Deck_Name".to_string()];
    let err = collection.find_cards_by_keyword(&options).unwrap_err();
    assert!(matches!(err, CollectionError::InvalidArgument(_)));
}
