use crate::collection::Collection;
use crate::error::Result;
use crate::models::{DeckDetails, Overview, ReviewMetrics};
use crate::query::QueryBuilder;
use tracing::debug;

/// Restricts review metrics to a review id range (ids are epoch millis) and/or a deck.
#[derive(Clone, Debug, Default)]
pub struct MetricsFilter {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub deck: Option<String>,
}

impl Collection {
    pub fn review_metrics(&self, filter: &MetricsFilter) -> Result<ReviewMetrics> {
        let mut query = QueryBuilder::new();
        query
            .filter_opt("r.id >= ?", filter.start)
            .filter_opt("r.id <= ?", filter.end)
            .filter_opt("d.name = ?", filter.deck.clone());
        let join = if filter.deck.is_some() {
            "JOIN cards c ON r.cid = c.id JOIN decks d ON c.did = d.id"
        } else {
            ""
        };
        let sql = format!(
            "SELECT
                COUNT(*),
                AVG(r.time),
                AVG(r.ease),
                MIN(r.id),
                MAX(r.id),
                COALESCE(SUM(r.ease = 1), 0),
                COALESCE(SUM(r.ease = 2), 0),
                COALESCE(SUM(r.ease = 3), 0),
                COALESCE(SUM(r.ease = 4), 0)
            FROM revlog r {} {}",
            join,
            query.where_clause()
        );
        debug!(sql = %sql, params = query.params().len(), "querying review metrics");
        self.read(|conn| {
            let metrics = conn.query_row(&sql, query.params().as_slice(), |row| {
                Ok(ReviewMetrics {
                    total_reviews: row.get(0)?,
                    avg_review_time: row.get(1)?,
                    avg_ease_factor: row.get(2)?,
                    first_review: row.get(3)?,
                    last_review: row.get(4)?,
                    again_count: row.get(5)?,
                    hard_count: row.get(6)?,
                    good_count: row.get(7)?,
                    easy_count: row.get(8)?,
                })
            })?;
            Ok(metrics)
        })
    }

    pub fn overview(&self) -> Result<Overview> {
        self.read(|conn| {
            let overview = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM cards),
                    (SELECT COUNT(DISTINCT did) FROM cards),
                    (SELECT COUNT(*) FROM notes),
                    (SELECT COUNT(*) FROM revlog)",
                [],
                |row| {
                    Ok(Overview {
                        total_cards: row.get(0)?,
                        total_decks: row.get(1)?,
                        total_notes: row.get(2)?,
                        total_reviews: row.get(3)?,
                    })
                },
            )?;
            Ok(overview)
        })
    }

    /// Card counts per deck and queue, largest deck first.
    pub fn deck_details(&self) -> Result<Vec<DeckDetails>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    d.id,
                    d.name,
                    COUNT(c.id),
                    COALESCE(SUM(c.queue = 0), 0),
                    COALESCE(SUM(c.queue IN (1, 3)), 0),
                    COALESCE(SUM(c.queue = 2), 0)
                FROM decks d
                LEFT JOIN cards c ON c.did = d.id
                GROUP BY d.id
                ORDER BY COUNT(c.id) DESC, d.name",
            )?;
            let decks = stmt
                .query_map([], |row| {
                    Ok(DeckDetails {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        total_cards: row.get(2)?,
                        new_cards: row.get(3)?,
                        learning_cards: row.get(4)?,
                        review_cards: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(decks)
        })
    }
}

#[cfg(test)]
use crate::testutil::{Fixture, DEFAULT_DECK_ID, INBOX_DECK_ID};

#[cfg(test)]
fn fixture_with_reviews() -> Fixture {
    let fixture = Fixture::new();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "a\x1fb", 2);
    fixture.add_note(20, 21, INBOX_DECK_ID, "c\x1fd", 1);
    fixture.add_note(30, 31, INBOX_DECK_ID, "e\x1ff", 0);
    fixture.add_review(1000, 11, 1, 1000);
    fixture.add_review(2000, 11, 3, 3000);
    fixture.add_review(3000, 21, 3, 2000);
    fixture.add_review(4000, 21, 4, 6000);
    fixture
}

#[cfg(test)]
fn bucket_sum(m: &ReviewMetrics) -> i64 {
    m.again_count + m.hard_count + m.good_count + m.easy_count
}

#[test]
fn test_empty_collection_is_all_zero() {
    let fixture = Fixture::new();
    let collection = fixture.collection();
    assert_eq!(
        collection.overview().unwrap(),
        Overview {
            total_cards: 0,
            total_decks: 0,
            total_notes: 0,
            total_reviews: 0
        }
    );
    let metrics = collection.review_metrics(&MetricsFilter::default()).unwrap();
    assert_eq!(metrics.total_reviews, 0);
    assert_eq!(bucket_sum(&metrics), 0);
    assert_eq!(metrics.avg_review_time, None);
    assert_eq!(metrics.first_review, None);
}

#[test]
fn test_metrics_over_all_reviews() {
    let fixture = fixture_with_reviews();
    let metrics = fixture
        .collection()
        .review_metrics(&MetricsFilter::default())
        .unwrap();
    assert_eq!(
        metrics,
        ReviewMetrics {
            total_reviews: 4,
            avg_review_time: Some(3000.0),
            avg_ease_factor: Some(2.75),
            first_review: Some(1000),
            last_review: Some(4000),
            again_count: 1,
            hard_count: 0,
            good_count: 2,
            easy_count: 1,
        }
    );
}

#[test]
fn test_metrics_filters_buckets_sum_to_total() {
    let fixture = fixture_with_reviews();
    let collection = fixture.collection();
    let filters = [
        MetricsFilter {
            deck: Some("ai_inbox".to_string()),
            ..MetricsFilter::default()
        },
        MetricsFilter {
            start: Some(2000),
            end: Some(3000),
            ..MetricsFilter::default()
        },
        MetricsFilter {
            start: Some(1500),
            end: None,
            deck: Some("Default".to_string()),
        },
    ];
    let totals: Vec<i64> = filters
        .iter()
        .map(|f| {
            let m = collection.review_metrics(f).unwrap();
            assert_eq!(bucket_sum(&m), m.total_reviews);
            m.total_reviews
        })
        .collect();
    assert_eq!(totals, vec![2, 2, 1]);
}

#[test]
fn test_overview_counts() {
    let fixture = fixture_with_reviews();
    assert_eq!(
        fixture.collection().overview().unwrap(),
        Overview {
            total_cards: 3,
            total_decks: 2,
            total_notes: 3,
            total_reviews: 4
        }
    );
}

#[test]
fn test_deck_details_by_queue() {
    let fixture = fixture_with_reviews();
    let decks = fixture.collection().deck_details().unwrap();
    let names: Vec<&str> = decks.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["ai_inbox", "Default", "to_delete"]);
    assert_eq!(
        decks[0],
        DeckDetails {
            id: INBOX_DECK_ID,
            name: "ai_inbox".to_string(),
            total_cards: 2,
            new_cards: 1,
            learning_cards: 1,
            review_cards: 0,
        }
    );
    assert_eq!(decks[1].review_cards, 1);
    assert_eq!(decks[2].total_cards, 0);
}
