use crate::collection::{require_deck_id, Collection};
use crate::error::Result;
use crate::models::ArchiveResult;
use rusqlite::params;
use tracing::{info, warn};

impl Collection {
    /// Moves a card into the archive deck. Only the card's deck reference
    /// changes; its note and review history stay, so moving it back undoes it.
    pub fn archive_card(&self, card_id: i64) -> Result<ArchiveResult> {
        let archive_deck = &self.config().archive_deck;
        self.write(|conn| {
            let deck_id = require_deck_id(conn, archive_deck)?;
            let changes = conn.execute(
                "UPDATE cards SET did = ?1 WHERE id = ?2",
                params![deck_id, card_id],
            )?;
            if changes == 0 {
                warn!(card_id, "no such card, nothing archived");
            } else {
                info!(card_id, deck = %archive_deck, "archived card");
            }
            Ok(ArchiveResult {
                card_id,
                deck_id,
                changes,
            })
        })
    }
}

#[cfg(test)]
use crate::error::CollectionError;
#[cfg(test)]
use crate::search::SearchOptions;
#[cfg(test)]
use crate::testutil::{Fixture, ARCHIVE_DECK_ID, DEFAULT_DECK_ID};

#[test]
fn test_archive_moves_only_deck_reference() {
    let fixture = Fixture::new();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "keep\x1fme", 2);
    fixture.add_note(20, 21, DEFAULT_DECK_ID, "other", 2);
    fixture.add_review(1000, 11, 3, 500);

    let result = fixture.collection().archive_card(11).unwrap();
    assert_eq!(
        result,
        ArchiveResult {
            card_id: 11,
            deck_id: ARCHIVE_DECK_ID,
            changes: 1
        }
    );
    assert_eq!(fixture.card_deck(11), ARCHIVE_DECK_ID);
    assert_eq!(fixture.card_deck(21), DEFAULT_DECK_ID);
    assert_eq!(fixture.count("notes"), 2);
    assert_eq!(fixture.count("revlog"), 1);

    let options = SearchOptions {
        deck: Some("to_delete".to_string()),
        ..SearchOptions::default()
    };
    let cards = fixture.collection().search(&options).unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].card_id, 11);
    assert_eq!(cards[0].review_count, 1);
}

#[test]
fn test_archive_without_archive_deck_fails() {
    let fixture = Fixture::without_archive_deck();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "q\x1fa", 0);
    let err = fixture.collection().archive_card(11).unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { kind: "deck", .. }));
    assert_eq!(fixture.card_deck(11), DEFAULT_DECK_ID);
}

#[test]
fn test_archive_unknown_card_changes_nothing() {
    let fixture = Fixture::new();
    let result = fixture.collection().archive_card(999).unwrap();
    assert_eq!(result.changes, 0);
}
