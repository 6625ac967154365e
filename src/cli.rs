//! Command-line surface: argument definitions and dispatch of one command to
//! the collection, rendering its result.

use crate::add::NewNote;
use crate::config::{self, CollectionConfig};
use crate::output::{render_many, render_one, OutputFormat};
use crate::search::{default_fields, FindOptions, SearchOptions, SortKey, SortOrder};
use crate::stats::MetricsFilter;
use crate::utils::{parse_review_bound, Bound};
use crate::Collection;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Search, add, archive and summarize cards of a local Anki collection.
#[derive(Parser)]
#[command(name = "ankiq", version, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Path to the collection file (overrides --profile)
    #[arg(long, global = true)]
    pub collection: Option<PathBuf>,
    /// Anki profile whose collection to open
    #[arg(long, global = true, default_value = config::DEFAULT_PROFILE)]
    pub profile: String,
    /// Deck new cards go to
    #[arg(long, global = true, default_value = config::DEFAULT_INBOX_DECK)]
    pub inbox_deck: String,
    /// Deck archived cards are moved to
    #[arg(long, global = true, default_value = config::DEFAULT_ARCHIVE_DECK)]
    pub archive_deck: String,
    /// Note-type used for new notes
    #[arg(long, global = true, default_value = config::DEFAULT_MODEL)]
    pub model: String,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search cards with their review aggregates
    Search {
        keyword: Option<String>,
        deck: Option<String>,
        #[arg(long, value_enum, default_value_t = SortKey::LastReviewTime)]
        sort: SortKey,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        min_reviews: u32,
        /// Only cards whose latest review had this ease (1-4)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=4))]
        ease: Option<i64>,
        /// Note fields to include, by name or front/back
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Add a note with one card
    Add {
        /// Deck to add to; "" means the inbox deck (--inbox-deck)
        deck: String,
        front: String,
        back: Option<String>,
        /// Extra field assignment, NAME=VALUE
        #[arg(long = "field", value_parser = parse_assignment)]
        extra: Vec<(String, String)>,
    },
    /// Move a card to the archive deck
    Archive { card_id: i64 },
    /// Review statistics, optionally by deck and review id or date range
    Metrics {
        deck: Option<String>,
        start: Option<String>,
        end: Option<String>,
    },
    /// Collection-wide counts
    Overview,
    /// Review statistics over the whole collection
    Reviews,
    /// Card counts per deck and queue
    Decks,
    /// Paginated keyword search over note fields
    Find {
        keyword: String,
        #[arg(long)]
        deck: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
}

impl Cli {
    pub fn config(&self) -> Result<CollectionConfig> {
        let mut config = match &self.collection {
            Some(path) => CollectionConfig::with_path(path),
            None => CollectionConfig::for_profile(&self.profile)?,
        };
        config.inbox_deck = self.inbox_deck.clone();
        config.archive_deck = self.archive_deck.clone();
        config.default_model = self.model.clone();
        Ok(config)
    }
}

/// Runs one command. Nothing is written to `out` unless the command succeeded.
pub fn run<W: Write>(
    collection: &Collection,
    command: Command,
    format: OutputFormat,
    out: W,
) -> Result<()> {
    match command {
        Command::Search {
            keyword,
            deck,
            sort,
            order,
            limit,
            min_reviews,
            ease,
            fields,
        } => {
            let options = SearchOptions {
                keyword: non_empty(keyword),
                deck: non_empty(deck),
                sort_by: sort,
                order,
                limit,
                min_review_count: min_reviews,
                ease,
                fields: fields_or_default(fields),
            };
            render_many(&collection.search(&options)?, format, out)
        }
        Command::Add {
            deck,
            front,
            back,
            extra,
        } => {
            let mut fields = vec![("front".to_string(), front)];
            if let Some(back) = back {
                fields.push(("back".to_string(), back));
            }
            fields.extend(extra);
            let note = NewNote {
                deck: non_empty(Some(deck)),
                model: None,
                fields,
            };
            render_one(&collection.add_card(&note)?, format, out)
        }
        Command::Archive { card_id } => render_one(&collection.archive_card(card_id)?, format, out),
        Command::Metrics { deck, start, end } => {
            let filter = MetricsFilter {
                start: start
                    .as_deref()
                    .map(|s| parse_review_bound(s, Bound::Start))
                    .transpose()?,
                end: end
                    .as_deref()
                    .map(|s| parse_review_bound(s, Bound::End))
                    .transpose()?,
                deck: non_empty(deck),
            };
            render_one(&collection.review_metrics(&filter)?, format, out)
        }
        Command::Overview => render_one(&collection.overview()?, format, out),
        Command::Reviews => {
            render_one(&collection.review_metrics(&MetricsFilter::default())?, format, out)
        }
        Command::Decks => render_many(&collection.deck_details()?, format, out),
        Command::Find {
            keyword,
            deck,
            limit,
            offset,
            case_sensitive,
            fields,
        } => {
            let options = FindOptions {
                keyword,
                deck: non_empty(deck),
                limit,
                offset,
                case_sensitive,
                fields: fields_or_default(fields),
            };
            render_many(&collection.find_cards_by_keyword(&options)?, format, out)
        }
    }
}

fn parse_assignment(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {:?}", s))?;
    Ok((name.trim().to_string(), value.to_string()))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

fn fields_or_default(fields: Vec<String>) -> Vec<String> {
    if fields.is_empty() {
        default_fields()
    } else {
        fields
    }
}

/// Parses `args` against the fixture's collection and runs the command,
/// returning the result and whatever was written.
#[cfg(test)]
fn dispatch(fixture: &crate::testutil::Fixture, args: &[&str]) -> (Result<()>, String) {
    let path = fixture.path.to_str().unwrap();
    let argv = ["ankiq", "--collection", path]
        .into_iter()
        .chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).unwrap();
    let collection = Collection::new(cli.config().unwrap());
    let mut out = Vec::new();
    let result = run(&collection, cli.command, cli.format, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[cfg(test)]
fn fixture_with_reviews() -> crate::testutil::Fixture {
    use crate::testutil::{Fixture, DEFAULT_DECK_ID, INBOX_DECK_ID};

    let fixture = Fixture::new();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "a\x1fb", 2);
    fixture.add_note(20, 21, INBOX_DECK_ID, "c\x1fd", 2);
    fixture.add_review(2500, 21, 3, 1000);
    fixture.add_review(5000, 21, 1, 1000);
    fixture.add_review(2600, 11, 4, 1000);
    fixture
}

#[test]
fn test_cli_is_well_formed() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn test_parse_add_with_extra_fields() {
    let cli = Cli::try_parse_from([
        "ankiq", "add", "ai_inbox", "Q", "A", "--field", "Notes=n=1",
    ])
    .unwrap();
    match cli.command {
        Command::Add { deck, front, back, extra } => {
            assert_eq!(deck, "ai_inbox");
            assert_eq!(front, "Q");
            assert_eq!(back.as_deref(), Some("A"));
            assert_eq!(extra, vec![("Notes".to_string(), "n=1".to_string())]);
        }
        _ => panic!("expected add"),
    }
}

#[test]
fn test_unknown_command_is_usage_error() {
    let err = Cli::try_parse_from(["ankiq", "frobnicate"]).err().unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
}

#[test]
fn test_search_defaults() {
    let cli = Cli::try_parse_from(["ankiq", "search", "word", "--fields", "front,extra"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Json);
    assert_eq!(cli.profile, "User 1");
    match cli.command {
        Command::Search { keyword, deck, sort, limit, fields, .. } => {
            assert_eq!(keyword.as_deref(), Some("word"));
            assert_eq!(deck, None);
            assert_eq!(sort, SortKey::LastReviewTime);
            assert_eq!(limit, None);
            assert_eq!(fields, vec!["front".to_string(), "extra".to_string()]);
        }
        _ => panic!("expected search"),
    }
}

#[test]
fn test_failed_archive_writes_nothing() {
    use crate::testutil::{Fixture, DEFAULT_DECK_ID};

    let fixture = Fixture::without_archive_deck();
    fixture.add_note(10, 11, DEFAULT_DECK_ID, "q\x1fa", 0);
    let (result, out) = dispatch(&fixture, &["archive", "11"]);
    assert_eq!(result.unwrap_err().to_string(), "deck \"to_delete\" not found");
    assert!(out.is_empty());
    assert_eq!(fixture.card_deck(11), DEFAULT_DECK_ID);
}

#[test]
fn test_metrics_by_deck_and_range() {
    let fixture = fixture_with_reviews();
    let (result, out) = dispatch(&fixture, &["metrics", "ai_inbox", "2000", "3000"]);
    result.unwrap();
    let metrics: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(metrics["total_reviews"], 1);
    assert_eq!(metrics["first_review"], 2500);
    assert_eq!(metrics["good_count"], 1);
}

#[test]
fn test_metrics_rejects_bad_bound() {
    let fixture = fixture_with_reviews();
    let (result, out) = dispatch(&fixture, &["metrics", "ai_inbox", "yesterday"]);
    assert!(result.is_err());
    assert!(out.is_empty());
}

#[test]
fn test_reviews_is_unfiltered() {
    let fixture = fixture_with_reviews();
    let (result, out) = dispatch(&fixture, &["reviews"]);
    result.unwrap();
    let metrics: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(metrics["total_reviews"], 3);
    assert_eq!(metrics["first_review"], 2500);
    assert_eq!(metrics["last_review"], 5000);
}

#[test]
fn test_add_with_empty_deck_uses_inbox() {
    use crate::testutil::{Fixture, INBOX_DECK_ID};

    let fixture = Fixture::new();
    let (result, out) = dispatch(&fixture, &["add", "", "Q", "A"]);
    result.unwrap();
    let added: serde_json::Value = serde_json::from_str(&out).unwrap();
    let card_id = added["cardId"].as_i64().unwrap();
    assert_eq!(added["noteId"].as_i64().unwrap() + 1, card_id);
    assert_eq!(fixture.card_deck(card_id), INBOX_DECK_ID);

    let (result, out) = dispatch(&fixture, &["search", "Q", "--format", "csv"]);
    result.unwrap();
    assert!(out.lines().nth(1).unwrap().ends_with(",A,Q"));
}
