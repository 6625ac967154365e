use crate::error::{CollectionError, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE: &str = "User 1";
pub const DEFAULT_INBOX_DECK: &str = "ai_inbox";
pub const DEFAULT_ARCHIVE_DECK: &str = "to_delete";
pub const DEFAULT_MODEL: &str = "Basic";
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;
pub const DEFAULT_FIND_LIMIT: u32 = 20;

const COLLECTION_FILE: &str = "collection.anki2";

/// Everything the accessor needs to know about where the collection lives and
/// which well-known decks and note-types to use.
#[derive(Clone, Debug)]
pub struct CollectionConfig {
    pub db_path: PathBuf,
    pub inbox_deck: String,
    pub archive_deck: String,
    pub default_model: String,
    pub search_limit: u32,
    pub find_limit: u32,
}

impl CollectionConfig {
    /// Config pointing at an explicit collection file, all other settings default.
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        CollectionConfig {
            db_path: db_path.into(),
            inbox_deck: DEFAULT_INBOX_DECK.to_string(),
            archive_deck: DEFAULT_ARCHIVE_DECK.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            find_limit: DEFAULT_FIND_LIMIT,
        }
    }

    /// Config for the collection of the given Anki profile under the user's home.
    pub fn for_profile(profile: &str) -> Result<Self> {
        let home = dirs::home_dir().ok_or(CollectionError::NoHomeDir)?;
        Ok(Self::with_path(profile_collection_path(&home, profile)))
    }
}

/// `<home>/<platform Anki2 dir>/<profile>/collection.anki2`
pub fn profile_collection_path(home: &Path, profile: &str) -> PathBuf {
    anki_base_dir(home).join(profile).join(COLLECTION_FILE)
}

fn anki_base_dir(home: &Path) -> PathBuf {
    if cfg!(target_os = "macos") {
        home.join("Library").join("Application Support").join("Anki2")
    } else if cfg!(target_os = "windows") {
        home.join("AppData").join("Roaming").join("Anki2")
    } else {
        home.join(".local").join("share").join("Anki2")
    }
}

#[test]
fn test_profile_collection_path() {
    let path = profile_collection_path(Path::new("/home/me"), "alien");
    assert!(path.starts_with("/home/me"));
    assert!(path.ends_with("Anki2/alien/collection.anki2"));
}

#[test]
fn test_with_path_uses_defaults() {
    let config = CollectionConfig::with_path("/tmp/c.anki2");
    assert_eq!(config.inbox_deck, "ai_inbox");
    assert_eq!(config.archive_deck, "to_delete");
    assert_eq!(config.default_model, "Basic");
    assert_eq!(config.search_limit, 50);
}
