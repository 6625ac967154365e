use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectionError>;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// A note-type, deck or field referenced by name doesn't exist.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not determine home directory to locate the collection")]
    NoHomeDir,
}

impl CollectionError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        CollectionError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

#[test]
fn test_not_found_names_entity() {
    let err = CollectionError::not_found("deck", "to_delete");
    assert_eq!(err.to_string(), "deck \"to_delete\" not found");
}
