use rusqlite::types::ToSql;

/// Accumulates `WHERE` predicates together with their bound parameters so the
/// optional filters of a command never get spliced into SQL text.
///
/// Predicates use anonymous `?` placeholders; parameters are bound in the
/// order they were pushed, predicates first, then anything added by [`bind`].
///
/// [`bind`]: QueryBuilder::bind
#[derive(Default)]
pub struct QueryBuilder {
    predicates: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    trailing: Vec<Box<dyn ToSql>>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate with exactly one `?` placeholder.
    pub fn filter<T>(&mut self, predicate: &str, value: T) -> &mut Self
    where
        T: ToSql + 'static,
    {
        self.predicates.push(predicate.to_string());
        self.params.push(Box::new(value));
        self
    }

    /// Adds the predicate only when a value is present.
    pub fn filter_opt<T>(&mut self, predicate: &str, value: Option<T>) -> &mut Self
    where
        T: ToSql + 'static,
    {
        if let Some(value) = value {
            self.filter(predicate, value);
        }
        self
    }

    /// Binds a parameter used after the `WHERE` clause, e.g. `LIMIT ?`.
    pub fn bind<T>(&mut self, value: T) -> &mut Self
    where
        T: ToSql + 'static,
    {
        self.trailing.push(Box::new(value));
        self
    }

    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicates.join(" AND "))
        }
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params
            .iter()
            .chain(self.trailing.iter())
            .map(|p| p.as_ref())
            .collect()
    }
}

#[test]
fn test_empty_builder_has_no_where_clause() {
    let query = QueryBuilder::new();
    assert_eq!(query.where_clause(), "");
    assert!(query.params().is_empty());
}

#[test]
fn test_predicates_joined_with_and() {
    let mut query = QueryBuilder::new();
    query
        .filter("d.name = ?", "Default".to_string())
        .filter_opt::<i64>("r.ease = ?", None)
        .filter_opt("r.id >= ?", Some(10_i64))
        .bind(50_i64);
    assert_eq!(query.where_clause(), "WHERE d.name = ? AND r.id >= ?");
    assert_eq!(query.params().len(), 3);
}

#[test]
fn test_params_bind_in_order() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let mut query = QueryBuilder::new();
    query.filter("x = ?", 1_i64).bind(2_i64);
    let joined: String = conn
        .query_row("SELECT ? || ',' || ?", query.params().as_slice(), |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(joined, "1,2");
}
