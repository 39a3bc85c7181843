//! Bookmark listing plans.
//!
//! A [`BookmarkQuery`] is the validated form of the listing parameters. Its
//! SQL is assembled only from `&'static str` fragments chosen by the enums
//! below; everything the client sends travels as a bound parameter.

use libsql::Value;
use serde::Deserialize;

pub(crate) const BOOKMARK_COLUMNS: &str =
    "id, url, name, favicon_url, note, folder_id, tags, favorite, bookmarked_at";

/// Which folders a listing covers. Exactly one applies per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Unsorted,
    Folder(i64),
}

/// Scope used when a listing names neither `unsorted` nor a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultScope {
    #[default]
    All,
    Unsorted,
}

impl DefaultScope {
    pub fn scope(self) -> Scope {
        match self {
            DefaultScope::All => Scope::All,
            DefaultScope::Unsorted => Scope::Unsorted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    BookmarkedAt,
    Name,
}

impl SortField {
    /// Anything outside the allowlist falls back to `bookmarked_at`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("bookmarked_at") | Some("bookmarkedAt") => SortField::BookmarkedAt,
            Some("name") => SortField::Name,
            _ => SortField::default(),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::BookmarkedAt => "bookmarked_at",
            SortField::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::default(),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkQuery {
    pub url_contains: Option<String>,
    pub name_contains: Option<String>,
    pub scope: Scope,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for BookmarkQuery {
    fn default() -> Self {
        Self {
            url_contains: None,
            name_contains: None,
            scope: Scope::All,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl BookmarkQuery {
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conditions: Vec<&'static str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        match self.scope {
            Scope::All => {}
            Scope::Unsorted => conditions.push("folder_id IS NULL"),
            Scope::Folder(id) => {
                conditions.push("folder_id = ?");
                params.push(Value::Integer(id));
            }
        }

        if let Some(url) = non_empty(&self.url_contains) {
            conditions.push("url LIKE ? ESCAPE '\\'");
            params.push(Value::Text(contains_pattern(url)));
        }

        if let Some(name) = non_empty(&self.name_contains) {
            conditions.push("name LIKE ? ESCAPE '\\'");
            params.push(Value::Text(contains_pattern(name)));
        }

        let mut sql = format!("SELECT {} FROM bookmarks", BOOKMARK_COLUMNS);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let column = self.sort_by.column();
        let direction = self.sort_order.keyword();
        sql.push_str(&format!(" ORDER BY {column} {direction}, id {direction}"));

        (sql, params)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Wraps `value` in `%` wildcards, escaping LIKE metacharacters so the value
/// matches literally.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_allowlist() {
        assert_eq!(SortField::parse(None), SortField::BookmarkedAt);
        assert_eq!(SortField::parse(Some("name")), SortField::Name);
        assert_eq!(SortField::parse(Some("bookmarkedAt")), SortField::BookmarkedAt);
        assert_eq!(SortField::parse(Some("Name")), SortField::BookmarkedAt);
        assert_eq!(SortField::parse(Some("evil; DROP TABLE bookmarks")), SortField::BookmarkedAt);
        assert_eq!(SortField::parse(Some("url")), SortField::BookmarkedAt);
    }

    #[test]
    fn test_sort_order_allowlist() {
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("x")), SortOrder::Desc);
    }

    #[test]
    fn test_default_query_sql() {
        let (sql, params) = BookmarkQuery::default().to_sql();
        assert_eq!(
            sql,
            format!("SELECT {BOOKMARK_COLUMNS} FROM bookmarks ORDER BY bookmarked_at DESC, id DESC")
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_filters_are_bound_and_combined() {
        let query = BookmarkQuery {
            url_contains: Some("github".to_string()),
            name_contains: Some("rust".to_string()),
            scope: Scope::Folder(3),
            sort_by: SortField::Name,
            sort_order: SortOrder::Asc,
        };
        let (sql, params) = query.to_sql();

        assert!(sql.ends_with(
            "WHERE folder_id = ? AND url LIKE ? ESCAPE '\\' AND name LIKE ? ESCAPE '\\' ORDER BY name ASC, id ASC"
        ));
        assert_eq!(
            params,
            vec![
                Value::Integer(3),
                Value::Text("%github%".to_string()),
                Value::Text("%rust%".to_string()),
            ]
        );
    }

    #[test]
    fn test_unsorted_scope_has_no_params() {
        let query = BookmarkQuery {
            scope: Scope::Unsorted,
            ..Default::default()
        };
        let (sql, params) = query.to_sql();
        assert!(sql.contains("WHERE folder_id IS NULL ORDER BY"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_filters_are_ignored() {
        let query = BookmarkQuery {
            url_contains: Some(String::new()),
            name_contains: Some(String::new()),
            ..Default::default()
        };
        let (sql, params) = query.to_sql();
        assert!(!sql.contains("WHERE"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_user_input_never_reaches_sql_text() {
        let query = BookmarkQuery {
            url_contains: Some("'; DROP TABLE bookmarks; --".to_string()),
            ..Default::default()
        };
        let (sql, _) = query.to_sql();
        assert!(!sql.contains("DROP"));
    }
}
