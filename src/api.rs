use crate::error::ApiError;
use crate::query::{BookmarkQuery, DefaultScope, Scope, SortField, SortOrder};

/// Raw query string of `GET /bookmarks`. Everything arrives as text and is
/// validated by [`ListBookmarksParams::into_query`].
#[derive(Debug, Default)]
pub struct ListBookmarksParams {
    pub url: Option<String>,
    pub name: Option<String>,
    pub unsorted: Option<String>,
    pub folder_id: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListBookmarksParams {
    /// Collects decoded query pairs. A repeated key keeps its first value and
    /// unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "url" => &mut params.url,
                "name" => &mut params.name,
                "unsorted" => &mut params.unsorted,
                "folder_id" => &mut params.folder_id,
                "sortBy" => &mut params.sort_by,
                "sortOrder" => &mut params.sort_order,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    pub fn into_query(self, default_scope: DefaultScope) -> Result<BookmarkQuery, ApiError> {
        let folder_id = self.folder_id.as_deref().map(str::trim).filter(|v| !v.is_empty());

        let scope = if self.unsorted.as_deref() == Some("true") {
            Scope::Unsorted
        } else if let Some(raw) = folder_id {
            let id = raw
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid folder_id: {raw}")))?;
            Scope::Folder(id)
        } else {
            default_scope.scope()
        };

        Ok(BookmarkQuery {
            url_contains: self.url.filter(|v| !v.is_empty()),
            name_contains: self.name.filter(|v| !v.is_empty()),
            scope,
            sort_by: SortField::parse(self.sort_by.as_deref()),
            sort_order: SortOrder::parse(self.sort_order.as_deref()),
        })
    }
}
