use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub favicon_url: String,
    pub note: String,
    pub folder_id: Option<i64>,
    pub tags: String,
    pub favorite: bool,
    pub bookmarked_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookmark {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite: bool,
}

/// Partial update for a bookmark. Absent fields are left untouched.
///
/// `folder_id` has three states: absent (`None`), explicit `null`
/// (`Some(None)`, moves the bookmark to unsorted) and a folder id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookmark {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub folder_id: Option<Option<i64>>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub favorite: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFolder {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFolder {
    #[serde(default)]
    pub name: Option<String>,
}

// A present key always lands in `Some`, so `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Explicit `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl CreateBookmark {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

impl UpdateBookmark {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err("url must not be empty".to_string());
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

impl CreateFolder {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

impl UpdateFolder {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}
