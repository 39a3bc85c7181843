use anyhow::Result;
use libsql::{Connection, Value};
use std::collections::HashMap;

use crate::favicon::favicon_url;
use crate::model::{Bookmark, CreateBookmark, CreateFolder, Folder, UpdateBookmark, UpdateFolder};
use crate::query::{BOOKMARK_COLUMNS, BookmarkQuery};

const FOLDER_COLUMNS: &str = "id, name, created_at";

/// Bookmark and folder persistence over a borrowed connection.
pub struct Store<'a> {
    conn: &'a Connection,
}

impl<'a> Store<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------------

    pub async fn create_bookmark(&self, input: CreateBookmark) -> Result<Bookmark> {
        let favicon = match input.favicon_url {
            Some(url) if !url.is_empty() => url,
            _ => favicon_url(&input.url),
        };

        let query = format!(
            r#"
            INSERT INTO bookmarks (url, name, favicon_url, note, folder_id, tags, favorite)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            BOOKMARK_COLUMNS
        );

        let mut rows = self
            .conn
            .query(
                &query,
                vec![
                    Value::Text(input.url),
                    Value::Text(input.name),
                    Value::Text(favicon),
                    Value::Text(input.note.unwrap_or_default()),
                    nullable(input.folder_id),
                    Value::Text(input.tags.unwrap_or_default()),
                    Value::Integer(i64::from(input.favorite)),
                ],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row_to_bookmark(&row)?)
        } else {
            anyhow::bail!("Failed to create bookmark")
        }
    }

    pub async fn get_bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        let query = format!("SELECT {} FROM bookmarks WHERE id = ?", BOOKMARK_COLUMNS);
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_bookmark(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn list_bookmarks(&self, plan: &BookmarkQuery) -> Result<Vec<Bookmark>> {
        let (query, params) = plan.to_sql();
        tracing::debug!(sql = %query, "listing bookmarks");

        let mut rows = self.conn.query(&query, params).await?;
        let mut bookmarks = Vec::new();
        while let Some(row) = rows.next().await? {
            bookmarks.push(row_to_bookmark(&row)?);
        }

        Ok(bookmarks)
    }

    pub async fn update_bookmark(&self, id: i64, input: UpdateBookmark) -> Result<Option<Bookmark>> {
        if self.get_bookmark(id).await?.is_none() {
            return Ok(None);
        }

        let mut updates = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(url) = input.url {
            updates.push("url = ?");
            params.push(Value::Text(url));
        }
        if let Some(name) = input.name {
            updates.push("name = ?");
            params.push(Value::Text(name));
        }
        if let Some(favicon) = input.favicon_url {
            updates.push("favicon_url = ?");
            params.push(Value::Text(favicon));
        }
        if let Some(note) = input.note {
            updates.push("note = ?");
            params.push(Value::Text(note));
        }
        if let Some(folder_id) = input.folder_id {
            updates.push("folder_id = ?");
            params.push(nullable(folder_id));
        }
        if let Some(tags) = input.tags {
            updates.push("tags = ?");
            params.push(Value::Text(tags));
        }
        if let Some(favorite) = input.favorite {
            updates.push("favorite = ?");
            params.push(Value::Integer(i64::from(favorite)));
        }

        if updates.is_empty() {
            return self.get_bookmark(id).await;
        }

        params.push(Value::Integer(id));
        let query = format!("UPDATE bookmarks SET {} WHERE id = ?", updates.join(", "));

        self.conn.execute(&query, params).await?;
        self.get_bookmark(id).await
    }

    pub async fn delete_bookmark(&self, id: i64) -> Result<bool> {
        let result = self
            .conn
            .execute("DELETE FROM bookmarks WHERE id = ?", libsql::params![id])
            .await?;
        Ok(result > 0)
    }

    pub async fn list_bookmarks_missing_favicon(&self) -> Result<Vec<Bookmark>> {
        let query = format!(
            "SELECT {} FROM bookmarks WHERE favicon_url = '' ORDER BY id",
            BOOKMARK_COLUMNS
        );
        let mut rows = self.conn.query(&query, ()).await?;
        let mut bookmarks = Vec::new();
        while let Some(row) = rows.next().await? {
            bookmarks.push(row_to_bookmark(&row)?);
        }
        Ok(bookmarks)
    }

    pub async fn set_favicon(&self, id: i64, favicon: &str) -> Result<bool> {
        let result = self
            .conn
            .execute(
                "UPDATE bookmarks SET favicon_url = ? WHERE id = ?",
                libsql::params![favicon, id],
            )
            .await?;
        Ok(result > 0)
    }

    // ------------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------------

    pub async fn create_folder(&self, input: CreateFolder) -> Result<Folder> {
        let query = format!(
            "INSERT INTO folders (name) VALUES (?) RETURNING {}",
            FOLDER_COLUMNS
        );
        let mut rows = self.conn.query(&query, libsql::params![input.name]).await?;

        if let Some(row) = rows.next().await? {
            Ok(row_to_folder(&row)?)
        } else {
            anyhow::bail!("Failed to create folder")
        }
    }

    /// Every folder, each carrying its bookmarks.
    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        let query = format!("SELECT {} FROM folders ORDER BY id", FOLDER_COLUMNS);
        let mut rows = self.conn.query(&query, ()).await?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next().await? {
            folders.push(row_to_folder(&row)?);
        }

        let query = format!(
            "SELECT {} FROM bookmarks WHERE folder_id IS NOT NULL ORDER BY id",
            BOOKMARK_COLUMNS
        );
        let mut rows = self.conn.query(&query, ()).await?;
        let mut by_folder: HashMap<i64, Vec<Bookmark>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let bookmark = row_to_bookmark(&row)?;
            if let Some(folder_id) = bookmark.folder_id {
                by_folder.entry(folder_id).or_default().push(bookmark);
            }
        }

        for folder in &mut folders {
            folder.bookmarks = by_folder.remove(&folder.id).unwrap_or_default();
        }

        Ok(folders)
    }

    pub async fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        let query = format!("SELECT {} FROM folders WHERE id = ?", FOLDER_COLUMNS);
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;

        let mut folder = match rows.next().await? {
            Some(row) => row_to_folder(&row)?,
            None => return Ok(None),
        };

        let query = format!(
            "SELECT {} FROM bookmarks WHERE folder_id = ? ORDER BY id",
            BOOKMARK_COLUMNS
        );
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;
        while let Some(row) = rows.next().await? {
            folder.bookmarks.push(row_to_bookmark(&row)?);
        }

        Ok(Some(folder))
    }

    pub async fn update_folder(&self, id: i64, input: UpdateFolder) -> Result<Option<Folder>> {
        if self.get_folder(id).await?.is_none() {
            return Ok(None);
        }

        if let Some(name) = input.name {
            self.conn
                .execute("UPDATE folders SET name = ? WHERE id = ?", libsql::params![name, id])
                .await?;
        }

        self.get_folder(id).await
    }

    pub async fn delete_folder(&self, id: i64) -> Result<bool> {
        let result = self
            .conn
            .execute("DELETE FROM folders WHERE id = ?", libsql::params![id])
            .await?;
        Ok(result > 0)
    }

    pub async fn count_bookmarks_in_folder(&self, folder_id: i64) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM bookmarks WHERE folder_id = ?",
                libsql::params![folder_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Moves every bookmark of `folder_id` to unsorted.
    /// Moves the folder's bookmarks to unsorted and deletes the folder in one
    /// transaction. Returns the number of moved bookmarks and whether the folder
    /// row was removed.
    pub async fn detach_and_delete_folder(&self, folder_id: i64) -> Result<(u64, bool)> {
        let tx = self.conn.transaction().await?;
        let outcome = async {
            let moved = tx
                .execute(
                    "UPDATE bookmarks SET folder_id = NULL WHERE folder_id = ?",
                    libsql::params![folder_id],
                )
                .await?;
            let deleted = tx
                .execute("DELETE FROM folders WHERE id = ?", libsql::params![folder_id])
                .await?;
            Ok::<_, libsql::Error>((moved, deleted))
        }
        .await;

        let (moved, deleted) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                tx.rollback().await?;
                return Err(e.into());
            }
        };
        tx.commit().await?;
        Ok((moved, deleted > 0))
    }
}

fn nullable(value: Option<i64>) -> Value {
    match value {
        Some(v) => Value::Integer(v),
        None => Value::Null,
    }
}

fn row_to_bookmark(row: &libsql::Row) -> Result<Bookmark> {
    Ok(Bookmark {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        favicon_url: row.get::<Option<String>>(3)?.unwrap_or_default(),
        note: row.get::<Option<String>>(4)?.unwrap_or_default(),
        folder_id: row.get(5)?,
        tags: row.get::<Option<String>>(6)?.unwrap_or_default(),
        favorite: row.get::<Option<i64>>(7)?.unwrap_or(0) != 0,
        bookmarked_at: row.get(8)?,
    })
}

fn row_to_folder(row: &libsql::Row) -> Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        bookmarks: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::query::{Scope, SortField, SortOrder};
    use tempfile::TempDir;

    async fn setup() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("test.db")).await.unwrap();
        (db, dir)
    }

    fn bookmark(url: &str, name: &str, folder_id: Option<i64>) -> CreateBookmark {
        CreateBookmark {
            url: url.to_string(),
            name: name.to_string(),
            folder_id,
            ..Default::default()
        }
    }

    fn ids(bookmarks: &[Bookmark]) -> Vec<i64> {
        bookmarks.iter().map(|b| b.id).collect()
    }

    #[tokio::test]
    async fn test_create_bookmark_derives_favicon() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());

        let created = store
            .create_bookmark(bookmark("https://docs.rs/tokio", "tokio docs", None))
            .await
            .unwrap();
        assert_eq!(
            created.favicon_url,
            "https://www.google.com/s2/favicons?sz=64&domain=docs.rs"
        );
        assert!(!created.favorite);
        assert_eq!(created.note, "");
        assert!(!created.bookmarked_at.is_empty());

        let unparseable = store
            .create_bookmark(bookmark("not a url", "broken", None))
            .await
            .unwrap();
        assert_eq!(unparseable.favicon_url, "");

        let explicit = store
            .create_bookmark(CreateBookmark {
                favicon_url: Some("https://cdn.example.com/icon.png".to_string()),
                ..bookmark("https://example.com", "example", None)
            })
            .await
            .unwrap();
        assert_eq!(explicit.favicon_url, "https://cdn.example.com/icon.png");
    }

    #[tokio::test]
    async fn test_list_scopes() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let work = store.create_folder(CreateFolder { name: "work".into() }).await.unwrap();
        let fun = store.create_folder(CreateFolder { name: "fun".into() }).await.unwrap();

        let a = store.create_bookmark(bookmark("https://a.dev", "a", None)).await.unwrap();
        let b = store.create_bookmark(bookmark("https://b.dev", "b", Some(work.id))).await.unwrap();
        let c = store.create_bookmark(bookmark("https://c.dev", "c", Some(fun.id))).await.unwrap();

        let all = store.list_bookmarks(&BookmarkQuery::default()).await.unwrap();
        assert_eq!(ids(&all), vec![c.id, b.id, a.id]);

        let unsorted = store
            .list_bookmarks(&BookmarkQuery { scope: Scope::Unsorted, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(ids(&unsorted), vec![a.id]);

        let in_work = store
            .list_bookmarks(&BookmarkQuery { scope: Scope::Folder(work.id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(ids(&in_work), vec![b.id]);
    }

    #[tokio::test]
    async fn test_list_substring_filters_and_sorting() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());

        let zed = store
            .create_bookmark(bookmark("https://github.com/zed-industries/zed", "zed", None))
            .await
            .unwrap();
        let axum = store
            .create_bookmark(bookmark("https://github.com/tokio-rs/axum", "axum", None))
            .await
            .unwrap();
        store
            .create_bookmark(bookmark("https://crates.io/crates/axum", "axum on crates.io", None))
            .await
            .unwrap();
        let percent = store
            .create_bookmark(bookmark("https://example.com/100%25", "100% done", None))
            .await
            .unwrap();

        let github_axum = store
            .list_bookmarks(&BookmarkQuery {
                url_contains: Some("github".into()),
                name_contains: Some("AXUM".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&github_axum), vec![axum.id]);

        let by_name = store
            .list_bookmarks(&BookmarkQuery {
                url_contains: Some("github".into()),
                sort_by: SortField::Name,
                sort_order: SortOrder::Asc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_name), vec![axum.id, zed.id]);

        // '%' is matched literally, not as a wildcard
        let literal = store
            .list_bookmarks(&BookmarkQuery { name_contains: Some("%".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(ids(&literal), vec![percent.id]);
    }

    #[tokio::test]
    async fn test_list_is_repeatable() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        for i in 0..5 {
            store
                .create_bookmark(bookmark(&format!("https://site{i}.dev"), "same", None))
                .await
                .unwrap();
        }

        let query = BookmarkQuery { sort_by: SortField::Name, ..Default::default() };
        let first = store.list_bookmarks(&query).await.unwrap();
        let second = store.list_bookmarks(&query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[tokio::test]
    async fn test_update_bookmark_is_partial() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let folder = store.create_folder(CreateFolder { name: "reading".into() }).await.unwrap();
        let original = store
            .create_bookmark(CreateBookmark {
                tags: Some("rust,async".into()),
                favorite: true,
                ..bookmark("https://tokio.rs", "Tokio", Some(folder.id))
            })
            .await
            .unwrap();

        let updated = store
            .update_bookmark(
                original.id,
                UpdateBookmark { note: Some("x".into()), ..Default::default() },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.note, "x");
        assert_eq!(updated.url, original.url);
        assert_eq!(updated.name, original.name);
        assert_eq!(updated.folder_id, Some(folder.id));
        assert_eq!(updated.tags, "rust,async");
        assert!(updated.favorite);
        assert_eq!(updated.bookmarked_at, original.bookmarked_at);

        let unsorted = store
            .update_bookmark(
                original.id,
                UpdateBookmark { folder_id: Some(None), favorite: Some(false), ..Default::default() },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unsorted.folder_id, None);
        assert!(!unsorted.favorite);
        assert_eq!(unsorted.note, "x");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_bookmark() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());

        let result = store
            .update_bookmark(404, UpdateBookmark { note: Some("x".into()), ..Default::default() })
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!store.delete_bookmark(404).await.unwrap());
    }

    #[tokio::test]
    async fn test_folders_include_bookmarks() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let work = store.create_folder(CreateFolder { name: "work".into() }).await.unwrap();
        let empty = store.create_folder(CreateFolder { name: "empty".into() }).await.unwrap();
        assert!(work.bookmarks.is_empty());

        let first = store.create_bookmark(bookmark("https://a.dev", "a", Some(work.id))).await.unwrap();
        let second = store.create_bookmark(bookmark("https://b.dev", "b", Some(work.id))).await.unwrap();
        store.create_bookmark(bookmark("https://c.dev", "c", None)).await.unwrap();

        let folders = store.list_folders().await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].id, work.id);
        assert_eq!(ids(&folders[0].bookmarks), vec![first.id, second.id]);
        assert_eq!(folders[1].id, empty.id);
        assert!(folders[1].bookmarks.is_empty());

        let fetched = store.get_folder(work.id).await.unwrap().unwrap();
        assert_eq!(fetched.bookmarks.len(), 2);
        assert!(store.get_folder(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_folder() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let folder = store.create_folder(CreateFolder { name: "old".into() }).await.unwrap();

        let renamed = store
            .update_folder(folder.id, UpdateFolder { name: Some("new".into()) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.created_at, folder.created_at);

        let untouched = store
            .update_folder(folder.id, UpdateFolder::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.name, "new");

        assert!(store.update_folder(999, UpdateFolder::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_folder_does_not_cascade() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let folder = store.create_folder(CreateFolder { name: "temp".into() }).await.unwrap();
        let kept = store
            .create_bookmark(bookmark("https://a.dev", "a", Some(folder.id)))
            .await
            .unwrap();

        assert_eq!(store.count_bookmarks_in_folder(folder.id).await.unwrap(), 1);
        assert!(store.delete_folder(folder.id).await.unwrap());
        assert!(!store.delete_folder(folder.id).await.unwrap());

        let orphan = store.get_bookmark(kept.id).await.unwrap().unwrap();
        assert_eq!(orphan.folder_id, Some(folder.id));
    }

    #[tokio::test]
    async fn test_detach_and_delete_folder() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let folder = store.create_folder(CreateFolder { name: "temp".into() }).await.unwrap();
        let a = store.create_bookmark(bookmark("https://a.dev", "a", Some(folder.id))).await.unwrap();
        store.create_bookmark(bookmark("https://b.dev", "b", Some(folder.id))).await.unwrap();

        assert_eq!(store.detach_and_delete_folder(folder.id).await.unwrap(), (2, true));
        assert_eq!(store.get_bookmark(a.id).await.unwrap().unwrap().folder_id, None);
        assert_eq!(store.count_bookmarks_in_folder(folder.id).await.unwrap(), 0);
        assert!(store.get_folder(folder.id).await.unwrap().is_none());
        assert_eq!(store.detach_and_delete_folder(folder.id).await.unwrap(), (0, false));
    }

    #[tokio::test]
    async fn test_favicon_backfill_helpers() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());
        let missing = store.create_bookmark(bookmark("nope", "no favicon", None)).await.unwrap();
        store.create_bookmark(bookmark("https://a.dev", "a", None)).await.unwrap();

        let pending = store.list_bookmarks_missing_favicon().await.unwrap();
        assert_eq!(ids(&pending), vec![missing.id]);

        assert!(store.set_favicon(missing.id, "https://icons.example/x.png").await.unwrap());
        assert!(store.list_bookmarks_missing_favicon().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detach_and_delete_folder_rolls_back_on_failure() {
        let (db, _dir) = setup().await;
        let store = Store::new(db.connection());

        let folder = store
            .create_folder(CreateFolder { name: "Reading".to_string() })
            .await
            .unwrap();
        let kept = store
            .create_bookmark(bookmark("https://lwn.net", "LWN", Some(folder.id)))
            .await
            .unwrap();

        db.connection()
            .execute_batch(
                "CREATE TRIGGER block_folder_delete BEFORE DELETE ON folders \
                 BEGIN SELECT RAISE(ABORT, 'folder locked'); END;",
            )
            .await
            .unwrap();

        assert!(store.detach_and_delete_folder(folder.id).await.is_err());
        let unchanged = store.get_bookmark(kept.id).await.unwrap().unwrap();
        assert_eq!(unchanged.folder_id, Some(folder.id));
        assert!(store.get_folder(folder.id).await.unwrap().is_some());

        db.connection()
            .execute_batch("DROP TRIGGER block_folder_delete;")
            .await
            .unwrap();
        assert_eq!(store.detach_and_delete_folder(folder.id).await.unwrap(), (1, true));
        let moved = store.get_bookmark(kept.id).await.unwrap().unwrap();
        assert_eq!(moved.folder_id, None);
    }
}
