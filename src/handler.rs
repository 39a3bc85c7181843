use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::ListBookmarksParams;
use crate::config::{Config, FolderDeletePolicy};
use crate::db::Database;
use crate::error::ApiError;
use crate::model::{CreateBookmark, CreateFolder, UpdateBookmark, UpdateFolder};
use crate::query::DefaultScope;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub default_scope: DefaultScope,
    pub folder_delete: FolderDeletePolicy,
}

impl AppState {
    pub fn new(db: Arc<Database>, cfg: &Config) -> Self {
        Self {
            db,
            default_scope: cfg.listing.default_scope,
            folder_delete: cfg.folders.on_delete,
        }
    }

    fn store(&self) -> Store<'_> {
        Store::new(self.db.connection())
    }
}

type HandlerResult = Result<Response, ApiError>;

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub async fn healthcheck() -> Response {
    ok(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// Bookmarks
// ============================================================================

pub async fn create_bookmark(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookmark>, JsonRejection>,
) -> HandlerResult {
    let Json(input) = payload?;
    input.validate().map_err(ApiError::BadRequest)?;

    let bookmark = state
        .store()
        .create_bookmark(input)
        .await
        .map_err(|e| ApiError::internal("Failed to create bookmark", e))?;

    tracing::info!(id = bookmark.id, url = %bookmark.url, "created bookmark");
    Ok(created(bookmark))
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> HandlerResult {
    let plan = ListBookmarksParams::from_pairs(pairs).into_query(state.default_scope)?;

    let bookmarks = state
        .store()
        .list_bookmarks(&plan)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch bookmarks", e))?;

    Ok(ok(bookmarks))
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateBookmark>, JsonRejection>,
) -> HandlerResult {
    let Json(patch) = payload?;
    patch.validate().map_err(ApiError::BadRequest)?;

    match state.store().update_bookmark(id, patch).await {
        Ok(Some(bookmark)) => Ok(ok(bookmark)),
        Ok(None) => Err(ApiError::NotFound("Bookmark not found")),
        Err(e) => Err(ApiError::internal("Failed to update bookmark", e)),
    }
}

pub async fn delete_bookmark(State(state): State<AppState>, Path(id): Path<i64>) -> HandlerResult {
    match state.store().delete_bookmark(id).await {
        Ok(true) => {
            tracing::info!(id, "deleted bookmark");
            Ok(no_content())
        }
        Ok(false) => Err(ApiError::NotFound("Bookmark not found")),
        Err(e) => Err(ApiError::internal("Failed to delete bookmark", e)),
    }
}

// ============================================================================
// Folders
// ============================================================================

pub async fn create_folder(
    State(state): State<AppState>,
    payload: Result<Json<CreateFolder>, JsonRejection>,
) -> HandlerResult {
    let Json(input) = payload?;
    input.validate().map_err(ApiError::BadRequest)?;

    let folder = state
        .store()
        .create_folder(input)
        .await
        .map_err(|e| ApiError::internal("Failed to create folder", e))?;

    tracing::info!(id = folder.id, name = %folder.name, "created folder");
    Ok(created(folder))
}

pub async fn list_folders(State(state): State<AppState>) -> HandlerResult {
    let folders = state
        .store()
        .list_folders()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch folders", e))?;

    Ok(ok(folders))
}

pub async fn get_folder(State(state): State<AppState>, Path(id): Path<i64>) -> HandlerResult {
    match state.store().get_folder(id).await {
        Ok(Some(folder)) => Ok(ok(folder)),
        Ok(None) => Err(ApiError::NotFound("Folder not found")),
        Err(e) => Err(ApiError::internal("Failed to fetch folder", e)),
    }
}

pub async fn update_folder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateFolder>, JsonRejection>,
) -> HandlerResult {
    let Json(patch) = payload?;
    patch.validate().map_err(ApiError::BadRequest)?;

    match state.store().update_folder(id, patch).await {
        Ok(Some(folder)) => Ok(ok(folder)),
        Ok(None) => Err(ApiError::NotFound("Folder not found")),
        Err(e) => Err(ApiError::internal("Failed to update folder", e)),
    }
}

pub async fn delete_folder(State(state): State<AppState>, Path(id): Path<i64>) -> HandlerResult {
    let store = state.store();

    match store.get_folder(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(ApiError::NotFound("Folder not found")),
        Err(e) => return Err(ApiError::internal("Failed to delete folder", e)),
    }

    match state.folder_delete {
        FolderDeletePolicy::Orphan => {}
        FolderDeletePolicy::Reject => {
            let count = store
                .count_bookmarks_in_folder(id)
                .await
                .map_err(|e| ApiError::internal("Failed to delete folder", e))?;
            if count > 0 {
                return Err(ApiError::Conflict(format!(
                    "Folder still contains {count} bookmark(s)"
                )));
            }
        }
        FolderDeletePolicy::Detach => {
            return match store.detach_and_delete_folder(id).await {
                Ok((moved, true)) => {
                    tracing::info!(id, moved, "deleted folder, moved bookmarks to unsorted");
                    Ok(no_content())
                }
                Ok((_, false)) => Err(ApiError::NotFound("Folder not found")),
                Err(e) => Err(ApiError::internal("Failed to delete folder", e)),
            };
        }
    }

    match store.delete_folder(id).await {
        Ok(true) => {
            tracing::info!(id, "deleted folder");
            Ok(no_content())
        }
        Ok(false) => Err(ApiError::NotFound("Folder not found")),
        Err(e) => Err(ApiError::internal("Failed to delete folder", e)),
    }
}
