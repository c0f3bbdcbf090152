use axum::{
    extract::{Query, State},
    Json,
};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, error};

use crate::{
    error::ApiError,
    walk::{list_tree, EntryRecord},
    SharedState,
};

// -------------------------------------------
// Resolution
// -------------------------------------------

/// Binds a client-supplied relative path to a directory under `root`.
///
/// `root` must already be canonical. One leading separator is stripped and an
/// empty path means the root itself. Anything missing, not a directory, or
/// resolving outside `root` is reported as not found.
pub fn resolve(root: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    let relative = strip_leading_separator(requested);
    let relative = if relative.is_empty() { "." } else { relative };

    let resolved = root.join(relative).canonicalize().map_err(|e| {
        debug!("cannot resolve path={} error={}", requested, e);
        ApiError::PathNotFound
    })?;

    if !resolved.starts_with(root) {
        debug!("path={} escapes the listing root", requested);
        return Err(ApiError::PathNotFound);
    }

    if !resolved.is_dir() {
        return Err(ApiError::PathNotFound);
    }

    Ok(resolved)
}

/// Repeated `path` keys resolve to the first one.
fn first_path(params: Vec<(String, String)>) -> Option<String> {
    params
        .into_iter()
        .find(|(key, _)| key == "path")
        .map(|(_, value)| value)
}

fn strip_leading_separator(path: &str) -> &str {
    path.strip_prefix('/')
        .or_else(|| path.strip_prefix(MAIN_SEPARATOR))
        .unwrap_or(path)
}

// -------------------------------------------
// Listing
// -------------------------------------------

/// GET /ls?path=<relative path>
/// Recursive metadata listing of one directory under the server root.
pub async fn list(
    State(state): State<SharedState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<EntryRecord>>, ApiError> {
    // The route only matches when the query names a path, even an empty one.
    let requested = first_path(params).ok_or(ApiError::RouteNotFound)?;
    debug!("Hit endpoint: list path={}", requested);

    let root = resolve(&state.root, &requested)?;

    let entries = tokio::task::spawn_blocking(move || list_tree(&root))
        .await?
        .inspect_err(|e| match e.path() {
            Some(node) => error!("Error accessing path={} error={}", node.display(), e),
            None => error!("Error while building directory listing, error={}", e),
        })?;

    Ok(Json(entries))
}
