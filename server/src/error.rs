use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::task::JoinError;

use crate::walk::WalkError;

/// Errors surfaced to API clients as plain-text bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested directory cannot be bound under the server root.
    #[error("Specified path not found")]
    PathNotFound,

    #[error("Unexpected error occurred during operation: {0}")]
    Walk(#[from] WalkError),

    /// The blocking walk task panicked or was cancelled.
    #[error("Unexpected error occurred during operation: {0}")]
    Task(#[from] JoinError),

    #[error("Invalid, unknown, or unauthorized API call")]
    RouteNotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PathNotFound => StatusCode::BAD_REQUEST,
            ApiError::Walk(e) if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Walk(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, path::PathBuf};

    #[test]
    fn fixed_messages() {
        assert_eq!(ApiError::PathNotFound.to_string(), "Specified path not found");
        assert_eq!(
            ApiError::RouteNotFound.to_string(),
            "Invalid, unknown, or unauthorized API call"
        );
    }

    #[test]
    fn walk_errors_map_by_cause() {
        let vanished = ApiError::from(WalkError::Vanished(PathBuf::from("/tmp/x")));
        assert_eq!(vanished.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            vanished.to_string(),
            "Unexpected error occurred during operation: File or folder does not exist"
        );

        let stat = ApiError::from(WalkError::Metadata {
            path: PathBuf::from("/tmp/y"),
            source: io::Error::new(io::ErrorKind::Other, "stale handle"),
        });
        assert_eq!(stat.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(stat.to_string().ends_with("/tmp/y: stale handle"));
    }

    #[test]
    fn unmatched_route_is_404() {
        let response = ApiError::RouteNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
