use axum::{extract::State, Json};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::SharedState;

/// Liveness payload returned by `/health`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub status: String,
    pub timestamp: DateTime<Local>,
    #[serde(rename = "lastactivity")]
    pub last_activity: DateTime<Local>,
}

/// Remembers when the previous health check was served.
#[derive(Debug)]
pub struct HealthTracker {
    last_activity: Mutex<DateTime<Local>>,
}

impl HealthTracker {
    pub fn new(started: DateTime<Local>) -> Self {
        Self {
            last_activity: Mutex::new(started),
        }
    }

    /// Reports the previous activity time and records this check as the latest.
    pub fn check(&self) -> HealthSnapshot {
        let (now, previous) = {
            // Advisory value only; a poisoned lock still holds a usable timestamp.
            let mut last = self
                .last_activity
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Read the clock under the lock so checks are ordered by it.
            let now = Local::now();
            (now, std::mem::replace(&mut *last, now))
        };

        HealthSnapshot {
            status: "OK".into(),
            timestamp: now,
            last_activity: previous,
        }
    }
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthSnapshot> {
    debug!("Hit endpoint: healthCheck");
    Json(state.health.check())
}
