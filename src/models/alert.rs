use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{generate_id, AlertReason};

/// One row per delivered alert. The `(listing_id, signal_value)` pair backs
/// the idempotence check: the same observed state never notifies twice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AlertRecord {
    pub id: String,
    pub listing_id: String,
    pub signal_value: f64,
    pub reason: AlertReason,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        listing_id: String,
        signal_value: f64,
        reason: AlertReason,
        threshold: f64,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            listing_id,
            signal_value,
            reason,
            threshold,
            triggered_at,
        }
    }
}
