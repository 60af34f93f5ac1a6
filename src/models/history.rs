use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{generate_id, ListingValue};

/// Append-only observation of a listing's tracked value. Rows are never
/// mutated or deleted; per listing they are ordered by `observed_at` and the
/// newest row mirrors the listing's current value.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub listing_id: String,
    pub value_json: String,
    pub observed_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        listing_id: String,
        value: &ListingValue,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: generate_id(),
            listing_id,
            value_json: value.to_json()?,
            observed_at,
        })
    }

    pub fn value(&self) -> Result<ListingValue, serde_json::Error> {
        ListingValue::from_json(&self.value_json)
    }
}
