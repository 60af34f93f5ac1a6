use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Listing, ListingKind, ListingStatus, ListingValue};

/// A raw listing extracted from one page, before dedup and classification.
/// `value` is `None` when the container carried something that looked like a
/// listing but its tracked quantity did not parse; the change detector
/// decides what to do with those (never overwrite a known-good value).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub kind: ListingKind,
    pub title: String,
    pub category: String,
    pub url: String,
    pub value: Option<ListingValue>,
}

impl Candidate {
    /// Materialize a candidate into a listing row carrying `value`.
    pub fn into_listing(
        self,
        value: &ListingValue,
        status: ListingStatus,
        first_seen_at: DateTime<Utc>,
        last_seen_at: DateTime<Utc>,
    ) -> Result<Listing, serde_json::Error> {
        Ok(Listing {
            id: self.id,
            kind: self.kind,
            title: self.title,
            category: self.category,
            url: self.url,
            value_json: value.to_json()?,
            status,
            first_seen_at,
            last_seen_at,
        })
    }
}
