use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod alert;
pub mod candidate;
pub mod history;
pub mod listing;

// Re-exports for convenience
pub use alert::*;
pub use candidate::*;
pub use history::*;
pub use listing::*;

// Common enums used across models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum ListingKind {
    #[sqlx(rename = "product")]
    Product,
    #[sqlx(rename = "job")]
    Job,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum ListingStatus {
    #[sqlx(rename = "new")]
    New,
    #[sqlx(rename = "unchanged")]
    Unchanged,
    #[sqlx(rename = "updated")]
    Updated,
    #[sqlx(rename = "alerted")]
    Alerted,
    #[sqlx(rename = "seen")]
    Seen,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum AlertReason {
    #[sqlx(rename = "price_drop")]
    PriceDrop,
    #[sqlx(rename = "match_score")]
    MatchScore,
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ListingKind::Product).unwrap(),
            "\"product\""
        );
        assert_eq!(serde_json::to_string(&ListingKind::Job).unwrap(), "\"job\"");
    }

    #[test]
    fn test_listing_status_roundtrip() {
        let values = vec![
            ListingStatus::New,
            ListingStatus::Unchanged,
            ListingStatus::Updated,
            ListingStatus::Alerted,
            ListingStatus::Seen,
        ];
        for value in values {
            let serialized = serde_json::to_string(&value).unwrap();
            let deserialized: ListingStatus = serde_json::from_str(&serialized).unwrap();
            assert_eq!(value, deserialized);
        }
    }

    #[test]
    fn test_alert_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&AlertReason::PriceDrop).unwrap(),
            "\"price_drop\""
        );
        assert_eq!(
            serde_json::to_string(&AlertReason::MatchScore).unwrap(),
            "\"match_score\""
        );
    }

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32); // UUID simple format is 32 chars
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
