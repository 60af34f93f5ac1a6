use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{ListingKind, ListingStatus};

/// The tracked quantity of a listing. Stored in the database as JSON text
/// (`value_json`), so the current-state and history tables share one column
/// shape across both domains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListingValue {
    Price { amount: Decimal, currency: String },
    Description { text: String },
}

impl ListingValue {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn as_price(&self) -> Option<(Decimal, &str)> {
        match self {
            ListingValue::Price { amount, currency } => Some((*amount, currency.as_str())),
            ListingValue::Description { .. } => None,
        }
    }

    pub fn as_description(&self) -> Option<&str> {
        match self {
            ListingValue::Description { text } => Some(text.as_str()),
            ListingValue::Price { .. } => None,
        }
    }

    /// Short human-readable form for logs and notifications.
    pub fn summary(&self) -> String {
        match self {
            ListingValue::Price { amount, currency } => format!("{} {}", amount, currency),
            ListingValue::Description { text } => {
                let mut s: String = text.chars().take(60).collect();
                if text.chars().count() > 60 {
                    s.push('…');
                }
                s
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Listing {
    pub id: String,
    pub kind: ListingKind,
    pub title: String,
    pub category: String,
    pub url: String,
    pub value_json: String,
    pub status: ListingStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Listing {
    pub fn value(&self) -> Result<ListingValue, serde_json::Error> {
        ListingValue::from_json(&self.value_json)
    }

    pub fn set_value(&mut self, value: &ListingValue) -> Result<(), serde_json::Error> {
        self.value_json = value.to_json()?;
        Ok(())
    }
}
