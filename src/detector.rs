use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{Candidate, Listing};
use crate::store::Store;
use crate::utils::error::Result;

/// A candidate's fate after comparison with the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    New {
        candidate: Candidate,
    },
    Updated {
        candidate: Candidate,
        existing: Listing,
    },
    Unchanged {
        candidate: Candidate,
        existing: Listing,
    },
}

#[derive(Debug, Default)]
pub struct DetectionOutcome {
    pub items: Vec<Classified>,
    /// Candidates whose tracked value did not parse. Known listings among
    /// them are classified unchanged (a known-good value is never replaced
    /// with an unknown one); unknown ones are dropped entirely.
    pub parse_failures: usize,
    /// Parse-failed candidates with no stored counterpart.
    pub dropped: usize,
}

/// Collapse repeated ids within one run: last write wins, first-seen order
/// is kept. Pagination overlap routinely repeats items.
pub fn collapse(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut order: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut index_by_id: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        match index_by_id.get(&candidate.id) {
            Some(&i) => order[i] = candidate,
            None => {
                index_by_id.insert(candidate.id.clone(), order.len());
                order.push(candidate);
            }
        }
    }
    order
}

/// Classify collapsed candidates against the store: absent id is new, a
/// differing value is updated (carrying the old row for scoring), an equal
/// value is unchanged.
pub async fn classify(store: &Store, candidates: Vec<Candidate>) -> Result<DetectionOutcome> {
    let mut outcome = DetectionOutcome::default();

    for candidate in candidates {
        let existing = store.get(&candidate.id).await?;

        match (existing, candidate.value.clone()) {
            (None, None) => {
                outcome.parse_failures += 1;
                outcome.dropped += 1;
                warn!(
                    id = %candidate.id,
                    title = %candidate.title,
                    "dropping unknown listing with unparseable value"
                );
            }
            (None, Some(_)) => outcome.items.push(Classified::New { candidate }),
            (Some(existing), None) => {
                outcome.parse_failures += 1;
                warn!(
                    id = %candidate.id,
                    title = %candidate.title,
                    "value did not parse; keeping stored value"
                );
                outcome.items.push(Classified::Unchanged {
                    candidate,
                    existing,
                });
            }
            (Some(existing), Some(value)) => {
                let changed = match existing.value() {
                    Ok(stored) => stored != value,
                    Err(e) => {
                        // A corrupt stored value is replaced by the
                        // freshly parsed one.
                        debug!(id = %candidate.id, error = %e, "stored value unreadable");
                        true
                    }
                };
                if changed {
                    outcome.items.push(Classified::Updated {
                        candidate,
                        existing,
                    });
                } else {
                    outcome.items.push(Classified::Unchanged {
                        candidate,
                        existing,
                    });
                }
            }
        }
    }

    Ok(outcome)
}
