use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single published message.
///
/// `id` is the sole deduplication key (global across topics, not scoped per
/// topic — see §9 "Open questions in source behavior").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub id: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, id: impl Into<String>) -> Self {
        Message { topic: topic.into(), payload: payload.into(), id: id.into() }
    }

    /// Generates a fresh random id for a message whose publisher didn't
    /// supply one.
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Result of attempting to insert a message into the store.
///
/// `Duplicate` is load-bearing: dissemination relies on it to terminate
/// forwarding cycles (§4.1, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Duplicate,
}

impl StoreOutcome {
    pub fn is_stored(self) -> bool {
        matches!(self, StoreOutcome::Stored)
    }
}
