//! Service tags (the shared vocabulary of offered services) and owners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One entry of the service vocabulary, e.g. `shared-hosting`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ServiceTag {
    pub tag_id: Uuid,
    pub slug: String,
    pub name: String,
}

/// Identity that creates requests and ends up owning providers.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Owner {
    pub owner_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
