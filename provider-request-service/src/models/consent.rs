//! Agreements the submitter opts into (or not) with a request.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Consent {
    pub request_id: Uuid,
    pub data_processing_opt_in: bool,
    pub newsletter_opt_in: bool,
}

impl std::fmt::Display for Consent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Data processing: {}, Newsletter signup: {}",
            self.data_processing_opt_in, self.newsletter_opt_in
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConsent {
    #[serde(default)]
    pub data_processing_opt_in: bool,
    #[serde(default)]
    pub newsletter_opt_in: bool,
}
