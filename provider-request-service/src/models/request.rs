//! Provider request model: the draft submission a provider hands in for review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Review status of a provider request, visible to submitters and staff.
///
/// - `PendingReview`: staff still need to verify the request
/// - `Approved`: staff approved it and the directory records exist
/// - `Rejected`: staff rejected it completely
/// - `Open`: staff asked the provider for changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRequestStatus {
    PendingReview,
    Approved,
    Rejected,
    Open,
}

impl ProviderRequestStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Open => "open",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending_review" => Some(Self::PendingReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "open" => Some(Self::Open),
            _ => None,
        }
    }

    /// Whether staff or the submitter may move a request from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingReview, Self::Approved)
                | (Self::PendingReview, Self::Rejected)
                | (Self::PendingReview, Self::Open)
                | (Self::Open, Self::PendingReview)
        )
    }
}

impl Default for ProviderRequestStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for ProviderRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider request as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub request_id: Uuid,
    pub name: String,
    pub website: String,
    pub description: String,
    pub status: ProviderRequestStatus,
    pub created_by: Option<Uuid>,
    pub authorised_by_org: bool,
    pub created_utc: DateTime<Utc>,
    pub modified_utc: DateTime<Utc>,
}

impl std::fmt::Display for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Input for creating a new request.
///
/// Deserializing from an arbitrary attribute map keeps only the known keys;
/// anything else is dropped without complaint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProviderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProviderRequestStatus,
    #[serde(default, alias = "creator")]
    pub created_by: Option<Uuid>,
    #[serde(default, alias = "authorised")]
    pub authorised_by_org: bool,
}

impl CreateProviderRequest {
    /// Build the input from a loosely-typed attribute map. No semantic
    /// validation happens here.
    pub fn from_attributes(attributes: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(attributes)
            .map_err(|e| ValidationError::MalformedAttributes(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_db_representation() {
        for status in [
            ProviderRequestStatus::PendingReview,
            ProviderRequestStatus::Approved,
            ProviderRequestStatus::Rejected,
            ProviderRequestStatus::Open,
        ] {
            assert_eq!(ProviderRequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProviderRequestStatus::parse("Pending review"), None);
    }

    #[test]
    fn terminal_states_do_not_transition() {
        use ProviderRequestStatus::*;
        for next in [PendingReview, Approved, Rejected, Open] {
            assert!(!Approved.can_transition_to(next));
            assert!(!Rejected.can_transition_to(next));
        }
        assert!(PendingReview.can_transition_to(Approved));
        assert!(PendingReview.can_transition_to(Open));
        assert!(Open.can_transition_to(PendingReview));
        assert!(!Open.can_transition_to(Approved));
    }

    #[test]
    fn unknown_attributes_are_ignored_and_status_defaults_to_open() {
        let input = CreateProviderRequest::from_attributes(json!({
            "name": "Acme Hosting",
            "website": "https://acme.example",
            "description": "Renewable hosting",
            "authorised": true,
            "favourite_colour": "green",
            "id": 42,
        }))
        .unwrap();

        assert_eq!(input.name, "Acme Hosting");
        assert!(input.authorised_by_org);
        assert_eq!(input.status, ProviderRequestStatus::Open);
        assert_eq!(input.created_by, None);
    }

    #[test]
    fn wrongly_typed_attribute_is_reported() {
        let result = CreateProviderRequest::from_attributes(json!({ "name": 12 }));
        assert!(matches!(result, Err(ValidationError::MalformedAttributes(_))));
    }
}
