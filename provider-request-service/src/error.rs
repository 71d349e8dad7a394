//! Error types for request intake, storage and approval.

use std::net::IpAddr;

use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ProviderRequestStatus;

/// Why an evidence record was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceProblem {
    Missing,
    Both,
}

/// Intake-time failures. Nothing is persisted when one of these is raised.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("The IP range must start with a lower IP than the end IP ({start} > {end})")]
    InvalidRange { start: IpAddr, end: IpAddr },

    #[error("{}", evidence_message(.0))]
    InvalidEvidence(EvidenceProblem),

    #[error("Invalid fields: {0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error("Malformed request attributes: {0}")]
    MalformedAttributes(String),
}

fn evidence_message(problem: &EvidenceProblem) -> &'static str {
    match problem {
        EvidenceProblem::Missing => {
            "Provide a link OR a file for this evidence, you haven't submitted either"
        }
        EvidenceProblem::Both => {
            "Provide a link OR a file for this evidence, you've attempted to submit both"
        }
    }
}

fn related_provider(provider: &Option<String>) -> String {
    match provider {
        Some(name) => format!("a related hosting provider '{}' already exists", name),
        None => "a related hosting provider already exists".to_string(),
    }
}

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("Storage error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Approval-time conflicts. Raised inside the approval transaction, which is
/// always rolled back completely.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Failed to approve the request '{request}' because it's already marked as approved")]
    AlreadyApproved { request: String },

    /// `provider` is `None` when the conflict surfaced as a storage constraint
    /// and the existing row could not be read inside the failed transaction.
    #[error(
        "Failed to approve the request '{request}' because {}",
        related_provider(.provider)
    )]
    DuplicateApproval {
        request: String,
        provider: Option<String>,
    },

    #[error(
        "Failed to approve the request '{request}' because the owner '{owner}' is already assigned to a hosting provider '{provider}'"
    )]
    OwnerAlreadyBound {
        request: String,
        owner: String,
        provider: String,
    },

    #[error("Failed to approve the request '{request}' because the ASN '{asn}' already exists")]
    DuplicateAsn { request: String, asn: i64 },

    #[error("Failed to approve the request '{request}' because it has no owner")]
    MissingOwner { request: String },

    #[error("Failed to approve the request '{request}' because it has no location")]
    MissingLocation { request: String },

    #[error("Request '{request}' cannot move from {from} to {to}")]
    InvalidTransition {
        request: String,
        from: ProviderRequestStatus,
        to: ProviderRequestStatus,
    },
}

impl ApprovalError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalError::AlreadyApproved { .. } => "already_approved",
            ApprovalError::DuplicateApproval { .. } => "duplicate_approval",
            ApprovalError::OwnerAlreadyBound { .. } => "owner_already_bound",
            ApprovalError::DuplicateAsn { .. } => "duplicate_asn",
            ApprovalError::MissingOwner { .. } => "missing_owner",
            ApprovalError::MissingLocation { .. } => "missing_location",
            ApprovalError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Error returned by the request and approval services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("Provider request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Hosting provider {0} not found")]
    ProviderNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Approval(e) => e.kind(),
            ServiceError::RequestNotFound(_) | ServiceError::ProviderNotFound(_) => "not_found",
            ServiceError::Store(_) => "db_error",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(ValidationError::Fields(errors)) => {
                AppError::ValidationError(errors)
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::Error::new(e)),
            ServiceError::Approval(e @ ApprovalError::InvalidTransition { .. })
            | ServiceError::Approval(e @ ApprovalError::MissingOwner { .. })
            | ServiceError::Approval(e @ ApprovalError::MissingLocation { .. }) => {
                AppError::BadRequest(anyhow::Error::new(e))
            }
            ServiceError::Approval(e) => AppError::Conflict(anyhow::Error::new(e)),
            e @ (ServiceError::RequestNotFound(_) | ServiceError::ProviderNotFound(_)) => {
                AppError::NotFound(anyhow::Error::new(e))
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
        }
    }
}
