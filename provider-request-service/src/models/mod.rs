//! Domain models for provider-request-service.

mod consent;
mod evidence;
mod location;
mod network;
mod provider;
mod request;
mod tag;

use serde::{Deserialize, Serialize};

pub use consent::{Consent, SetConsent};
pub use evidence::{EvidenceType, NewEvidence, RequestEvidence};
pub use location::{Location, NewLocation};
pub use network::{ip_to_u128, NewIpRange, RequestAsn, RequestIpRange};
pub use provider::{
    GreencheckAsn, GreencheckIp, HostingProvider, NewHostingProvider, NewSupportingDocument,
    ProviderDetail, ProviderLocation, SupportingDocument,
};
pub use request::{CreateProviderRequest, ProviderRequest, ProviderRequestStatus};
pub use tag::{Owner, ServiceTag};

/// A request with its whole child graph, as shown on the review screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDetail {
    pub request: ProviderRequest,
    pub services: Vec<ServiceTag>,
    pub locations: Vec<Location>,
    pub asns: Vec<RequestAsn>,
    pub ip_ranges: Vec<RequestIpRange>,
    pub evidence: Vec<RequestEvidence>,
    pub consent: Option<Consent>,
}
