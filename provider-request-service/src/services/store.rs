//! Storage abstractions.
//!
//! Every collaborator the workflow touches (requests, tag vocabulary,
//! identities, directory) is a trait. A single [`UnitOfWork`] implements all of
//! them, so a sequence of writes commits or rolls back as one. Dropping a unit
//! of work without committing discards its writes.

use async_trait::async_trait;
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Consent, CreateProviderRequest, GreencheckAsn, GreencheckIp, HostingProvider, Location,
    NewEvidence, NewHostingProvider, NewIpRange, NewLocation, NewSupportingDocument, Owner,
    ProviderRequest, ProviderRequestStatus, RequestAsn, RequestEvidence, RequestIpRange,
    ServiceTag, SetConsent, SupportingDocument,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Constraint on the request back-reference of a directory provider.
pub const PROVIDER_REQUEST_CONSTRAINT: &str = "hosting_providers_request_id_key";

/// Directory-wide uniqueness of bound ASN values.
pub const ASN_CONSTRAINT: &str = "greencheck_asns_asn_key";

/// Entry point to a storage backend.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: UnitOfWork;

    /// Start an isolated unit of work.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}

#[async_trait]
pub trait UnitOfWork: RequestStore + TagVocabulary + IdentityStore + DirectoryStore + Send {
    async fn commit(self) -> StoreResult<()>;
    async fn rollback(self) -> StoreResult<()>;
}

/// Draft requests and their child records.
#[async_trait]
pub trait RequestStore: Send {
    async fn insert_request(&mut self, input: &CreateProviderRequest) -> StoreResult<ProviderRequest>;

    async fn get_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>>;

    /// Fetch a request and hold it against concurrent writers until the unit
    /// of work ends.
    async fn lock_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>>;

    async fn update_request_status(
        &mut self,
        request_id: Uuid,
        status: ProviderRequestStatus,
    ) -> StoreResult<()>;

    /// Remove a request and every child record. Returns false if it did not exist.
    async fn delete_request(&mut self, request_id: Uuid) -> StoreResult<bool>;

    async fn insert_location(&mut self, request_id: Uuid, input: &NewLocation) -> StoreResult<Location>;

    /// Locations in insertion order.
    async fn list_locations(&mut self, request_id: Uuid) -> StoreResult<Vec<Location>>;

    async fn insert_request_asn(&mut self, request_id: Uuid, asn: i64) -> StoreResult<RequestAsn>;

    async fn list_request_asns(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestAsn>>;

    async fn insert_request_ip_range(
        &mut self,
        request_id: Uuid,
        input: &NewIpRange,
    ) -> StoreResult<RequestIpRange>;

    async fn list_request_ip_ranges(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestIpRange>>;

    async fn insert_evidence(
        &mut self,
        request_id: Uuid,
        input: &NewEvidence,
    ) -> StoreResult<RequestEvidence>;

    async fn list_evidence(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestEvidence>>;

    /// Replace the consent record of a request.
    async fn upsert_consent(&mut self, request_id: Uuid, input: &SetConsent) -> StoreResult<Consent>;

    async fn get_consent(&mut self, request_id: Uuid) -> StoreResult<Option<Consent>>;

    /// Replace the service tags attached to a request.
    async fn set_request_services(&mut self, request_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()>;

    async fn list_request_services(&mut self, request_id: Uuid) -> StoreResult<Vec<ServiceTag>>;
}

/// Global vocabulary of offered services.
#[async_trait]
pub trait TagVocabulary: Send {
    /// Tags whose slug is in `slugs`. Unknown slugs are skipped.
    async fn find_tags_by_slugs(&mut self, slugs: &[String]) -> StoreResult<Vec<ServiceTag>>;

    /// All tags ordered by slug.
    async fn list_tags(&mut self) -> StoreResult<Vec<ServiceTag>>;

    /// Insert a tag, or return the existing one with the same slug.
    async fn upsert_tag(&mut self, slug: &str, name: &str) -> StoreResult<ServiceTag>;
}

/// Identities and the providers bound to them.
#[async_trait]
pub trait IdentityStore: Send {
    async fn insert_owner(&mut self, name: &str) -> StoreResult<Owner>;

    async fn get_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>>;

    /// Fetch an owner and hold it against concurrent bindings until the unit
    /// of work ends.
    async fn lock_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>>;

    async fn providers_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<HostingProvider>>;

    async fn bind_owner(&mut self, owner_id: Uuid, provider_id: Uuid) -> StoreResult<()>;
}

/// Live directory records.
#[async_trait]
pub trait DirectoryStore: Send {
    /// Fails with a [`PROVIDER_REQUEST_CONSTRAINT`] violation if the request
    /// already produced a provider.
    async fn insert_provider(&mut self, input: &NewHostingProvider) -> StoreResult<HostingProvider>;

    async fn get_provider(&mut self, provider_id: Uuid) -> StoreResult<Option<HostingProvider>>;

    async fn provider_for_request(&mut self, request_id: Uuid) -> StoreResult<Option<HostingProvider>>;

    async fn list_providers(&mut self) -> StoreResult<Vec<HostingProvider>>;

    async fn set_provider_services(&mut self, provider_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()>;

    async fn list_provider_services(&mut self, provider_id: Uuid) -> StoreResult<Vec<ServiceTag>>;

    /// Fails with an [`ASN_CONSTRAINT`] violation if the ASN is already bound.
    async fn insert_greencheck_asn(&mut self, provider_id: Uuid, asn: i64) -> StoreResult<GreencheckAsn>;

    async fn find_greencheck_asn(&mut self, asn: i64) -> StoreResult<Option<GreencheckAsn>>;

    async fn list_greencheck_asns(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckAsn>>;

    async fn insert_greencheck_ip(
        &mut self,
        provider_id: Uuid,
        ip_start: IpAddr,
        ip_end: IpAddr,
    ) -> StoreResult<GreencheckIp>;

    async fn list_greencheck_ips(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckIp>>;

    async fn insert_supporting_document(
        &mut self,
        input: &NewSupportingDocument,
    ) -> StoreResult<SupportingDocument>;

    async fn list_supporting_documents(
        &mut self,
        provider_id: Uuid,
    ) -> StoreResult<Vec<SupportingDocument>>;
}
