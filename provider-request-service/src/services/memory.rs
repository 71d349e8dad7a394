//! In-memory store for tests and local tooling.
//!
//! A unit of work holds the store mutex for its whole lifetime and writes to a
//! private copy of the state. Commit swaps the copy in; rollback or drop throws
//! it away. Units of work are therefore fully serialized.

use async_trait::async_trait;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Consent, CreateProviderRequest, GreencheckAsn, GreencheckIp, HostingProvider, Location,
    NewEvidence, NewHostingProvider, NewIpRange, NewLocation, NewSupportingDocument, Owner,
    ProviderRequest, ProviderRequestStatus, RequestAsn, RequestEvidence, RequestIpRange,
    ServiceTag, SetConsent, SupportingDocument,
};
use crate::services::store::{
    DirectoryStore, IdentityStore, RequestStore, Store, StoreResult, TagVocabulary, UnitOfWork,
    ASN_CONSTRAINT, PROVIDER_REQUEST_CONSTRAINT,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    requests: Vec<ProviderRequest>,
    locations: Vec<Location>,
    request_asns: Vec<RequestAsn>,
    request_ip_ranges: Vec<RequestIpRange>,
    evidence: Vec<RequestEvidence>,
    consents: Vec<Consent>,
    /// (request_id, tag_id)
    request_services: Vec<(Uuid, Uuid)>,
    tags: Vec<ServiceTag>,
    owners: Vec<Owner>,
    /// (owner_id, provider_id)
    owner_providers: Vec<(Uuid, Uuid)>,
    providers: Vec<HostingProvider>,
    /// (provider_id, tag_id)
    provider_services: Vec<(Uuid, Uuid)>,
    asns: Vec<GreencheckAsn>,
    ips: Vec<GreencheckIp>,
    documents: Vec<SupportingDocument>,
}

impl MemoryState {
    fn tags_in(&self, links: &[(Uuid, Uuid)], owner: Uuid) -> Vec<ServiceTag> {
        let mut tags: Vec<ServiceTag> = self
            .tags
            .iter()
            .filter(|t| links.iter().any(|(o, tag)| *o == owner && *tag == t.tag_id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.slug.cmp(&b.slug));
        tags
    }
}

fn replace_links(links: &mut Vec<(Uuid, Uuid)>, owner: Uuid, tag_ids: &[Uuid]) {
    links.retain(|(o, _)| *o != owner);
    for tag_id in tag_ids {
        if !links.contains(&(owner, *tag_id)) {
            links.push((owner, *tag_id));
        }
    }
}

/// Shared in-memory store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> StoreResult<MemoryUnitOfWork> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = (*guard).clone();
        Ok(MemoryUnitOfWork { guard, working })
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        drop(self);
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryUnitOfWork {
    async fn insert_request(&mut self, input: &CreateProviderRequest) -> StoreResult<ProviderRequest> {
        let now = Utc::now();
        let request = ProviderRequest {
            request_id: Uuid::new_v4(),
            name: input.name.clone(),
            website: input.website.clone(),
            description: input.description.clone(),
            status: input.status,
            created_by: input.created_by,
            authorised_by_org: input.authorised_by_org,
            created_utc: now,
            modified_utc: now,
        };
        self.working.requests.push(request.clone());
        Ok(request)
    }

    async fn get_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>> {
        Ok(self
            .working
            .requests
            .iter()
            .find(|r| r.request_id == request_id)
            .cloned())
    }

    async fn lock_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>> {
        // The unit of work already holds the store lock.
        self.get_request(request_id).await
    }

    async fn update_request_status(
        &mut self,
        request_id: Uuid,
        status: ProviderRequestStatus,
    ) -> StoreResult<()> {
        let request = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| {
                StoreError::Backend(anyhow::anyhow!("Request {} does not exist", request_id))
            })?;
        request.status = status;
        request.modified_utc = Utc::now();
        Ok(())
    }

    async fn delete_request(&mut self, request_id: Uuid) -> StoreResult<bool> {
        let state = &mut self.working;
        let before = state.requests.len();
        state.requests.retain(|r| r.request_id != request_id);
        if state.requests.len() == before {
            return Ok(false);
        }

        state.locations.retain(|l| l.request_id != request_id);
        state.request_asns.retain(|a| a.request_id != request_id);
        state.request_ip_ranges.retain(|r| r.request_id != request_id);
        state.evidence.retain(|e| e.request_id != request_id);
        state.consents.retain(|c| c.request_id != request_id);
        state.request_services.retain(|(r, _)| *r != request_id);
        for provider in state
            .providers
            .iter_mut()
            .filter(|p| p.request_id == Some(request_id))
        {
            provider.request_id = None;
        }
        Ok(true)
    }

    async fn insert_location(&mut self, request_id: Uuid, input: &NewLocation) -> StoreResult<Location> {
        let location = Location {
            location_id: Uuid::new_v4(),
            request_id,
            name: input.name.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
        };
        self.working.locations.push(location.clone());
        Ok(location)
    }

    async fn list_locations(&mut self, request_id: Uuid) -> StoreResult<Vec<Location>> {
        Ok(self
            .working
            .locations
            .iter()
            .filter(|l| l.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn insert_request_asn(&mut self, request_id: Uuid, asn: i64) -> StoreResult<RequestAsn> {
        let record = RequestAsn {
            asn_id: Uuid::new_v4(),
            request_id,
            asn,
        };
        self.working.request_asns.push(record.clone());
        Ok(record)
    }

    async fn list_request_asns(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestAsn>> {
        Ok(self
            .working
            .request_asns
            .iter()
            .filter(|a| a.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn insert_request_ip_range(
        &mut self,
        request_id: Uuid,
        input: &NewIpRange,
    ) -> StoreResult<RequestIpRange> {
        let record = RequestIpRange {
            ip_range_id: Uuid::new_v4(),
            request_id,
            start: input.start,
            end: input.end,
        };
        self.working.request_ip_ranges.push(record.clone());
        Ok(record)
    }

    async fn list_request_ip_ranges(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestIpRange>> {
        Ok(self
            .working
            .request_ip_ranges
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn insert_evidence(
        &mut self,
        request_id: Uuid,
        input: &NewEvidence,
    ) -> StoreResult<RequestEvidence> {
        let record = RequestEvidence {
            evidence_id: Uuid::new_v4(),
            request_id,
            title: input.title.clone(),
            description: input.description.clone(),
            link: input.link.clone(),
            file: input.file.clone(),
            evidence_type: input.evidence_type,
            public: input.public,
        };
        self.working.evidence.push(record.clone());
        Ok(record)
    }

    async fn list_evidence(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestEvidence>> {
        Ok(self
            .working
            .evidence
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn upsert_consent(&mut self, request_id: Uuid, input: &SetConsent) -> StoreResult<Consent> {
        let consent = Consent {
            request_id,
            data_processing_opt_in: input.data_processing_opt_in,
            newsletter_opt_in: input.newsletter_opt_in,
        };
        self.working.consents.retain(|c| c.request_id != request_id);
        self.working.consents.push(consent.clone());
        Ok(consent)
    }

    async fn get_consent(&mut self, request_id: Uuid) -> StoreResult<Option<Consent>> {
        Ok(self
            .working
            .consents
            .iter()
            .find(|c| c.request_id == request_id)
            .cloned())
    }

    async fn set_request_services(&mut self, request_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()> {
        replace_links(&mut self.working.request_services, request_id, tag_ids);
        Ok(())
    }

    async fn list_request_services(&mut self, request_id: Uuid) -> StoreResult<Vec<ServiceTag>> {
        Ok(self
            .working
            .tags_in(&self.working.request_services, request_id))
    }
}

#[async_trait]
impl TagVocabulary for MemoryUnitOfWork {
    async fn find_tags_by_slugs(&mut self, slugs: &[String]) -> StoreResult<Vec<ServiceTag>> {
        Ok(self
            .working
            .tags
            .iter()
            .filter(|t| slugs.iter().any(|s| *s == t.slug))
            .cloned()
            .collect())
    }

    async fn list_tags(&mut self) -> StoreResult<Vec<ServiceTag>> {
        let mut tags = self.working.tags.clone();
        tags.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(tags)
    }

    async fn upsert_tag(&mut self, slug: &str, name: &str) -> StoreResult<ServiceTag> {
        if let Some(existing) = self.working.tags.iter().find(|t| t.slug == slug) {
            return Ok(existing.clone());
        }
        let tag = ServiceTag {
            tag_id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.working.tags.push(tag.clone());
        Ok(tag)
    }
}

#[async_trait]
impl IdentityStore for MemoryUnitOfWork {
    async fn insert_owner(&mut self, name: &str) -> StoreResult<Owner> {
        let owner = Owner {
            owner_id: Uuid::new_v4(),
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        self.working.owners.push(owner.clone());
        Ok(owner)
    }

    async fn get_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>> {
        Ok(self
            .working
            .owners
            .iter()
            .find(|o| o.owner_id == owner_id)
            .cloned())
    }

    async fn lock_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>> {
        self.get_owner(owner_id).await
    }

    async fn providers_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<HostingProvider>> {
        let state = &self.working;
        Ok(state
            .owner_providers
            .iter()
            .filter(|(o, _)| *o == owner_id)
            .filter_map(|(_, p)| state.providers.iter().find(|hp| hp.provider_id == *p))
            .cloned()
            .collect())
    }

    async fn bind_owner(&mut self, owner_id: Uuid, provider_id: Uuid) -> StoreResult<()> {
        let link = (owner_id, provider_id);
        if self.working.owner_providers.contains(&link) {
            return Err(StoreError::UniqueViolation {
                constraint: "owner_providers_pkey".to_string(),
            });
        }
        self.working.owner_providers.push(link);
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MemoryUnitOfWork {
    async fn insert_provider(&mut self, input: &NewHostingProvider) -> StoreResult<HostingProvider> {
        if let Some(request_id) = input.request_id {
            if self
                .working
                .providers
                .iter()
                .any(|p| p.request_id == Some(request_id))
            {
                return Err(StoreError::UniqueViolation {
                    constraint: PROVIDER_REQUEST_CONSTRAINT.to_string(),
                });
            }
        }

        let provider = HostingProvider {
            provider_id: Uuid::new_v4(),
            request_id: input.request_id,
            name: input.name.clone(),
            description: input.description.clone(),
            website: input.website.clone(),
            locations: input.locations.clone(),
            created_utc: Utc::now(),
        };
        self.working.providers.push(provider.clone());
        Ok(provider)
    }

    async fn get_provider(&mut self, provider_id: Uuid) -> StoreResult<Option<HostingProvider>> {
        Ok(self
            .working
            .providers
            .iter()
            .find(|p| p.provider_id == provider_id)
            .cloned())
    }

    async fn provider_for_request(&mut self, request_id: Uuid) -> StoreResult<Option<HostingProvider>> {
        Ok(self
            .working
            .providers
            .iter()
            .find(|p| p.request_id == Some(request_id))
            .cloned())
    }

    async fn list_providers(&mut self) -> StoreResult<Vec<HostingProvider>> {
        Ok(self.working.providers.clone())
    }

    async fn set_provider_services(&mut self, provider_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()> {
        replace_links(&mut self.working.provider_services, provider_id, tag_ids);
        Ok(())
    }

    async fn list_provider_services(&mut self, provider_id: Uuid) -> StoreResult<Vec<ServiceTag>> {
        Ok(self
            .working
            .tags_in(&self.working.provider_services, provider_id))
    }

    async fn insert_greencheck_asn(&mut self, provider_id: Uuid, asn: i64) -> StoreResult<GreencheckAsn> {
        if self.working.asns.iter().any(|a| a.asn == asn) {
            return Err(StoreError::UniqueViolation {
                constraint: ASN_CONSTRAINT.to_string(),
            });
        }
        let record = GreencheckAsn {
            asn_id: Uuid::new_v4(),
            provider_id,
            asn,
            active: true,
        };
        self.working.asns.push(record.clone());
        Ok(record)
    }

    async fn find_greencheck_asn(&mut self, asn: i64) -> StoreResult<Option<GreencheckAsn>> {
        Ok(self.working.asns.iter().find(|a| a.asn == asn).cloned())
    }

    async fn list_greencheck_asns(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckAsn>> {
        Ok(self
            .working
            .asns
            .iter()
            .filter(|a| a.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn insert_greencheck_ip(
        &mut self,
        provider_id: Uuid,
        ip_start: IpAddr,
        ip_end: IpAddr,
    ) -> StoreResult<GreencheckIp> {
        let record = GreencheckIp {
            ip_id: Uuid::new_v4(),
            provider_id,
            ip_start,
            ip_end,
            active: true,
        };
        self.working.ips.push(record.clone());
        Ok(record)
    }

    async fn list_greencheck_ips(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckIp>> {
        Ok(self
            .working
            .ips
            .iter()
            .filter(|i| i.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn insert_supporting_document(
        &mut self,
        input: &NewSupportingDocument,
    ) -> StoreResult<SupportingDocument> {
        let document = SupportingDocument {
            document_id: Uuid::new_v4(),
            provider_id: input.provider_id,
            title: input.title.clone(),
            description: input.description.clone(),
            url: input.url.clone(),
            attachment: input.attachment.clone(),
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            evidence_type: input.evidence_type,
            public: input.public,
        };
        self.working.documents.push(document.clone());
        Ok(document)
    }

    async fn list_supporting_documents(
        &mut self,
        provider_id: Uuid,
    ) -> StoreResult<Vec<SupportingDocument>> {
        Ok(self
            .working
            .documents
            .iter()
            .filter(|d| d.provider_id == provider_id)
            .cloned()
            .collect())
    }
}
