//! Request intake: drafting requests, attaching child records and moving them
//! through review.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{ApprovalError, ServiceError};
use crate::models::{
    Consent, CreateProviderRequest, Location, NewEvidence, NewIpRange, NewLocation, Owner,
    ProviderRequest, ProviderRequestStatus, RequestAsn, RequestDetail, RequestEvidence,
    RequestIpRange, ServiceTag, SetConsent,
};
use crate::services::metrics::{record_error, REQUESTS_CREATED, TRANSITIONS_TOTAL};
use crate::services::store::{IdentityStore, RequestStore, Store, TagVocabulary, UnitOfWork};
use crate::services::validation::{validate_evidence, validate_ip_range, validate_location};

pub type ServiceResult<T> = Result<T, ServiceError>;

async fn require_request<T: RequestStore>(tx: &mut T, request_id: Uuid) -> ServiceResult<ProviderRequest> {
    tx.get_request(request_id)
        .await?
        .ok_or(ServiceError::RequestNotFound(request_id))
}

pub struct ProviderRequestService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for ProviderRequestService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> ProviderRequestService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a request from a loosely-typed attribute map.
    ///
    /// Only `name`, `website`, `description`, `status`, `creator` and
    /// `authorised` are read. Everything else is ignored.
    pub async fn create(&self, attributes: serde_json::Value) -> ServiceResult<ProviderRequest> {
        let input = CreateProviderRequest::from_attributes(attributes)?;
        self.create_request(&input).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_request(&self, input: &CreateProviderRequest) -> ServiceResult<ProviderRequest> {
        let mut tx = self.store.begin().await?;
        let request = tx.insert_request(input).await?;
        tx.commit().await?;

        REQUESTS_CREATED
            .with_label_values(&[request.status.as_str()])
            .inc();
        info!(request_id = %request.request_id, status = %request.status, "Provider request created");

        Ok(request)
    }

    #[instrument(skip(self))]
    pub async fn register_owner(&self, name: &str) -> ServiceResult<Owner> {
        let mut tx = self.store.begin().await?;
        let owner = tx.insert_owner(name).await?;
        tx.commit().await?;

        info!(owner_id = %owner.owner_id, "Owner registered");
        Ok(owner)
    }

    /// Add a tag to the service vocabulary. Returns the existing tag if the
    /// slug is already known.
    #[instrument(skip(self))]
    pub async fn add_service_tag(&self, slug: &str, name: &str) -> ServiceResult<ServiceTag> {
        let mut tx = self.store.begin().await?;
        let tag = tx.upsert_tag(slug, name).await?;
        tx.commit().await?;
        Ok(tag)
    }

    /// Replace the services of a request with the tags matching `slugs`.
    /// Unknown slugs are dropped.
    #[instrument(skip(self, slugs), fields(request_id = %request_id))]
    pub async fn assign_services(
        &self,
        request_id: Uuid,
        slugs: &[String],
    ) -> ServiceResult<Vec<ServiceTag>> {
        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;

        let tags = tx.find_tags_by_slugs(slugs).await?;
        if tags.len() < slugs.len() {
            warn!(
                requested = slugs.len(),
                matched = tags.len(),
                "Ignoring unknown service slugs"
            );
        }

        let tag_ids: Vec<Uuid> = tags.iter().map(|t| t.tag_id).collect();
        tx.set_request_services(request_id, &tag_ids).await?;
        tx.commit().await?;

        Ok(tags)
    }

    /// `(slug, name)` pairs of every known service, ordered by slug.
    pub async fn list_available_services(&self) -> ServiceResult<Vec<(String, String)>> {
        let mut tx = self.store.begin().await?;
        let tags = tx.list_tags().await?;
        tx.rollback().await?;

        Ok(tags.into_iter().map(|t| (t.slug, t.name)).collect())
    }

    #[instrument(skip(self, input), fields(request_id = %request_id))]
    pub async fn add_location(&self, request_id: Uuid, input: NewLocation) -> ServiceResult<Location> {
        validate_location(&input)?;

        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;
        let location = tx.insert_location(request_id, &input).await?;
        tx.commit().await?;
        Ok(location)
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn add_asn(&self, request_id: Uuid, asn: i64) -> ServiceResult<RequestAsn> {
        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;
        let record = tx.insert_request_asn(request_id, asn).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Attach an IP range. Ranges whose start lies above their end are refused
    /// before anything is written.
    #[instrument(skip(self), fields(request_id = %request_id, start = %range.start, end = %range.end))]
    pub async fn add_ip_range(&self, request_id: Uuid, range: NewIpRange) -> ServiceResult<RequestIpRange> {
        validate_ip_range(&range)?;

        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;
        let record = tx.insert_request_ip_range(request_id, &range).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Attach an evidence item. Exactly one of link and file must be given.
    #[instrument(skip(self, input), fields(request_id = %request_id, title = %input.title))]
    pub async fn add_evidence(&self, request_id: Uuid, input: NewEvidence) -> ServiceResult<RequestEvidence> {
        let input = input.normalized();
        validate_evidence(&input)?;

        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;
        let record = tx.insert_evidence(request_id, &input).await?;
        tx.commit().await?;
        Ok(record)
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn set_consent(&self, request_id: Uuid, consent: SetConsent) -> ServiceResult<Consent> {
        let mut tx = self.store.begin().await?;
        require_request(&mut tx, request_id).await?;
        let record = tx.upsert_consent(request_id, &consent).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn get_request(&self, request_id: Uuid) -> ServiceResult<ProviderRequest> {
        let mut tx = self.store.begin().await?;
        let request = require_request(&mut tx, request_id).await?;
        tx.rollback().await?;
        Ok(request)
    }

    pub async fn get_request_detail(&self, request_id: Uuid) -> ServiceResult<RequestDetail> {
        let mut tx = self.store.begin().await?;
        let request = require_request(&mut tx, request_id).await?;

        let detail = RequestDetail {
            services: tx.list_request_services(request_id).await?,
            locations: tx.list_locations(request_id).await?,
            asns: tx.list_request_asns(request_id).await?,
            ip_ranges: tx.list_request_ip_ranges(request_id).await?,
            evidence: tx.list_evidence(request_id).await?,
            consent: tx.get_consent(request_id).await?,
            request,
        };
        tx.rollback().await?;

        Ok(detail)
    }

    /// Delete a request with all of its child records. A provider approved
    /// from it stays in the directory and loses its back-reference.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn delete_request(&self, request_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_request(request_id).await? {
            return Err(ServiceError::RequestNotFound(request_id));
        }
        tx.commit().await?;

        info!("Provider request deleted");
        Ok(())
    }

    /// Hand a request in for review.
    pub async fn submit(&self, request_id: Uuid) -> ServiceResult<ProviderRequest> {
        self.transition(request_id, ProviderRequestStatus::PendingReview)
            .await
    }

    /// Send a request back to the submitter for changes.
    pub async fn request_changes(&self, request_id: Uuid) -> ServiceResult<ProviderRequest> {
        self.transition(request_id, ProviderRequestStatus::Open).await
    }

    pub async fn reject(&self, request_id: Uuid) -> ServiceResult<ProviderRequest> {
        self.transition(request_id, ProviderRequestStatus::Rejected)
            .await
    }

    #[instrument(skip(self), fields(request_id = %request_id, to = %next))]
    async fn transition(
        &self,
        request_id: Uuid,
        next: ProviderRequestStatus,
    ) -> ServiceResult<ProviderRequest> {
        let mut tx = self.store.begin().await?;
        let request = tx
            .lock_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if !request.status.can_transition_to(next) {
            record_error("invalid_transition");
            return Err(ApprovalError::InvalidTransition {
                request: request.name,
                from: request.status,
                to: next,
            }
            .into());
        }

        tx.update_request_status(request_id, next).await?;
        let updated = require_request(&mut tx, request_id).await?;
        tx.commit().await?;

        TRANSITIONS_TOTAL.with_label_values(&[next.as_str()]).inc();
        info!(from = %request.status, to = %next, "Provider request status changed");

        Ok(updated)
    }
}
