//! Approval: promoting a reviewed request into live directory records.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ApprovalError, ServiceError, StoreError};
use crate::models::{
    HostingProvider, NewHostingProvider, NewSupportingDocument, ProviderDetail, ProviderLocation,
    ProviderRequest, ProviderRequestStatus,
};
use crate::services::metrics::{record_error, APPROVALS_TOTAL};
use crate::services::requests::ServiceResult;
use crate::services::store::{
    DirectoryStore, IdentityStore, RequestStore, Store, UnitOfWork, ASN_CONSTRAINT,
    PROVIDER_REQUEST_CONSTRAINT,
};

/// Tunables of the approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Length of the validity window given to every supporting document.
    pub evidence_validity_days: u64,
    /// How many directory providers a single owner may hold.
    pub max_providers_per_owner: usize,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            evidence_validity_days: 365,
            max_providers_per_owner: 1,
        }
    }
}

pub struct ApprovalEngine<S: Store> {
    store: Arc<S>,
    policy: ApprovalPolicy,
}

impl<S: Store> Clone for ApprovalEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: Store> ApprovalEngine<S> {
    pub fn new(store: Arc<S>, policy: ApprovalPolicy) -> Self {
        Self { store, policy }
    }

    /// Approve a request, creating its directory provider with everything
    /// attached. Either all records are written or none are.
    pub async fn approve(&self, request_id: Uuid) -> ServiceResult<HostingProvider> {
        self.approve_on(request_id, Utc::now().date_naive()).await
    }

    /// [`approve`](Self::approve) with an explicit first day of document validity.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn approve_on(&self, request_id: Uuid, today: NaiveDate) -> ServiceResult<HostingProvider> {
        let mut tx = self.store.begin().await?;

        match self.materialize(&mut tx, request_id, today).await {
            Ok(provider) => {
                tx.commit().await?;

                APPROVALS_TOTAL.with_label_values(&["ok"]).inc();
                info!(
                    provider_id = %provider.provider_id,
                    name = %provider.name,
                    "Provider request approved"
                );
                Ok(provider)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back approval");
                }

                APPROVALS_TOTAL.with_label_values(&[e.kind()]).inc();
                record_error(e.kind());
                match &e {
                    ServiceError::Store(_) => error!(error = %e, "Approval failed"),
                    _ => warn!(error = %e, "Approval refused"),
                }
                Err(e)
            }
        }
    }

    async fn materialize(
        &self,
        tx: &mut S::Tx,
        request_id: Uuid,
        today: NaiveDate,
    ) -> ServiceResult<HostingProvider> {
        let request = tx
            .lock_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        self.check_preconditions(tx, &request).await?;

        let locations = tx.list_locations(request_id).await?;
        let primary = locations.first().ok_or_else(|| ApprovalError::MissingLocation {
            request: request.name.clone(),
        })?;
        if locations.len() > 1 {
            warn!(
                locations = locations.len(),
                "Only the first location is copied to the provider"
            );
        }

        let provider = tx
            .insert_provider(&NewHostingProvider {
                request_id: Some(request.request_id),
                name: request.name.clone(),
                description: request.description.clone(),
                website: request.website.clone(),
                locations: vec![ProviderLocation {
                    city: primary.city.clone(),
                    country: primary.country.clone(),
                }],
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref constraint }
                    if constraint == PROVIDER_REQUEST_CONSTRAINT =>
                {
                    ServiceError::from(ApprovalError::DuplicateApproval {
                        request: request.name.clone(),
                        provider: None,
                    })
                }
                other => other.into(),
            })?;

        let services: Vec<Uuid> = tx
            .list_request_services(request_id)
            .await?
            .into_iter()
            .map(|t| t.tag_id)
            .collect();
        tx.set_provider_services(provider.provider_id, &services)
            .await?;

        if let Some(owner_id) = request.created_by {
            tx.bind_owner(owner_id, provider.provider_id).await?;
        }

        for child in tx.list_request_asns(request_id).await? {
            tx.insert_greencheck_asn(provider.provider_id, child.asn)
                .await
                .map_err(|e| match e {
                    StoreError::UniqueViolation { ref constraint } if constraint == ASN_CONSTRAINT => {
                        ServiceError::from(ApprovalError::DuplicateAsn {
                            request: request.name.clone(),
                            asn: child.asn,
                        })
                    }
                    other => other.into(),
                })?;
        }

        for range in tx.list_request_ip_ranges(request_id).await? {
            tx.insert_greencheck_ip(provider.provider_id, range.start, range.end)
                .await?;
        }

        let valid_to = today
            .checked_add_days(Days::new(self.policy.evidence_validity_days))
            .unwrap_or(NaiveDate::MAX);
        for evidence in tx.list_evidence(request_id).await? {
            tx.insert_supporting_document(&NewSupportingDocument {
                provider_id: provider.provider_id,
                title: evidence.title,
                description: evidence.description,
                url: evidence.link.unwrap_or_default(),
                attachment: evidence.file.unwrap_or_default(),
                valid_from: today,
                valid_to,
                evidence_type: evidence.evidence_type,
                public: evidence.public,
            })
            .await?;
        }

        tx.update_request_status(request_id, ProviderRequestStatus::Approved)
            .await?;

        Ok(provider)
    }

    async fn check_preconditions(&self, tx: &mut S::Tx, request: &ProviderRequest) -> ServiceResult<()> {
        if request.status == ProviderRequestStatus::Approved {
            return Err(ApprovalError::AlreadyApproved {
                request: request.name.clone(),
            }
            .into());
        }

        if let Some(existing) = tx.provider_for_request(request.request_id).await? {
            return Err(ApprovalError::DuplicateApproval {
                request: request.name.clone(),
                provider: Some(existing.name),
            }
            .into());
        }

        let missing_owner = || ApprovalError::MissingOwner {
            request: request.name.clone(),
        };
        let owner_id = request.created_by.ok_or_else(missing_owner)?;
        // Held until the unit of work ends so concurrent approvals for the
        // same owner cannot both pass the limit check.
        let owner = tx.lock_owner(owner_id).await?.ok_or_else(missing_owner)?;

        let bound = tx.providers_for_owner(owner_id).await?;
        if bound.len() >= self.policy.max_providers_per_owner {
            return Err(ApprovalError::OwnerAlreadyBound {
                request: request.name.clone(),
                owner: owner.name,
                provider: bound.last().map(|p| p.name.clone()).unwrap_or_default(),
            }
            .into());
        }

        Ok(())
    }

    /// A directory provider with its services, network ranges and documents.
    pub async fn get_provider_detail(&self, provider_id: Uuid) -> ServiceResult<ProviderDetail> {
        let mut tx = self.store.begin().await?;
        let provider = tx
            .get_provider(provider_id)
            .await?
            .ok_or(ServiceError::ProviderNotFound(provider_id))?;

        let detail = ProviderDetail {
            services: tx.list_provider_services(provider_id).await?,
            asns: tx.list_greencheck_asns(provider_id).await?,
            ip_ranges: tx.list_greencheck_ips(provider_id).await?,
            documents: tx.list_supporting_documents(provider_id).await?,
            provider,
        };
        tx.rollback().await?;

        Ok(detail)
    }

    /// Every provider in the directory.
    pub async fn list_providers(&self) -> ServiceResult<Vec<HostingProvider>> {
        let mut tx = self.store.begin().await?;
        let providers = tx.list_providers().await?;
        tx.rollback().await?;
        Ok(providers)
    }
}
