//! Common test utilities for provider-request-service integration tests.

#![allow(dead_code)]

use provider_request_service::models::{
    EvidenceType, NewEvidence, NewIpRange, NewLocation, Owner, ProviderRequest,
};
use provider_request_service::services::{
    ApprovalEngine, ApprovalPolicy, MemoryStore, ProviderRequestService, Store,
};
use serde_json::json;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,provider_request_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Request service and approval engine sharing one store.
pub struct Harness<S: Store> {
    pub store: Arc<S>,
    pub requests: ProviderRequestService<S>,
    pub engine: ApprovalEngine<S>,
}

impl<S: Store> Harness<S> {
    pub fn with_store(store: S, policy: ApprovalPolicy) -> Self {
        init_tracing();
        let store = Arc::new(store);
        Self {
            requests: ProviderRequestService::new(Arc::clone(&store)),
            engine: ApprovalEngine::new(Arc::clone(&store), policy),
            store,
        }
    }
}

pub fn memory_harness() -> Harness<MemoryStore> {
    Harness::with_store(MemoryStore::new(), ApprovalPolicy::default())
}

pub fn memory_harness_with(policy: ApprovalPolicy) -> Harness<MemoryStore> {
    Harness::with_store(MemoryStore::new(), policy)
}

pub fn ip(value: &str) -> std::net::IpAddr {
    value.parse().expect("valid IP literal")
}

/// A pending request by `owner`, with no child records.
pub async fn pending_request<S: Store>(
    harness: &Harness<S>,
    name: &str,
    owner: &Owner,
) -> ProviderRequest {
    harness
        .requests
        .create(json!({
            "name": name,
            "website": format!("https://{}.example", name.to_lowercase().replace(' ', "-")),
            "description": format!("{} runs on wind power", name),
            "status": "pending_review",
            "creator": owner.owner_id,
            "authorised": true,
        }))
        .await
        .expect("Failed to create request")
}

/// The reference request: Berlin/DE, one ASN, 10.0.0.1-10.0.0.10 and a
/// public annual report link.
pub async fn acme_request<S: Store>(harness: &Harness<S>, asn: i64) -> (ProviderRequest, Owner) {
    let owner = harness
        .requests
        .register_owner("Acme Admin")
        .await
        .expect("Failed to register owner");
    let request = pending_request(harness, "Acme Hosting", &owner).await;
    let id = request.request_id;

    harness
        .requests
        .add_location(id, NewLocation::new("HQ", "Berlin", "DE"))
        .await
        .expect("Failed to add location");
    harness
        .requests
        .add_asn(id, asn)
        .await
        .expect("Failed to add ASN");
    harness
        .requests
        .add_ip_range(id, NewIpRange::new(ip("10.0.0.1"), ip("10.0.0.10")))
        .await
        .expect("Failed to add IP range");
    harness
        .requests
        .add_evidence(
            id,
            NewEvidence::link(
                "Annual report 2025",
                "https://acme.example/report.pdf",
                EvidenceType::AnnualReport,
            ),
        )
        .await
        .expect("Failed to add evidence");

    (request, owner)
}
