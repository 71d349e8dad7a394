//! Approval integration tests (in-memory store).

mod common;

use chrono::NaiveDate;
use common::{acme_request, ip, memory_harness, memory_harness_with, pending_request};
use provider_request_service::error::{ApprovalError, ServiceError};
use provider_request_service::models::{
    EvidenceType, NewEvidence, NewHostingProvider, NewIpRange, NewLocation, ProviderLocation,
    ProviderRequestStatus,
};
use provider_request_service::services::{
    ApprovalPolicy, DirectoryStore, IdentityStore, Store, UnitOfWork,
};
use serde_json::json;
use uuid::Uuid;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn approving_acme_creates_the_full_directory_entry() {
    let h = memory_harness();
    h.requests.add_service_tag("shared-hosting", "Shared hosting").await.unwrap();
    let (request, owner) = acme_request(&h, 64512).await;
    h.requests
        .assign_services(request.request_id, &["shared-hosting".to_string()])
        .await
        .unwrap();

    let provider = h
        .engine
        .approve_on(request.request_id, day(2026, 3, 1))
        .await
        .unwrap();

    assert_eq!(provider.name, "Acme Hosting");
    assert_eq!(provider.website, "https://acme-hosting.example");
    assert_eq!(provider.description, "Acme Hosting runs on wind power");
    assert_eq!(provider.request_id, Some(request.request_id));
    assert_eq!(provider.city(), Some("Berlin"));
    assert_eq!(provider.country(), Some("DE"));

    let detail = h.engine.get_provider_detail(provider.provider_id).await.unwrap();

    assert_eq!(detail.services.len(), 1);
    assert_eq!(detail.services[0].slug, "shared-hosting");

    assert_eq!(detail.asns.len(), 1);
    assert_eq!(detail.asns[0].asn, 64512);
    assert!(detail.asns[0].active);

    assert_eq!(detail.ip_ranges.len(), 1);
    let range = &detail.ip_ranges[0];
    assert_eq!(range.ip_start, ip("10.0.0.1"));
    assert_eq!(range.ip_end, ip("10.0.0.10"));
    assert_eq!(range.range_length(), 10);
    assert!(range.active);

    assert_eq!(detail.documents.len(), 1);
    let document = &detail.documents[0];
    assert_eq!(document.title, "Annual report 2025");
    assert_eq!(document.url, "https://acme.example/report.pdf");
    assert_eq!(document.attachment, "");
    assert_eq!(document.evidence_type, EvidenceType::AnnualReport);
    assert!(document.public);
    assert_eq!(document.valid_from, day(2026, 3, 1));
    assert_eq!(document.valid_to, day(2027, 3, 1));
    assert_eq!((document.valid_to - document.valid_from).num_days(), 365);

    let stored = h.requests.get_request(request.request_id).await.unwrap();
    assert_eq!(stored.status, ProviderRequestStatus::Approved);

    let mut tx = h.store.begin().await.unwrap();
    let owned = tx.providers_for_owner(owner.owner_id).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].provider_id, provider.provider_id);
}

#[tokio::test]
async fn second_approval_is_refused() {
    let h = memory_harness();
    let (request, _) = acme_request(&h, 64512).await;

    h.engine.approve(request.request_id).await.unwrap();
    let err = h.engine.approve(request.request_id).await.unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Approval(ApprovalError::AlreadyApproved { ref request }) if request == "Acme Hosting"
    ));
    assert_eq!(h.engine.list_providers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn existing_provider_for_the_request_blocks_approval() {
    let h = memory_harness();
    let (request, _) = acme_request(&h, 64512).await;

    let mut tx = h.store.begin().await.unwrap();
    let legacy = tx
        .insert_provider(&NewHostingProvider {
            request_id: Some(request.request_id),
            name: "Acme Legacy".to_string(),
            description: String::new(),
            website: "https://legacy.acme.example".to_string(),
            locations: vec![ProviderLocation {
                city: "Berlin".to_string(),
                country: "DE".to_string(),
            }],
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let err = h.engine.approve(request.request_id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Approval(ApprovalError::DuplicateApproval { ref provider, .. })
            if provider.as_deref() == Some("Acme Legacy")
    ));
    assert!(err.to_string().contains("provider 'Acme Legacy' already exists"));

    let providers = h.engine.list_providers().await.unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].provider_id, legacy.provider_id);
    assert_eq!(
        h.requests.get_request(request.request_id).await.unwrap().status,
        ProviderRequestStatus::PendingReview
    );
}

#[tokio::test]
async fn private_file_evidence_becomes_a_private_attachment() {
    let h = memory_harness();
    let owner = h.requests.register_owner("Solar Admin").await.unwrap();
    let request = pending_request(&h, "Solar Hosting", &owner).await;
    let id = request.request_id;
    h.requests
        .add_location(id, NewLocation::new("", "Lisbon", "PT"))
        .await
        .unwrap();

    let mut evidence = NewEvidence::file(
        "Renewable certificate",
        "uploads/solar-certificate.pdf",
        EvidenceType::Certificate,
    );
    evidence.public = false;
    h.requests.add_evidence(id, evidence).await.unwrap();

    let provider = h.engine.approve_on(id, day(2026, 3, 1)).await.unwrap();
    let detail = h.engine.get_provider_detail(provider.provider_id).await.unwrap();

    assert_eq!(detail.documents.len(), 1);
    let document = &detail.documents[0];
    assert_eq!(document.title, "Renewable certificate");
    assert_eq!(document.url, "");
    assert_eq!(document.attachment, "uploads/solar-certificate.pdf");
    assert_eq!(document.evidence_type, EvidenceType::Certificate);
    assert!(!document.public);
}

#[tokio::test]
async fn rejected_and_open_requests_can_still_be_approved() {
    let h = memory_harness_with(ApprovalPolicy {
        max_providers_per_owner: 2,
        ..ApprovalPolicy::default()
    });
    let (rejected, owner) = acme_request(&h, 64512).await;
    h.requests.reject(rejected.request_id).await.unwrap();

    let reopened = pending_request(&h, "Acme Two", &owner).await;
    h.requests
        .add_location(reopened.request_id, NewLocation::new("", "Hamburg", "DE"))
        .await
        .unwrap();
    h.requests.request_changes(reopened.request_id).await.unwrap();

    for (id, before) in [
        (rejected.request_id, ProviderRequestStatus::Rejected),
        (reopened.request_id, ProviderRequestStatus::Open),
    ] {
        assert_eq!(h.requests.get_request(id).await.unwrap().status, before);

        let provider = h.engine.approve(id).await.unwrap();
        assert_eq!(provider.request_id, Some(id));
        assert_eq!(
            h.requests.get_request(id).await.unwrap().status,
            ProviderRequestStatus::Approved
        );
    }

    assert_eq!(h.engine.list_providers().await.unwrap().len(), 2);
}

#[tokio::test]
async fn owner_bound_to_a_provider_cannot_approve_another() {
    let h = memory_harness();
    let (first, owner) = acme_request(&h, 64512).await;
    h.engine.approve(first.request_id).await.unwrap();

    let second = pending_request(&h, "Acme Two", &owner).await;
    h.requests
        .add_location(second.request_id, NewLocation::new("", "Hamburg", "DE"))
        .await
        .unwrap();

    let err = h.engine.approve(second.request_id).await.unwrap_err();
    match err {
        ServiceError::Approval(ApprovalError::OwnerAlreadyBound { owner: o, provider, .. }) => {
            assert_eq!(o, "Acme Admin");
            assert_eq!(provider, "Acme Hosting");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.engine.list_providers().await.unwrap().len(), 1);
    assert_eq!(
        h.requests.get_request(second.request_id).await.unwrap().status,
        ProviderRequestStatus::PendingReview
    );
}

#[tokio::test]
async fn policy_can_allow_several_providers_per_owner() {
    let h = memory_harness_with(ApprovalPolicy {
        max_providers_per_owner: 2,
        ..ApprovalPolicy::default()
    });
    let (first, owner) = acme_request(&h, 64512).await;
    h.engine.approve(first.request_id).await.unwrap();

    for (name, city) in [("Acme Two", "Hamburg"), ("Acme Three", "Munich")] {
        let request = pending_request(&h, name, &owner).await;
        h.requests
            .add_location(request.request_id, NewLocation::new("", city, "DE"))
            .await
            .unwrap();

        let result = h.engine.approve(request.request_id).await;
        if name == "Acme Two" {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result,
                Err(ServiceError::Approval(ApprovalError::OwnerAlreadyBound { .. }))
            ));
        }
    }

    assert_eq!(h.engine.list_providers().await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_asn_rolls_back_everything() {
    let h = memory_harness();
    let (first, _) = acme_request(&h, 64512).await;
    let first_provider = h.engine.approve(first.request_id).await.unwrap();

    let rival = h.requests.register_owner("Rival Admin").await.unwrap();
    let second = pending_request(&h, "Rival Hosting", &rival).await;
    let id = second.request_id;
    h.requests
        .add_location(id, NewLocation::new("", "Vienna", "AT"))
        .await
        .unwrap();
    h.requests.add_asn(id, 65001).await.unwrap();
    h.requests.add_asn(id, 64512).await.unwrap();
    h.requests
        .add_ip_range(id, NewIpRange::new(ip("192.0.2.1"), ip("192.0.2.200")))
        .await
        .unwrap();
    h.requests
        .add_evidence(
            id,
            NewEvidence::link("Green tariff", "https://rival.example/tariff", EvidenceType::WebPage),
        )
        .await
        .unwrap();

    let err = h.engine.approve(id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Approval(ApprovalError::DuplicateAsn { asn: 64512, .. })
    ));
    assert!(err.to_string().contains("'64512'"));

    let providers = h.engine.list_providers().await.unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].provider_id, first_provider.provider_id);

    let mut tx = h.store.begin().await.unwrap();
    assert!(tx.find_greencheck_asn(65001).await.unwrap().is_none());
    assert_eq!(
        tx.find_greencheck_asn(64512).await.unwrap().unwrap().provider_id,
        first_provider.provider_id
    );
    assert!(tx.providers_for_owner(rival.owner_id).await.unwrap().is_empty());
    assert!(tx.provider_for_request(id).await.unwrap().is_none());
    tx.rollback().await.unwrap();

    assert_eq!(
        h.requests.get_request(id).await.unwrap().status,
        ProviderRequestStatus::PendingReview
    );
}

#[tokio::test]
async fn request_without_location_is_refused() {
    let h = memory_harness();
    let owner = h.requests.register_owner("Owner").await.unwrap();
    let request = pending_request(&h, "Nowhere Hosting", &owner).await;

    let err = h.engine.approve(request.request_id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Approval(ApprovalError::MissingLocation { .. })
    ));
    assert!(h.engine.list_providers().await.unwrap().is_empty());
}

#[tokio::test]
async fn request_without_owner_is_refused() {
    let h = memory_harness();
    let request = h
        .requests
        .create(json!({
            "name": "Orphan Hosting",
            "website": "https://orphan.example",
            "status": "pending_review",
        }))
        .await
        .unwrap();
    h.requests
        .add_location(request.request_id, NewLocation::new("", "Oslo", "NO"))
        .await
        .unwrap();

    let err = h.engine.approve(request.request_id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Approval(ApprovalError::MissingOwner { .. })
    ));
}

#[tokio::test]
async fn only_the_first_location_is_copied() {
    let h = memory_harness();
    let (request, _) = acme_request(&h, 64512).await;
    h.requests
        .add_location(request.request_id, NewLocation::new("DR site", "Frankfurt", "DE"))
        .await
        .unwrap();

    let provider = h.engine.approve(request.request_id).await.unwrap();
    assert_eq!(provider.locations.len(), 1);
    assert_eq!(provider.city(), Some("Berlin"));
}

#[tokio::test]
async fn unknown_ids_are_reported() {
    let h = memory_harness();

    assert!(matches!(
        h.engine.approve(Uuid::new_v4()).await,
        Err(ServiceError::RequestNotFound(_))
    ));
    assert!(matches!(
        h.engine.get_provider_detail(Uuid::new_v4()).await,
        Err(ServiceError::ProviderNotFound(_))
    ));
}

#[tokio::test]
async fn deleting_an_approved_request_keeps_the_provider() {
    let h = memory_harness();
    let (request, _) = acme_request(&h, 64512).await;
    let provider = h.engine.approve(request.request_id).await.unwrap();

    h.requests.delete_request(request.request_id).await.unwrap();

    let detail = h.engine.get_provider_detail(provider.provider_id).await.unwrap();
    assert_eq!(detail.provider.request_id, None);
    assert_eq!(detail.asns.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_of_one_request_succeed_once() {
    let h = memory_harness();
    let (request, _) = acme_request(&h, 64512).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = h.engine.clone();
            let id = request.request_id;
            tokio::spawn(async move { engine.approve(id).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ServiceError::Approval(
                ApprovalError::AlreadyApproved { .. } | ApprovalError::DuplicateApproval { .. },
            )) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(h.engine.list_providers().await.unwrap().len(), 1);
}
