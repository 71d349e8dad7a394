//! Directory records: the live hosting provider and what is bound to it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::net::IpAddr;
use uuid::Uuid;

use super::evidence::EvidenceType;
use super::network::ip_to_u128;
use super::tag::ServiceTag;

/// Where a directory provider operates.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ProviderLocation {
    pub city: String,
    pub country: String,
}

/// Publicly listed green hosting provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostingProvider {
    pub provider_id: Uuid,
    /// Request this provider was approved from, if any.
    pub request_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub website: String,
    /// Ordered; the first entry is the primary location.
    pub locations: Vec<ProviderLocation>,
    pub created_utc: DateTime<Utc>,
}

impl HostingProvider {
    pub fn city(&self) -> Option<&str> {
        self.locations.first().map(|l| l.city.as_str())
    }

    pub fn country(&self) -> Option<&str> {
        self.locations.first().map(|l| l.country.as_str())
    }
}

impl std::fmt::Display for HostingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Input for creating a directory provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHostingProvider {
    pub request_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub website: String,
    pub locations: Vec<ProviderLocation>,
}

/// ASN bound to a directory provider. ASN values are unique directory-wide.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GreencheckAsn {
    pub asn_id: Uuid,
    pub provider_id: Uuid,
    pub asn: i64,
    pub active: bool,
}

/// IP range bound to a directory provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreencheckIp {
    pub ip_id: Uuid,
    pub provider_id: Uuid,
    pub ip_start: IpAddr,
    pub ip_end: IpAddr,
    pub active: bool,
}

impl GreencheckIp {
    /// Number of addresses covered, both ends inclusive.
    pub fn range_length(&self) -> u128 {
        let start = ip_to_u128(&self.ip_start);
        let end = ip_to_u128(&self.ip_end);
        end.saturating_sub(start).saturating_add(1)
    }
}

/// Supporting document backing a provider's green energy claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub document_id: Uuid,
    pub provider_id: Uuid,
    pub title: String,
    pub description: String,
    /// Empty when the evidence was a file.
    pub url: String,
    /// Empty when the evidence was a link.
    pub attachment: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub evidence_type: EvidenceType,
    pub public: bool,
}

impl SupportingDocument {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date < self.valid_to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSupportingDocument {
    pub provider_id: Uuid,
    pub title: String,
    pub description: String,
    pub url: String,
    pub attachment: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub evidence_type: EvidenceType,
    pub public: bool,
}

/// A provider with everything bound to it (for review and lookup screens).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDetail {
    pub provider: HostingProvider,
    pub services: Vec<ServiceTag>,
    pub asns: Vec<GreencheckAsn>,
    pub ip_ranges: Vec<GreencheckIp>,
    pub documents: Vec<SupportingDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip_range(start: &str, end: &str) -> GreencheckIp {
        GreencheckIp {
            ip_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            ip_start: start.parse().unwrap(),
            ip_end: end.parse().unwrap(),
            active: true,
        }
    }

    #[test]
    fn range_length_counts_both_ends() {
        assert_eq!(ip_range("127.0.0.1", "127.0.0.1").range_length(), 1);
        assert_eq!(ip_range("127.0.0.1", "127.0.0.255").range_length(), 255);
        assert_eq!(ip_range("127.0.0.1", "127.0.1.1").range_length(), 257);
        assert_eq!(ip_range("2001:db8::", "2001:db8::ff").range_length(), 256);
    }

    #[test]
    fn document_validity_window_is_half_open() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let doc = SupportingDocument {
            document_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            title: "Certificate".to_string(),
            description: String::new(),
            url: "https://example.org/cert".to_string(),
            attachment: String::new(),
            valid_from: from,
            valid_to: to,
            evidence_type: EvidenceType::Certificate,
            public: true,
        };
        assert!(doc.is_valid_on(from));
        assert!(doc.is_valid_on(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()));
        assert!(!doc.is_valid_on(to));
    }
}
