//! Network resources (ASNs and IP ranges) claimed in a provider request.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::net::IpAddr;
use uuid::Uuid;

/// Autonomous system number operated by the requesting provider.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RequestAsn {
    pub asn_id: Uuid,
    pub request_id: Uuid,
    pub asn: i64,
}

impl std::fmt::Display for RequestAsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.asn)
    }
}

/// IP range operated by the requesting provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestIpRange {
    pub ip_range_id: Uuid,
    pub request_id: Uuid,
    pub start: IpAddr,
    pub end: IpAddr,
}

impl std::fmt::Display for RequestIpRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Input for attaching an IP range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIpRange {
    pub start: IpAddr,
    pub end: IpAddr,
}

impl NewIpRange {
    pub fn new(start: IpAddr, end: IpAddr) -> Self {
        Self { start, end }
    }
}

/// Numeric value of an address: IPv4 as its 32-bit value, IPv6 as 128-bit.
pub fn ip_to_u128(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}
