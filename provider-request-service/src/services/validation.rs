//! Intake validation for request child records.

use validator::Validate;

use crate::error::{EvidenceProblem, ValidationError};
use crate::models::{ip_to_u128, NewEvidence, NewIpRange, NewLocation};

/// Start must not be greater than end. A single-address range is valid.
pub fn validate_ip_range(range: &NewIpRange) -> Result<(), ValidationError> {
    if ip_to_u128(&range.start) > ip_to_u128(&range.end) {
        return Err(ValidationError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    Ok(())
}

/// Exactly one of link and file must be present. Blank strings count as absent.
pub fn validate_evidence(evidence: &NewEvidence) -> Result<(), ValidationError> {
    let evidence = evidence.clone().normalized();

    match (evidence.link.is_some(), evidence.file.is_some()) {
        (false, false) => Err(ValidationError::InvalidEvidence(EvidenceProblem::Missing)),
        (true, true) => Err(ValidationError::InvalidEvidence(EvidenceProblem::Both)),
        _ => {
            evidence.validate()?;
            Ok(())
        }
    }
}

pub fn validate_location(location: &NewLocation) -> Result<(), ValidationError> {
    location.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EvidenceType;

    fn range(start: &str, end: &str) -> NewIpRange {
        NewIpRange::new(start.parse().unwrap(), end.parse().unwrap())
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let result = validate_ip_range(&range("10.0.0.10", "10.0.0.1"));
        assert!(matches!(result, Err(ValidationError::InvalidRange { .. })));

        let result = validate_ip_range(&range("2001:db8::2", "2001:db8::1"));
        assert!(matches!(result, Err(ValidationError::InvalidRange { .. })));
    }

    #[test]
    fn test_ordered_range_passes() {
        assert!(validate_ip_range(&range("10.0.0.1", "10.0.0.10")).is_ok());
        assert!(validate_ip_range(&range("2001:db8::1", "2001:db8::ffff")).is_ok());
    }

    #[test]
    fn test_single_address_range_passes() {
        assert!(validate_ip_range(&range("10.0.0.1", "10.0.0.1")).is_ok());
    }

    #[test]
    fn test_ordering_is_numeric_not_lexical() {
        // "10.0.0.9" sorts after "10.0.0.10" as text
        assert!(validate_ip_range(&range("10.0.0.9", "10.0.0.10")).is_ok());
    }

    #[test]
    fn test_evidence_with_link_passes() {
        let evidence = NewEvidence::link(
            "Annual report",
            "https://acme.example/cert",
            EvidenceType::AnnualReport,
        );
        assert!(validate_evidence(&evidence).is_ok());
    }

    #[test]
    fn test_evidence_with_file_passes() {
        let evidence = NewEvidence::file("Certificate", "uploads/cert.pdf", EvidenceType::Certificate);
        assert!(validate_evidence(&evidence).is_ok());
    }

    #[test]
    fn test_evidence_with_neither_is_rejected() {
        let mut evidence = NewEvidence::link("Report", "https://acme.example", EvidenceType::Other);
        evidence.link = None;
        let result = validate_evidence(&evidence);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidEvidence(EvidenceProblem::Missing))
        ));
    }

    #[test]
    fn test_evidence_with_both_is_rejected() {
        let mut evidence = NewEvidence::link("Report", "https://acme.example", EvidenceType::Other);
        evidence.file = Some("uploads/report.pdf".to_string());
        let result = validate_evidence(&evidence);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidEvidence(EvidenceProblem::Both))
        ));
    }

    #[test]
    fn test_evidence_with_blank_file_counts_as_absent() {
        let mut evidence = NewEvidence::link("Report", "https://acme.example", EvidenceType::Other);
        evidence.file = Some(String::new());
        assert!(validate_evidence(&evidence).is_ok());
    }

    #[test]
    fn test_evidence_link_must_be_url() {
        let evidence = NewEvidence::link("Report", "not a url", EvidenceType::WebPage);
        assert!(matches!(
            validate_evidence(&evidence),
            Err(ValidationError::Fields(_))
        ));
    }

    #[test]
    fn test_location_requires_two_letter_country() {
        assert!(validate_location(&NewLocation::new("HQ", "Berlin", "DE")).is_ok());
        assert!(matches!(
            validate_location(&NewLocation::new("HQ", "Berlin", "DEU")),
            Err(ValidationError::Fields(_))
        ));
        assert!(matches!(
            validate_location(&NewLocation::new("HQ", "", "DE")),
            Err(ValidationError::Fields(_))
        ));
    }
}
