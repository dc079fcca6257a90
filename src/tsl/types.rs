use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::errors::{TrustEvaluationError, TslError};
use super::evaluator::TrustEvaluator;
use crate::pki::{Certificate, CertificateProperties, KeyUsageBit};

/// One parsed and verified trusted list.
///
/// Instances are immutable once built by the parser. Re-parsing produces a
/// new instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustList {
    pub(crate) url: String,
    pub(crate) scheme_type: String,
    pub(crate) operator_name: String,
    pub(crate) territory: String,
    pub(crate) sequence_number: u64,
    pub(crate) issue_date: DateTime<Utc>,
    pub(crate) next_update: Option<DateTime<Utc>>,
    pub(crate) pointers: Vec<Pointer>,
    pub(crate) pivots: Vec<Pointer>,
    pub(crate) signing_certs: Vec<Certificate>,
    pub(crate) services: Vec<Service>,
}

impl TrustList {
    /// Check if the list is past its scheduled next update
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A list without a next update belongs to a closed scheme and counts as
    /// expired.
    pub fn is_expired_at(&self, instant: DateTime<Utc>) -> bool {
        match self.next_update {
            Some(next_update) => instant >= next_update,
            None => true,
        }
    }

    /// Evaluate a certificate chain (leaf first) against this list's services
    pub fn validate(&self, chain: &[Certificate]) -> Result<(), TrustEvaluationError> {
        TrustEvaluator::new(&self.services).validate(chain)
    }

    pub fn validate_at(
        &self,
        chain: &[Certificate],
        instant: DateTime<Utc>,
    ) -> Result<(), TrustEvaluationError> {
        TrustEvaluator::new(&self.services).validate_at(chain, instant)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme_type(&self) -> &str {
        &self.scheme_type
    }

    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    pub fn territory(&self) -> &str {
        &self.territory
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn issue_date(&self) -> DateTime<Utc> {
        self.issue_date
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    /// Pointers to trusted lists of other territories
    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    /// Pointers to older versions of this list, nearest predecessor first
    pub fn pivots(&self) -> &[Pointer] {
        &self.pivots
    }

    /// Certificates this list declares for signing itself
    pub fn signing_certs(&self) -> &[Certificate] {
        &self.signing_certs
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn into_services(self) -> Vec<Service> {
        self.services
    }
}

/// Reference to another trusted list
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub territory: String,
    pub location: String,
    /// Certificates expected to sign the referenced list
    pub certs: Vec<Certificate>,
}

/// One trust service entry
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub service_type: String,
    pub name: String,
    /// `AdditionalServiceInformation` URI, empty when absent
    pub additional: String,
    pub certs: Vec<Certificate>,
    /// Oldest first
    pub validity: Vec<Validity>,
}

impl Service {
    /// The window covering `instant`, if any.
    pub fn validity_at(&self, instant: DateTime<Utc>) -> Option<&Validity> {
        self.validity.iter().find(|window| window.contains(instant))
    }

    /// Returns true if one of the service certificates is in the chain or
    /// issued a certificate of the chain.
    pub fn matches_chain(&self, chain: &[Certificate]) -> bool {
        self.certs.iter().any(|service_cert| {
            chain
                .iter()
                .any(|cert| cert == service_cert || cert.is_issued_by(service_cert))
        })
    }
}

/// How a status URI was classified when the window was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityStatus {
    Active,
    Withdrawn,
    Unknown,
}

/// Interval `[start, end)` during which a service held one status
#[derive(Debug, Clone, PartialEq)]
pub struct Validity {
    pub start: DateTime<Utc>,
    /// `None` while the status is still current
    pub end: Option<DateTime<Utc>>,
    pub status: ValidityStatus,
    pub status_uri: String,
    pub qualifiers: Vec<Qualifier>,
}

impl Validity {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && self.end.is_none_or(|end| instant < end)
    }

    pub fn is_active(&self) -> bool {
        self.status == ValidityStatus::Active
    }
}

/// How a qualifier's criteria combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertMode {
    All,
    AtLeastOne,
    None,
}

impl FromStr for AssertMode {
    type Err = TslError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "atLeastOne" => Ok(Self::AtLeastOne),
            "none" => Ok(Self::None),
            other => Err(TslError::Structural(format!(
                "unknown qualifier assert mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AssertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::All => "all",
            Self::AtLeastOne => "atLeastOne",
            Self::None => "none",
        };
        f.write_str(text)
    }
}

/// Qualification element attached to a validity window
#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    /// Qualifier URIs, e.g. `.../SvcInfoExt/QCWithSSCD`
    pub qualifiers: Vec<String>,
    /// Each inner list is one acceptable policy OID combination
    pub policy_set: Vec<Vec<String>>,
    /// Each map is one key usage combination, bit to expected value
    pub key_usage: Vec<BTreeMap<KeyUsageBit, bool>>,
    pub assert: AssertMode,
}

impl Qualifier {
    /// Check the qualifier criteria against certificate properties.
    ///
    /// Every policy group and every key usage map is one condition. A policy
    /// group holds when all its OIDs are present; a key usage map holds when
    /// every listed bit has the expected value.
    pub fn is_satisfied_by(&self, properties: &CertificateProperties) -> bool {
        let policy_conditions = self.policy_set.iter().map(|group| {
            group
                .iter()
                .all(|oid| properties.policies.contains(oid.as_str()))
        });
        let key_usage_conditions = self.key_usage.iter().map(|bits| {
            bits.iter()
                .all(|(bit, expected)| properties.key_usage.contains(bit) == *expected)
        });
        let mut conditions = policy_conditions.chain(key_usage_conditions);

        match self.assert {
            AssertMode::All => conditions.all(|holds| holds),
            AssertMode::AtLeastOne => conditions.any(|holds| holds),
            AssertMode::None => !conditions.any(|holds| holds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn props(bits: &[KeyUsageBit], policies: &[&str]) -> CertificateProperties {
        CertificateProperties {
            key_usage: bits.iter().copied().collect(),
            policies: policies.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn qualifier(assert: AssertMode) -> Qualifier {
        Qualifier {
            qualifiers: vec!["http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCWithSSCD".into()],
            policy_set: vec![vec!["1.2.3".into(), "1.2.4".into()]],
            key_usage: vec![BTreeMap::from([(KeyUsageBit::NonRepudiation, true)])],
            assert,
        }
    }

    #[test]
    fn test_assert_all() {
        let q = qualifier(AssertMode::All);
        assert!(q.is_satisfied_by(&props(&[KeyUsageBit::NonRepudiation], &["1.2.3", "1.2.4"])));
        // policy group is a conjunction
        assert!(!q.is_satisfied_by(&props(&[KeyUsageBit::NonRepudiation], &["1.2.3"])));
        assert!(!q.is_satisfied_by(&props(&[], &["1.2.3", "1.2.4"])));
    }

    #[test]
    fn test_assert_at_least_one() {
        let q = qualifier(AssertMode::AtLeastOne);
        assert!(q.is_satisfied_by(&props(&[KeyUsageBit::NonRepudiation], &[])));
        assert!(q.is_satisfied_by(&props(&[], &["1.2.3", "1.2.4"])));
        assert!(!q.is_satisfied_by(&props(&[KeyUsageBit::DigitalSignature], &["1.2.3"])));
    }

    #[test]
    fn test_assert_none() {
        let q = qualifier(AssertMode::None);
        assert!(q.is_satisfied_by(&props(&[KeyUsageBit::DigitalSignature], &["9.9"])));
        assert!(!q.is_satisfied_by(&props(&[KeyUsageBit::NonRepudiation], &[])));
    }

    #[test]
    fn test_expected_false_bit() {
        let q = Qualifier {
            qualifiers: vec![],
            policy_set: vec![],
            key_usage: vec![BTreeMap::from([(KeyUsageBit::KeyCertSign, false)])],
            assert: AssertMode::All,
        };
        assert!(q.is_satisfied_by(&props(&[KeyUsageBit::DigitalSignature], &[])));
        assert!(!q.is_satisfied_by(&props(&[KeyUsageBit::KeyCertSign], &[])));
    }

    #[test]
    fn test_assert_mode_parsing() {
        assert_eq!("atLeastOne".parse::<AssertMode>().unwrap(), AssertMode::AtLeastOne);
        assert_eq!(AssertMode::None.to_string(), "none");
        assert!(matches!(
            "any".parse::<AssertMode>(),
            Err(TslError::Structural(_))
        ));
    }

    #[test]
    fn test_validity_bounds() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let window = Validity {
            start,
            end: Some(end),
            status: ValidityStatus::Active,
            status_uri: String::new(),
            qualifiers: vec![],
        };

        assert!(window.contains(start));
        assert!(!window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
        assert!(window.contains(end - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_expiry() {
        let next_update = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let list = TrustList {
            url: "https://example.test/tl.xml".into(),
            scheme_type: String::new(),
            operator_name: String::new(),
            territory: "EE".into(),
            sequence_number: 1,
            issue_date: next_update - chrono::Duration::days(180),
            next_update: Some(next_update),
            pointers: vec![],
            pivots: vec![],
            signing_certs: vec![],
            services: vec![],
        };

        assert!(!list.is_expired_at(next_update - chrono::Duration::seconds(1)));
        assert!(list.is_expired_at(next_update));

        let closed = TrustList {
            next_update: None,
            ..list
        };
        assert!(closed.is_expired_at(next_update - chrono::Duration::days(365)));
    }
}
