//! Typed model of a trusted list document
//!
//! Only the elements the engine consumes are modelled. Unknown elements,
//! including the enveloped `Signature`, are skipped by the deserializer.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::constants::PREFERRED_LANGUAGE;
use super::errors::{TslError, TslResult};
use super::types::{AssertMode, Qualifier};
use crate::pki::{Certificate, KeyUsageBit};

/// `TrustServiceStatusList` root element
#[derive(Debug, Deserialize)]
pub struct TrustStatusListDoc {
    #[serde(rename = "SchemeInformation")]
    pub scheme_information: SchemeInformation,
    #[serde(rename = "TrustServiceProviderList", default)]
    pub provider_list: Option<TrustServiceProviderList>,
}

#[derive(Debug, Deserialize)]
pub struct SchemeInformation {
    #[serde(rename = "TSLSequenceNumber")]
    pub sequence_number: u64,
    #[serde(rename = "TSLType")]
    pub tsl_type: String,
    #[serde(rename = "SchemeOperatorName")]
    pub operator_name: InternationalNames,
    #[serde(rename = "SchemeInformationURI", default)]
    pub information_uri: Option<UriList>,
    #[serde(rename = "SchemeTerritory")]
    pub territory: String,
    #[serde(rename = "PointersToOtherTSL", default)]
    pub pointers: Option<PointersToOtherTsl>,
    #[serde(rename = "ListIssueDateTime")]
    pub issue_date_time: String,
    #[serde(rename = "NextUpdate", default)]
    pub next_update: Option<NextUpdate>,
}

/// Language tagged text, used for names and URIs
#[derive(Debug, Clone, Deserialize)]
pub struct MultiLangText {
    #[serde(rename = "@lang", alias = "@xml:lang", default)]
    pub lang: String,
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InternationalNames {
    #[serde(rename = "Name", default)]
    pub names: Vec<MultiLangText>,
}

impl InternationalNames {
    /// English variant, falling back to the first name present.
    pub fn preferred(&self) -> String {
        self.names
            .iter()
            .find(|name| name.lang.eq_ignore_ascii_case(PREFERRED_LANGUAGE))
            .or_else(|| self.names.first())
            .map(|name| name.value.trim().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UriList {
    #[serde(rename = "URI", default)]
    pub uris: Vec<MultiLangText>,
}

#[derive(Debug, Deserialize)]
pub struct NextUpdate {
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PointersToOtherTsl {
    #[serde(rename = "OtherTSLPointer", default)]
    pub pointers: Vec<OtherTslPointer>,
}

#[derive(Debug, Deserialize)]
pub struct OtherTslPointer {
    #[serde(rename = "ServiceDigitalIdentities", default)]
    pub identities: Option<ServiceDigitalIdentities>,
    #[serde(rename = "TSLLocation")]
    pub location: String,
    #[serde(rename = "AdditionalInformation", default)]
    pub additional_information: Option<AdditionalInformation>,
}

impl OtherTslPointer {
    pub fn tsl_type(&self) -> Option<&str> {
        self.other_information()
            .find_map(|info| info.tsl_type.as_deref())
            .map(str::trim)
    }

    pub fn territory(&self) -> Option<&str> {
        self.other_information()
            .find_map(|info| info.territory.as_deref())
            .map(str::trim)
    }

    pub fn certificates(&self) -> TslResult<Vec<Certificate>> {
        let Some(identities) = &self.identities else {
            return Ok(Vec::new());
        };
        let mut certs = Vec::new();
        for identity in &identities.identities {
            certs.extend(identity.certificates()?);
        }
        Ok(certs)
    }

    fn other_information(&self) -> impl Iterator<Item = &OtherInformation> {
        self.additional_information
            .iter()
            .flat_map(|info| info.entries.iter())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceDigitalIdentities {
    #[serde(rename = "ServiceDigitalIdentity", default)]
    pub identities: Vec<DigitalIdentity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DigitalIdentity {
    #[serde(rename = "DigitalId", default)]
    pub ids: Vec<DigitalId>,
}

impl DigitalIdentity {
    pub fn certificates(&self) -> TslResult<Vec<Certificate>> {
        self.ids
            .iter()
            .filter_map(|id| id.x509_certificate.as_deref())
            .map(|text| Certificate::from_base64(text).map_err(TslError::from))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DigitalId {
    #[serde(rename = "X509Certificate", default)]
    pub x509_certificate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdditionalInformation {
    #[serde(rename = "OtherInformation", default)]
    pub entries: Vec<OtherInformation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtherInformation {
    #[serde(rename = "TSLType", default)]
    pub tsl_type: Option<String>,
    #[serde(rename = "SchemeTerritory", default)]
    pub territory: Option<String>,
    #[serde(rename = "MimeType", default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrustServiceProviderList {
    #[serde(rename = "TrustServiceProvider", default)]
    pub providers: Vec<TrustServiceProvider>,
}

#[derive(Debug, Deserialize)]
pub struct TrustServiceProvider {
    #[serde(rename = "TSPServices")]
    pub services: TspServices,
}

#[derive(Debug, Default, Deserialize)]
pub struct TspServices {
    #[serde(rename = "TSPService", default)]
    pub services: Vec<TspService>,
}

#[derive(Debug, Deserialize)]
pub struct TspService {
    #[serde(rename = "ServiceInformation")]
    pub information: ServiceInformation,
    #[serde(rename = "ServiceHistory", default)]
    pub history: Option<ServiceHistoryDoc>,
}

/// Current status record of a service
#[derive(Debug, Deserialize)]
pub struct ServiceInformation {
    #[serde(rename = "ServiceTypeIdentifier")]
    pub service_type: String,
    #[serde(rename = "ServiceName", default)]
    pub name: InternationalNames,
    #[serde(rename = "ServiceDigitalIdentity", default)]
    pub digital_identity: DigitalIdentity,
    #[serde(rename = "ServiceStatus")]
    pub status: String,
    #[serde(rename = "StatusStartingTime")]
    pub status_starting_time: String,
    #[serde(rename = "ServiceInformationExtensions", default)]
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceHistoryDoc {
    #[serde(rename = "ServiceHistoryInstance", default)]
    pub instances: Vec<ServiceHistoryInstance>,
}

/// Historical status record of a service
#[derive(Debug, Deserialize)]
pub struct ServiceHistoryInstance {
    #[serde(rename = "ServiceTypeIdentifier")]
    pub service_type: String,
    #[serde(rename = "ServiceStatus")]
    pub status: String,
    #[serde(rename = "StatusStartingTime")]
    pub status_starting_time: String,
    #[serde(rename = "ServiceInformationExtensions", default)]
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Extensions {
    #[serde(rename = "Extension", default)]
    pub extensions: Vec<Extension>,
}

impl Extensions {
    /// First `AdditionalServiceInformation` URI, if any
    pub fn additional_information(&self) -> Option<String> {
        self.extensions
            .iter()
            .filter_map(|ext| ext.additional.as_ref())
            .map(|info| info.uri.value.trim().to_string())
            .next()
    }

    /// Convert qualification elements. Any element that cannot be
    /// interpreted is a structural error.
    pub fn qualifiers(&self) -> TslResult<Vec<Qualifier>> {
        self.extensions
            .iter()
            .filter_map(|ext| ext.qualifications.as_ref())
            .flat_map(|q| q.elements.iter())
            .map(QualificationElement::to_qualifier)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct Extension {
    #[serde(rename = "AdditionalServiceInformation", default)]
    pub additional: Option<AdditionalServiceInformation>,
    #[serde(rename = "Qualifications", default)]
    pub qualifications: Option<Qualifications>,
}

#[derive(Debug, Deserialize)]
pub struct AdditionalServiceInformation {
    #[serde(rename = "URI")]
    pub uri: MultiLangText,
}

#[derive(Debug, Default, Deserialize)]
pub struct Qualifications {
    #[serde(rename = "QualificationElement", default)]
    pub elements: Vec<QualificationElement>,
}

#[derive(Debug, Deserialize)]
pub struct QualificationElement {
    #[serde(rename = "Qualifiers", default)]
    pub qualifiers: QualifierUris,
    #[serde(rename = "CriteriaList")]
    pub criteria: CriteriaList,
}

impl QualificationElement {
    fn to_qualifier(&self) -> TslResult<Qualifier> {
        let assert = self.criteria.assert.trim().parse::<AssertMode>()?;

        let mut key_usage = Vec::with_capacity(self.criteria.key_usage.len());
        for usage in &self.criteria.key_usage {
            let mut bits = BTreeMap::new();
            for bit in &usage.bits {
                let name = bit.name.trim().parse::<KeyUsageBit>().map_err(|e| {
                    TslError::Structural(format!("unsupported qualification criteria: {e}"))
                })?;
                bits.insert(name, bit.value);
            }
            key_usage.push(bits);
        }

        let policy_set = self
            .criteria
            .policy_sets
            .iter()
            .map(|set| {
                set.identifiers
                    .iter()
                    .map(|policy| normalize_oid(&policy.identifier.value))
                    .collect()
            })
            .collect();

        Ok(Qualifier {
            qualifiers: self
                .qualifiers
                .qualifiers
                .iter()
                .map(|q| q.uri.trim().to_string())
                .collect(),
            policy_set,
            key_usage,
            assert,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QualifierUris {
    #[serde(rename = "Qualifier", default)]
    pub qualifiers: Vec<QualifierUri>,
}

#[derive(Debug, Deserialize)]
pub struct QualifierUri {
    #[serde(rename = "@uri")]
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct CriteriaList {
    #[serde(rename = "@assert")]
    pub assert: String,
    #[serde(rename = "KeyUsage", default)]
    pub key_usage: Vec<KeyUsageCriteria>,
    #[serde(rename = "PolicySet", default)]
    pub policy_sets: Vec<PolicySet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeyUsageCriteria {
    #[serde(rename = "KeyUsageBit", default)]
    pub bits: Vec<KeyUsageBitDoc>,
}

#[derive(Debug, Deserialize)]
pub struct KeyUsageBitDoc {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "$text")]
    pub value: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicySet {
    #[serde(rename = "PolicyIdentifier", default)]
    pub identifiers: Vec<PolicyIdentifier>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyIdentifier {
    #[serde(rename = "Identifier")]
    pub identifier: MultiLangText,
}

fn normalize_oid(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix("urn:oid:")
        .unwrap_or(value)
        .to_string()
}

/// Deserialize a trusted list document from raw bytes
pub fn parse_document(bytes: &[u8]) -> TslResult<TrustStatusListDoc> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let xml = std::str::from_utf8(bytes)
        .map_err(|e| TslError::Structural(format!("document is not UTF-8: {e}")))?;
    quick_xml::de::from_str(xml).map_err(|e| TslError::Structural(e.to_string()))
}

/// Parse an `xsd:dateTime`. Values without a zone are taken as UTC.
pub fn parse_xsd_datetime(value: &str) -> TslResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| TslError::Structural(format!("invalid dateTime '{value}': {e}")))
}
