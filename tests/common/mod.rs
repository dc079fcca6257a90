#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509Builder, X509Extension, X509NameBuilder};
use ring::digest::{SHA256, digest};
use tsl_trust::adapters::xml_signature::{XmlSignatureSigner, XmlSignatureValidator};
use tsl_trust::pki::Certificate;
use tsl_trust::tsl::cache::digest_url;
use tsl_trust::tsl::constants::{GENERIC_TYPE, LIST_OF_THE_LISTS_TYPE, STATUS_GRANTED};
use tsl_trust::tsl::{
    DigestCache, FetchRequest, FetchResponse, Fetcher, ParserOptions, TslError, TslParser,
    TslResult,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const LOTL_URL: &str = "https://lotl.example.test/eu-lotl.xml";
pub const CA_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/QC";

pub fn tl_url(territory: &str) -> String {
    format!("https://tl.example.test/{territory}.xml")
}

/// A key pair with its certificate
pub struct TestIdentity {
    pub key: PKey<Private>,
    pub x509: X509,
    pub cert: Certificate,
}

impl TestIdentity {
    /// Self-signed CA certificate
    pub fn root(cn: &str) -> Self {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let x509 = build_cert(cn, &key, None, true, true, &[]);
        let cert = Certificate::from_der(x509.to_der().unwrap()).unwrap();
        Self { key, x509, cert }
    }

    /// End entity certificate issued by this identity
    pub fn issue_leaf(&self, cn: &str, non_repudiation: bool, policies: &[&str]) -> Certificate {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let x509 = build_cert(cn, &key, Some(self), false, non_repudiation, policies);
        Certificate::from_der(x509.to_der().unwrap()).unwrap()
    }

    pub fn signer(&self) -> XmlSignatureSigner {
        XmlSignatureSigner::new(self.key.clone(), self.cert.clone()).unwrap()
    }

    /// Sign a list document with an enveloped signature
    pub fn sign(&self, xml: &str) -> Vec<u8> {
        self.signer().sign(xml).unwrap().into_bytes()
    }
}

fn build_cert(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<&TestIdentity>,
    ca: bool,
    non_repudiation: bool,
    policies: &[&str],
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(rand_serial()).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some(issuer) => builder
            .set_issuer_name(issuer.x509.subject_name())
            .unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();

    let mut usage = KeyUsage::new();
    usage.critical().digital_signature();
    if ca {
        usage.key_cert_sign().crl_sign();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    if non_repudiation {
        usage.non_repudiation();
    }
    builder.append_extension(usage.build().unwrap()).unwrap();

    if !policies.is_empty() {
        builder
            .append_extension(certificate_policies(policies))
            .unwrap();
    }

    let signing_key = issuer.map(|issuer| &issuer.key).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn der_tlv(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if body.len() < 0x80 {
        out.push(body.len() as u8);
    } else {
        let len = body.len().to_be_bytes();
        let skip = len.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (len.len() - skip) as u8);
        out.extend_from_slice(&len[skip..]);
    }
    out.extend_from_slice(body);
    out
}

fn oid_der(oid: &str) -> Vec<u8> {
    let arcs: Vec<u64> = oid.split('.').map(|arc| arc.parse().unwrap()).collect();
    let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for arc in &arcs[2..] {
        let mut encoded = vec![(arc & 0x7f) as u8];
        let mut rest = arc >> 7;
        while rest > 0 {
            encoded.push((rest & 0x7f) as u8 | 0x80);
            rest >>= 7;
        }
        encoded.reverse();
        body.extend(encoded);
    }
    der_tlv(0x06, &body)
}

/// certificatePolicies with one PolicyInformation per OID, built from DER
/// since the textual form needs an OpenSSL config database
fn certificate_policies(oids: &[&str]) -> X509Extension {
    let infos: Vec<u8> = oids
        .iter()
        .flat_map(|oid| der_tlv(0x30, &oid_der(oid)))
        .collect();
    let contents = Asn1OctetString::new_from_bytes(&der_tlv(0x30, &infos)).unwrap();
    let oid = Asn1Object::from_str("2.5.29.32").unwrap();
    X509Extension::new_from_der(&oid, false, &contents).unwrap()
}

fn rand_serial() -> u32 {
    let id = uuid::Uuid::new_v4();
    u32::from_be_bytes(id.as_bytes()[..4].try_into().unwrap()) >> 1
}

fn x509_base64(cert: &Certificate) -> String {
    base64::engine::general_purpose::STANDARD.encode(cert.der())
}

/// Pointer entry of a `PointersToOtherTSL` block
pub struct PointerSpec {
    pub tsl_type: &'static str,
    pub territory: String,
    pub location: String,
    pub certs: Vec<Certificate>,
}

/// One dated status record
pub struct StatusSpec {
    pub status: String,
    pub start: String,
    /// Raw `QualificationElement` fragments
    pub qualifications: Vec<String>,
}

impl StatusSpec {
    pub fn new(status: &str, start: &str) -> Self {
        Self {
            status: status.to_string(),
            start: start.to_string(),
            qualifications: Vec::new(),
        }
    }

    pub fn with_qualification(mut self, fragment: String) -> Self {
        self.qualifications.push(fragment);
        self
    }

    fn extensions_xml(&self) -> String {
        if self.qualifications.is_empty() {
            return String::new();
        }
        format!(
            "<ServiceInformationExtensions><Extension Critical=\"true\"><Qualifications>{}</Qualifications></Extension></ServiceInformationExtensions>",
            self.qualifications.concat()
        )
    }
}

pub struct ServiceSpec {
    pub name: String,
    pub service_type: String,
    pub cert: Certificate,
    pub current: StatusSpec,
    pub history: Vec<StatusSpec>,
}

impl ServiceSpec {
    pub fn granted(name: &str, cert: &Certificate, start: &str) -> Self {
        Self {
            name: name.to_string(),
            service_type: CA_QC.to_string(),
            cert: cert.clone(),
            current: StatusSpec::new(STATUS_GRANTED, start),
            history: Vec::new(),
        }
    }

    pub fn with_current(mut self, current: StatusSpec) -> Self {
        self.current = current;
        self
    }

    pub fn with_history(mut self, record: StatusSpec) -> Self {
        self.history.push(record);
        self
    }

    fn to_xml(&self) -> String {
        let history = if self.history.is_empty() {
            String::new()
        } else {
            let instances: String = self
                .history
                .iter()
                .map(|record| {
                    format!(
                        "<ServiceHistoryInstance><ServiceTypeIdentifier>{}</ServiceTypeIdentifier><ServiceName><Name xml:lang=\"en\">{}</Name></ServiceName><ServiceStatus>{}</ServiceStatus><StatusStartingTime>{}</StatusStartingTime>{}</ServiceHistoryInstance>",
                        self.service_type,
                        self.name,
                        record.status,
                        record.start,
                        record.extensions_xml()
                    )
                })
                .collect();
            format!("<ServiceHistory>{instances}</ServiceHistory>")
        };

        format!(
            r#"<TSPService><ServiceInformation><ServiceTypeIdentifier>{}</ServiceTypeIdentifier><ServiceName><Name xml:lang="en">{}</Name></ServiceName><ServiceDigitalIdentity><DigitalId><X509Certificate>{}</X509Certificate></DigitalId></ServiceDigitalIdentity><ServiceStatus>{}</ServiceStatus><StatusStartingTime>{}</StatusStartingTime>{}</ServiceInformation>{history}</TSPService>"#,
            self.service_type,
            self.name,
            x509_base64(&self.cert),
            self.current.status,
            self.current.start,
            self.current.extensions_xml()
        )
    }
}

/// `QualificationElement` with one key usage map and the given policy groups
pub fn qualification(assert: &str, key_usage: &[(&str, bool)], policy_sets: &[&[&str]]) -> String {
    let key_usage_xml = if key_usage.is_empty() {
        String::new()
    } else {
        let bits: String = key_usage
            .iter()
            .map(|(name, value)| format!("<KeyUsageBit name=\"{name}\">{value}</KeyUsageBit>"))
            .collect();
        format!("<KeyUsage>{bits}</KeyUsage>")
    };
    let policy_xml: String = policy_sets
        .iter()
        .map(|set| {
            let ids: String = set
                .iter()
                .map(|oid| {
                    format!("<PolicyIdentifier><Identifier Qualifier=\"OIDAsURN\">urn:oid:{oid}</Identifier></PolicyIdentifier>")
                })
                .collect();
            format!("<PolicySet>{ids}</PolicySet>")
        })
        .collect();

    format!(
        r#"<QualificationElement><Qualifiers><Qualifier uri="http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCWithSSCD"/></Qualifiers><CriteriaList assert="{assert}">{key_usage_xml}{policy_xml}</CriteriaList></QualificationElement>"#
    )
}

/// Builder for trusted list documents
pub struct ListSpec {
    pub tsl_type: &'static str,
    pub territory: String,
    pub sequence_number: u64,
    pub issue_date: String,
    pub next_update: Option<String>,
    pub pointers: Vec<PointerSpec>,
    pub pivots: Vec<String>,
    pub services: Vec<ServiceSpec>,
}

impl ListSpec {
    pub fn lotl(sequence_number: u64) -> Self {
        Self::new(LIST_OF_THE_LISTS_TYPE, "EU", sequence_number)
    }

    pub fn territory(code: &str, sequence_number: u64) -> Self {
        Self::new(GENERIC_TYPE, code, sequence_number)
    }

    fn new(tsl_type: &'static str, territory: &str, sequence_number: u64) -> Self {
        Self {
            tsl_type,
            territory: territory.to_string(),
            sequence_number,
            issue_date: "2024-01-01T00:00:00Z".to_string(),
            next_update: Some("2099-01-01T00:00:00Z".to_string()),
            pointers: Vec::new(),
            pivots: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_next_update(mut self, next_update: Option<&str>) -> Self {
        self.next_update = next_update.map(str::to_string);
        self
    }

    /// Pointer to a territory list signed by `certs`
    pub fn with_territory_pointer(
        mut self,
        territory: &str,
        location: &str,
        certs: &[&Certificate],
    ) -> Self {
        self.pointers.push(PointerSpec {
            tsl_type: GENERIC_TYPE,
            territory: territory.to_string(),
            location: location.to_string(),
            certs: certs.iter().map(|c| (*c).clone()).collect(),
        });
        self
    }

    /// Self pointer declaring the certificates that sign this list
    pub fn with_signing_certs(mut self, location: &str, certs: &[&Certificate]) -> Self {
        self.pointers.push(PointerSpec {
            tsl_type: self.tsl_type,
            territory: self.territory.clone(),
            location: location.to_string(),
            certs: certs.iter().map(|c| (*c).clone()).collect(),
        });
        self
    }

    pub fn with_pivot(mut self, location: &str) -> Self {
        self.pivots.push(location.to_string());
        self
    }

    pub fn with_service(mut self, service: ServiceSpec) -> Self {
        self.services.push(service);
        self
    }

    pub fn to_xml(&self) -> String {
        let uris: String = std::iter::once(
            "https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=CELEX:52019XC0816(01)".to_string(),
        )
        .chain(self.pivots.iter().cloned())
        .map(|uri| format!("<URI xml:lang=\"en\">{uri}</URI>"))
        .collect();

        let pointers: String = self
            .pointers
            .iter()
            .map(|pointer| {
                let identities: String = pointer
                    .certs
                    .iter()
                    .map(|cert| {
                        format!(
                            "<ServiceDigitalIdentity><DigitalId><X509Certificate>{}</X509Certificate></DigitalId></ServiceDigitalIdentity>",
                            x509_base64(cert)
                        )
                    })
                    .collect();
                format!(
                    "<OtherTSLPointer><ServiceDigitalIdentities>{identities}</ServiceDigitalIdentities><TSLLocation>{}</TSLLocation><AdditionalInformation><OtherInformation><TSLType>{}</TSLType></OtherInformation><OtherInformation><SchemeTerritory>{}</SchemeTerritory></OtherInformation><OtherInformation><MimeType>application/vnd.etsi.tsl+xml</MimeType></OtherInformation></AdditionalInformation></OtherTSLPointer>",
                    pointer.location, pointer.tsl_type, pointer.territory
                )
            })
            .collect();

        let next_update = match &self.next_update {
            Some(at) => format!("<NextUpdate><dateTime>{at}</dateTime></NextUpdate>"),
            None => "<NextUpdate/>".to_string(),
        };

        let providers = if self.services.is_empty() {
            String::new()
        } else {
            let services: String = self.services.iter().map(ServiceSpec::to_xml).collect();
            format!(
                "<TrustServiceProviderList><TrustServiceProvider><TSPInformation><TSPName><Name xml:lang=\"en\">Test Provider</Name></TSPName></TSPInformation><TSPServices>{services}</TSPServices></TrustServiceProvider></TrustServiceProviderList>"
            )
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TrustServiceStatusList xmlns="http://uri.etsi.org/02231/v2#" TSLTag="http://uri.etsi.org/19612/TSLTag"><SchemeInformation><TSLVersionIdentifier>5</TSLVersionIdentifier><TSLSequenceNumber>{}</TSLSequenceNumber><TSLType>{}</TSLType><SchemeOperatorName><Name xml:lang="en">{} scheme operator</Name></SchemeOperatorName><SchemeInformationURI>{uris}</SchemeInformationURI><SchemeTerritory>{}</SchemeTerritory><PointersToOtherTSL>{pointers}</PointersToOtherTSL><ListIssueDateTime>{}</ListIssueDateTime>{next_update}</SchemeInformation>{providers}</TrustServiceStatusList>
"#,
            self.sequence_number,
            self.tsl_type,
            self.territory,
            self.territory,
            self.issue_date,
        )
    }

    pub fn signed_by(&self, identity: &TestIdentity) -> Vec<u8> {
        identity.sign(&self.to_xml())
    }
}

struct Published {
    body: Vec<u8>,
    etag: String,
}

/// In-memory `Fetcher` serving published documents with ETags
#[derive(Default)]
pub struct MemoryFetcher {
    documents: Mutex<HashMap<String, Published>>,
    failing: Mutex<HashSet<String>>,
    downloads: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` at `url` with an ETag derived from its content
    pub fn publish(&self, url: &str, body: Vec<u8>) {
        let etag = format!("\"{}\"", hex::encode(&digest(&SHA256, &body).as_ref()[..8]));
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), Published { body, etag });
    }

    /// Serve `body` at `url` together with its hex SHA-256 digest
    pub fn publish_with_digest(&self, url: &str, body: Vec<u8>) {
        let hex_digest = hex::encode(digest(&SHA256, &body));
        self.publish(&digest_url(url), hex_digest.into_bytes());
        self.publish(url, body);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn recover(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    /// Number of full bodies served for `url`
    pub fn downloads(&self, url: &str) -> usize {
        self.downloads.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: &FetchRequest) -> TslResult<FetchResponse> {
        if self.failing.lock().unwrap().contains(&request.url) {
            return Err(TslError::Network {
                url: request.url.clone(),
                reason: "connection refused".into(),
            });
        }

        let documents = self.documents.lock().unwrap();
        let Some(published) = documents.get(&request.url) else {
            return Err(TslError::Network {
                url: request.url.clone(),
                reason: "HTTP error 404 Not Found".into(),
            });
        };

        if request.etag.as_deref() == Some(published.etag.as_str()) {
            return Ok(FetchResponse::NotModified);
        }

        *self
            .downloads
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_default() += 1;
        Ok(FetchResponse::Content {
            body: published.body.clone(),
            etag: Some(published.etag.clone()),
        })
    }
}

/// Parser over `fetcher` with real signature validation
pub fn parser(
    dir: &tempfile::TempDir,
    fetcher: Arc<MemoryFetcher>,
    options: ParserOptions,
) -> TslParser {
    let cache = DigestCache::new(dir.path(), fetcher);
    TslParser::new(cache, Arc::new(XmlSignatureValidator::new())).with_options(options)
}
