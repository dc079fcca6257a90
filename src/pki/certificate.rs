use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use openssl::x509::X509;
use thiserror::Error;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// Error type for certificate handling.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("Invalid base64 certificate: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("Unknown key usage bit: {0}")]
    UnknownKeyUsage(String),
}

/// A DER encoded X.509 certificate with cached identity fields.
///
/// The raw bytes are shared, so cloning is cheap and a certificate can be
/// referenced from any number of pointers and services.
#[derive(Clone)]
pub struct Certificate {
    raw: Arc<Vec<u8>>,
    subject: String,
    issuer: String,
    serial_number: String,
}

impl Certificate {
    /// Create a certificate from DER-encoded bytes
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, CertificateError> {
        let der_bytes = der.as_ref();
        let (_, cert) =
            X509Certificate::from_der(der_bytes).map_err(|e| CertificateError::X509(e.into()))?;

        let serial_number = cert.tbs_certificate.serial.to_string();
        let subject = cert.subject().to_string();
        let issuer = cert.issuer().to_string();

        Ok(Self {
            raw: Arc::new(der_bytes.to_vec()),
            subject,
            issuer,
            serial_number,
        })
    }

    /// Create a certificate from the base64 text of an `X509Certificate` element.
    /// Embedded whitespace and line breaks are ignored.
    pub fn from_base64(text: &str) -> Result<Self, CertificateError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD.decode(compact)?;
        Self::from_der(der)
    }

    /// Create a certificate from either PEM or DER input.
    pub fn from_pem_or_der(bytes: &[u8]) -> Result<Self, CertificateError> {
        if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            let x509 = X509::from_pem(bytes)?;
            return Self::from_der(x509.to_der()?);
        }
        Self::from_der(bytes)
    }

    pub fn der(&self) -> &[u8] {
        &self.raw
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Parse the certificate from stored DER bytes
    pub fn parse(&self) -> Result<X509Certificate<'_>, CertificateError> {
        let (_, cert) =
            X509Certificate::from_der(&self.raw).map_err(|e| CertificateError::X509(e.into()))?;
        Ok(cert)
    }

    /// Convert into an OpenSSL certificate for signature primitives.
    pub fn to_openssl(&self) -> Result<X509, CertificateError> {
        Ok(X509::from_der(&self.raw)?)
    }

    /// Returns true if `issuer` names this certificate's issuer and its key
    /// verifies this certificate's signature.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        let (Ok(cert), Ok(candidate)) = (self.parse(), issuer.parse()) else {
            return false;
        };
        cert.issuer() == candidate.subject()
            && cert
                .verify_signature(Some(candidate.public_key()))
                .is_ok()
    }

    /// Extract the key usage bits and certificate policy OIDs.
    pub fn properties(&self) -> Result<CertificateProperties, CertificateError> {
        let cert = self.parse()?;

        let mut key_usage = BTreeSet::new();
        if let Some(ext) = cert.key_usage()? {
            let usage = ext.value;
            let bits = [
                (KeyUsageBit::DigitalSignature, usage.digital_signature()),
                (KeyUsageBit::NonRepudiation, usage.non_repudiation()),
                (KeyUsageBit::KeyEncipherment, usage.key_encipherment()),
                (KeyUsageBit::DataEncipherment, usage.data_encipherment()),
                (KeyUsageBit::KeyAgreement, usage.key_agreement()),
                (KeyUsageBit::KeyCertSign, usage.key_cert_sign()),
                (KeyUsageBit::CrlSign, usage.crl_sign()),
                (KeyUsageBit::EncipherOnly, usage.encipher_only()),
                (KeyUsageBit::DecipherOnly, usage.decipher_only()),
            ];
            key_usage.extend(bits.into_iter().filter(|(_, set)| *set).map(|(bit, _)| bit));
        }

        let mut policies = BTreeSet::new();
        for ext in cert.extensions() {
            if let ParsedExtension::CertificatePolicies(list) = ext.parsed_extension() {
                policies.extend(list.iter().map(|policy| policy.policy_id.to_id_string()));
            }
        }

        Ok(CertificateProperties {
            key_usage,
            policies,
        })
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("serial_number", &self.serial_number)
            .finish()
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)
    }
}

/// Key usage bits as named in the `KeyUsageBit` element of a trusted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyUsageBit {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    CrlSign,
    EncipherOnly,
    DecipherOnly,
}

impl FromStr for KeyUsageBit {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digitalSignature" => Ok(Self::DigitalSignature),
            // X.509 renamed the bit, lists still use both spellings
            "nonRepudiation" | "contentCommitment" => Ok(Self::NonRepudiation),
            "keyEncipherment" => Ok(Self::KeyEncipherment),
            "dataEncipherment" => Ok(Self::DataEncipherment),
            "keyAgreement" => Ok(Self::KeyAgreement),
            "keyCertSign" => Ok(Self::KeyCertSign),
            "crlSign" => Ok(Self::CrlSign),
            "encipherOnly" => Ok(Self::EncipherOnly),
            "decipherOnly" => Ok(Self::DecipherOnly),
            other => Err(CertificateError::UnknownKeyUsage(other.to_string())),
        }
    }
}

/// Certificate facts that trust-list qualifiers are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateProperties {
    pub key_usage: BTreeSet<KeyUsageBit>,
    pub policies: BTreeSet<String>,
}
