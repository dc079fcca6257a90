//! Data structures and types for XML signature processing

use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::Id;
use serde::Serialize;
use thiserror::Error;

use super::constants::*;
use crate::pki::CertificateError;

/// Errors raised while signing or verifying an enveloped signature
#[derive(Error, Debug)]
pub enum XmlSignatureError {
    #[error("XML processing failed: {0}")]
    Xml(String),

    #[error("Missing signature element: {0}")]
    MissingElement(&'static str),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported key type for signing")]
    UnsupportedKey,

    #[error("Reference digest does not match the signed content")]
    DigestMismatch,

    #[error("Signature value does not verify against any expected certificate")]
    InvalidSignature,

    #[error("Signing certificate is not among the expected certificates")]
    UntrustedSigner,

    #[error("No certificates available to verify the signature")]
    NoExpectedCertificates,

    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),
}

pub type XmlSignatureResult<T> = Result<T, XmlSignatureError>;

/// Generic XML element with algorithm attribute
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmElement {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

pub type CanonicalizationMethod = AlgorithmElement;
pub type SignatureMethod = AlgorithmElement;
pub type DigestMethod = AlgorithmElement;
pub type Transform = AlgorithmElement;

#[derive(Debug, Clone, Serialize)]
pub struct Transforms {
    #[serde(rename = "Transform")]
    pub transform: Vec<Transform>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,
    #[serde(rename = "Transforms")]
    pub transforms: Transforms,
    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "CanonicalizationMethod")]
    pub canonicalization_method: CanonicalizationMethod,
    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,
    #[serde(rename = "Reference")]
    pub reference: Reference,
}

#[derive(Debug, Serialize)]
pub struct X509Data {
    #[serde(rename = "X509Certificate")]
    pub x509_certificate: String,
}

#[derive(Debug, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "X509Data")]
    pub x509_data: X509Data,
}

/// Digest algorithms accepted in `DigestMethod`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_uri(uri: &str) -> XmlSignatureResult<Self> {
        match uri {
            SHA256_DIGEST_ALGORITHM => Ok(Self::Sha256),
            SHA384_DIGEST_ALGORITHM => Ok(Self::Sha384),
            SHA512_DIGEST_ALGORITHM => Ok(Self::Sha512),
            other => Err(XmlSignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::Sha256 => SHA256_DIGEST_ALGORITHM,
            Self::Sha384 => SHA384_DIGEST_ALGORITHM,
            Self::Sha512 => SHA512_DIGEST_ALGORITHM,
        }
    }

    pub fn message_digest(&self) -> MessageDigest {
        match self {
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// Key family of a signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ecdsa,
}

/// Signature algorithms accepted in `SignatureMethod`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    pub family: KeyFamily,
    pub digest: DigestAlgorithm,
}

impl SignatureAlgorithm {
    pub fn from_uri(uri: &str) -> XmlSignatureResult<Self> {
        let (family, digest) = match uri {
            RSA_SHA256_ALGORITHM => (KeyFamily::Rsa, DigestAlgorithm::Sha256),
            RSA_SHA384_ALGORITHM => (KeyFamily::Rsa, DigestAlgorithm::Sha384),
            RSA_SHA512_ALGORITHM => (KeyFamily::Rsa, DigestAlgorithm::Sha512),
            ECDSA_SHA256_ALGORITHM => (KeyFamily::Ecdsa, DigestAlgorithm::Sha256),
            ECDSA_SHA384_ALGORITHM => (KeyFamily::Ecdsa, DigestAlgorithm::Sha384),
            ECDSA_SHA512_ALGORITHM => (KeyFamily::Ecdsa, DigestAlgorithm::Sha512),
            other => return Err(XmlSignatureError::UnsupportedAlgorithm(other.to_string())),
        };
        Ok(Self { family, digest })
    }

    /// Algorithm matching a signing key
    pub fn for_key(id: Id, digest: DigestAlgorithm) -> XmlSignatureResult<Self> {
        let family = match id {
            Id::RSA => KeyFamily::Rsa,
            Id::EC => KeyFamily::Ecdsa,
            _ => return Err(XmlSignatureError::UnsupportedKey),
        };
        Ok(Self { family, digest })
    }

    pub fn uri(&self) -> &'static str {
        match (self.family, self.digest) {
            (KeyFamily::Rsa, DigestAlgorithm::Sha256) => RSA_SHA256_ALGORITHM,
            (KeyFamily::Rsa, DigestAlgorithm::Sha384) => RSA_SHA384_ALGORITHM,
            (KeyFamily::Rsa, DigestAlgorithm::Sha512) => RSA_SHA512_ALGORITHM,
            (KeyFamily::Ecdsa, DigestAlgorithm::Sha256) => ECDSA_SHA256_ALGORITHM,
            (KeyFamily::Ecdsa, DigestAlgorithm::Sha384) => ECDSA_SHA384_ALGORITHM,
            (KeyFamily::Ecdsa, DigestAlgorithm::Sha512) => ECDSA_SHA512_ALGORITHM,
        }
    }
}

/// Signature components extracted from a signed document
#[derive(Debug)]
pub struct SignatureComponents {
    /// `SignedInfo` exactly as published
    pub signed_info: String,
    pub signature_algorithm: SignatureAlgorithm,
    pub digest_algorithm: DigestAlgorithm,
    pub digest_value: Vec<u8>,
    pub signature_value: Vec<u8>,
    /// DER certificate from `KeyInfo`, if present
    pub certificate: Option<Vec<u8>>,
}
