//! Enveloped XML signature signer for trusted lists
//!
//! Produces the form accepted by [`XmlSignatureValidator`](super::XmlSignatureValidator):
//! the reference digest covers the document without its signature and the
//! `SignedInfo` element is signed exactly as emitted.

use base64::Engine;
use openssl::bn::BigNumRef;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::hash;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use quick_xml::se::to_string;
use tracing::{debug, info};

use super::constants::*;
use super::types::*;
use super::utils::{insert_before_root_end, remove_signature};
use crate::pki::Certificate;

/// Signs trusted list documents with an enveloped signature
pub struct XmlSignatureSigner {
    key: PKey<Private>,
    certificate: Certificate,
    algorithm: SignatureAlgorithm,
    include_key_info: bool,
}

impl XmlSignatureSigner {
    /// Create a signer; the signature algorithm follows the key type with
    /// SHA-256 digests.
    pub fn new(key: PKey<Private>, certificate: Certificate) -> XmlSignatureResult<Self> {
        let algorithm = SignatureAlgorithm::for_key(key.id(), DigestAlgorithm::Sha256)?;
        Ok(Self {
            key,
            certificate,
            algorithm,
            include_key_info: true,
        })
    }

    /// Create a signer from PEM encoded private key and certificate
    pub fn from_pem(private_key_pem: &[u8], cert_pem: &[u8]) -> XmlSignatureResult<Self> {
        let key = PKey::private_key_from_pem(private_key_pem)?;
        let certificate = Certificate::from_pem_or_der(cert_pem)?;
        Self::new(key, certificate)
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.algorithm.digest = digest;
        self
    }

    /// Leave the signer certificate out of `KeyInfo`
    pub fn without_key_info(mut self) -> Self {
        self.include_key_info = false;
        self
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Sign `xml`, replacing any enveloped signature it already carries
    pub fn sign(&self, xml: &str) -> XmlSignatureResult<String> {
        let unsigned = remove_signature(xml)?;
        let digest = hash(self.algorithm.digest.message_digest(), unsigned.as_bytes())?;

        let signed_info = SignedInfo {
            canonicalization_method: CanonicalizationMethod {
                algorithm: EXCLUSIVE_C14N_ALGORITHM.to_string(),
            },
            signature_method: SignatureMethod {
                algorithm: self.algorithm.uri().to_string(),
            },
            reference: Reference {
                uri: String::new(),
                transforms: Transforms {
                    transform: vec![Transform {
                        algorithm: XMLDSIG_ENVELOPED_SIGNATURE.to_string(),
                    }],
                },
                digest_method: DigestMethod {
                    algorithm: self.algorithm.digest.uri().to_string(),
                },
                digest_value: base64::engine::general_purpose::STANDARD.encode(digest),
            },
        };
        let signed_info_xml = to_string(&signed_info)
            .map_err(|e| XmlSignatureError::Xml(format!("Failed to serialize SignedInfo: {e}")))?;

        let signature_value = self.sign_bytes(signed_info_xml.as_bytes())?;

        let key_info_xml = if self.include_key_info {
            to_string(&KeyInfo {
                x509_data: X509Data {
                    x509_certificate: base64::engine::general_purpose::STANDARD
                        .encode(self.certificate.der()),
                },
            })
            .map_err(|e| XmlSignatureError::Xml(format!("Failed to serialize KeyInfo: {e}")))?
        } else {
            String::new()
        };

        let signature_xml = format!(
            r#"<{SIGNATURE_ELEMENT} xmlns="{XMLDSIG_NAMESPACE}">{signed_info_xml}<{SIGNATURE_VALUE_ELEMENT}>{}</{SIGNATURE_VALUE_ELEMENT}>{key_info_xml}</{SIGNATURE_ELEMENT}>"#,
            base64::engine::general_purpose::STANDARD.encode(signature_value)
        );

        debug!(
            "Created enveloped signature - algorithm: {}, signer: {}",
            self.algorithm.uri(),
            self.certificate
        );
        let signed = insert_before_root_end(&unsigned, &signature_xml)?;
        info!("Document signed by {}", self.certificate);
        Ok(signed)
    }

    fn sign_bytes(&self, data: &[u8]) -> XmlSignatureResult<Vec<u8>> {
        let mut signer = Signer::new(self.algorithm.digest.message_digest(), &self.key)?;
        signer.update(data)?;
        let signature = signer.sign_to_vec()?;

        match self.algorithm.family {
            KeyFamily::Rsa => Ok(signature),
            KeyFamily::Ecdsa => {
                let field_len = self.ec_field_len()?;
                let sig = EcdsaSig::from_der(&signature)?;
                let mut raw = pad(sig.r(), field_len)?;
                raw.extend(pad(sig.s(), field_len)?);
                Ok(raw)
            }
        }
    }

    fn ec_field_len(&self) -> XmlSignatureResult<usize> {
        let ec_key = self.key.ec_key()?;
        let bits = ec_key.group().degree() as usize;
        Ok(bits.div_ceil(8))
    }
}

fn pad(value: &BigNumRef, len: usize) -> XmlSignatureResult<Vec<u8>> {
    Ok(value.to_vec_padded(len as i32)?)
}
