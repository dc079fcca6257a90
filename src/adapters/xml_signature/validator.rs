//! XML signature validator for signed trusted lists

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::hash;
use openssl::sign::Verifier;
use tracing::{debug, warn};

use super::constants::*;
use super::types::*;
use super::utils::{decode_base64_text, find_element, find_elements, find_enveloped_signature};
use crate::pki::Certificate;
use crate::tsl::{SignatureVerifier, TslError, TslResult};

/// Verifies enveloped XML-DSig signatures against expected certificates
#[derive(Debug, Default, Clone)]
pub struct XmlSignatureValidator;

impl XmlSignatureValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the enveloped signature of `xml` and return the certificate
    /// that produced it.
    pub fn validate(&self, xml: &str, expected: &[Certificate]) -> XmlSignatureResult<Certificate> {
        if expected.is_empty() {
            return Err(XmlSignatureError::NoExpectedCertificates);
        }

        let signature = find_enveloped_signature(xml)?
            .ok_or(XmlSignatureError::MissingElement(SIGNATURE_ELEMENT))?;
        let components = self.extract_signature_components(signature.outer(xml))?;

        // enveloped-signature transform
        let unsigned = format!("{}{}", &xml[..signature.start], &xml[signature.end..]);
        self.verify_digest_value(&unsigned, &components)?;

        let candidates = match &components.certificate {
            Some(der) => {
                let signer = Certificate::from_der(der.clone())?;
                if !expected.contains(&signer) {
                    warn!("Signer {signer} is not among the expected certificates");
                    return Err(XmlSignatureError::UntrustedSigner);
                }
                vec![signer]
            }
            None => expected.to_vec(),
        };

        for candidate in candidates {
            if self.verify_signed_info(&components, &candidate)? {
                debug!(
                    "Signature verified - algorithm: {}, signer: {candidate}",
                    components.signature_algorithm.uri()
                );
                return Ok(candidate);
            }
        }

        Err(XmlSignatureError::InvalidSignature)
    }

    fn extract_signature_components(
        &self,
        signature_xml: &str,
    ) -> XmlSignatureResult<SignatureComponents> {
        let signed_info = find_element(signature_xml, SIGNED_INFO_ELEMENT)?
            .ok_or(XmlSignatureError::MissingElement(SIGNED_INFO_ELEMENT))?;
        let signed_info_xml = signed_info.outer(signature_xml);

        let signature_method = find_element(signed_info_xml, SIGNATURE_METHOD_ELEMENT)?
            .and_then(|e| e.attribute(ALGORITHM_ATTRIBUTE).map(str::to_string))
            .ok_or(XmlSignatureError::MissingElement(SIGNATURE_METHOD_ELEMENT))?;

        // the reference to the whole document, other references cover signed properties
        let reference = find_elements(signed_info_xml, REFERENCE_ELEMENT)?
            .into_iter()
            .find(|r| r.attribute(URI_ATTRIBUTE).unwrap_or_default().is_empty())
            .ok_or(XmlSignatureError::MissingElement(REFERENCE_ELEMENT))?;
        let reference_xml = reference.outer(signed_info_xml);

        let digest_method = find_element(reference_xml, DIGEST_METHOD_ELEMENT)?
            .and_then(|e| e.attribute(ALGORITHM_ATTRIBUTE).map(str::to_string))
            .ok_or(XmlSignatureError::MissingElement(DIGEST_METHOD_ELEMENT))?;
        let digest_value = find_element(reference_xml, DIGEST_VALUE_ELEMENT)?
            .ok_or(XmlSignatureError::MissingElement(DIGEST_VALUE_ELEMENT))?;

        let signature_value = find_element(signature_xml, SIGNATURE_VALUE_ELEMENT)?
            .ok_or(XmlSignatureError::MissingElement(SIGNATURE_VALUE_ELEMENT))?;

        let certificate = match find_element(signature_xml, KEY_INFO_ELEMENT)? {
            Some(key_info) => {
                let key_info_xml = key_info.outer(signature_xml);
                find_element(key_info_xml, X509_CERTIFICATE_ELEMENT)?
                    .map(|cert| decode_base64_text(cert.text(key_info_xml)))
                    .transpose()?
            }
            None => None,
        };

        Ok(SignatureComponents {
            signed_info: signed_info_xml.to_string(),
            signature_algorithm: SignatureAlgorithm::from_uri(signature_method.trim())?,
            digest_algorithm: DigestAlgorithm::from_uri(digest_method.trim())?,
            digest_value: decode_base64_text(digest_value.text(reference_xml))?,
            signature_value: decode_base64_text(signature_value.text(signature_xml))?,
            certificate,
        })
    }

    fn verify_digest_value(
        &self,
        unsigned_xml: &str,
        components: &SignatureComponents,
    ) -> XmlSignatureResult<()> {
        let calculated = hash(
            components.digest_algorithm.message_digest(),
            unsigned_xml.as_bytes(),
        )?;

        if calculated.as_ref() != components.digest_value.as_slice() {
            warn!("Reference digest verification failed");
            return Err(XmlSignatureError::DigestMismatch);
        }
        Ok(())
    }

    fn verify_signed_info(
        &self,
        components: &SignatureComponents,
        certificate: &Certificate,
    ) -> XmlSignatureResult<bool> {
        let public_key = certificate.to_openssl()?.public_key()?;
        let algorithm = components.signature_algorithm;

        let signature = match algorithm.family {
            KeyFamily::Rsa => components.signature_value.clone(),
            KeyFamily::Ecdsa => match ecdsa_raw_to_der(&components.signature_value)? {
                Some(der) => der,
                None => return Ok(false),
            },
        };

        let mut verifier = Verifier::new(algorithm.digest.message_digest(), &public_key)?;
        verifier.update(components.signed_info.as_bytes())?;
        // a key of the wrong type surfaces as an error; treat it as a mismatch
        Ok(verifier.verify(&signature).unwrap_or(false))
    }
}

/// XML-DSig carries ECDSA signatures as `r || s`; openssl expects DER.
fn ecdsa_raw_to_der(raw: &[u8]) -> XmlSignatureResult<Option<Vec<u8>>> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Ok(None);
    }
    let (r, s) = raw.split_at(raw.len() / 2);
    let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    Ok(Some(sig.to_der()?))
}

impl SignatureVerifier for XmlSignatureValidator {
    fn verify(&self, document: &[u8], expected: &[Certificate]) -> TslResult<Certificate> {
        let document = document.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(document);
        let xml = std::str::from_utf8(document)
            .map_err(|e| TslError::Signature(format!("document is not UTF-8: {e}")))?;
        self.validate(xml, expected)
            .map_err(|e| TslError::Signature(e.to_string()))
    }
}
