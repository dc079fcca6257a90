use crate::pki::Certificate;

use super::errors::TslResult;

/// Verifies the enveloped signature of a trusted list document.
#[cfg_attr(test, mockall::automock)]
pub trait SignatureVerifier: Send + Sync {
    /// Verify `document` against the certificates expected to sign it and
    /// return the certificate that did.
    fn verify(&self, document: &[u8], expected: &[Certificate]) -> TslResult<Certificate>;
}
