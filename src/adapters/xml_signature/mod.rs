//! Enveloped XML-DSig signatures for trusted lists
//!
//! [`XmlSignatureValidator`] verifies the signature of a published list
//! against the certificates expected to sign it. [`XmlSignatureSigner`]
//! produces signatures in the same form.

pub mod constants;
pub mod signer;
pub mod types;
pub mod utils;
pub mod validator;

pub use signer::XmlSignatureSigner;
pub use types::{DigestAlgorithm, SignatureAlgorithm, XmlSignatureError, XmlSignatureResult};
pub use validator::XmlSignatureValidator;
