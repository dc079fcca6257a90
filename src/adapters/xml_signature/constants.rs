//! XML signature constants and algorithm URIs

/// XML namespace URIs
pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XMLDSIG_ENVELOPED_SIGNATURE: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const EXCLUSIVE_C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Digest algorithm URIs
pub const SHA256_DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384_DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512_DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

/// Signature algorithm URIs
pub const RSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA384_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const RSA_SHA512_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
pub const ECDSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub const ECDSA_SHA384_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
pub const ECDSA_SHA512_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

/// XML element names
pub const SIGNATURE_ELEMENT: &str = "Signature";
pub const SIGNED_INFO_ELEMENT: &str = "SignedInfo";
pub const REFERENCE_ELEMENT: &str = "Reference";
pub const SIGNATURE_VALUE_ELEMENT: &str = "SignatureValue";
pub const SIGNATURE_METHOD_ELEMENT: &str = "SignatureMethod";
pub const DIGEST_METHOD_ELEMENT: &str = "DigestMethod";
pub const DIGEST_VALUE_ELEMENT: &str = "DigestValue";
pub const KEY_INFO_ELEMENT: &str = "KeyInfo";
pub const X509_CERTIFICATE_ELEMENT: &str = "X509Certificate";

/// XML attribute names
pub const ALGORITHM_ATTRIBUTE: &str = "Algorithm";
pub const URI_ATTRIBUTE: &str = "URI";
