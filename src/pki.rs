pub mod certificate;

// Re-export commonly used types
pub use certificate::{Certificate, CertificateError, CertificateProperties, KeyUsageBit};
