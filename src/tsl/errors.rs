use thiserror::Error;

use crate::pki::CertificateError;

/// Trusted list related errors
#[derive(Error, Debug)]
pub enum TslError {
    #[error("Malformed or unsupported trusted list: {0}")]
    Structural(String),

    #[error("Trusted list signature verification failed: {0}")]
    Signature(String),

    #[error("Published digest does not match content of {url}")]
    DigestMismatch { url: String },

    #[error("Pivot chain resolution failed: {0}")]
    ChainResolution(String),

    #[error("Failed to resolve pivot {url}: {source}")]
    PivotUnresolved {
        url: String,
        #[source]
        source: Box<TslError>,
    },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Timeout while fetching {url}")]
    Timeout { url: String },

    #[error("Territory {0} is not supported by the list of the lists")]
    UnsupportedTerritory(String),

    #[error("No active territory could be parsed")]
    NoTerritorySucceeded,

    #[error(transparent)]
    TrustEvaluation(#[from] TrustEvaluationError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TslError {
    /// Fetch failures, including timeouts.
    pub fn is_network(&self) -> bool {
        matches!(self, TslError::Network { .. } | TslError::Timeout { .. })
    }

    /// Pivot chain failures, whether raised by the resolver itself or by a
    /// pivot document that failed to load.
    pub fn is_chain_resolution(&self) -> bool {
        matches!(
            self,
            TslError::ChainResolution(_) | TslError::PivotUnresolved { .. }
        )
    }
}

/// Reasons a certificate chain is not trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustEvaluationError {
    #[error("Certificate chain is empty")]
    EmptyChain,

    #[error("No trusted service matches the certificate chain")]
    NoMatchingService,

    #[error("No active validity window of service '{service}' covers the evaluation time")]
    OutsideValidity { service: String },

    #[error("Qualifiers of service '{service}' reject the certificate")]
    QualifierRejected { service: String },

    #[error("Unable to read certificate properties: {0}")]
    InvalidCertificate(String),
}

/// Convenient Result type alias
pub type TslResult<T> = Result<T, TslError>;
