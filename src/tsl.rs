//! Trusted list (TSL) parsing and trust evaluation
//!
//! A [`TslParser`] downloads a list through the [`DigestCache`], checks its
//! published digest and enveloped signature, builds a [`TrustList`] and walks
//! its pivot chain. [`TslService`] does this for the list of the lists and
//! every territory enabled in the [`TerritoryRegistry`]. The resulting
//! services feed the [`TrustEvaluator`].

pub mod aggregate;
pub mod cache;
pub mod constants;
pub mod document;
pub mod errors;
pub mod evaluator;
pub mod fetcher;
pub mod history;
pub mod parser;
pub mod pivot;
pub mod registry;
pub mod signature;
pub mod types;

pub use aggregate::{RootList, TslService};
pub use cache::{DigestCache, DigestCheck, Revalidation};
pub use errors::{TrustEvaluationError, TslError, TslResult};
pub use evaluator::TrustEvaluator;
pub use fetcher::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use history::{ServiceHistory, StatusRecord};
pub use parser::{LoadedList, ParserOptions, TslParser};
pub use pivot::PivotResolver;
pub use registry::TerritoryRegistry;
pub use signature::SignatureVerifier;
pub use types::{AssertMode, Pointer, Qualifier, Service, TrustList, Validity, ValidityStatus};
