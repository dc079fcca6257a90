use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cache::{DigestCache, DigestCheck, Revalidation};
use super::constants::{
    DEFAULT_MAX_PIVOT_DEPTH, GENERIC_URI, PIVOT_MARKER, SCHEMES_URI, SERVICES_SUPPORTED,
};
use super::document::{TrustStatusListDoc, parse_document, parse_xsd_datetime};
use super::errors::{TslError, TslResult};
use super::fetcher::{FetchRequest, FetchResponse};
use super::history::ServiceHistory;
use super::pivot::PivotResolver;
use super::signature::SignatureVerifier;
use super::types::{Pointer, Service, TrustList};
use crate::pki::Certificate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Number of pivot levels walked behind a list
    pub max_pivot_depth: u32,
    /// Use a cached copy whose signature still verifies when the download fails
    pub allow_cached_fallback: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_pivot_depth: DEFAULT_MAX_PIVOT_DEPTH,
            allow_cached_fallback: true,
        }
    }
}

/// A verified list together with the anchors it was verified against
#[derive(Debug, Clone)]
pub struct LoadedList {
    pub list: TrustList,
    pub anchors: Vec<Certificate>,
    pub signer: Certificate,
}

/// Downloads, verifies and parses trusted lists
#[derive(Clone)]
pub struct TslParser {
    cache: DigestCache,
    verifier: Arc<dyn SignatureVerifier>,
    options: ParserOptions,
}

impl TslParser {
    pub fn new(cache: DigestCache, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            cache,
            verifier,
            options: ParserOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// Load the list at `url`, verify it against `expected_certs` and walk
    /// its pivot chain.
    pub async fn parse(
        &self,
        url: &str,
        expected_certs: &[Certificate],
        territory: &str,
        timeout: Duration,
    ) -> TslResult<TrustList> {
        info!("Parsing trusted list {url} for {territory}");
        let loaded = self.load_list(url, expected_certs, territory, timeout).await?;

        if !loaded.list.pivots.is_empty() {
            let older = PivotResolver::new(self, self.options.max_pivot_depth)
                .resolve(&loaded, timeout)
                .await?;
            debug!("{} pivot level(s) verified behind {url}", older.len());
        }

        info!(
            "Parsed trusted list {url}: territory {}, sequence {}, {} service(s)",
            loaded.list.territory,
            loaded.list.sequence_number,
            loaded.list.services.len()
        );
        Ok(loaded.list)
    }

    /// Load and verify a single document without following its pivots
    pub async fn load_list(
        &self,
        url: &str,
        expected_certs: &[Certificate],
        territory: &str,
        timeout: Duration,
    ) -> TslResult<LoadedList> {
        match self.cache.revalidate(territory, url, timeout).await {
            Revalidation::Fresh { cached } => {
                if let Some(loaded) = self.verify_cached(url, expected_certs, &cached) {
                    debug!("Reusing unchanged cached copy of {url}");
                    return Ok(loaded);
                }
            }
            Revalidation::Changed { body, etag } => {
                return self
                    .accept_download(url, expected_certs, territory, timeout, body, etag)
                    .await;
            }
            Revalidation::Unknown => {}
        }

        let request = FetchRequest::new(url, timeout);
        match self.cache.fetcher().fetch(&request).await {
            Ok(FetchResponse::Content { body, etag }) => {
                self.accept_download(url, expected_certs, territory, timeout, body, etag)
                    .await
            }
            Ok(FetchResponse::NotModified) => Err(TslError::Network {
                url: url.to_string(),
                reason: "unexpected not-modified response to an unconditional request"
                    .to_string(),
            }),
            Err(e) if e.is_network() && self.options.allow_cached_fallback => {
                match self.load_cached(url, expected_certs, territory).await {
                    Some(loaded) => {
                        warn!("Fetching {url} failed ({e}), using cached copy");
                        Ok(loaded)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn accept_download(
        &self,
        url: &str,
        expected_certs: &[Certificate],
        territory: &str,
        timeout: Duration,
        body: Vec<u8>,
        etag: Option<String>,
    ) -> TslResult<LoadedList> {
        match self.cache.verify_digest(url, &body, timeout).await {
            DigestCheck::Match => debug!("Published digest of {url} matches"),
            DigestCheck::Unavailable => debug!("No published digest for {url}"),
            DigestCheck::Mismatch => {
                warn!("Published digest of {url} does not match downloaded content");
                return Err(TslError::DigestMismatch {
                    url: url.to_string(),
                });
            }
        }

        let signer = self.verifier.verify(&body, expected_certs)?;
        let list = build_trust_list(url, &parse_document(&body)?)?;

        if let Err(e) = self.cache.store(territory, url, &body, etag).await {
            warn!("Failed to cache {url}: {e}");
        }

        Ok(LoadedList {
            list,
            anchors: expected_certs.to_vec(),
            signer,
        })
    }

    /// A cached copy is only used when it still verifies and parses.
    async fn load_cached(
        &self,
        url: &str,
        expected_certs: &[Certificate],
        territory: &str,
    ) -> Option<LoadedList> {
        let cached = match self.cache.read_cached(territory, url).await {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cached copy of {url}: {e}");
                return None;
            }
        };

        self.verify_cached(url, expected_certs, &cached)
    }

    fn verify_cached(
        &self,
        url: &str,
        expected_certs: &[Certificate],
        cached: &[u8],
    ) -> Option<LoadedList> {
        let loaded = self.verifier.verify(cached, expected_certs).and_then(|signer| {
            let list = build_trust_list(url, &parse_document(cached)?)?;
            Ok(LoadedList {
                list,
                anchors: expected_certs.to_vec(),
                signer,
            })
        });

        match loaded {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                warn!("Discarding cached copy of {url}: {e}");
                None
            }
        }
    }
}

/// Turn a deserialized document into a `TrustList`
pub fn build_trust_list(url: &str, doc: &TrustStatusListDoc) -> TslResult<TrustList> {
    let info = &doc.scheme_information;
    let scheme_type = info.tsl_type.trim();
    let territory = info.territory.trim().to_uppercase();

    if !SCHEMES_URI.contains(scheme_type) && !GENERIC_URI.contains(scheme_type) {
        return Err(TslError::Structural(format!(
            "unsupported TSLType '{scheme_type}'"
        )));
    }

    let issue_date = parse_xsd_datetime(&info.issue_date_time)?;
    let next_update = info
        .next_update
        .as_ref()
        .and_then(|next| next.date_time.as_deref())
        .filter(|value| !value.trim().is_empty())
        .map(parse_xsd_datetime)
        .transpose()?;

    let mut pointers = Vec::new();
    let mut signing_certs = Vec::new();
    for pointer in info.pointers.iter().flat_map(|p| p.pointers.iter()) {
        let location = pointer.location.trim();
        let Some(tsl_type) = pointer.tsl_type() else {
            debug!("Skipping pointer to {location} without TSLType");
            continue;
        };
        let pointer_territory = pointer.territory().unwrap_or_default().to_uppercase();

        if GENERIC_URI.contains(tsl_type) && pointer_territory != territory {
            pointers.push(Pointer {
                territory: pointer_territory,
                location: location.to_string(),
                certs: pointer.certificates()?,
            });
        } else if SCHEMES_URI.contains(tsl_type) && pointer_territory == territory {
            signing_certs.extend(pointer.certificates()?);
        } else {
            debug!("Skipping pointer to {location} ({tsl_type}, {pointer_territory})");
        }
    }

    let pivots = info
        .information_uri
        .iter()
        .flat_map(|uris| uris.uris.iter())
        .map(|uri| uri.value.trim())
        .filter(|uri| uri.to_lowercase().contains(PIVOT_MARKER))
        .map(|uri| Pointer {
            territory: territory.clone(),
            location: uri.to_string(),
            certs: signing_certs.clone(),
        })
        .collect();

    let mut services = Vec::new();
    let providers = doc
        .provider_list
        .iter()
        .flat_map(|list| list.providers.iter())
        .flat_map(|provider| provider.services.services.iter());
    for tsp_service in providers {
        let information = &tsp_service.information;
        let service_type = information.service_type.trim();
        if !SERVICES_SUPPORTED.contains(service_type) {
            continue;
        }

        let mut history = ServiceHistory::new();
        for instance in tsp_service.history.iter().flat_map(|h| h.instances.iter()) {
            if instance.service_type.trim() != service_type {
                debug!("Skipping history entry of type {}", instance.service_type.trim());
                continue;
            }
            history.push(instance)?;
        }
        // pushed last so the current status wins a timestamp tie
        history.push(information)?;

        services.push(Service {
            service_type: service_type.to_string(),
            name: information.name.preferred(),
            additional: information
                .extensions
                .as_ref()
                .and_then(|extensions| extensions.additional_information())
                .unwrap_or_default(),
            certs: information.digital_identity.certificates()?,
            validity: history.finish(),
        });
    }

    Ok(TrustList {
        url: url.to_string(),
        scheme_type: scheme_type.to_string(),
        operator_name: info.operator_name.preferred(),
        territory,
        sequence_number: info.sequence_number,
        issue_date,
        next_update,
        pointers,
        pivots,
        signing_certs,
        services,
    })
}
