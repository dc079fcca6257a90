use chrono::{DateTime, Utc};
use tracing::debug;

use super::errors::TrustEvaluationError;
use super::types::Service;
use crate::pki::Certificate;

/// Decides whether a certificate chain is trusted by a set of services.
///
/// A service vouches for the chain when one of its certificates is part of
/// the chain or issued one of its certificates, the window covering the
/// evaluation instant is active, and one of the window's qualifiers (if it
/// has any) accepts the leaf certificate.
pub struct TrustEvaluator<'a> {
    services: &'a [Service],
}

impl<'a> TrustEvaluator<'a> {
    pub fn new(services: &'a [Service]) -> Self {
        Self { services }
    }

    /// Evaluate `chain` (leaf first) at the current time
    pub fn validate(&self, chain: &[Certificate]) -> Result<(), TrustEvaluationError> {
        self.validate_at(chain, Utc::now())
    }

    pub fn validate_at(
        &self,
        chain: &[Certificate],
        instant: DateTime<Utc>,
    ) -> Result<(), TrustEvaluationError> {
        let leaf = chain.first().ok_or(TrustEvaluationError::EmptyChain)?;

        // the most specific rejection seen so far
        let mut rejection = TrustEvaluationError::NoMatchingService;
        let mut leaf_properties = None;

        for service in self.services.iter().filter(|s| s.matches_chain(chain)) {
            let Some(window) = service.validity_at(instant).filter(|w| w.is_active()) else {
                debug!("Service '{}' is not active at {instant}", service.name);
                if rejection == TrustEvaluationError::NoMatchingService {
                    rejection = TrustEvaluationError::OutsideValidity {
                        service: service.name.clone(),
                    };
                }
                continue;
            };

            if window.qualifiers.is_empty() {
                debug!("Chain trusted by service '{}'", service.name);
                return Ok(());
            }

            if leaf_properties.is_none() {
                leaf_properties = Some(
                    leaf.properties()
                        .map_err(|e| TrustEvaluationError::InvalidCertificate(e.to_string()))?,
                );
            }
            let accepted = leaf_properties.as_ref().is_some_and(|properties| {
                window
                    .qualifiers
                    .iter()
                    .any(|qualifier| qualifier.is_satisfied_by(properties))
            });

            if accepted {
                debug!("Chain trusted by qualified service '{}'", service.name);
                return Ok(());
            }

            debug!("Qualifiers of service '{}' reject {leaf}", service.name);
            rejection = TrustEvaluationError::QualifierRejected {
                service: service.name.clone(),
            };
        }

        Err(rejection)
    }
}
