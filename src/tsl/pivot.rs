//! Walk of the pivot chain behind a trusted list
//!
//! Each older version must be signed by the certificates the newer one
//! declares and must carry a smaller sequence number. The walk is bounded
//! by a depth budget.

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use super::errors::{TslError, TslResult};
use super::parser::{LoadedList, TslParser};
use super::types::TrustList;
use crate::pki::Certificate;

pub struct PivotResolver<'a> {
    parser: &'a TslParser,
    max_depth: u32,
}

impl<'a> PivotResolver<'a> {
    pub fn new(parser: &'a TslParser, max_depth: u32) -> Self {
        Self { parser, max_depth }
    }

    /// Verify the lineage of `start` and return the older lists, nearest
    /// first.
    ///
    /// The walk ends successfully when a list has no further pivot or when
    /// the depth budget is spent after at least one level. Running out of
    /// budget before any level resolved is a failure.
    pub async fn resolve(
        &self,
        start: &LoadedList,
        timeout: Duration,
    ) -> TslResult<Vec<TrustList>> {
        let mut visited = HashSet::from([start.list.url.clone()]);
        let mut resolved: Vec<TrustList> = Vec::new();

        let mut sequence_number = start.list.sequence_number;
        let mut territory = start.list.territory.clone();
        let mut anchors = declared_or(&start.list, &start.anchors);
        let mut next = start.list.pivots.first().cloned();
        let mut depth = 0u32;

        while let Some(pivot) = next {
            if depth >= self.max_depth {
                if resolved.is_empty() {
                    return Err(TslError::ChainResolution(format!(
                        "depth budget of {} exhausted before resolving {}",
                        self.max_depth, pivot.location
                    )));
                }
                debug!(
                    "Pivot depth budget reached after {depth} level(s), stopping at {}",
                    pivot.location
                );
                break;
            }

            if !visited.insert(pivot.location.clone()) {
                return Err(TslError::ChainResolution(format!(
                    "pivot cycle through {}",
                    pivot.location
                )));
            }

            let expected = if pivot.certs.is_empty() {
                anchors.clone()
            } else {
                pivot.certs.clone()
            };

            debug!("Resolving pivot {} (level {})", pivot.location, depth + 1);
            let loaded = self
                .parser
                .load_list(&pivot.location, &expected, &territory, timeout)
                .await
                .map_err(|e| TslError::PivotUnresolved {
                    url: pivot.location.clone(),
                    source: Box::new(e),
                })?;

            if loaded.list.sequence_number >= sequence_number {
                return Err(TslError::ChainResolution(format!(
                    "sequence number {} of {} does not precede {}",
                    loaded.list.sequence_number, pivot.location, sequence_number
                )));
            }

            sequence_number = loaded.list.sequence_number;
            territory = loaded.list.territory.clone();
            anchors = declared_or(&loaded.list, &loaded.anchors);
            next = loaded.list.pivots.first().cloned();
            depth += 1;
            resolved.push(loaded.list);
        }

        Ok(resolved)
    }
}

/// Signing certificates a list declares, or the anchors that verified it
fn declared_or(list: &TrustList, anchors: &[Certificate]) -> Vec<Certificate> {
    if list.signing_certs.is_empty() {
        anchors.to_vec()
    } else {
        list.signing_certs.clone()
    }
}
