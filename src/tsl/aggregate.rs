use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::errors::{TslError, TslResult};
use super::parser::TslParser;
use super::registry::TerritoryRegistry;
use super::types::{Pointer, Service};
use crate::pki::Certificate;

/// Root list location and the trust anchors it must be signed with
#[derive(Debug, Clone)]
pub struct RootList {
    pub url: String,
    pub territory: String,
    pub anchors: Vec<Certificate>,
}

/// Aggregates the services of every active territory
pub struct TslService {
    parser: TslParser,
    registry: Arc<TerritoryRegistry>,
    root: RootList,
}

impl TslService {
    pub fn new(parser: TslParser, registry: Arc<TerritoryRegistry>, root: RootList) -> Self {
        Self {
            parser,
            registry,
            root,
        }
    }

    pub fn registry(&self) -> &Arc<TerritoryRegistry> {
        &self.registry
    }

    pub fn parser(&self) -> &TslParser {
        &self.parser
    }

    pub fn activate(&self, territory: &str) -> bool {
        self.registry.activate(territory)
    }

    /// Parse the root list and the lists of all active territories.
    ///
    /// A territory whose list fails is logged and skipped. The call fails
    /// when the root list fails, when an active territory has no pointer in
    /// the root list, or when no active territory could be parsed.
    pub async fn parse(&self, timeout: Duration) -> TslResult<Vec<Service>> {
        let root = self
            .parser
            .parse(&self.root.url, &self.root.anchors, &self.root.territory, timeout)
            .await?;
        if root.is_expired() {
            warn!("Root trusted list {} is past its next update", self.root.url);
        }

        let mut targets: Vec<(String, Pointer)> = Vec::new();
        for territory in self.registry.active() {
            if territory == root.territory {
                continue;
            }
            let pointer = root
                .pointers
                .iter()
                .find(|pointer| pointer.territory == territory)
                .ok_or_else(|| TslError::UnsupportedTerritory(territory.clone()))?;
            targets.push((territory, pointer.clone()));
        }

        let mut services = root.into_services();
        if targets.is_empty() {
            return Ok(services);
        }

        let mut join_set = JoinSet::new();
        for (territory, pointer) in targets {
            let parser = self.parser.clone();
            join_set.spawn(async move {
                let result = parser
                    .parse(&pointer.location, &pointer.certs, &territory, timeout)
                    .await;
                (territory, result)
            });
        }

        let mut by_territory = BTreeMap::new();
        while let Some(task_result) = join_set.join_next().await {
            match task_result {
                Ok((territory, Ok(list))) => {
                    if list.is_expired() {
                        warn!("Trusted list of {territory} is past its next update");
                    }
                    by_territory.insert(territory, list.into_services());
                }
                Ok((territory, Err(e))) => {
                    debug!("Skipping territory {territory}: {e}");
                }
                Err(e) => {
                    error!("Territory parse task failed to complete: {e}");
                }
            }
        }

        if by_territory.is_empty() {
            return Err(TslError::NoTerritorySucceeded);
        }

        info!(
            "Loaded services of {} territory list(s): {}",
            by_territory.len(),
            by_territory.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        services.extend(by_territory.into_values().flatten());
        Ok(services)
    }
}
