use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::constants::RECOGNIZED_TERRITORIES;

/// Territories taking part in aggregate parsing
#[derive(Debug, Default)]
pub struct TerritoryRegistry {
    enabled: Mutex<BTreeSet<String>>,
}

impl TerritoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.enabled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enable `territory`. Returns true if the code is recognised; unknown
    /// codes are not enabled.
    pub fn activate(&self, territory: &str) -> bool {
        let code = territory.trim().to_uppercase();
        if !RECOGNIZED_TERRITORIES.contains(code.as_str()) {
            warn!("Ignoring unrecognised territory '{territory}'");
            return false;
        }
        debug!("Territory {code} activated");
        self.lock().insert(code);
        true
    }

    /// Returns true if the territory was enabled
    pub fn deactivate(&self, territory: &str) -> bool {
        self.lock().remove(&territory.trim().to_uppercase())
    }

    pub fn is_active(&self, territory: &str) -> bool {
        self.lock().contains(&territory.trim().to_uppercase())
    }

    /// Snapshot of the enabled territories, sorted
    pub fn active(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}
