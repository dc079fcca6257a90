//! Folding of service status records into validity windows

use chrono::{DateTime, Utc};

use super::constants::{SERVICESTATUS_END, SERVICESTATUS_START};
use super::document::{Extensions, ServiceHistoryInstance, ServiceInformation, parse_xsd_datetime};
use super::errors::TslResult;
use super::types::{Qualifier, Validity, ValidityStatus};

/// A dated status entry of a service, current or historical
pub trait StatusRecord {
    fn status_value(&self) -> &str;

    fn starting_time(&self) -> &str;

    fn extensions(&self) -> Option<&Extensions>;

    fn timestamp(&self) -> TslResult<DateTime<Utc>> {
        parse_xsd_datetime(self.starting_time())
    }

    fn qualifier_data(&self) -> TslResult<Vec<Qualifier>> {
        self.extensions()
            .map(Extensions::qualifiers)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl StatusRecord for ServiceInformation {
    fn status_value(&self) -> &str {
        self.status.trim()
    }

    fn starting_time(&self) -> &str {
        &self.status_starting_time
    }

    fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }
}

impl StatusRecord for ServiceHistoryInstance {
    fn status_value(&self) -> &str {
        self.status.trim()
    }

    fn starting_time(&self) -> &str {
        &self.status_starting_time
    }

    fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }
}

/// Map a status URI onto the window classification
pub fn classify_status(uri: &str) -> ValidityStatus {
    if SERVICESTATUS_START.contains(uri) {
        ValidityStatus::Active
    } else if SERVICESTATUS_END.contains(uri) {
        ValidityStatus::Withdrawn
    } else {
        ValidityStatus::Unknown
    }
}

struct Transition {
    at: DateTime<Utc>,
    status_uri: String,
    qualifiers: Vec<Qualifier>,
}

/// Collects status records of one service and produces its windows.
#[derive(Default)]
pub struct ServiceHistory {
    transitions: Vec<Transition>,
}

impl ServiceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<R: StatusRecord>(&mut self, record: &R) -> TslResult<()> {
        self.transitions.push(Transition {
            at: record.timestamp()?,
            status_uri: record.status_value().to_string(),
            qualifiers: record.qualifier_data()?,
        });
        Ok(())
    }

    /// Sort transitions and turn each into a window ending where the next
    /// one starts. Of several transitions sharing an instant the last pushed
    /// one is kept.
    pub fn finish(mut self) -> Vec<Validity> {
        // stable sort keeps push order among equal instants
        self.transitions.sort_by_key(|t| t.at);

        let mut deduped: Vec<Transition> = Vec::with_capacity(self.transitions.len());
        for transition in self.transitions {
            match deduped.last_mut() {
                Some(last) if last.at == transition.at => *last = transition,
                _ => deduped.push(transition),
            }
        }

        let ends: Vec<Option<DateTime<Utc>>> = deduped
            .iter()
            .skip(1)
            .map(|t| Some(t.at))
            .chain(std::iter::once(None))
            .collect();

        deduped
            .into_iter()
            .zip(ends)
            .map(|(transition, end)| Validity {
                start: transition.at,
                end,
                status: classify_status(&transition.status_uri),
                status_uri: transition.status_uri,
                qualifiers: transition.qualifiers,
            })
            .collect()
    }
}
