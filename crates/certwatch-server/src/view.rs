//! Presentation of stored observations, independent of any transport.

pub mod html;

use certwatch_common::{Observation, Urgency};

/// One status-page row: the observation plus its urgency tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub observation: Observation,
    pub urgency: Urgency,
}

/// Pairs each observation with its urgency. Order is preserved, so callers
/// pass the store's urgency-ordered list straight through.
pub fn status_rows(observations: Vec<Observation>) -> Vec<StatusRow> {
    observations
        .into_iter()
        .map(|observation| StatusRow {
            urgency: observation.urgency(),
            observation,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrgencySummary {
    pub critical: usize,
    pub warning: usize,
    pub healthy: usize,
}

impl UrgencySummary {
    pub fn from_rows(rows: &[StatusRow]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            match row.urgency {
                Urgency::Critical => acc.critical += 1,
                Urgency::Warning => acc.warning += 1,
                Urgency::Healthy => acc.healthy += 1,
            }
            acc
        })
    }
}
