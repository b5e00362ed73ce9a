//! Cost-rate resolution
//!
//! A record's cost rate resolves from its own upstream value, else the local
//! override table, else the configured/environment default, else zero. The
//! chosen source travels with the rate; zero-fallbacks produce one warning
//! per missing subject, de-duplicated.

use std::collections::{BTreeSet, HashMap};
use tally_core::{RateInfo, RateOverrides, RateSource, RecordId, TimeRecord};

/// Resolves cost rates for a batch of records and collects data-quality
/// warnings along the way.
#[derive(Debug)]
pub struct RateResolver {
    overrides: RateOverrides,
    missing: BTreeSet<String>,
}

impl RateResolver {
    pub fn new(overrides: RateOverrides) -> Self {
        Self {
            overrides,
            missing: BTreeSet::new(),
        }
    }

    /// Resolve one record's cost rate with provenance.
    pub fn cost_rate(&mut self, record: &TimeRecord) -> RateInfo {
        if let Some(rate) = record.cost_rate {
            return RateInfo {
                rate,
                source: RateSource::Upstream,
            };
        }
        if let Some(rate) = self.overrides.rate_for(&record.user_name) {
            return RateInfo {
                rate,
                source: RateSource::ConfigFile,
            };
        }
        if let Some(rate) = self.overrides.default_rate {
            return RateInfo {
                rate,
                source: RateSource::EnvDefault,
            };
        }
        self.missing.insert(record.user_name.clone());
        RateInfo {
            rate: 0.0,
            source: RateSource::FallbackZero,
        }
    }

    /// Resolve every record up front. Calculators use the returned map so
    /// grouped computations stay pure.
    pub fn resolve_all(&mut self, records: &[TimeRecord]) -> HashMap<RecordId, RateInfo> {
        records
            .iter()
            .map(|record| (record.id, self.cost_rate(record)))
            .collect()
    }

    /// One warning per subject that fell through to a zero rate.
    pub fn warnings(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|name| format!("No cost rate found for {}; assuming 0", name))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
