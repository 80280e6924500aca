//! Process-wide cache of credential verification results.
//!
//! Keyed by (organization, integration). Each entry carries a generation
//! counter: `set`/`delete` bump it, and a connection test only publishes its
//! outcome if the generation it started under is still current. A test
//! racing a credential change can therefore never leave a stale Verified
//! entry behind.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::IntegrationKey;

#[derive(Debug, Default)]
struct CacheEntry {
    generation: u64,
    verified_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct VerificationCache {
    entries: DashMap<(Uuid, IntegrationKey), CacheEntry>,
}

impl VerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current generation before starting a connection test.
    pub fn begin(&self, organization_id: Uuid, key: IntegrationKey) -> u64 {
        self.entries
            .entry((organization_id, key))
            .or_default()
            .generation
    }

    /// Credential change: bump the generation and drop any cached result.
    /// Called synchronously after every `set`/`delete`, as the last writer.
    pub fn invalidate(&self, organization_id: Uuid, key: IntegrationKey) {
        let mut entry = self.entries.entry((organization_id, key)).or_default();
        entry.generation += 1;
        entry.verified_utc = None;
    }

    /// Publish a successful test, unless the credentials changed while it
    /// ran. Returns whether the result was fresh enough to keep.
    pub fn publish_verified(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
        generation: u64,
        at: DateTime<Utc>,
    ) -> bool {
        let mut entry = self.entries.entry((organization_id, key)).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.verified_utc = Some(at);
        true
    }

    /// Publish a failed test: clear the cached result if the generation is
    /// still current. Returns whether the failure applied to the current
    /// credentials.
    pub fn publish_failed(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
        generation: u64,
    ) -> bool {
        let mut entry = self.entries.entry((organization_id, key)).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.verified_utc = None;
        true
    }

    /// Last successful verification of the current credentials, if any.
    pub fn verified_at(&self, organization_id: Uuid, key: IntegrationKey) -> Option<DateTime<Utc>> {
        self.entries
            .get(&(organization_id, key))
            .and_then(|e| e.verified_utc)
    }
}
