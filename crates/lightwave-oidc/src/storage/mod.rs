//! Per-tenant, in-memory authorization code and session stores.
//!
//! Both stores partition their entries by tenant behind two lock levels: an
//! outer lock over the tenant index, held only to find or create a tenant's
//! partition, and one lock per partition under which all entry work happens.
//! Traffic for one tenant never waits on another tenant's entries.
//!
//! Nothing here survives a restart. Entries carry their creation instant and
//! are evicted by [`start_reaper`] or treated as absent once too old.

mod code;
mod reaper;
mod session;

pub use code::{AuthzCodeEntry, AuthzCodeStore};
pub use reaper::start_reaper;
pub use session::{AuthSession, AuthSessionStore};

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::OidcError;

/// Generates a URL-safe random identifier with 256 bits of entropy.
///
/// # Errors
///
/// `RandomGeneration` if the OS entropy source fails. Callers must not retry.
pub(crate) fn random_token() -> Result<String, OidcError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OidcError::random_generation(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

type Partition<V> = Arc<RwLock<HashMap<String, V>>>;

/// Two-level tenant map.
pub(crate) struct TenantMap<V> {
    tenants: RwLock<HashMap<String, Partition<V>>>,
}

impl<V> TenantMap<V> {
    pub(crate) fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the tenant's partition if it exists.
    pub(crate) fn partition(&self, tenant: &str) -> Option<Partition<V>> {
        self.tenants.read().get(tenant).cloned()
    }

    /// Returns the tenant's partition, creating it on first use.
    pub(crate) fn partition_or_create(&self, tenant: &str) -> Partition<V> {
        if let Some(partition) = self.partition(tenant) {
            return partition;
        }
        self.tenants
            .write()
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(HashMap::new())))
            .clone()
    }

    /// Snapshot of all partitions, so sweeps never hold the outer lock while
    /// touching entries.
    pub(crate) fn partitions(&self) -> Vec<(String, Partition<V>)> {
        self.tenants
            .read()
            .iter()
            .map(|(tenant, partition)| (tenant.clone(), partition.clone()))
            .collect()
    }

    /// Drops every entry for which `keep` is false. Returns how many were dropped.
    pub(crate) fn retain(&self, mut keep: impl FnMut(&V) -> bool) -> usize {
        let mut removed = 0;
        for (_, partition) in self.partitions() {
            let mut entries = partition.write();
            let before = entries.len();
            entries.retain(|_, v| keep(v));
            removed += before - entries.len();
        }
        removed
    }
}
