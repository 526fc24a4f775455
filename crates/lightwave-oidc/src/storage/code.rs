use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use crate::error::OidcError;
use crate::types::{ClientInfo, ScopeSet, SessionId};

use super::{TenantMap, random_token};

/// State needed to resume a flow when its authorization code is redeemed.
#[derive(Debug, Clone)]
pub struct AuthzCodeEntry {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub scope: ScopeSet,
    pub nonce: Option<String>,
    pub session_id: SessionId,
    created_at: Instant,
}

impl AuthzCodeEntry {
    /// Time since the code was minted.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Single-use authorization codes, partitioned by tenant.
pub struct AuthzCodeStore {
    codes: TenantMap<AuthzCodeEntry>,
    lifetime: Duration,
}

impl AuthzCodeStore {
    /// Creates a store whose codes become unusable after `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            codes: TenantMap::new(),
            lifetime,
        }
    }

    /// Mints a fresh code bound to `session_id` and stores it.
    ///
    /// # Errors
    ///
    /// `RandomGeneration` if no code could be generated.
    pub fn add(
        &self,
        tenant: &str,
        client: &ClientInfo,
        scope: &ScopeSet,
        nonce: Option<&str>,
        session_id: &SessionId,
    ) -> Result<AuthzCodeEntry, OidcError> {
        let partition = self.codes.partition_or_create(tenant);

        // A collision on 256 random bits means the entropy source is broken.
        let code = random_token()?;
        let mut entries = partition.write();
        match entries.entry(code.clone()) {
            Entry::Occupied(_) => Err(OidcError::random_generation(
                "Generated authorization code collides with an existing one",
            )),
            Entry::Vacant(slot) => {
                let entry = AuthzCodeEntry {
                    code,
                    client_id: client.client_id.clone(),
                    redirect_uri: client.redirect_uri.clone(),
                    scope: scope.clone(),
                    nonce: nonce.map(str::to_string),
                    session_id: session_id.clone(),
                    created_at: Instant::now(),
                };
                slot.insert(entry.clone());
                Ok(entry)
            }
        }
    }

    /// Atomically takes the code out of the store.
    ///
    /// Exactly one caller observes `Some` for a given code. Codes older than
    /// the configured lifetime are deleted and reported as absent.
    pub fn remove(&self, tenant: &str, code: &str) -> Option<AuthzCodeEntry> {
        let partition = self.codes.partition(tenant)?;
        let entry = partition.write().remove(code)?;
        if entry.age() > self.lifetime {
            tracing::debug!(tenant, client_id = %entry.client_id, "Authorization code expired");
            return None;
        }
        Some(entry)
    }

    /// Evicts expired codes across all tenants.
    pub fn purge_expired(&self) -> usize {
        let lifetime = self.lifetime;
        self.codes.retain(|entry| entry.age() <= lifetime)
    }

    /// Number of codes currently held for `tenant`.
    #[must_use]
    pub fn len(&self, tenant: &str) -> usize {
        self.codes
            .partition(tenant)
            .map_or(0, |partition| partition.read().len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn client() -> ClientInfo {
        ClientInfo::new("app1", Some("https://app/cb".to_string()))
    }

    fn add(store: &AuthzCodeStore, tenant: &str) -> AuthzCodeEntry {
        store
            .add(
                tenant,
                &client(),
                &ScopeSet::parse("openid").unwrap(),
                Some("n-0S6"),
                &SessionId::new("sid-1"),
            )
            .unwrap()
    }

    #[test]
    fn test_code_is_single_use() {
        let store = AuthzCodeStore::new(Duration::from_secs(60));
        let entry = add(&store, "acme");

        let taken = store.remove("acme", &entry.code).unwrap();
        assert_eq!(taken.client_id, "app1");
        assert_eq!(taken.redirect_uri.as_deref(), Some("https://app/cb"));
        assert_eq!(taken.nonce.as_deref(), Some("n-0S6"));
        assert_eq!(taken.session_id, SessionId::new("sid-1"));

        assert!(store.remove("acme", &entry.code).is_none());
    }

    #[test]
    fn test_codes_are_tenant_scoped() {
        let store = AuthzCodeStore::new(Duration::from_secs(60));
        let entry = add(&store, "acme");

        assert!(store.remove("globex", &entry.code).is_none());
        assert!(store.remove("acme", &entry.code).is_some());
    }

    #[test]
    fn test_expired_code_is_absent() {
        let store = AuthzCodeStore::new(Duration::ZERO);
        let entry = add(&store, "acme");
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.remove("acme", &entry.code).is_none());
        assert_eq!(store.len("acme"), 0);
    }

    #[test]
    fn test_purge_expired() {
        let store = AuthzCodeStore::new(Duration::ZERO);
        add(&store, "acme");
        add(&store, "globex");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len("acme"), 0);
    }

    #[test]
    fn test_concurrent_redemption_has_one_winner() {
        let store = Arc::new(AuthzCodeStore::new(Duration::from_secs(60)));
        let code = add(&store, "acme").code;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let code = code.clone();
                std::thread::spawn(move || store.remove("acme", &code).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
