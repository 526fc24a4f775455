use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::error::OidcError;
use crate::types::{LoginMethod, SessionId, UserId};

use super::{TenantMap, random_token};

/// An authenticated browser session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: SessionId,
    pub user: UserId,
    pub login_method: LoginMethod,
    /// Clients that obtained tokens under this session. Drives logout fan-out.
    pub clients: BTreeSet<String>,
    created_at: Instant,
}

impl AuthSession {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Browser sessions, partitioned by tenant.
pub struct AuthSessionStore {
    sessions: TenantMap<AuthSession>,
    cookie_prefix: String,
    lifetime: Duration,
}

impl AuthSessionStore {
    /// Creates a store. Sessions older than `lifetime` are evicted by
    /// [`purge_expired`](Self::purge_expired).
    #[must_use]
    pub fn new(cookie_prefix: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            sessions: TenantMap::new(),
            cookie_prefix: cookie_prefix.into(),
            lifetime,
        }
    }

    /// Creates a session for a freshly authenticated user.
    ///
    /// # Errors
    ///
    /// `RandomGeneration` if no session ID could be generated.
    pub fn new_session(
        &self,
        tenant: &str,
        user: &UserId,
        login_method: LoginMethod,
        client_id: &str,
    ) -> Result<AuthSession, OidcError> {
        let id = SessionId::new(random_token()?);
        let session = AuthSession {
            id: id.clone(),
            user: user.clone(),
            login_method,
            clients: BTreeSet::from([client_id.to_string()]),
            created_at: Instant::now(),
        };

        let partition = self.sessions.partition_or_create(tenant);
        let mut entries = partition.write();
        if entries.contains_key(id.as_str()) {
            return Err(OidcError::random_generation(
                "Generated session ID collides with an existing one",
            ));
        }
        entries.insert(id.as_str().to_string(), session.clone());
        Ok(session)
    }

    #[must_use]
    pub fn get(&self, tenant: &str, id: &SessionId) -> Option<AuthSession> {
        self.sessions
            .partition(tenant)?
            .read()
            .get(id.as_str())
            .cloned()
    }

    /// Records `client_id` against the session and optionally replaces the
    /// login method. Returns the updated session, or `None` if it is gone.
    pub fn update(
        &self,
        tenant: &str,
        id: &SessionId,
        login_method: Option<LoginMethod>,
        client_id: &str,
    ) -> Option<AuthSession> {
        let partition = self.sessions.partition(tenant)?;
        let mut entries = partition.write();
        let session = entries.get_mut(id.as_str())?;
        if let Some(method) = login_method {
            session.login_method = method;
        }
        session.clients.insert(client_id.to_string());
        Some(session.clone())
    }

    /// Deletes the session, returning it if it existed.
    pub fn remove(&self, tenant: &str, id: &SessionId) -> Option<AuthSession> {
        self.sessions.partition(tenant)?.write().remove(id.as_str())
    }

    /// Name of the session cookie for `tenant`.
    ///
    /// Derived from a digest of the tenant name so that sessions of different
    /// tenants served from one host never share a cookie.
    #[must_use]
    pub fn session_cookie_name(&self, tenant: &str) -> String {
        let digest = Sha256::digest(tenant.as_bytes());
        format!("{}_{}", self.cookie_prefix, hex::encode(&digest[..8]))
    }

    /// Evicts sessions older than the store lifetime across all tenants.
    pub fn purge_expired(&self) -> usize {
        let lifetime = self.lifetime;
        self.sessions.retain(|session| session.age() <= lifetime)
    }
}
