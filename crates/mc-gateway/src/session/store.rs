//! Session store
//!
//! Maps each authenticated connection to the identity that logged in on
//! it and the set of methods that identity may call. A connection with
//! no entry here is unauthenticated.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use mc_core::{ConnectionId, CredentialStore};

/// An authenticated connection's identity.
///
/// The permitted method set is fixed at login and never changes for
/// the life of the session.
#[derive(Debug)]
pub struct Session {
    /// Connection this session belongs to
    pub connection: ConnectionId,
    /// Authenticated username
    pub username: String,
    /// Methods this session may call
    permitted: HashSet<String>,
    /// When the login happened
    pub created_at: Instant,
}

impl Session {
    /// Create a session
    pub fn new(connection: ConnectionId, username: impl Into<String>, permitted: HashSet<String>) -> Self {
        Self {
            connection,
            username: username.into(),
            permitted,
            created_at: Instant::now(),
        }
    }

    /// Whether this session may call `method`
    pub fn is_permitted(&self, method: &str) -> bool {
        self.permitted.contains(method)
    }

    /// The permitted method set
    pub fn permitted(&self) -> &HashSet<String> {
        &self.permitted
    }
}

/// Result of a login attempt. A failed login is an expected outcome, not an error.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Credentials matched; the connection now has this session
    Success(Arc<Session>),
    /// Credentials did not match; the connection is unauthenticated
    Rejected,
}

impl LoginOutcome {
    /// Whether the login succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }
}

/// Manages all active sessions across all connections
pub struct SessionStore {
    /// Credentials consulted at login
    credentials: Arc<CredentialStore>,
    /// Sessions indexed by connection
    sessions: DashMap<ConnectionId, Arc<Session>>,
}

impl SessionStore {
    /// Create a new session store backed by `credentials`
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            credentials,
            sessions: DashMap::new(),
        }
    }

    /// Log `connection` in as `username`.
    ///
    /// On success the connection's session is created or replaced. On
    /// failure any previous session on the connection is ended.
    pub fn authenticate(&self, connection: ConnectionId, username: &str, password: &str) -> LoginOutcome {
        match self.credentials.verify(username, password) {
            Some(permitted) => {
                let session = Arc::new(Session::new(connection, username, permitted));
                let previous = self.sessions.insert(connection, Arc::clone(&session));

                match previous {
                    Some(prev) if prev.username != username => tracing::info!(
                        connection = %connection,
                        previous = %prev.username,
                        user = %username,
                        "Session replaced"
                    ),
                    _ => tracing::info!(connection = %connection, user = %username, "Login succeeded"),
                }

                LoginOutcome::Success(session)
            }
            None => {
                if self.sessions.remove(&connection).is_some() {
                    tracing::info!(connection = %connection, "Failed login ended existing session");
                }
                tracing::warn!(connection = %connection, user = %username, "Login rejected");
                LoginOutcome::Rejected
            }
        }
    }

    /// Get the session for a connection
    pub fn get(&self, connection: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(&connection).map(|r| Arc::clone(&r))
    }

    /// End the session for a connection. Idempotent.
    pub fn end(&self, connection: ConnectionId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(&connection).map(|(_, session)| session);
        if let Some(session) = &removed {
            tracing::info!(connection = %connection, user = %session.username, "Session ended");
        }
        removed
    }

    /// List all sessions
    pub fn list(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
