//! User credential store
//!
//! Loaded once at startup from a JSON file mapping each username to a
//! password and the list of methods that user may call:
//!
//! ```json
//! {
//!   "alice": { "password": "secret", "allowedMethods": ["Machine_on"] },
//!   "bob":   { "password": "sha256:2bb80d...", "allowedFunctions": ["print_uint32"] }
//! }
//! ```
//!
//! Passwords are either stored verbatim or as `sha256:<hex digest>`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CredentialError;

/// Prefix marking a hashed password entry
const SHA256_PREFIX: &str = "sha256:";

/// One user's stored credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// Plain password or `sha256:<hex>`
    pub password: String,
    /// Methods this user may call
    #[serde(default, alias = "allowedFunctions")]
    pub allowed_methods: Vec<String>,
}

/// Stored password in comparable form
#[derive(Debug, Clone)]
enum StoredPassword {
    Plain(String),
    Sha256([u8; 32]),
}

impl StoredPassword {
    fn parse(username: &str, raw: &str) -> Result<Self, CredentialError> {
        let Some(digest) = raw.strip_prefix(SHA256_PREFIX) else {
            return Ok(StoredPassword::Plain(raw.to_string()));
        };

        let bytes = hex::decode(digest.trim())
            .map_err(|_| CredentialError::InvalidHash(username.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CredentialError::InvalidHash(username.to_string()))?;
        Ok(StoredPassword::Sha256(bytes))
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            StoredPassword::Plain(stored) => constant_time_eq(stored.as_bytes(), candidate.as_bytes()),
            StoredPassword::Sha256(stored) => {
                let digest = Sha256::digest(candidate.as_bytes());
                constant_time_eq(stored, digest.as_slice())
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: StoredPassword,
    allowed_methods: HashSet<String>,
}

/// Username -> credentials lookup, read-only after load
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, StoredUser>,
}

impl CredentialStore {
    /// Create an empty store (every login fails)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from parsed entries
    pub fn from_entries(entries: HashMap<String, UserEntry>) -> Result<Self, CredentialError> {
        let mut users = HashMap::with_capacity(entries.len());
        for (username, entry) in entries {
            let password = StoredPassword::parse(&username, &entry.password)?;
            users.insert(
                username,
                StoredUser {
                    password,
                    allowed_methods: entry.allowed_methods.into_iter().collect(),
                },
            );
        }
        Ok(Self { users })
    }

    /// Parse a store from JSON text
    pub fn from_json(path: &Path, content: &str) -> Result<Self, CredentialError> {
        let entries: HashMap<String, UserEntry> =
            serde_json::from_str(content).map_err(|source| CredentialError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(entries)
    }

    /// Load the store from a file.
    ///
    /// A missing file yields an empty store; an unreadable or malformed
    /// one is an error.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Credentials file not found - all logins will be rejected"
            );
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_json(path, &content)?;
        tracing::info!(path = %path.display(), users = store.len(), "Loaded credentials");
        Ok(store)
    }

    /// Check a username/password pair, returning the user's permitted methods on success
    pub fn verify(&self, username: &str, password: &str) -> Option<HashSet<String>> {
        let user = self.users.get(username)?;
        if user.password.matches(password) {
            Some(user.allowed_methods.clone())
        } else {
            None
        }
    }

    /// Hash a password into the `sha256:<hex>` stored form
    pub fn hash_password(password: &str) -> String {
        format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(password.as_bytes())))
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
