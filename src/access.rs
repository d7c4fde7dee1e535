//! External-collaborator interfaces: user directory, access-log sink, and
//! reverse geolocation.
//!
//! The engine only depends on the degradation semantics specified here; the
//! persistence/transport behind each trait belongs to the embedding
//! application. A failed location lookup falls back to a fixed label and a
//! failed log append is swallowed: the login that triggered the entry must
//! still succeed.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::error::EngineError;
use crate::schema::sentinel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    /// Null until the user sets a password on first login.
    pub password_hash: Option<String>,
    pub role: Role,
}

/// Username-keyed credential store.
pub trait CredentialStore {
    fn get(&self, username: &str) -> Option<UserRecord>;
    fn set_password_hash(&mut self, username: &str, hash: &str) -> Result<(), EngineError>;
}

/// Append-only access-log sink.
pub trait AccessSink {
    fn append(&mut self, entry: AccessEntry) -> Result<(), EngineError>;
}

/// Reverse geolocation by origin address.
pub trait GeoLookup {
    fn locate(&self, ip_address: &str) -> Result<String, EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessEntry {
    pub username: String,
    pub timestamp: NaiveDateTime,
    pub ip_address: String,
    pub location: String,
}

/// In-memory user directory seeded from fixed admin/user lists.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: BTreeMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn seeded(admins: &[&str], users: &[&str]) -> Self {
        let mut directory = Self::default();
        for name in admins {
            directory.insert(name, Role::Admin);
        }
        for name in users {
            directory.insert(name, Role::User);
        }
        directory
    }

    fn insert(&mut self, username: &str, role: Role) {
        self.users
            .entry(username.to_string())
            .or_insert_with(|| UserRecord {
                username: username.to_string(),
                password_hash: None,
                role,
            });
    }
}

impl CredentialStore for UserDirectory {
    fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).cloned()
    }

    fn set_password_hash(&mut self, username: &str, hash: &str) -> Result<(), EngineError> {
        match self.users.get_mut(username) {
            Some(record) => {
                record.password_hash = Some(hash.to_string());
                Ok(())
            }
            None => Err(EngineError::InvalidData(format!(
                "unknown user: {username}"
            ))),
        }
    }
}

/// In-memory access log for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub entries: Vec<AccessEntry>,
}

impl AccessSink for MemorySink {
    fn append(&mut self, entry: AccessEntry) -> Result<(), EngineError> {
        self.entries.push(entry);
        Ok(())
    }
}

/// Record a login in the access log and return what was written.
pub fn record_access(
    sink: &mut dyn AccessSink,
    geo: &dyn GeoLookup,
    username: &str,
    ip_address: &str,
    timestamp: NaiveDateTime,
) -> AccessEntry {
    let location = match geo.locate(ip_address) {
        Ok(location) => location,
        Err(err) => {
            warn!(error = %err, ip_address, "geolocation lookup failed");
            sentinel::UNKNOWN_LOCATION.to_string()
        }
    };
    let entry = AccessEntry {
        username: username.to_string(),
        timestamp,
        ip_address: ip_address.to_string(),
        location,
    };
    if let Err(err) = sink.append(entry.clone()) {
        warn!(error = %err, "access log append failed");
    }
    entry
}
