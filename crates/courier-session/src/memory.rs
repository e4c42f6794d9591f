//! The in-memory session store used by the server binary.
//!
//! # Concurrency note
//!
//! Every connection task calls into the same store, so the state lives
//! behind one `std::sync::Mutex`. Each operation is a handful of map
//! lookups and never awaits while holding the lock, which keeps a plain
//! blocking mutex appropriate even inside async tasks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use courier_transport::ConnectionId;

use crate::{
    LoginStatus, SessionReport, SessionStore, UploadReport, UserReport,
};

/// A registered user.
#[derive(Debug)]
struct User {
    passcode: String,
    /// The connection this user is logged in on, if any.
    connection: Option<ConnectionId>,
    logins: Vec<u64>,
    logouts: Vec<u64>,
    uploads: Vec<UploadReport>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, User>,
    /// Reverse index: which user is logged in on which connection.
    /// Kept in sync with `User::connection`.
    active: HashMap<ConnectionId, String>,
}

/// Users are created on first login; their passcode is whatever they
/// logged in with that first time.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `username` is logged in on some connection.
    pub fn is_logged_in(&self, username: &str) -> bool {
        self.lock()
            .users
            .get(username)
            .is_some_and(|u| u.connection.is_some())
    }

    /// Returns the user logged in on `conn`, if any.
    pub fn user_on(&self, conn: ConnectionId) -> Option<String> {
        self.lock().active.get(&conn).cloned()
    }

    /// Number of connections with a logged-in user.
    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Builds a diagnostic snapshot of every known user.
    pub fn report(&self) -> SessionReport {
        let inner = self.lock();
        let mut users: Vec<UserReport> = inner
            .users
            .iter()
            .map(|(name, user)| UserReport {
                username: name.clone(),
                connection: user.connection.map(ConnectionId::into_inner),
                logins: user.logins.clone(),
                logouts: user.logouts.clone(),
                uploads: user.uploads.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        SessionReport { users }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-update can only leave a stale history entry behind,
        // so keep serving instead of propagating the poison.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    fn login(
        &self,
        conn: ConnectionId,
        username: &str,
        passcode: &str,
    ) -> LoginStatus {
        let mut inner = self.lock();

        if inner.active.contains_key(&conn) {
            return LoginStatus::AlreadyConnectedElsewhere;
        }

        let now = unix_millis();
        let status = match inner.users.get_mut(username) {
            None => {
                inner.users.insert(
                    username.to_string(),
                    User {
                        passcode: passcode.to_string(),
                        connection: Some(conn),
                        logins: vec![now],
                        logouts: Vec::new(),
                        uploads: Vec::new(),
                    },
                );
                LoginStatus::Success
            }
            Some(user) if user.passcode != passcode => {
                LoginStatus::WrongPassword
            }
            Some(user) if user.connection.is_some() => {
                LoginStatus::AlreadyLoggedIn
            }
            Some(user) => {
                user.connection = Some(conn);
                user.logins.push(now);
                LoginStatus::Relogged
            }
        };

        if status.is_success() {
            inner.active.insert(conn, username.to_string());
            tracing::info!(%conn, user = username, %status, "login");
        } else {
            tracing::debug!(%conn, user = username, %status, "login refused");
        }
        status
    }

    fn logout(&self, conn: ConnectionId) {
        let mut inner = self.lock();
        let Some(username) = inner.active.remove(&conn) else {
            return;
        };
        if let Some(user) = inner.users.get_mut(&username) {
            user.connection = None;
            user.logouts.push(unix_millis());
        }
        tracing::info!(%conn, user = %username, "logout");
    }

    fn track_upload(&self, username: &str, filename: &str, topic: &str) {
        let mut inner = self.lock();
        match inner.users.get_mut(username) {
            Some(user) => user.uploads.push(UploadReport {
                filename: filename.to_string(),
                topic: topic.to_string(),
                at: unix_millis(),
            }),
            None => tracing::warn!(
                user = username,
                filename,
                "upload reported for unknown user"
            ),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================
