//! The [`SessionStore`] capability consumed by the protocol engine.

use std::fmt;

use courier_transport::ConnectionId;

/// Outcome of a login attempt.
///
/// Failures are values, not errors: every way a login can go wrong maps
/// to a variant the engine turns into an ERROR frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// First login for this username; the user was created.
    Success,
    /// Known user, correct passcode, not logged in anywhere.
    Relogged,
    /// This connection already carries a logged-in user.
    AlreadyConnectedElsewhere,
    /// The user is logged in on another connection.
    AlreadyLoggedIn,
    /// Known user, wrong passcode.
    WrongPassword,
}

impl LoginStatus {
    /// Returns `true` if the connection is now logged in.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Relogged)
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "new user registered",
            Self::Relogged => "logged in",
            Self::AlreadyConnectedElsewhere => "client already connected",
            Self::AlreadyLoggedIn => "user already logged in",
            Self::WrongPassword => "wrong password",
        })
    }
}

/// Verifies credentials and tracks which user owns which connection.
///
/// # Trait bounds
///
/// One store is shared by every connection task, so implementations must
/// be `Send + Sync` and handle their own locking. All methods are
/// synchronous: they are called from inside the engine's transition
/// function, which never awaits.
pub trait SessionStore: Send + Sync + 'static {
    /// Attempts to log `username` in on `conn`.
    fn login(
        &self,
        conn: ConnectionId,
        username: &str,
        passcode: &str,
    ) -> LoginStatus;

    /// Logs out whoever is logged in on `conn`. Does nothing if nobody is.
    fn logout(&self, conn: ConnectionId);

    /// Records that `username` published `filename` to `topic`.
    ///
    /// Default: ignored.
    fn track_upload(&self, _username: &str, _filename: &str, _topic: &str) {}
}
