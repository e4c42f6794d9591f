//! Diagnostic snapshot of the session store, printed by the operator
//! console's `report` command.

use std::fmt;

use serde::Serialize;

/// A point-in-time view of every known user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Users sorted by name.
    pub users: Vec<UserReport>,
}

/// One user's status and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReport {
    pub username: String,
    /// Raw id of the connection the user is logged in on, if any.
    pub connection: Option<u64>,
    /// Login times, unix milliseconds.
    pub logins: Vec<u64>,
    /// Logout times, unix milliseconds.
    pub logouts: Vec<u64>,
    pub uploads: Vec<UploadReport>,
}

/// A file a user reported while publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub filename: String,
    pub topic: String,
    /// Unix milliseconds.
    pub at: u64,
}

impl SessionReport {
    /// Number of users currently logged in.
    pub fn online(&self) -> usize {
        self.users.iter().filter(|u| u.connection.is_some()).count()
    }

    /// Renders the report as pretty-printed JSON.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== session report: {} users, {} online ===",
            self.users.len(),
            self.online()
        )?;
        for user in &self.users {
            match user.connection {
                Some(id) => write!(f, "{} [online, conn-{id}]", user.username)?,
                None => write!(f, "{} [offline]", user.username)?,
            }
            writeln!(
                f,
                " logins={} logouts={}",
                user.logins.len(),
                user.logouts.len()
            )?;
            for at in &user.logins {
                writeln!(f, "  login  @ {at}")?;
            }
            for at in &user.logouts {
                writeln!(f, "  logout @ {at}")?;
            }
            for upload in &user.uploads {
                writeln!(
                    f,
                    "  upload {} -> {} @ {}",
                    upload.filename, upload.topic, upload.at
                )?;
            }
        }
        Ok(())
    }
}
