//! Types shared between mechanisms.

use core::fmt;

#[cfg(feature = "scram")]
pub mod scram;

/// A set of authentication credentials.
///
/// Usernames and passwords are used as the raw UTF-8 the caller provides;
/// no stringprep profile is applied. Servers which require SASLprep'd
/// credentials will reject logins whose credentials contain characters that
/// SASLprep would have altered.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// The username to authenticate as.
    pub username: String,
    /// The password proving ownership of the username.
    pub password: String,
}

impl Credentials {
    /// Sets the username.
    pub fn with_username<U: Into<String>>(mut self, username: U) -> Credentials {
        self.username = username.into();
        self
    }

    /// Sets the password.
    pub fn with_password<P: Into<String>>(mut self, password: P) -> Credentials {
        self.password = password.into();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Keep the password out of log output.
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
