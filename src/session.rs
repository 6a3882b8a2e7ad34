//! Caller identity for the messaging channel.

use secrecy::{ExposeSecret, SecretString};

/// An authenticated user session.
///
/// The access token is an opaque bearer credential; the channel only ever
/// appends it to the connection address. It is held in a [`SecretString`]
/// so it never appears in debug output or logs.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name used as the sender on outbound messages.
    pub username: String,
    /// Opaque bearer token for the channel connection.
    access_token: SecretString,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// Expose the raw token for address construction.
    pub(crate) fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}
