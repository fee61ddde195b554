//! Pulling the (token, username) pair out of a request.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::{auth::cookies::read_cookie, config::SessionConfig};

const BEARER_PREFIX: &str = "Bearer ";

/// Token and username presented with a request. Either may be empty when absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub username: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("username", &self.username)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the session cookies, falling back to the `Authorization` header.
    ///
    /// Cookies win only when both are present and non-empty. The header form is
    /// `Bearer <token>:<username>`, split at the first colon; anything else yields empty
    /// credentials rather than an error.
    pub fn from_headers(headers: &HeaderMap, session: &SessionConfig) -> Self {
        let token = read_cookie(headers, &session.token_cookie_name);
        let username = read_cookie(headers, &session.username_cookie_name);
        if let (Some(token), Some(username)) = (token, username) {
            return Self {
                token: token.into_owned(),
                username: username.into_owned(),
            };
        }

        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer_pair)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty() && self.username.is_empty()
    }
}

fn parse_bearer_pair(value: &str) -> Option<Credentials> {
    let (token, username) = value.strip_prefix(BEARER_PREFIX)?.split_once(':')?;
    Some(Credentials {
        token: token.to_string(),
        username: username.to_string(),
    })
}
