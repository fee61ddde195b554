//! Signed session tokens.
//!
//! A token is an HS256 JWT whose claims are a random subject and an expiry. It does not name the
//! user it was issued to: the username travels next to it (cookie or bearer pair) and the two are
//! checked independently by the access gate.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{Error, Result},
};

const SECONDS_PER_DAY: i64 = 86_400;

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String, // Random subject, fresh for every token
    pub exp: i64,    // Expiration time (seconds since the epoch)
}

/// Issues and checks session tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: TimeDelta,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("lifetime", &self.lifetime).finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, lifetime: TimeDelta) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token is invalid from its `exp` second onwards
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let secret = config.secret_key.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| Error::Internal {
            operation: "create token service: secret_key is required".to_string(),
        })?;
        let lifetime = TimeDelta::from_std(config.auth.session.token_lifetime).map_err(|e| Error::Internal {
            operation: format!("create token service: token_lifetime out of range: {e}"),
        })?;

        Ok(Self::new(secret, lifetime))
    }

    /// Issue a token expiring one lifetime from now.
    pub fn issue(&self) -> Result<String> {
        let expires_at = Utc::now().checked_add_signed(self.lifetime).ok_or_else(|| Error::Internal {
            operation: format!("issue session token: lifetime {} overflows the clock", self.lifetime),
        })?;
        self.issue_until(expires_at)
    }

    /// Issue a token with an explicit expiry.
    pub fn issue_until(&self, expires_at: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("sign session token: {e}"),
        })
    }

    fn decode_claims(&self, token: &str) -> Result<TokenClaims> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            // Anything a client can send us: malformed, forged, expired
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::ImmatureSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

            _ => Error::Internal {
                operation: format!("verify session token: {e}"),
            },
        })?;

        Ok(token_data.claims)
    }

    /// Whether the token carries a valid signature and has not yet expired.
    ///
    /// Never fails: malformed, forged, empty and expired tokens are all simply invalid.
    pub fn verify(&self, token: &str) -> bool {
        match self.decode_claims(token) {
            Ok(_) => true,
            Err(Error::Unauthenticated { .. }) => false,
            Err(e) => {
                warn!("Session token rejected: {e}");
                false
            }
        }
    }

    /// Expiry of a currently valid token.
    pub fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        self.decode_claims(token).ok().and_then(|claims| DateTime::from_timestamp(claims.exp, 0))
    }

    /// Whether a valid token expires within `window_days` days from now.
    pub fn is_almost_expired(&self, token: &str, window_days: i64) -> bool {
        self.is_almost_expired_at(token, window_days, Utc::now())
    }

    /// Whether a token that is valid now has between 1 and `window_days` days left at `reference`.
    ///
    /// Days are counted with any partial day rounded up, so a token with twelve hours left has one
    /// day remaining and a token past its expiry has none.
    pub fn is_almost_expired_at(&self, token: &str, window_days: i64, reference: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at(token) else {
            return false;
        };

        let days = remaining_days(expires_at - reference);
        (1..=window_days).contains(&days)
    }
}

fn remaining_days(remaining: TimeDelta) -> i64 {
    let seconds = remaining.num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}
