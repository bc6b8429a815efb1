//! Stateless session tokens.
//!
//! Tokens are HS256 JWTs carrying the account id as `sub` plus `iat` and
//! `exp`. Nothing is persisted: a token is valid when its signature checks
//! out under the deployment secret and `exp` is still in the future. Expiry
//! is compared with zero leeway.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
}

/// Which lifetime a token gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLifetime {
    Standard,
    /// Opt-in "remember me" lifetime.
    Extended,
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub standard: Duration,
    pub extended: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            standard: Duration::hours(24),
            extended: Duration::days(7),
        }
    }
}

impl TokenPolicy {
    #[must_use]
    pub fn duration(&self, lifetime: TokenLifetime) -> Duration {
        match lifetime {
            TokenLifetime::Standard => self.standard,
            TokenLifetime::Extended => self.extended,
        }
    }
}

/// Signing and verification keys derived from the deployment secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    policy: TokenPolicy,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"[REDACTED]")
            .field("policy", &self.policy)
            .finish()
    }
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &[u8], policy: TokenPolicy) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Issue a token for `account` starting now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if encoding fails.
    pub fn issue(&self, account: Uuid, lifetime: TokenLifetime) -> Result<String, SessionError> {
        self.issue_at(account, lifetime, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if the expiry overflows or encoding
    /// fails.
    pub fn issue_at(
        &self,
        account: Uuid,
        lifetime: TokenLifetime,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let expires = now
            .checked_add_signed(self.policy.duration(lifetime))
            .ok_or_else(|| SessionError::Signing {
                reason: "token expiry is out of range".to_owned(),
            })?;
        let claims = Claims {
            sub: account,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |e| SessionError::Signing {
                reason: e.to_string(),
            },
        )
    }

    /// Validate a token and return the account id it names.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] for every kind of failure.
    pub fn validate(&self, token: &str) -> Result<Uuid, SessionError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] for every kind of failure.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against `now` instead of the wall clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| SessionError::InvalidToken)?;
        if data.claims.exp <= now.timestamp() {
            return Err(SessionError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}
