//! Verification record model - single-use secrets filed under an identifier.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Namespace for two-factor codes, so they never displace a pending
/// email-verification or reset token for the same address.
pub const TWO_FACTOR_PREFIX: &str = "2fa:";

/// Namespace for invitations: `invite:<email>:<invited_by>`.
pub const INVITE_PREFIX: &str = "invite:";

/// Token families and their lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
    TwoFactor,
    Invite,
}

impl TokenKind {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::EmailVerification => Duration::hours(24),
            TokenKind::PasswordReset => Duration::hours(1),
            TokenKind::TwoFactor => Duration::minutes(10),
            TokenKind::Invite => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::EmailVerification => "email_verification",
            TokenKind::PasswordReset => "password_reset",
            TokenKind::TwoFactor => "two_factor",
            TokenKind::Invite => "invite",
        }
    }
}

/// Persisted `(identifier, token, expires)` triple.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VerificationRecord {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn new(identifier: String, token: String, expires: DateTime<Utc>) -> Self {
        Self {
            identifier,
            token,
            expires,
        }
    }

    /// Usable for verification: expiry strictly in the future.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires > now
    }

    /// Eligible for the sweep: expiry strictly in the past.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}

/// A freshly issued URL token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// A freshly issued human-typed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub expires: DateTime<Utc>,
}

/// Who was invited, and by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InviteClaim {
    #[schema(example = "new.member@example.com")]
    pub email: String,
    #[schema(example = "3f0e2a4c-8d57-4bb4-9d38-1f2a6c9d0e11")]
    pub invited_by: String,
}

pub fn two_factor_identifier(email: &str) -> String {
    format!("{}{}", TWO_FACTOR_PREFIX, email)
}

pub fn invite_identifier(email: &str, invited_by: &str) -> String {
    format!("{}{}:{}", INVITE_PREFIX, email, invited_by)
}

/// Split `invite:<email>:<invited_by>`; anything other than exactly three
/// segments is rejected.
pub fn parse_invite_identifier(identifier: &str) -> Option<InviteClaim> {
    let parts: Vec<&str> = identifier.split(':').collect();
    match parts.as_slice() {
        ["invite", email, invited_by] => Some(InviteClaim {
            email: (*email).to_string(),
            invited_by: (*invited_by).to_string(),
        }),
        _ => None,
    }
}
