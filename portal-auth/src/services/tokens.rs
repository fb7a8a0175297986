//! Single-use secret lifecycle: issue, consume, expire.
//!
//! Records live only in the [`VerificationStore`]; nothing is cached here.
//! A miss on any verify path is `None`, never an error; only store faults
//! surface as `Err`.

use rand::{rngs::OsRng, Rng, RngCore};
use std::sync::Arc;

use crate::models::{
    invite_identifier, parse_invite_identifier, two_factor_identifier, InviteClaim, IssuedCode,
    IssuedToken, TokenKind, VerificationRecord, INVITE_PREFIX,
};
use crate::services::{Clock, ServiceError, UserDirectory, VerificationStore};

/// Default entropy for URL tokens: 32 bytes, 64 hex characters.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Hex-encode `byte_length` bytes from the OS CSPRNG.
pub fn generate_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Six-digit numeric code, uniform over `[100000, 999999]`.
pub fn generate_verification_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn VerificationStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            users,
            clock,
        }
    }

    /// Issue a URL token for `identifier`, replacing any record filed under
    /// exactly that identifier.
    pub async fn create_verification_token(
        &self,
        identifier: &str,
        kind: TokenKind,
    ) -> Result<IssuedToken, ServiceError> {
        let token = generate_token(DEFAULT_TOKEN_BYTES);
        let expires = self.clock.now() + kind.ttl();

        self.store
            .replace(&VerificationRecord::new(
                identifier.to_string(),
                token.clone(),
                expires,
            ))
            .await?;

        tracing::info!(
            identifier = %identifier,
            kind = kind.as_str(),
            expires = %expires,
            "Verification token issued"
        );

        Ok(IssuedToken { token, expires })
    }

    /// Consume a live token, returning the identifier it was filed under.
    pub async fn verify_token(&self, token: &str) -> Result<Option<String>, ServiceError> {
        let now = self.clock.now();
        let Some(record) = self.store.find_live_by_token(token, now).await? else {
            tracing::debug!("Token lookup missed");
            return Ok(None);
        };

        if !self.store.delete(&record.identifier, &record.token).await? {
            // Another request consumed it between lookup and delete.
            tracing::warn!(identifier = %record.identifier, "Token already consumed");
            return Ok(None);
        }

        tracing::info!(identifier = %record.identifier, "Verification token consumed");
        Ok(Some(record.identifier))
    }

    /// `None` without side effects when no account exists for `email`.
    pub async fn create_password_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<IssuedToken>, ServiceError> {
        if self.users.find_by_email(email).await?.is_none() {
            tracing::debug!(email = %email, "Password reset requested for unknown email");
            return Ok(None);
        }

        self.create_verification_token(email, TokenKind::PasswordReset)
            .await
            .map(Some)
    }

    pub async fn create_two_factor_token(&self, email: &str) -> Result<IssuedCode, ServiceError> {
        let identifier = two_factor_identifier(email);
        let code = generate_verification_code();
        let expires = self.clock.now() + TokenKind::TwoFactor.ttl();

        self.store
            .replace(&VerificationRecord::new(
                identifier.clone(),
                code.clone(),
                expires,
            ))
            .await?;

        tracing::info!(identifier = %identifier, expires = %expires, "Two-factor code issued");

        Ok(IssuedCode { code, expires })
    }

    /// True only when a live code filed under exactly `2fa:<email>` was
    /// consumed by this call. Codes belonging to other addresses are left
    /// untouched.
    pub async fn verify_two_factor_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<bool, ServiceError> {
        let identifier = two_factor_identifier(email);
        let now = self.clock.now();

        let Some(record) = self.store.find_live(&identifier, code, now).await? else {
            tracing::debug!(identifier = %identifier, "Two-factor code lookup missed");
            return Ok(false);
        };

        let consumed = self.store.delete(&record.identifier, &record.token).await?;
        if consumed {
            tracing::info!(identifier = %identifier, "Two-factor code verified");
        }
        Ok(consumed)
    }

    /// Invites accumulate; earlier invites for the same pair stay valid.
    pub async fn create_invite_token(
        &self,
        email: &str,
        invited_by: &str,
    ) -> Result<IssuedToken, ServiceError> {
        let identifier = invite_identifier(email, invited_by);
        let token = generate_token(DEFAULT_TOKEN_BYTES);
        let expires = self.clock.now() + TokenKind::Invite.ttl();

        self.store
            .insert(&VerificationRecord::new(
                identifier.clone(),
                token.clone(),
                expires,
            ))
            .await?;

        tracing::info!(identifier = %identifier, expires = %expires, "Invite token issued");

        Ok(IssuedToken { token, expires })
    }

    pub async fn verify_invite_token(
        &self,
        token: &str,
    ) -> Result<Option<InviteClaim>, ServiceError> {
        let now = self.clock.now();
        let Some(record) = self
            .store
            .find_live_by_token_and_prefix(token, INVITE_PREFIX, now)
            .await?
        else {
            tracing::debug!("Invite token lookup missed");
            return Ok(None);
        };

        let Some(claim) = parse_invite_identifier(&record.identifier) else {
            tracing::warn!(identifier = %record.identifier, "Malformed invite identifier");
            return Ok(None);
        };

        if !self.store.delete(&record.identifier, &record.token).await? {
            tracing::warn!(identifier = %record.identifier, "Invite token already consumed");
            return Ok(None);
        }

        tracing::info!(
            email = %claim.email,
            invited_by = %claim.invited_by,
            "Invite token consumed"
        );
        Ok(Some(claim))
    }

    /// Delete every record whose expiry is strictly in the past.
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, ServiceError> {
        let deleted = self.store.delete_expired(self.clock.now()).await?;
        tracing::info!(deleted, "Expired verification tokens removed");
        Ok(deleted)
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.health_check().await
    }
}
