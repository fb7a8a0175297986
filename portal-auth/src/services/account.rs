//! Account flows built on the token manager: email verification, password
//! reset, two-factor codes and invitations.

use std::sync::Arc;

use crate::models::{InviteClaim, IssuedToken, TokenKind};
use crate::services::{Clock, EmailProvider, ServiceError, TokenService, UserDirectory};
use crate::utils::{check_password_strength, hash_password, normalize_email, Password};

/// Result of consuming an email verification link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailVerificationOutcome {
    Verified,
    AlreadyVerified,
}

#[derive(Clone)]
pub struct AccountService {
    tokens: TokenService,
    users: Arc<dyn UserDirectory>,
    email: Arc<dyn EmailProvider>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl AccountService {
    pub fn new(
        tokens: TokenService,
        users: Arc<dyn UserDirectory>,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
        base_url: String,
    ) -> Self {
        Self {
            tokens,
            users,
            email,
            clock,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Unknown addresses succeed silently so callers cannot probe membership.
    pub async fn resend_verification_email(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::info!(email = %email, "Verification resend for unknown email");
            return Ok(());
        };

        if user.is_email_verified() {
            return Err(ServiceError::EmailAlreadyVerified);
        }

        let issued = self
            .tokens
            .create_verification_token(&email, TokenKind::EmailVerification)
            .await?;

        self.email
            .send_verification_email(&email, &issued.token, &self.base_url)
            .await
    }

    pub async fn verify_email(
        &self,
        token: &str,
    ) -> Result<EmailVerificationOutcome, ServiceError> {
        let identifier = self
            .tokens
            .verify_token(token)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let user = self
            .users
            .find_by_email(&identifier)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        if user.is_email_verified() {
            return Ok(EmailVerificationOutcome::AlreadyVerified);
        }

        self.users
            .mark_email_verified(user.id, self.clock.now())
            .await?;

        tracing::info!(user_id = %user.id, "Email verified");

        if let Err(e) = self
            .email
            .send_welcome_email(&user.email, user.display_name(), &self.base_url)
            .await
        {
            tracing::error!(error = %e, user_id = %user.id, "Failed to send welcome email");
        }

        Ok(EmailVerificationOutcome::Verified)
    }

    /// Always succeeds from the caller's point of view; a link is mailed
    /// only when the account exists.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);

        let Some(issued) = self.tokens.create_password_reset_token(&email).await? else {
            return Ok(());
        };

        if let Err(e) = self
            .email
            .send_password_reset_email(&email, &issued.token, &self.base_url)
            .await
        {
            tracing::error!(error = %e, email = %email, "Failed to send password reset email");
        }

        Ok(())
    }

    /// The new password is checked before the token is consumed, so a weak
    /// password does not burn the link.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &Password,
        confirm_password: &Password,
    ) -> Result<(), ServiceError> {
        if password.as_str() != confirm_password.as_str() {
            return Err(ServiceError::Validation("Passwords do not match".to_string()));
        }

        let assessment = check_password_strength(password.as_str());
        if !assessment.is_valid {
            return Err(ServiceError::WeakPassword(assessment.feedback));
        }

        let identifier = self
            .tokens
            .verify_token(token)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let user = self
            .users
            .find_by_email(&identifier)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let hash = hash_password(password)?;
        self.users
            .update_password_hash(user.id, &hash, self.clock.now())
            .await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    /// Codes go only to known accounts; the response is the same either way.
    pub async fn send_two_factor_code(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);

        if self.users.find_by_email(&email).await?.is_none() {
            tracing::info!(email = %email, "Two-factor code requested for unknown email");
            return Ok(());
        }

        let issued = self.tokens.create_two_factor_token(&email).await?;
        if let Err(e) = self.email.send_two_factor_code(&email, &issued.code).await {
            tracing::error!(error = %e, email = %email, "Failed to send two-factor code");
        }

        Ok(())
    }

    pub async fn verify_two_factor_code(&self, email: &str, code: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);

        if self.tokens.verify_two_factor_code(&email, code).await? {
            Ok(())
        } else {
            Err(ServiceError::InvalidCode)
        }
    }

    pub async fn create_invite(
        &self,
        email: &str,
        invited_by: &str,
    ) -> Result<IssuedToken, ServiceError> {
        let email = normalize_email(email);
        let invited_by = invited_by.trim();

        if email.contains(':') || invited_by.contains(':') {
            return Err(ServiceError::Validation(
                "Email and inviter must not contain ':'".to_string(),
            ));
        }
        if email.is_empty() || invited_by.is_empty() {
            return Err(ServiceError::Validation(
                "Email and inviter are required".to_string(),
            ));
        }

        let issued = self.tokens.create_invite_token(&email, invited_by).await?;

        self.email
            .send_invite_email(&email, &issued.token, invited_by, &self.base_url)
            .await?;

        Ok(issued)
    }

    pub async fn accept_invite(&self, token: &str) -> Result<InviteClaim, ServiceError> {
        self.tokens
            .verify_invite_token(token)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64, ServiceError> {
        self.tokens.cleanup_expired_tokens().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserAccount;
    use crate::services::{
        InMemoryUserDirectory, InMemoryVerificationStore, ManualClock, MockEmailService, SentEmail,
    };
    use crate::utils::{verify_password, PasswordHashString};
    use async_trait::async_trait;
    use chrono::Duration;

    /// Delivers everything except the welcome message.
    struct NoWelcomeMailer(MockEmailService);

    #[async_trait]
    impl EmailProvider for NoWelcomeMailer {
        async fn send_verification_email(
            &self,
            to_email: &str,
            token: &str,
            base_url: &str,
        ) -> Result<(), ServiceError> {
            self.0.send_verification_email(to_email, token, base_url).await
        }

        async fn send_password_reset_email(
            &self,
            to_email: &str,
            token: &str,
            base_url: &str,
        ) -> Result<(), ServiceError> {
            self.0.send_password_reset_email(to_email, token, base_url).await
        }

        async fn send_two_factor_code(&self, to_email: &str, code: &str) -> Result<(), ServiceError> {
            self.0.send_two_factor_code(to_email, code).await
        }

        async fn send_welcome_email(
            &self,
            _to_email: &str,
            _name: &str,
            _base_url: &str,
        ) -> Result<(), ServiceError> {
            Err(ServiceError::Email("relay refused".to_string()))
        }

        async fn send_invite_email(
            &self,
            to_email: &str,
            token: &str,
            invited_by: &str,
            base_url: &str,
        ) -> Result<(), ServiceError> {
            self.0
                .send_invite_email(to_email, token, invited_by, base_url)
                .await
        }
    }

    struct Fixture {
        accounts: AccountService,
        users: Arc<InMemoryUserDirectory>,
        mailer: Arc<MockEmailService>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryVerificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let mailer = Arc::new(MockEmailService::new());
        let clock = Arc::new(ManualClock::default());
        let tokens = TokenService::new(store, users.clone(), clock.clone());
        let accounts = AccountService::new(
            tokens,
            users.clone(),
            mailer.clone(),
            clock.clone(),
            "http://localhost:3000/".to_string(),
        );
        Fixture {
            accounts,
            users,
            mailer,
            clock,
        }
    }

    fn member(f: &Fixture, email: &str) -> UserAccount {
        let user = UserAccount::new(email.to_string(), Some("Member".to_string()));
        f.users.insert(user.clone());
        user
    }

    #[tokio::test]
    async fn test_resend_then_verify_email() {
        let f = fixture();
        let user = member(&f, "member@example.com");

        f.accounts
            .resend_verification_email(" Member@Example.com ")
            .await
            .unwrap();
        let token = f
            .mailer
            .last_secret_to("member@example.com")
            .unwrap();

        let outcome = f.accounts.verify_email(&token).await.unwrap();
        assert_eq!(outcome, EmailVerificationOutcome::Verified);

        let stored = f.users.get(user.id).unwrap();
        assert!(stored.is_email_verified());
        assert_eq!(stored.status, "ACTIVE");
        assert!(matches!(
            f.mailer.last_to("member@example.com"),
            Some(SentEmail::Welcome { name, .. }) if name == "Member"
        ));

        let again = f.accounts.verify_email(&token).await;
        assert!(matches!(again, Err(ServiceError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_welcome_failure_does_not_block_verification() {
        let store = Arc::new(InMemoryVerificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let mailer = Arc::new(NoWelcomeMailer(MockEmailService::new()));
        let clock = Arc::new(ManualClock::default());
        let tokens = TokenService::new(store, users.clone(), clock.clone());
        let accounts = AccountService::new(
            tokens,
            users.clone(),
            mailer.clone(),
            clock,
            "http://localhost:3000".to_string(),
        );

        let user = UserAccount::new("member@example.com".to_string(), None);
        users.insert(user.clone());

        accounts
            .resend_verification_email("member@example.com")
            .await
            .unwrap();
        let token = mailer.0.last_secret_to("member@example.com").unwrap();

        let outcome = accounts.verify_email(&token).await.unwrap();
        assert_eq!(outcome, EmailVerificationOutcome::Verified);
        assert!(users.get(user.id).unwrap().is_email_verified());
    }

    #[tokio::test]
    async fn test_resend_for_verified_user_conflicts() {
        let f = fixture();
        let mut user = UserAccount::new("member@example.com".to_string(), None);
        user.email_verified = Some(f.clock.now());
        f.users.insert(user);

        let result = f.accounts.resend_verification_email("member@example.com").await;
        assert!(matches!(result, Err(ServiceError::EmailAlreadyVerified)));
    }

    #[tokio::test]
    async fn test_resend_for_unknown_email_is_silent() {
        let f = fixture();
        f.accounts
            .resend_verification_email("ghost@example.com")
            .await
            .unwrap();
        assert!(f.mailer.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_round_trip() {
        let f = fixture();
        let user = member(&f, "member@example.com");

        f.accounts
            .request_password_reset("member@example.com")
            .await
            .unwrap();
        let sent = f.mailer.last_to("member@example.com").unwrap();
        assert!(matches!(sent, SentEmail::PasswordReset { .. }));

        let password = Password::new("N3w-Secure!Pass".to_string());
        f.accounts
            .confirm_password_reset(sent.secret().unwrap(), &password, &password.clone())
            .await
            .unwrap();

        let stored = f.users.get(user.id).unwrap();
        assert_eq!(stored.updated_at, f.clock.now());
        let hash = stored.password_hash.unwrap();
        assert!(verify_password(&password, &PasswordHashString::new(hash)).is_ok());
    }

    #[tokio::test]
    async fn test_weak_password_keeps_reset_token() {
        let f = fixture();
        member(&f, "member@example.com");
        f.accounts
            .request_password_reset("member@example.com")
            .await
            .unwrap();
        let token = f
            .mailer
            .last_secret_to("member@example.com")
            .unwrap();

        let weak = Password::new("password".to_string());
        let result = f.accounts.confirm_password_reset(&token, &weak, &weak).await;
        assert!(matches!(result, Err(ServiceError::WeakPassword(_))));

        let strong = Password::new("Tr0ub4dor&3XyZ".to_string());
        f.accounts
            .confirm_password_reset(&token, &strong, &strong)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_confirmation_is_rejected() {
        let f = fixture();
        let result = f
            .accounts
            .confirm_password_reset(
                "anything",
                &Password::new("Tr0ub4dor&3XyZ".to_string()),
                &Password::new("Tr0ub4dor&3XyQ".to_string()),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reset_request_for_unknown_email_sends_nothing() {
        let f = fixture();
        f.accounts
            .request_password_reset("ghost@example.com")
            .await
            .unwrap();
        assert!(f.mailer.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_two_factor_flow() {
        let f = fixture();
        member(&f, "member@example.com");

        f.accounts
            .send_two_factor_code("member@example.com")
            .await
            .unwrap();
        let code = f
            .mailer
            .last_secret_to("member@example.com")
            .unwrap();

        f.accounts
            .verify_two_factor_code("member@example.com", &code)
            .await
            .unwrap();

        let replay = f
            .accounts
            .verify_two_factor_code("member@example.com", &code)
            .await;
        assert!(matches!(replay, Err(ServiceError::InvalidCode)));
    }

    #[tokio::test]
    async fn test_two_factor_code_expires() {
        let f = fixture();
        member(&f, "member@example.com");
        f.accounts
            .send_two_factor_code("member@example.com")
            .await
            .unwrap();
        let code = f
            .mailer
            .last_secret_to("member@example.com")
            .unwrap();

        f.clock.advance(Duration::minutes(11));

        let result = f
            .accounts
            .verify_two_factor_code("member@example.com", &code)
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidCode)));
    }

    #[tokio::test]
    async fn test_invite_accept() {
        let f = fixture();
        let issued = f
            .accounts
            .create_invite("Guest@Example.com", "admin-1")
            .await
            .unwrap();

        let claim = f.accounts.accept_invite(&issued.token).await.unwrap();
        assert_eq!(claim.email, "guest@example.com");
        assert_eq!(claim.invited_by, "admin-1");

        let again = f.accounts.accept_invite(&issued.token).await;
        assert!(matches!(again, Err(ServiceError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_invite_rejects_colon() {
        let f = fixture();
        let result = f.accounts.create_invite("guest@example.com", "team:admin").await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
