use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::services::ServiceError;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError>;

    async fn send_two_factor_code(&self, to_email: &str, code: &str) -> Result<(), ServiceError>;

    /// Sent once an address has been verified.
    async fn send_welcome_email(
        &self,
        to_email: &str,
        name: &str,
        base_url: &str,
    ) -> Result<(), ServiceError>;

    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        invited_by: &str,
        base_url: &str,
    ) -> Result<(), ServiceError>;
}

// Links open pages of the portal front end, which call back into this API.

pub fn verification_link(app_url: &str, token: &str) -> String {
    format!("{}/verify-email?token={}", app_url, token)
}

pub fn reset_link(app_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", app_url, token)
}

pub fn invite_link(app_url: &str, token: &str) -> String {
    format!("{}/accept-invite?token={}", app_url, token)
}

pub fn login_link(app_url: &str) -> String {
    format!("{}/login", app_url)
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_address.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), ServiceError> {
        let from = self
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?;
        let to = to_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        // SMTP I/O is blocking; keep it off the async workers.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::Email(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let link = verification_link(base_url, verification_token);

        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Please verify your email</h2>
        <p>Click the link below to verify your email address:</p>
        <p><a href="{link}">Verify Email</a></p>
        <p style="color: #666; font-size: 12px;">This link will expire in 24 hours. If you didn't request this, please ignore this email.</p>
    </body>
</html>"#
        );
        let plain_body = format!(
            "Please verify your email\n\nVisit the following link to verify your email address:\n\n{link}\n\nThis link will expire in 24 hours. If you didn't request this, please ignore this email."
        );

        self.send_email(to_email, "Verify Your Email Address", plain_body, html_body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let link = reset_link(base_url, reset_token);

        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Password Reset Request</h2>
        <p>We received a request to reset your password. Click the link below to set a new password:</p>
        <p><a href="{link}">Reset Password</a></p>
        <p style="color: #666; font-size: 12px;">This link will expire in 1 hour. If you didn't request this, please ignore this email.</p>
    </body>
</html>"#
        );
        let plain_body = format!(
            "Password Reset Request\n\nVisit the following link to set a new password:\n\n{link}\n\nThis link will expire in 1 hour. If you didn't request this, please ignore this email."
        );

        self.send_email(to_email, "Reset Your Password", plain_body, html_body)
            .await
    }

    async fn send_two_factor_code(&self, to_email: &str, code: &str) -> Result<(), ServiceError> {
        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your sign-in code</h2>
        <p style="font-size: 24px; letter-spacing: 4px;"><strong>{code}</strong></p>
        <p style="color: #666; font-size: 12px;">This code will expire in 10 minutes.</p>
    </body>
</html>"#
        );
        let plain_body =
            format!("Your sign-in code is {code}\n\nThis code will expire in 10 minutes.");

        self.send_email(to_email, "Your Sign-in Code", plain_body, html_body)
            .await
    }

    async fn send_welcome_email(
        &self,
        to_email: &str,
        name: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let link = login_link(base_url);

        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Welcome, {name}!</h2>
        <p>Your email address is verified and your account is ready.</p>
        <p><a href="{link}">Sign in</a></p>
    </body>
</html>"#
        );
        let plain_body = format!(
            "Welcome, {name}!\n\nYour email address is verified and your account is ready. Sign in at:\n\n{link}"
        );

        self.send_email(to_email, "Welcome to the Community Portal", plain_body, html_body)
            .await
    }

    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        invited_by: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let link = invite_link(base_url, invite_token);

        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>You're invited</h2>
        <p>{invited_by} invited you to join the community portal.</p>
        <p><a href="{link}">Accept Invitation</a></p>
        <p style="color: #666; font-size: 12px;">This invitation will expire in 7 days.</p>
    </body>
</html>"#
        );
        let plain_body = format!(
            "You're invited\n\n{invited_by} invited you to join the community portal:\n\n{link}\n\nThis invitation will expire in 7 days."
        );

        self.send_email(to_email, "You're Invited", plain_body, html_body)
            .await
    }
}

/// Message captured by [`MockEmailService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Verification { to: String, token: String, link: String },
    PasswordReset { to: String, token: String, link: String },
    TwoFactorCode { to: String, code: String },
    Welcome { to: String, name: String, link: String },
    Invite { to: String, token: String, invited_by: String, link: String },
}

impl SentEmail {
    pub fn to(&self) -> &str {
        match self {
            SentEmail::Verification { to, .. }
            | SentEmail::PasswordReset { to, .. }
            | SentEmail::TwoFactorCode { to, .. }
            | SentEmail::Welcome { to, .. }
            | SentEmail::Invite { to, .. } => to,
        }
    }

    /// The token or code carried by the message, if any.
    pub fn secret(&self) -> Option<&str> {
        match self {
            SentEmail::Verification { token, .. }
            | SentEmail::PasswordReset { token, .. }
            | SentEmail::Invite { token, .. } => Some(token),
            SentEmail::TwoFactorCode { code, .. } => Some(code),
            SentEmail::Welcome { .. } => None,
        }
    }
}

/// Messages kept before the oldest are dropped.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Records messages instead of sending them. The outbox is bounded so a
/// long-running process without SMTP does not grow without limit.
#[derive(Debug)]
pub struct MockEmailService {
    outbox: Mutex<VecDeque<SentEmail>>,
    capacity: usize,
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outbox: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn outbox(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|o| o.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last_to(&self, email: &str) -> Option<SentEmail> {
        self.outbox().into_iter().rev().find(|m| m.to() == email)
    }

    /// Most recent token or code mailed to `email`.
    pub fn last_secret_to(&self, email: &str) -> Option<String> {
        self.outbox()
            .into_iter()
            .rev()
            .filter(|m| m.to() == email)
            .find_map(|m| m.secret().map(str::to_string))
    }

    fn record(&self, email: SentEmail) -> Result<(), ServiceError> {
        tracing::info!(to = %email.to(), "Email not delivered; SMTP is not configured");
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|e| ServiceError::Email(e.to_string()))?;
        if outbox.len() == self.capacity {
            outbox.pop_front();
        }
        outbox.push_back(email);
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::Verification {
            to: to_email.to_string(),
            token: verification_token.to_string(),
            link: verification_link(base_url, verification_token),
        })
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::PasswordReset {
            to: to_email.to_string(),
            token: reset_token.to_string(),
            link: reset_link(base_url, reset_token),
        })
    }

    async fn send_two_factor_code(&self, to_email: &str, code: &str) -> Result<(), ServiceError> {
        self.record(SentEmail::TwoFactorCode {
            to: to_email.to_string(),
            code: code.to_string(),
        })
    }

    async fn send_welcome_email(
        &self,
        to_email: &str,
        name: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::Welcome {
            to: to_email.to_string(),
            name: name.to_string(),
            link: login_link(base_url),
        })
    }

    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        invited_by: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::Invite {
            to: to_email.to_string(),
            token: invite_token.to_string(),
            invited_by: invited_by.to_string(),
            link: invite_link(base_url, invite_token),
        })
    }
}
