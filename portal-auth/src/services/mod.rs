pub mod account;
pub mod clock;
pub mod database;
pub mod email;
pub mod error;
pub mod store;
pub mod sweeper;
pub mod tokens;
pub mod users;

pub use account::{AccountService, EmailVerificationOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use email::{EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::{ServiceError, INVALID_OR_EXPIRED};
pub use store::{InMemoryVerificationStore, VerificationStore};
pub use sweeper::spawn_token_sweeper;
pub use tokens::{generate_token, generate_verification_code, TokenService, DEFAULT_TOKEN_BYTES};
pub use users::{InMemoryUserDirectory, UserDirectory};
