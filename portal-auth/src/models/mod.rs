pub mod user;
pub mod verification_token;

pub use user::{UserAccount, UserStatus};
pub use verification_token::{
    invite_identifier, parse_invite_identifier, two_factor_identifier, InviteClaim, IssuedCode,
    IssuedToken, TokenKind, VerificationRecord, INVITE_PREFIX, TWO_FACTOR_PREFIX,
};
