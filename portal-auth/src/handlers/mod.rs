pub mod admin;
pub mod invites;
pub mod password;
pub mod password_reset;
pub mod two_factor;
pub mod verification;
