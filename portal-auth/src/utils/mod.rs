pub mod password;
pub mod validation;

pub use password::{
    check_password_strength, generate_random_password, hash_password, verify_password, Password,
    PasswordAssessment, PasswordHashString, PasswordStrength,
};
pub use validation::{normalize_email, ValidatedJson};
