use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_GENERATED_LENGTH: usize = 16;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Case-insensitive substrings that mark a password as guessable.
const COMMON_SUBSTRINGS: [&str; 3] = ["password", "qwerty", "abc123"];

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hash a password using Argon2
///
/// Uses Argon2id variant with secure default parameters.
/// Salt is automatically generated and included in the hash.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a hash using constant-time comparison
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

/// Strength buckets, weakest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => PasswordStrength::Weak,
            3 => PasswordStrength::Fair,
            4 => PasswordStrength::Good,
            5 => PasswordStrength::Strong,
            _ => PasswordStrength::VeryStrong,
        }
    }
}

/// Result of [`check_password_strength`].
///
/// `is_valid` is the minimum policy (length and all four character classes)
/// and ignores the common-pattern penalty, so a password can be valid yet
/// rated weak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PasswordAssessment {
    #[schema(example = 6)]
    pub score: u32,
    pub strength: PasswordStrength,
    #[schema(example = json!(["Add special characters"]))]
    pub feedback: Vec<String>,
    #[schema(example = true)]
    pub is_valid: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct CharacterClasses {
    lowercase: bool,
    uppercase: bool,
    digit: bool,
    symbol: bool,
}

impl CharacterClasses {
    fn scan(password: &str) -> Self {
        password.chars().fold(Self::default(), |mut classes, c| {
            match c {
                'a'..='z' => classes.lowercase = true,
                'A'..='Z' => classes.uppercase = true,
                '0'..='9' => classes.digit = true,
                _ => classes.symbol = true,
            }
            classes
        })
    }

    fn all(&self) -> bool {
        self.lowercase && self.uppercase && self.digit && self.symbol
    }
}

/// Score a candidate password. Pure; accepts any input, including "".
pub fn check_password_strength(password: &str) -> PasswordAssessment {
    let mut feedback = Vec::new();
    let mut score: u32 = 0;
    let length = password.chars().count();

    if length >= MIN_PASSWORD_LENGTH {
        score += 1;
    } else {
        feedback.push(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if length >= 12 {
        score += 1;
    }
    if length >= 16 {
        score += 1;
    }

    let classes = CharacterClasses::scan(password);
    let checks = [
        (classes.lowercase, "Add lowercase letters"),
        (classes.uppercase, "Add uppercase letters"),
        (classes.digit, "Add numbers"),
        (classes.symbol, "Add special characters"),
    ];
    for (present, message) in checks {
        if present {
            score += 1;
        } else {
            feedback.push(message.to_string());
        }
    }

    if has_common_pattern(password) {
        score = score.saturating_sub(2);
        feedback.push("Avoid common patterns".to_string());
    }

    PasswordAssessment {
        score,
        strength: PasswordStrength::from_score(score),
        feedback,
        is_valid: length >= MIN_PASSWORD_LENGTH && classes.all(),
    }
}

fn has_common_pattern(password: &str) -> bool {
    let lowered = password.to_lowercase();
    password.starts_with("123")
        || COMMON_SUBSTRINGS.iter().any(|p| lowered.contains(p))
        || has_repeated_run(password, 3)
}

/// True when some character occurs `run` times in a row. Line breaks never
/// count as part of a run.
fn has_repeated_run(password: &str, run: usize) -> bool {
    let mut previous: Option<char> = None;
    let mut count = 0;

    for c in password.chars() {
        if matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
            previous = None;
            count = 0;
            continue;
        }
        if previous == Some(c) {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

/// Random password with at least one character from each class.
///
/// Lengths below 4 are raised to 4 so every class fits.
pub fn generate_random_password(length: usize) -> String {
    let length = length.max(4);
    let mut rng = rand::rngs::OsRng;
    let alphabet: Vec<u8> = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS].concat();

    let mut bytes: Vec<u8> = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS]
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();

    while bytes.len() < length {
        bytes.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }

    bytes.shuffle(&mut rng);
    bytes.into_iter().map(char::from).collect()
}
