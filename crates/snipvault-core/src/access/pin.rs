//! PIN and emergency-code handling.
//!
//! Both secrets are stored only as Argon2id PHC strings. The emergency code
//! is twelve characters from an unambiguous alphabet, shown to the user in
//! groups of four (`ABCD-EFGH-JKLM`).

use argon2::password_hash::{
    Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::error::{Field, Result, SnipError};

pub const MIN_PIN_DIGITS: usize = 4;
pub const MAX_PIN_DIGITS: usize = 8;

/// Characters used in emergency codes (no I, O, 0 or 1).
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 12;
const CODE_GROUP: usize = 4;
const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashCost {
    /// Smallest cost Argon2 accepts. Only suitable for tests.
    pub const MINIMUM: HashCost = HashCost {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Format check for a PIN. Usable as an interactive input validator.
pub fn validate_pin_format(pin: &str) -> std::result::Result<(), String> {
    let len = pin.chars().count();
    if !(MIN_PIN_DIGITS..=MAX_PIN_DIGITS).contains(&len) {
        return Err(format!(
            "PIN must be {} to {} digits",
            MIN_PIN_DIGITS, MAX_PIN_DIGITS
        ));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err("PIN may only contain digits".to_string());
    }
    Ok(())
}

/// Format check for an emergency code. Case, spaces and dashes are ignored.
pub fn validate_emergency_code_format(code: &str) -> std::result::Result<(), String> {
    let normalized = normalize_emergency_code(code);
    if normalized.len() != CODE_LEN
        || !normalized.bytes().all(|b| CODE_ALPHABET.contains(&b))
    {
        return Err("Emergency code looks like XXXX-XXXX-XXXX".to_string());
    }
    Ok(())
}

pub(crate) fn check_pin(pin: &str) -> Result<()> {
    validate_pin_format(pin).map_err(|reason| SnipError::validation(Field::Pin, reason))
}

pub(crate) fn check_emergency_code(code: &str) -> Result<()> {
    validate_emergency_code_format(code)
        .map_err(|reason| SnipError::validation(Field::EmergencyCode, reason))
}

/// Uppercase and strip separators.
pub fn normalize_emergency_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Generate a fresh emergency code in display form.
pub fn generate_emergency_code() -> Result<SecretString> {
    let mut bytes = Zeroizing::new([0u8; CODE_LEN]);
    getrandom::getrandom(bytes.as_mut())
        .map_err(|e| SnipError::Vault(format!("Failed to generate emergency code: {}", e)))?;

    let mut code = String::with_capacity(CODE_LEN + CODE_LEN / CODE_GROUP);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 && i % CODE_GROUP == 0 {
            code.push('-');
        }
        code.push(CODE_ALPHABET[(*byte as usize) % CODE_ALPHABET.len()] as char);
    }
    Ok(SecretString::from(code))
}

/// Hash a secret into a PHC string.
pub fn hash_secret(secret: &str, cost: HashCost) -> Result<String> {
    let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
        .map_err(|e| SnipError::Config(format!("Invalid Argon2 parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut salt_bytes = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| SnipError::Vault(format!("Failed to generate salt: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| SnipError::Vault(format!("Failed to encode salt: {}", e)))?;

    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SnipError::Vault(format!("Hashing failed: {}", e)))
}

/// Check a secret against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; errors only if the stored hash is
/// unreadable.
pub fn verify_secret(secret: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| SnipError::Vault(format!("Stored hash is corrupt: {}", e)))?;
    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(SnipError::Vault(format!("Verification failed: {}", e))),
    }
}
