//! Subject Field Sanitization
//!
//! Turns untrusted form input into bounded, character-filtered subject fields.
//! Nothing in this module performs I/O; every function is deterministic.
//!
//! # Character Policy
//! - ASCII letters and digits are always allowed
//! - The symbols in [`SanitizePolicy::allowed_symbols`] are allowed (default ` .-_*@`)
//! - Non-ASCII letters are allowed only when [`SanitizePolicy::allow_unicode_letters`] is set
//!
//! The asterisk stays in the default set so wildcard Common Names such as
//! `*.example.com` survive sanitization.
//!
//! # Key Sizes
//! Key sizes go through [`validate_key_size`], a closed allow-list of
//! 2048, 3072 and 4096 bits.

use crate::error::ValidationError;
use serde::Deserialize;

pub const DEFAULT_ALLOWED_SYMBOLS: &str = " .-_*@";
pub const DEFAULT_MAX_LENGTH: usize = 64;
pub const COMMON_NAME_MAX_LENGTH: usize = 253;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const ALLOWED_KEY_SIZES: [u32; 3] = [2048, 3072, 4096];
pub const DEFAULT_KEY_SIZE: &str = "2048";

/// Symbols that would break the `/ATTR=value` subject syntax or a file path.
const FORBIDDEN_SYMBOLS: [char; 3] = ['/', '\\', '='];

/// A subject field that passed through the [`Sanitizer`].
///
/// The inner string is private to this module, so the only way to obtain one
/// is through [`Sanitizer::sanitize`] and friends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedField(String);

impl SanitizedField {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SanitizedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configurable character class and length ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SanitizePolicy {
    pub allowed_symbols: String,
    pub allow_unicode_letters: bool,
    pub default_max_length: usize,
    pub common_name_max_length: usize,
    pub email_max_length: usize,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            allowed_symbols: DEFAULT_ALLOWED_SYMBOLS.to_string(),
            allow_unicode_letters: false,
            default_max_length: DEFAULT_MAX_LENGTH,
            common_name_max_length: COMMON_NAME_MAX_LENGTH,
            email_max_length: EMAIL_MAX_LENGTH,
        }
    }
}

impl SanitizePolicy {
    /// Reject policies that would let subject separators or control
    /// characters through.
    ///
    /// # Returns
    /// * `Ok(())` - Policy is usable
    /// * `Err(String)` - Human readable reason the policy is invalid
    pub fn validate(&self) -> Result<(), String> {
        if let Some(c) = self
            .allowed_symbols
            .chars()
            .find(|c| FORBIDDEN_SYMBOLS.contains(c) || c.is_control())
        {
            return Err(format!(
                "allowed_symbols may not contain {:?}",
                c.escape_default().to_string()
            ));
        }
        if self.default_max_length == 0
            || self.common_name_max_length == 0
            || self.email_max_length == 0
        {
            return Err("field length ceilings must be greater than zero".to_string());
        }
        Ok(())
    }

    fn allows(&self, c: char) -> bool {
        if c.is_ascii_alphanumeric() {
            return true;
        }
        if self.allowed_symbols.contains(c) {
            return true;
        }
        self.allow_unicode_letters && !c.is_ascii() && c.is_alphabetic()
    }
}

/// Raw subject fields as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectRequest {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub email: String,
    pub key_size: String,
}

/// Subject fields after sanitization. Empty fields are omitted later by the
/// subject builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedSubject {
    pub common_name: SanitizedField,
    pub organization: SanitizedField,
    pub organizational_unit: SanitizedField,
    pub city: SanitizedField,
    pub state: SanitizedField,
    pub country: SanitizedField,
    pub email: SanitizedField,
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    policy: SanitizePolicy,
}

impl Sanitizer {
    pub fn new(policy: SanitizePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SanitizePolicy {
        &self.policy
    }

    /// Strip every disallowed character, then keep at most `max_length`
    /// characters from the left. Never fails.
    pub fn sanitize(&self, raw: &str, max_length: usize) -> SanitizedField {
        let cleaned: String = raw
            .chars()
            .filter(|c| self.policy.allows(*c))
            .take(max_length)
            .collect();
        SanitizedField(cleaned)
    }

    /// Country codes are upper-cased and only kept when exactly two ASCII
    /// letters remain. No lookup against a real country table is done.
    pub fn sanitize_country(&self, raw: &str) -> SanitizedField {
        let field = self.sanitize(raw, self.policy.default_max_length);
        let upper = field.0.to_ascii_uppercase();
        if upper.len() == 2 && upper.chars().all(|c| c.is_ascii_alphabetic()) {
            SanitizedField(upper)
        } else {
            SanitizedField::default()
        }
    }

    /// Sanitize every subject field of a request with its own ceiling.
    pub fn sanitize_request(&self, request: &SubjectRequest) -> SanitizedSubject {
        let default_max = self.policy.default_max_length;
        SanitizedSubject {
            common_name: self.sanitize(&request.common_name, self.policy.common_name_max_length),
            organization: self.sanitize(&request.organization, default_max),
            organizational_unit: self.sanitize(&request.organizational_unit, default_max),
            city: self.sanitize(&request.city, default_max),
            state: self.sanitize(&request.state, default_max),
            country: self.sanitize_country(&request.country),
            email: self.sanitize(&request.email, self.policy.email_max_length),
        }
    }
}

/// Parse a requested RSA key size against the closed allow-list.
///
/// The raw value is never forwarded anywhere; only the parsed integer is.
///
/// # Arguments
/// * `raw` - Key size exactly as submitted (no trimming is applied)
///
/// # Returns
/// * `Ok(u32)` - One of 2048, 3072 or 4096
/// * `Err(ValidationError::InvalidKeySize)` - Anything else
pub fn validate_key_size(raw: &str) -> Result<u32, ValidationError> {
    let parsed: i64 = raw.parse().map_err(|_| ValidationError::InvalidKeySize)?;
    ALLOWED_KEY_SIZES
        .iter()
        .copied()
        .find(|allowed| i64::from(*allowed) == parsed)
        .ok_or(ValidationError::InvalidKeySize)
}
