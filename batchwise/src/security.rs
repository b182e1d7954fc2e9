//! Security utilities for batchwise.
//!
//! Everything that ends up inside generated SQL passes through [`SqlSecurity`]:
//! bare identifiers are validated, quoted identifiers and string literals are
//! escaped. Resolved connection strings are held in a [`SecureString`].

use crate::error::{BatchError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum accepted length of a SQL identifier.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecureString {}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a bare (unquoted) SQL identifier such as a table or schema name.
    ///
    /// Bare identifiers are emitted verbatim, so they must start with a letter
    /// or underscore and contain only letters, digits and underscores.
    ///
    /// # Examples
    /// ```rust
    /// use batchwise::security::SqlSecurity;
    ///
    /// assert!(SqlSecurity::validate_identifier("orders").is_ok());
    /// assert!(SqlSecurity::validate_identifier("orders; DROP TABLE users").is_err());
    /// ```
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        Self::check_common(identifier)?;

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            // This regex is compile-time constant and known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(BatchError::SecurityError(format!(
                "Invalid SQL identifier format: '{identifier}'. Unquoted identifiers must start with a letter or underscore and contain only letters, numbers and underscores"
            )));
        }

        Ok(())
    }

    /// Quotes an identifier with double quotes, doubling any embedded quotes.
    ///
    /// ```rust
    /// use batchwise::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("pickup_datetime").unwrap(), "\"pickup_datetime\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::check_common(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Renders a single-quoted SQL string literal.
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn check_common(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(BatchError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        // prevent pathological inputs from reaching the backend
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(BatchError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(BatchError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }
}
