// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Authorization and token handling utilities.
//!
//! Tokens come in two flavours: control tokens may run every command, read
//! tokens only the status and diagnostics queries.

use std::collections::HashSet;
use std::fmt;

/// What a command needs to be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    Read,
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    /// Token is valid but only for reading.
    ReadOnly,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => write!(f, "missing authorization token"),
            Self::InvalidToken => write!(f, "invalid authorization token"),
            Self::ReadOnly => write!(f, "token is not allowed to control devices"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Strip the "Bearer " prefix from a token string (case-insensitive).
///
/// If the string starts with "Bearer " (ignoring case), returns the remainder.
/// Otherwise returns the original trimmed string.
pub fn strip_bearer(value: &str) -> &str {
    let trimmed = value.trim();
    let prefix = "bearer ";
    if trimmed.len() >= prefix.len() && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix) {
        trimmed[prefix.len()..].trim_start()
    } else {
        trimmed
    }
}

/// Trait for validating authorization tokens.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: Option<&str>, scope: AuthScope) -> Result<(), AuthError>;
}

/// Validator backed by fixed sets of control and read-only tokens.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenValidator {
    control: HashSet<String>,
    read: HashSet<String>,
}

impl SimpleTokenValidator {
    pub fn new(control: impl IntoIterator<Item = String>, read: impl IntoIterator<Item = String>) -> Self {
        Self {
            control: control.into_iter().collect(),
            read: read.into_iter().collect(),
        }
    }

    /// No tokens configured means no auth is required.
    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.read.is_empty()
    }
}

impl TokenValidator for SimpleTokenValidator {
    fn validate(&self, token: Option<&str>, scope: AuthScope) -> Result<(), AuthError> {
        if self.is_empty() {
            return Ok(());
        }

        let candidate = strip_bearer(token.ok_or(AuthError::MissingToken)?);
        if self.control.contains(candidate) {
            return Ok(());
        }
        if self.read.contains(candidate) {
            return match scope {
                AuthScope::Read => Ok(()),
                AuthScope::Control => Err(AuthError::ReadOnly),
            };
        }
        Err(AuthError::InvalidToken)
    }
}

/// Validator that accepts everything. Used when auth is disabled.
pub struct NoAuthValidator;

impl TokenValidator for NoAuthValidator {
    fn validate(&self, _token: Option<&str>, _scope: AuthScope) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SimpleTokenValidator {
        SimpleTokenValidator::new(vec!["ctl".to_string()], vec!["view".to_string()])
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc123"), "abc123");
        assert_eq!(strip_bearer("BeArEr  test123"), "test123");
        assert_eq!(strip_bearer("  abc123 "), "abc123");
        assert_eq!(strip_bearer("bearer "), "bearer");
    }

    #[test]
    fn test_control_token_allows_everything() {
        let v = validator();
        assert_eq!(v.validate(Some("ctl"), AuthScope::Control), Ok(()));
        assert_eq!(v.validate(Some("Bearer ctl"), AuthScope::Read), Ok(()));
    }

    #[test]
    fn test_read_token_is_read_only() {
        let v = validator();
        assert_eq!(v.validate(Some("view"), AuthScope::Read), Ok(()));
        assert_eq!(
            v.validate(Some("view"), AuthScope::Control),
            Err(AuthError::ReadOnly)
        );
    }

    #[test]
    fn test_missing_and_invalid_tokens() {
        let v = validator();
        assert_eq!(v.validate(None, AuthScope::Read), Err(AuthError::MissingToken));
        assert_eq!(
            v.validate(Some("nope"), AuthScope::Read),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            AuthError::MissingToken.to_string(),
            "missing authorization token"
        );
    }

    #[test]
    fn test_empty_validator_and_no_auth() {
        let v = SimpleTokenValidator::default();
        assert!(v.is_empty());
        assert_eq!(v.validate(None, AuthScope::Control), Ok(()));
        assert_eq!(NoAuthValidator.validate(None, AuthScope::Control), Ok(()));
    }
}
