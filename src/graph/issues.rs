//! Issues
//!
//! Problems found while building a type graph. Issues are collected, never
//! thrown: a bad sub-schema becomes an errant node and the walk continues.
//! Only the root of a graph stores issues; every other node delegates to it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Token;

// =============================================================================
// Issue Kind
// =============================================================================

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    Error,
    Warning,
    Info,
    Failure,
    Other,
}

impl IssueKind {
    /// Errors and failures make a graph unfit for code generation
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Failure)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Failure => write!(f, "failure"),
            Self::Other => write!(f, "other"),
        }
    }
}

// =============================================================================
// Issue
// =============================================================================

/// A single collected issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, token: Option<Token>, message: impl Into<String>) -> Self {
        Self {
            kind,
            token,
            message: message.into(),
        }
    }

    pub fn error(token: Option<Token>, message: impl Into<String>) -> Self {
        Self::new(IssueKind::Error, token, message)
    }

    pub fn warning(token: Option<Token>, message: impl Into<String>) -> Self {
        Self::new(IssueKind::Warning, token, message)
    }

    /// Same issue, pointing at a different location
    pub fn at(&self, token: Option<Token>) -> Self {
        Self {
            kind: self.kind,
            token,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token {
            Some(token) => write!(f, "[{}] {}: {}", self.kind, token, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::error(Some(Token::new(2, 5)), "Cannot resolve reference: /definitions/X");
        assert_eq!(
            issue.to_string(),
            "[error] 2:5: Cannot resolve reference: /definitions/X"
        );
        assert_eq!(Issue::warning(None, "odd").to_string(), "[warning] odd");
    }

    #[test]
    fn test_is_error() {
        assert!(IssueKind::Error.is_error());
        assert!(IssueKind::Failure.is_error());
        assert!(!IssueKind::Warning.is_error());
        assert!(!IssueKind::Info.is_error());
        assert!(!IssueKind::Other.is_error());
    }

    #[test]
    fn test_at_moves_token() {
        let issue = Issue::error(None, "boom").at(Some(Token::new(1, 1)));
        assert_eq!(issue.token, Some(Token::new(1, 1)));
        assert_eq!(issue.message, "boom");
    }
}
