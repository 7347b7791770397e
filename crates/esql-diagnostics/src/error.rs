//! Error types

use crate::{ErrorCode, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// A problem in the query text
    Error,
    /// A defect in the front end itself
    Bug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Bug => write!(f, "internal error"),
        }
    }
}

/// Main error type of the query front end.
///
/// `Semantic` errors describe a problem in the query text. `Internal` errors
/// describe a broken resolver invariant and carry no location.
#[derive(Debug, Clone, Error)]
pub enum EsqlError {
    #[error("{code}: {message}")]
    Semantic {
        code: ErrorCode,
        message: String,
        location: Option<SourceLocation>,
        source_text: Arc<str>,
        context: Option<String>,
    },

    #[error("{code}: internal error: {message}")]
    Internal { code: ErrorCode, message: String },
}

impl EsqlError {
    /// A contract violation inside the resolver
    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    /// A user-facing error that is not tied to any place in the query text,
    /// such as a clash between externally supplied parameter names
    pub fn semantic(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            location: None,
            source_text: Arc::from(""),
            context: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Semantic { code, .. } | Self::Internal { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Semantic { message, .. } | Self::Internal { message, .. } => message,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Semantic { location, .. } => location.as_ref(),
            Self::Internal { .. } => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Semantic {
                code,
                message,
                location,
                context,
                ..
            } => Diagnostic {
                severity: Severity::Error,
                code: *code,
                message: message.clone(),
                location: location.clone(),
                context: context.clone(),
                help: code.info().help.map(str::to_string),
            },
            Self::Internal { code, message } => Diagnostic {
                severity: Severity::Bug,
                code: *code,
                message: message.clone(),
                location: None,
                context: None,
                help: None,
            },
        }
    }
}

/// A reportable diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// "near ..." description of the offending construct
    pub context: Option<String>,
    pub help: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({}", ctx)?;
            if let Some(loc) = &self.location {
                write!(f, ", {}", loc)?;
            }
            write!(f, ")")?;
        } else if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}
