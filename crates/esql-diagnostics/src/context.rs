//! Error contexts
//!
//! Every AST node the resolver consumes carries an [`ErrorContext`]: where the
//! node starts in the query text, the text itself, and a short description
//! of the construct used to phrase "near ..." hints.

use std::sync::Arc;

use crate::{EsqlError, ErrorCode, SourceLocation, Span, StringTable, keys};

/// A message that is either literal text or a key into the string table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageText {
    Literal(String),
    ResourceKey(String),
}

impl MessageText {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self::ResourceKey(key.into())
    }

    pub fn is_resource_key(&self) -> bool {
        matches!(self, Self::ResourceKey(_))
    }

    /// Produce display text, consulting `strings` for resource keys
    pub fn resolve(&self, strings: &dyn StringTable) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::ResourceKey(key) => strings.format(key, &[]),
        }
    }
}

/// Position of a syntax node within the query text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Span of the node within `source`
    pub span: Span,
    /// Description of the construct ("simple identifier", "function call", ...)
    pub info: MessageText,
    /// The complete query text
    pub source: Arc<str>,
}

impl ErrorContext {
    pub fn new(span: Span, info: MessageText, source: Arc<str>) -> Self {
        Self { span, info, source }
    }

    /// Context with no particular construct description
    pub fn at(span: Span, source: Arc<str>) -> Self {
        Self::new(span, MessageText::key(keys::CTX_GENERIC_SYNTAX_ERROR), source)
    }

    /// Context that does not point anywhere in particular
    pub fn detached() -> Self {
        Self::at(Span::default(), Arc::from(""))
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::from_span(self.span, &self.source)
    }

    /// Build a user-facing semantic error located at this context.
    ///
    /// `key` and `args` are resolved through `strings`.
    pub fn error(
        &self,
        strings: &dyn StringTable,
        code: ErrorCode,
        key: &str,
        args: &[&str],
    ) -> EsqlError {
        let message = strings.format(key, args);
        let near = format!(
            "{} {}",
            strings.format(keys::CTX_NEAR, &[]),
            self.info.resolve(strings)
        );
        EsqlError::Semantic {
            code,
            message,
            location: Some(self.location()),
            source_text: self.source.clone(),
            context: Some(near),
        }
    }
}
