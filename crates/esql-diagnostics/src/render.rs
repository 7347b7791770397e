//! Plain-text rendering of errors
//!
//! Semantic errors are shown with the offending line of the query and a caret
//! under the span. Internal errors are rendered as a single line: they are
//! resolver defects, so pointing at the query would blame the user.

use crate::{EsqlError, line_text};

#[cfg(feature = "colored")]
use colored::Colorize;

/// Render `error` for a terminal or log
pub fn render(error: &EsqlError) -> String {
    match error {
        EsqlError::Internal { code, message } => {
            format!("{} {}: {}", label("internal error"), code, message)
        }
        EsqlError::Semantic {
            code,
            message,
            location,
            source_text,
            context,
        } => {
            let mut out = format!("{} {}: {}", label("error"), code, message);
            let Some(loc) = location else {
                return out;
            };
            out.push_str(&format!("\n  --> {}", loc));
            if let Some(ctx) = context {
                out.push_str(&format!(" ({})", ctx));
            }
            if let Some(line) = line_text(source_text, loc.line) {
                let indent = loc.column.saturating_sub(1);
                let width = loc.length.max(1).min(line.len().saturating_sub(indent).max(1));
                out.push_str(&format!(
                    "\n   | {}\n   | {}{}",
                    line,
                    " ".repeat(indent),
                    caret(width)
                ));
            }
            out
        }
    }
}

#[cfg(feature = "colored")]
fn label(text: &str) -> String {
    format!("{}", text.red().bold())
}

#[cfg(not(feature = "colored"))]
fn label(text: &str) -> String {
    text.to_string()
}

#[cfg(feature = "colored")]
fn caret(width: usize) -> String {
    format!("{}", "^".repeat(width).red())
}

#[cfg(not(feature = "colored"))]
fn caret(width: usize) -> String {
    "^".repeat(width)
}

#[cfg(all(test, not(feature = "colored")))]
mod tests {
    use super::*;
    use crate::{ESQL0100, ESQL0402, ErrorContext, MessageTable, MessageText, SourceLocation, Span, keys};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_semantic_error_renders_caret() {
        let strings = MessageTable::english();
        let ctx = ErrorContext::new(
            Span::new(7, 11),
            MessageText::literal("simple identifier"),
            Arc::from("select nope from t"),
        );
        let err = ctx.error(&strings, ESQL0100, keys::NOT_A_FUNCTION, &["nope"]);

        assert_eq!(
            render(&err),
            "error ESQL0100: 'nope' cannot be called as a function.\n  --> line 1, column 8 (near simple identifier)\n   | select nope from t\n   |        ^^^^"
        );
    }

    #[test]
    fn test_column_zero_renders_at_line_start() {
        let err = EsqlError::Semantic {
            code: ESQL0100,
            message: "'abc' could not be resolved.".to_string(),
            location: Some(SourceLocation::new(1, 0, 0, 3)),
            source_text: Arc::from("abc + 1"),
            context: None,
        };

        assert_eq!(
            render(&err),
            "error ESQL0100: 'abc' could not be resolved.\n  --> line 1, column 0\n   | abc + 1\n   | ^^^"
        );
    }

    #[test]
    fn test_internal_error_has_no_caret() {
        let err = EsqlError::internal(ESQL0402, "scope index 7 is out of range");
        let text = render(&err);
        assert_eq!(text, "internal error ESQL0402: scope index 7 is out of range");
        assert!(!text.contains('^'));
    }
}
