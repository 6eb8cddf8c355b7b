use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

use super::ast::Span;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized input `{text}`")]
    InvalidToken { text: String, span: Span },

    #[error("expected {expected}, found `{found}`")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    #[error("`end {found}` does not close class `{expected}`")]
    MismatchedEnd {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("invalid number literal `{text}`")]
    InvalidNumber { text: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::InvalidToken { span, .. }
            | ParseError::Unexpected { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::MismatchedEnd { span, .. }
            | ParseError::InvalidNumber { span, .. } => *span,
        }
    }

    /// Diagnostic for `codespan_reporting::term::emit`.
    pub fn to_diagnostic<FileId: Copy>(&self, file_id: FileId) -> Diagnostic<FileId> {
        let span = self.span();
        Diagnostic::error()
            .with_message("syntax error")
            .with_labels(vec![
                Label::primary(file_id, span.start..span.end).with_message(self.to_string())
            ])
    }
}
