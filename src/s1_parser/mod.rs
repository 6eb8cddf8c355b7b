//! Source text to typed syntax tree.
//!
//! The analyzer never calls the parser directly; it goes through
//! [`SourceParser`] so hosts can plug in their own (for example an
//! incremental parser that reuses the previous tree).

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use error::ParseError;
pub use parser::{parse_expression, parse_stored_definition};

use ast::StoredDefinition;

pub trait SourceParser {
    /// Parses a whole file. `previous` is the last tree produced for the
    /// same source, if any.
    fn parse(
        &self,
        text: &str,
        previous: Option<&StoredDefinition>,
    ) -> Result<StoredDefinition, ParseError>;
}

/// The built-in recursive-descent parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelicaParser;

impl SourceParser for ModelicaParser {
    fn parse(
        &self,
        text: &str,
        _previous: Option<&StoredDefinition>,
    ) -> Result<StoredDefinition, ParseError> {
        parse_stored_definition(text)
    }
}
