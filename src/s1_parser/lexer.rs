//! Tokenizer built on `logos`.
//!
//! Whitespace and both comment forms are skipped. Keywords are separate
//! tokens; `der`, `initial` and `pure` double as function names and the
//! parser accepts them in call position.

use logos::Logos;

use super::ast::Span;
use super::error::ParseError;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Tok {
    // === Keywords ===
    #[token("algorithm")]
    Algorithm,
    #[token("and")]
    And,
    #[token("annotation")]
    Annotation,
    #[token("block")]
    Block,
    #[token("break")]
    Break,
    #[token("class")]
    Class,
    #[token("connect")]
    Connect,
    #[token("connector")]
    Connector,
    #[token("constant")]
    Constant,
    #[token("constrainedby")]
    Constrainedby,
    #[token("der")]
    Der,
    #[token("discrete")]
    Discrete,
    #[token("each")]
    Each,
    #[token("else")]
    Else,
    #[token("elseif")]
    Elseif,
    #[token("elsewhen")]
    Elsewhen,
    #[token("encapsulated")]
    Encapsulated,
    #[token("end")]
    End,
    #[token("enumeration")]
    Enumeration,
    #[token("equation")]
    Equation,
    #[token("expandable")]
    Expandable,
    #[token("extends")]
    Extends,
    #[token("external")]
    External,
    #[token("false")]
    False,
    #[token("final")]
    Final,
    #[token("flow")]
    Flow,
    #[token("for")]
    For,
    #[token("function")]
    Function,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("impure")]
    Impure,
    #[token("in")]
    In,
    #[token("initial")]
    Initial,
    #[token("inner")]
    Inner,
    #[token("input")]
    Input,
    #[token("loop")]
    Loop,
    #[token("model")]
    Model,
    #[token("not")]
    Not,
    #[token("operator")]
    Operator,
    #[token("or")]
    Or,
    #[token("outer")]
    Outer,
    #[token("output")]
    Output,
    #[token("package")]
    Package,
    #[token("parameter")]
    Parameter,
    #[token("partial")]
    Partial,
    #[token("protected")]
    Protected,
    #[token("public")]
    Public,
    #[token("pure")]
    Pure,
    #[token("record")]
    Record,
    #[token("redeclare")]
    Redeclare,
    #[token("replaceable")]
    Replaceable,
    #[token("return")]
    Return,
    #[token("stream")]
    Stream,
    #[token("then")]
    Then,
    #[token("true")]
    True,
    #[token("type")]
    Type,
    #[token("when")]
    When,
    #[token("while")]
    While,
    #[token("within")]
    Within,

    // === Literals ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    #[regex(r"'([^'\\]|\\.)+'")]
    Ident,
    #[regex(r"[0-9]+")]
    UnsignedInteger,
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    UnsignedReal,
    #[regex(r#""([^"\\]|\\.|\\\n)*""#)]
    String,

    // === Operators ===
    #[token(".+")]
    ElemAdd,
    #[token(".-")]
    ElemSub,
    #[token(".*")]
    ElemMul,
    #[token("./")]
    ElemDiv,
    #[token(".^")]
    ElemExp,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("==")]
    EqEq,
    #[token("<>")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(":=")]
    Assign,
    #[token("=")]
    Eq,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}

impl Tok {
    /// Human readable form used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Tok::Ident => "identifier",
            Tok::UnsignedInteger => "integer literal",
            Tok::UnsignedReal => "real literal",
            Tok::String => "string literal",
            Tok::LParen => "`(`",
            Tok::RParen => "`)`",
            Tok::LBrace => "`{`",
            Tok::RBrace => "`}`",
            Tok::LBracket => "`[`",
            Tok::RBracket => "`]`",
            Tok::Comma => "`,`",
            Tok::Semi => "`;`",
            Tok::Colon => "`:`",
            Tok::Dot => "`.`",
            Tok::Eq => "`=`",
            Tok::Assign => "`:=`",
            _ => "keyword or operator",
        }
    }
}

/// One token with its source slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'src> {
    pub tok: Tok,
    pub text: &'src str,
    pub span: Span,
}

pub fn tokenize(source: &str) -> Result<Vec<Lexeme<'_>>, ParseError> {
    let mut lexer = Tok::lexer(source);
    let mut out = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        match result {
            Ok(tok) => out.push(Lexeme {
                tok,
                text: lexer.slice(),
                span,
            }),
            Err(()) => {
                return Err(ParseError::InvalidToken {
                    text: lexer.slice().to_string(),
                    span,
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source)
            .expect("lexing failed")
            .into_iter()
            .map(|l| l.tok)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("model modelA end modelA;"),
            vec![Tok::Model, Tok::Ident, Tok::End, Tok::Ident, Tok::Semi]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 3. 1e3 4.0E-2"),
            vec![
                Tok::UnsignedInteger,
                Tok::UnsignedReal,
                Tok::UnsignedReal,
                Tok::UnsignedReal,
                Tok::UnsignedReal
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "x // line comment\n /* block\n comment */ y";
        assert_eq!(kinds(source), vec![Tok::Ident, Tok::Ident]);
    }

    #[test]
    fn test_strings_and_quoted_identifiers() {
        let lexemes = tokenize(r#""a \"quoted\" word" 'quoted ident'"#).expect("lexing failed");
        assert_eq!(lexemes[0].tok, Tok::String);
        assert_eq!(lexemes[1].tok, Tok::Ident);
        assert_eq!(lexemes[1].text, "'quoted ident'");
    }

    #[test]
    fn test_elementwise_operators() {
        assert_eq!(
            kinds("a .* b .^ 2"),
            vec![Tok::Ident, Tok::ElemMul, Tok::Ident, Tok::ElemExp, Tok::UnsignedInteger]
        );
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("model M ? end M;").expect_err("should fail");
        assert!(matches!(err, ParseError::InvalidToken { .. }));
    }
}
