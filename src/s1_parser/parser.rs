//! Recursive-descent parser for Modelica source text.
//!
//! The grammar covers stored definitions, classes, elements, equations,
//! statements and expressions of Modelica 3. The parser stops at the first
//! error.

use std::sync::Arc;

use super::ast::*;
use super::error::ParseError;
use super::lexer::{tokenize, Lexeme, Tok};

type PResult<T> = Result<T, ParseError>;

pub fn parse_stored_definition(source: &str) -> PResult<StoredDefinition> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        eof: Span::new(source.len(), source.len()),
    };
    parser.stored_definition()
}

/// Parses a standalone expression, e.g. for command line arguments.
pub fn parse_expression(source: &str) -> PResult<Expression> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        eof: Span::new(source.len(), source.len()),
    };
    let expr = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

struct Parser<'src> {
    tokens: Vec<Lexeme<'src>>,
    pos: usize,
    eof: Span,
}

impl<'src> Parser<'src> {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Token helpers
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn peek(&self) -> Option<Tok> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<Tok> {
        self.tokens.get(self.pos + offset).map(|l| l.tok)
    }

    fn at(&self, tok: Tok) -> bool {
        self.peek() == Some(tok)
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map(|l| l.span).unwrap_or(self.eof)
    }

    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            return Span::default();
        }
        self.tokens
            .get(self.pos - 1)
            .map(|l| l.span)
            .unwrap_or(self.eof)
    }

    fn bump(&mut self) -> Token {
        let lexeme = &self.tokens[self.pos];
        let token = Token {
            text: lexeme.text.to_string(),
            span: lexeme.span,
        };
        self.pos += 1;
        token
    }

    fn eat(&mut self, tok: Tok) -> bool {
        if self.at(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> PResult<Token> {
        if self.at(tok) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(tok.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(lexeme) => ParseError::Unexpected {
                expected: expected.to_string(),
                found: lexeme.text.to_string(),
                span: lexeme.span,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: self.eof,
            },
        }
    }

    fn ident(&mut self) -> PResult<Token> {
        self.expect(Tok::Ident)
    }

    fn name(&mut self) -> PResult<Name> {
        let mut parts = vec![self.ident()?];
        while self.at(Tok::Dot) && self.peek_at(1) == Some(Tok::Ident) {
            self.pos += 1;
            parts.push(self.ident()?);
        }
        Ok(Name { parts })
    }

    fn type_specifier(&mut self) -> PResult<TypeSpecifier> {
        let global = self.eat(Tok::Dot);
        let name = self.name()?;
        Ok(TypeSpecifier { global, name })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Stored definition and classes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn stored_definition(&mut self) -> PResult<StoredDefinition> {
        let start = self.current_span();
        let mut within = None;
        if self.eat(Tok::Within) {
            if self.at(Tok::Ident) {
                within = Some(self.name()?);
            }
            self.expect(Tok::Semi)?;
        }
        let mut classes = Vec::new();
        while self.peek().is_some() {
            let final_ = self.eat(Tok::Final);
            let prefixes = ElementPrefixes {
                final_,
                ..Default::default()
            };
            let class = self.class_definition(Visibility::Public, prefixes)?;
            self.expect(Tok::Semi)?;
            classes.push(Arc::new(class));
        }
        Ok(StoredDefinition {
            node_data: NodeData::new(start.to(self.previous_span())),
            within,
            classes,
        })
    }

    fn at_class_prefix(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::Encapsulated
                    | Tok::Partial
                    | Tok::Class
                    | Tok::Model
                    | Tok::Record
                    | Tok::Block
                    | Tok::Expandable
                    | Tok::Connector
                    | Tok::Type
                    | Tok::Package
                    | Tok::Pure
                    | Tok::Impure
                    | Tok::Operator
                    | Tok::Function
            )
        )
    }

    fn class_prefixes(&mut self) -> PResult<ClassPrefixes> {
        let mut prefixes = ClassPrefixes {
            encapsulated: self.eat(Tok::Encapsulated),
            partial: self.eat(Tok::Partial),
            ..Default::default()
        };
        prefixes.class_type = match self.peek() {
            Some(Tok::Class) => ClassType::Class,
            Some(Tok::Model) => ClassType::Model,
            Some(Tok::Block) => ClassType::Block,
            Some(Tok::Type) => ClassType::Type,
            Some(Tok::Package) => ClassType::Package,
            Some(Tok::Record) => ClassType::Record,
            Some(Tok::Function) => ClassType::Function,
            Some(Tok::Connector) => ClassType::Connector,
            Some(Tok::Expandable) => {
                self.pos += 1;
                prefixes.expandable = true;
                if !self.at(Tok::Connector) {
                    return Err(self.unexpected("`connector`"));
                }
                ClassType::Connector
            }
            Some(Tok::Pure | Tok::Impure) => {
                prefixes.pure = self.at(Tok::Pure);
                prefixes.impure = self.at(Tok::Impure);
                self.pos += 1;
                prefixes.operator = self.eat(Tok::Operator);
                if !self.at(Tok::Function) {
                    return Err(self.unexpected("`function`"));
                }
                ClassType::Function
            }
            Some(Tok::Operator) => match self.peek_at(1) {
                Some(Tok::Record) => {
                    self.pos += 1;
                    prefixes.operator = true;
                    ClassType::Record
                }
                Some(Tok::Function) => {
                    self.pos += 1;
                    prefixes.operator = true;
                    ClassType::Function
                }
                _ => ClassType::Operator,
            },
            _ => return Err(self.unexpected("class restriction")),
        };
        self.pos += 1;
        Ok(prefixes)
    }

    fn class_definition(
        &mut self,
        visibility: Visibility,
        element_prefixes: ElementPrefixes,
    ) -> PResult<ClassDefinition> {
        let start = self.current_span();
        let prefixes = self.class_prefixes()?;

        // `model extends Base(...) ... end Base;`
        if self.eat(Tok::Extends) {
            let name = self.ident()?;
            let extends_modification = if self.at(Tok::LParen) {
                Some(self.class_modification()?)
            } else {
                None
            };
            let description = self.string_comment()?;
            let specifier = self.composition(&name, description, extends_modification)?;
            return Ok(ClassDefinition {
                node_data: NodeData::new(start.to(self.previous_span())),
                visibility,
                element_prefixes,
                prefixes,
                name,
                specifier,
                constraining: None,
            });
        }

        let name = self.ident()?;
        let specifier = if self.eat(Tok::Eq) {
            self.short_specifier()?
        } else {
            let description = self.string_comment()?;
            self.composition(&name, description, None)?
        };
        Ok(ClassDefinition {
            node_data: NodeData::new(start.to(self.previous_span())),
            visibility,
            element_prefixes,
            prefixes,
            name,
            specifier,
            constraining: None,
        })
    }

    fn short_specifier(&mut self) -> PResult<ClassSpecifier> {
        if self.eat(Tok::Enumeration) {
            self.expect(Tok::LParen)?;
            let mut literals = Vec::new();
            let mut open = false;
            if self.eat(Tok::Colon) {
                open = true;
            } else if self.at(Tok::Ident) {
                loop {
                    let ident = self.ident()?;
                    let description = self.description()?;
                    literals.push(EnumerationLiteral { ident, description });
                    if !self.eat(Tok::Comma) {
                        break;
                    }
                }
            }
            self.expect(Tok::RParen)?;
            let description = self.description()?;
            return Ok(ClassSpecifier::Enumeration {
                literals,
                open,
                description,
            });
        }

        if self.eat(Tok::Der) {
            self.expect(Tok::LParen)?;
            let type_specifier = self.type_specifier()?;
            let mut arguments = Vec::new();
            while self.eat(Tok::Comma) {
                arguments.push(self.ident()?);
            }
            self.expect(Tok::RParen)?;
            let description = self.description()?;
            return Ok(ClassSpecifier::Derivative {
                type_specifier,
                arguments,
                description,
            });
        }

        let causality = self.causality();
        let type_specifier = self.type_specifier()?;
        let subscripts = if self.at(Tok::LBracket) {
            self.array_subscripts()?
        } else {
            Vec::new()
        };
        let class_modification = if self.at(Tok::LParen) {
            Some(self.class_modification()?)
        } else {
            None
        };
        let description = self.description()?;
        Ok(ClassSpecifier::Short {
            causality,
            type_specifier,
            subscripts,
            class_modification,
            description,
        })
    }

    fn composition(
        &mut self,
        name: &Token,
        description: Vec<String>,
        extends_modification: Option<ClassModification>,
    ) -> PResult<ClassSpecifier> {
        let mut elements = Vec::new();
        let mut annotation = None;
        let mut external = None;
        let mut visibility = Visibility::Public;

        loop {
            match self.peek() {
                Some(Tok::End) => break,
                Some(Tok::Public) => {
                    self.pos += 1;
                    visibility = Visibility::Public;
                }
                Some(Tok::Protected) => {
                    self.pos += 1;
                    visibility = Visibility::Protected;
                }
                Some(Tok::Equation) => {
                    elements.push(Element::EquationSection(Arc::new(
                        self.equation_section(false)?,
                    )));
                }
                Some(Tok::Algorithm) => {
                    elements.push(Element::AlgorithmSection(Arc::new(
                        self.algorithm_section(false)?,
                    )));
                }
                Some(Tok::Initial) if self.peek_at(1) == Some(Tok::Equation) => {
                    self.pos += 1;
                    elements.push(Element::EquationSection(Arc::new(
                        self.equation_section(true)?,
                    )));
                }
                Some(Tok::Initial) if self.peek_at(1) == Some(Tok::Algorithm) => {
                    self.pos += 1;
                    elements.push(Element::AlgorithmSection(Arc::new(
                        self.algorithm_section(true)?,
                    )));
                }
                Some(Tok::Annotation) => {
                    annotation = Some(Arc::new(self.annotation()?));
                    self.expect(Tok::Semi)?;
                }
                Some(Tok::External) => {
                    external = Some(self.external_clause()?);
                }
                None => return Err(self.unexpected("`end`")),
                _ => {
                    self.element(visibility, &mut elements)?;
                    self.expect(Tok::Semi)?;
                }
            }
        }

        self.expect(Tok::End)?;
        let end_name = self.ident()?;
        if end_name.text != name.text {
            return Err(ParseError::MismatchedEnd {
                expected: name.text.clone(),
                found: end_name.text,
                span: end_name.span,
            });
        }

        Ok(ClassSpecifier::Long {
            description,
            extends_modification,
            elements,
            external,
            annotation,
        })
    }

    fn external_clause(&mut self) -> PResult<ExternalClause> {
        self.expect(Tok::External)?;
        let language = if self.at(Tok::String) {
            Some(unescape(self.bump().text.as_str()))
        } else {
            None
        };
        let mut call = None;
        if !self.at(Tok::Annotation) && !self.at(Tok::Semi) {
            let lhs = self.expression()?;
            call = Some(if self.eat(Tok::Eq) {
                self.expression()?
            } else {
                lhs
            });
        }
        let annotation = if self.at(Tok::Annotation) {
            Some(Arc::new(self.annotation()?))
        } else {
            None
        };
        self.expect(Tok::Semi)?;
        // The class may carry its own annotation right after the external clause.
        Ok(ExternalClause {
            language,
            call,
            annotation,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Elements
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn element(&mut self, visibility: Visibility, out: &mut Vec<Element>) -> PResult<()> {
        if self.at(Tok::Import) {
            out.push(Element::Import(Arc::new(self.import_clause(visibility)?)));
            return Ok(());
        }
        if self.at(Tok::Extends) {
            out.push(Element::Extends(Arc::new(self.extends_clause(visibility)?)));
            return Ok(());
        }

        let mut prefixes = ElementPrefixes::default();
        loop {
            match self.peek() {
                Some(Tok::Redeclare) => prefixes.redeclare = true,
                Some(Tok::Final) => prefixes.final_ = true,
                Some(Tok::Inner) => prefixes.inner = true,
                Some(Tok::Outer) => prefixes.outer = true,
                Some(Tok::Replaceable) => prefixes.replaceable = true,
                _ => break,
            }
            self.pos += 1;
        }

        if self.at_class_prefix() {
            let mut class = self.class_definition(visibility, prefixes)?;
            if self.at(Tok::Constrainedby) {
                class.constraining = Some(self.constraining_clause()?);
                // description of the constraining clause
                self.description()?;
            }
            out.push(Element::Class(Arc::new(class)));
        } else {
            let declarations = self.component_clause(visibility, prefixes)?;
            out.extend(declarations.into_iter().map(Element::Component));
        }
        Ok(())
    }

    fn import_clause(&mut self, visibility: Visibility) -> PResult<ImportClause> {
        let start = self.current_span();
        self.expect(Tok::Import)?;
        let kind = if self.at(Tok::Ident) && self.peek_at(1) == Some(Tok::Eq) {
            let alias = self.ident()?;
            self.expect(Tok::Eq)?;
            ImportKind::Alias {
                alias,
                name: self.name()?,
            }
        } else {
            let name = self.name()?;
            if self.eat(Tok::ElemMul) {
                ImportKind::Wildcard { name }
            } else if self.at(Tok::Dot) && self.peek_at(1) == Some(Tok::LBrace) {
                self.pos += 2;
                let mut imports = vec![self.ident()?];
                while self.eat(Tok::Comma) {
                    imports.push(self.ident()?);
                }
                self.expect(Tok::RBrace)?;
                ImportKind::Multiple { name, imports }
            } else {
                ImportKind::Qualified { name }
            }
        };
        let description = self.description()?;
        Ok(ImportClause {
            node_data: NodeData::new(start.to(self.previous_span())),
            visibility,
            kind,
            description,
        })
    }

    fn extends_clause(&mut self, visibility: Visibility) -> PResult<ExtendsClause> {
        let start = self.current_span();
        self.expect(Tok::Extends)?;
        let type_specifier = self.type_specifier()?;
        let class_modification = if self.at(Tok::LParen) {
            Some(self.class_modification()?)
        } else {
            None
        };
        let annotation = if self.at(Tok::Annotation) {
            Some(Arc::new(self.annotation()?))
        } else {
            None
        };
        Ok(ExtendsClause {
            node_data: NodeData::new(start.to(self.previous_span())),
            visibility,
            type_specifier,
            class_modification,
            annotation,
        })
    }

    fn constraining_clause(&mut self) -> PResult<ConstrainingClause> {
        self.expect(Tok::Constrainedby)?;
        let type_specifier = self.type_specifier()?;
        let class_modification = if self.at(Tok::LParen) {
            Some(self.class_modification()?)
        } else {
            None
        };
        Ok(ConstrainingClause {
            type_specifier,
            class_modification,
        })
    }

    fn causality(&mut self) -> Causality {
        if self.eat(Tok::Input) {
            Causality::Input
        } else if self.eat(Tok::Output) {
            Causality::Output
        } else {
            Causality::Empty
        }
    }

    /// `type_prefix type_specifier [subscripts] declaration {, declaration}`
    fn component_clause(
        &mut self,
        visibility: Visibility,
        prefixes: ElementPrefixes,
    ) -> PResult<Vec<Arc<ComponentDeclaration>>> {
        let connection = if self.eat(Tok::Flow) {
            Connection::Flow
        } else if self.eat(Tok::Stream) {
            Connection::Stream
        } else {
            Connection::Empty
        };
        let variability = if self.eat(Tok::Discrete) {
            Variability::Discrete
        } else if self.eat(Tok::Parameter) {
            Variability::Parameter
        } else if self.eat(Tok::Constant) {
            Variability::Constant
        } else {
            Variability::Empty
        };
        let causality = self.causality();
        let type_specifier = self.type_specifier()?;
        let type_subscripts = if self.at(Tok::LBracket) {
            self.array_subscripts()?
        } else {
            Vec::new()
        };

        let mut declarations = Vec::new();
        loop {
            let start = self.current_span();
            let name = self.ident()?;
            let subscripts = if self.at(Tok::LBracket) {
                self.array_subscripts()?
            } else {
                Vec::new()
            };
            let modification = self.optional_modification()?;
            let condition = if self.eat(Tok::If) {
                Some(self.expression()?)
            } else {
                None
            };
            let description = self.description()?;
            declarations.push(ComponentDeclaration {
                node_data: NodeData::new(start.to(self.previous_span())),
                visibility,
                prefixes: prefixes.clone(),
                connection,
                variability,
                causality,
                type_specifier: type_specifier.clone(),
                type_subscripts: type_subscripts.clone(),
                name,
                subscripts,
                modification,
                condition,
                description,
                constraining: None,
            });
            if !self.eat(Tok::Comma) {
                break;
            }
        }

        if self.at(Tok::Constrainedby) {
            let constraining = self.constraining_clause()?;
            let description = self.description()?;
            if let Some(last) = declarations.last_mut() {
                last.constraining = Some(constraining);
                if last.description.strings.is_empty() && last.description.annotation.is_none() {
                    last.description = description;
                }
            }
        }

        Ok(declarations.into_iter().map(Arc::new).collect())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Modifications
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn optional_modification(&mut self) -> PResult<Option<Modification>> {
        match self.peek() {
            Some(Tok::LParen) => {
                let class_modification = Some(self.class_modification()?);
                let expression = if self.eat(Tok::Eq) {
                    Some(self.expression()?)
                } else {
                    None
                };
                Ok(Some(Modification {
                    class_modification,
                    expression,
                }))
            }
            Some(Tok::Eq | Tok::Assign) => {
                self.pos += 1;
                Ok(Some(Modification {
                    class_modification: None,
                    expression: Some(self.expression()?),
                }))
            }
            _ => Ok(None),
        }
    }

    fn class_modification(&mut self) -> PResult<ClassModification> {
        self.expect(Tok::LParen)?;
        let mut arguments = Vec::new();
        if !self.at(Tok::RParen) {
            loop {
                arguments.push(Arc::new(self.argument()?));
                if !self.eat(Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RParen)?;
        Ok(ClassModification { arguments })
    }

    fn argument(&mut self) -> PResult<Argument> {
        let redeclare = self.eat(Tok::Redeclare);
        let each = self.eat(Tok::Each);
        let final_ = self.eat(Tok::Final);
        let replaceable = self.eat(Tok::Replaceable);

        if redeclare || replaceable {
            let prefixes = ElementPrefixes {
                redeclare,
                final_,
                replaceable,
                ..Default::default()
            };
            if self.at_class_prefix() {
                let mut definition = self.class_definition(Visibility::Public, prefixes)?;
                if self.at(Tok::Constrainedby) {
                    definition.constraining = Some(self.constraining_clause()?);
                }
                return Ok(Argument::ClassRedeclaration {
                    each,
                    final_,
                    definition: Arc::new(definition),
                });
            }
            let mut declarations = self.component_clause(Visibility::Public, prefixes)?;
            let declaration = match declarations.len() {
                1 => declarations.remove(0),
                _ => return Err(self.unexpected("single component redeclaration")),
            };
            return Ok(Argument::ComponentRedeclaration {
                each,
                final_,
                declaration,
            });
        }

        let name = self.name()?;
        let modification = self.optional_modification()?;
        let description = self.string_comment()?;
        Ok(Argument::ElementModification {
            each,
            final_,
            name,
            modification,
            description,
        })
    }

    fn string_comment(&mut self) -> PResult<Vec<String>> {
        let mut strings = Vec::new();
        if self.at(Tok::String) {
            strings.push(unescape(&self.bump().text));
            while self.at(Tok::Plus) && self.peek_at(1) == Some(Tok::String) {
                self.pos += 1;
                strings.push(unescape(&self.bump().text));
            }
        }
        Ok(strings)
    }

    fn annotation(&mut self) -> PResult<Annotation> {
        let start = self.current_span();
        self.expect(Tok::Annotation)?;
        let class_modification = self.class_modification()?;
        Ok(Annotation {
            node_data: NodeData::new(start.to(self.previous_span())),
            class_modification,
        })
    }

    fn description(&mut self) -> PResult<Description> {
        let strings = self.string_comment()?;
        let annotation = if self.at(Tok::Annotation) {
            Some(Arc::new(self.annotation()?))
        } else {
            None
        };
        Ok(Description {
            strings,
            annotation,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Equations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn at_section_boundary(&self) -> bool {
        match self.peek() {
            None
            | Some(
                Tok::End
                | Tok::Public
                | Tok::Protected
                | Tok::Equation
                | Tok::Algorithm
                | Tok::External
                | Tok::Annotation,
            ) => true,
            Some(Tok::Initial) => matches!(
                self.peek_at(1),
                Some(Tok::Equation | Tok::Algorithm)
            ),
            _ => false,
        }
    }

    fn equation_section(&mut self, initial: bool) -> PResult<EquationSection> {
        let start = self.current_span();
        self.expect(Tok::Equation)?;
        let mut equations = Vec::new();
        while !self.at_section_boundary() {
            equations.push(self.equation()?);
            self.expect(Tok::Semi)?;
        }
        Ok(EquationSection {
            node_data: NodeData::new(start.to(self.previous_span())),
            initial,
            equations,
        })
    }

    fn equation_list(&mut self, terminators: &[Tok]) -> PResult<Vec<Equation>> {
        let mut equations = Vec::new();
        while !matches!(self.peek(), Some(tok) if terminators.contains(&tok)) {
            if self.peek().is_none() {
                return Err(self.unexpected("`end`"));
            }
            equations.push(self.equation()?);
            self.expect(Tok::Semi)?;
        }
        Ok(equations)
    }

    fn equation(&mut self) -> PResult<Equation> {
        match self.peek() {
            Some(Tok::If) => {
                self.pos += 1;
                let mut branches = Vec::new();
                let mut else_branch = Vec::new();
                let condition = self.expression()?;
                self.expect(Tok::Then)?;
                let equations = self.equation_list(&[Tok::Elseif, Tok::Else, Tok::End])?;
                branches.push(EquationBlock {
                    condition,
                    equations,
                });
                loop {
                    if self.eat(Tok::Elseif) {
                        let condition = self.expression()?;
                        self.expect(Tok::Then)?;
                        let equations =
                            self.equation_list(&[Tok::Elseif, Tok::Else, Tok::End])?;
                        branches.push(EquationBlock {
                            condition,
                            equations,
                        });
                    } else if self.eat(Tok::Else) {
                        else_branch = self.equation_list(&[Tok::End])?;
                    } else {
                        break;
                    }
                }
                self.expect(Tok::End)?;
                self.expect(Tok::If)?;
                let description = self.description()?;
                Ok(Equation::If {
                    branches,
                    else_branch,
                    description,
                })
            }
            Some(Tok::For) => {
                self.pos += 1;
                let indices = self.for_indices()?;
                self.expect(Tok::Loop)?;
                let equations = self.equation_list(&[Tok::End])?;
                self.expect(Tok::End)?;
                self.expect(Tok::For)?;
                let description = self.description()?;
                Ok(Equation::For {
                    indices,
                    equations,
                    description,
                })
            }
            Some(Tok::When) => {
                self.pos += 1;
                let mut branches = Vec::new();
                loop {
                    let condition = self.expression()?;
                    self.expect(Tok::Then)?;
                    let equations = self.equation_list(&[Tok::Elsewhen, Tok::End])?;
                    branches.push(EquationBlock {
                        condition,
                        equations,
                    });
                    if !self.eat(Tok::Elsewhen) {
                        break;
                    }
                }
                self.expect(Tok::End)?;
                self.expect(Tok::When)?;
                let description = self.description()?;
                Ok(Equation::When {
                    branches,
                    description,
                })
            }
            Some(Tok::Connect) => {
                self.pos += 1;
                self.expect(Tok::LParen)?;
                let lhs = self.component_reference()?;
                self.expect(Tok::Comma)?;
                let rhs = self.component_reference()?;
                self.expect(Tok::RParen)?;
                let description = self.description()?;
                Ok(Equation::Connect {
                    lhs,
                    rhs,
                    description,
                })
            }
            _ => {
                let lhs = self.simple_expression()?;
                if self.eat(Tok::Eq) {
                    let rhs = self.expression()?;
                    let description = self.description()?;
                    return Ok(Equation::Simple {
                        lhs,
                        rhs,
                        description,
                    });
                }
                match lhs {
                    Expression::FunctionCall { callee, arguments } => {
                        let description = self.description()?;
                        Ok(Equation::FunctionCall {
                            callee,
                            arguments,
                            description,
                        })
                    }
                    _ => Err(self.unexpected("`=`")),
                }
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Statements
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn algorithm_section(&mut self, initial: bool) -> PResult<AlgorithmSection> {
        let start = self.current_span();
        self.expect(Tok::Algorithm)?;
        let mut statements = Vec::new();
        while !self.at_section_boundary() {
            statements.push(self.statement()?);
            self.expect(Tok::Semi)?;
        }
        Ok(AlgorithmSection {
            node_data: NodeData::new(start.to(self.previous_span())),
            initial,
            statements,
        })
    }

    fn statement_list(&mut self, terminators: &[Tok]) -> PResult<Vec<Statement>> {
        let mut statements = Vec::new();
        while !matches!(self.peek(), Some(tok) if terminators.contains(&tok)) {
            if self.peek().is_none() {
                return Err(self.unexpected("`end`"));
            }
            statements.push(self.statement()?);
            self.expect(Tok::Semi)?;
        }
        Ok(statements)
    }

    fn statement_blocks(&mut self, separator: Tok) -> PResult<(Vec<StatementBlock>, Vec<Statement>)> {
        let mut branches = Vec::new();
        let mut else_branch = Vec::new();
        loop {
            let condition = self.expression()?;
            self.expect(Tok::Then)?;
            let statements = self.statement_list(&[separator, Tok::Else, Tok::End])?;
            branches.push(StatementBlock {
                condition,
                statements,
            });
            if !self.eat(separator) {
                break;
            }
        }
        if separator == Tok::Elseif && self.eat(Tok::Else) {
            else_branch = self.statement_list(&[Tok::End])?;
        }
        Ok((branches, else_branch))
    }

    fn statement(&mut self) -> PResult<Statement> {
        let statement = match self.peek() {
            Some(Tok::Break) => {
                self.pos += 1;
                Statement::Break
            }
            Some(Tok::Return) => {
                self.pos += 1;
                Statement::Return
            }
            Some(Tok::If) => {
                self.pos += 1;
                let (branches, else_branch) = self.statement_blocks(Tok::Elseif)?;
                self.expect(Tok::End)?;
                self.expect(Tok::If)?;
                Statement::If {
                    branches,
                    else_branch,
                }
            }
            Some(Tok::When) => {
                self.pos += 1;
                let (branches, _) = self.statement_blocks(Tok::Elsewhen)?;
                self.expect(Tok::End)?;
                self.expect(Tok::When)?;
                Statement::When { branches }
            }
            Some(Tok::For) => {
                self.pos += 1;
                let indices = self.for_indices()?;
                self.expect(Tok::Loop)?;
                let statements = self.statement_list(&[Tok::End])?;
                self.expect(Tok::End)?;
                self.expect(Tok::For)?;
                Statement::For {
                    indices,
                    statements,
                }
            }
            Some(Tok::While) => {
                self.pos += 1;
                let condition = self.expression()?;
                self.expect(Tok::Loop)?;
                let statements = self.statement_list(&[Tok::End])?;
                self.expect(Tok::End)?;
                self.expect(Tok::While)?;
                Statement::While {
                    condition,
                    statements,
                }
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let targets = self.output_expression_list()?;
                self.expect(Tok::RParen)?;
                self.expect(Tok::Assign)?;
                let callee = self.component_reference()?;
                let arguments = self.function_call_args()?;
                Statement::MultiAssignment {
                    targets,
                    callee,
                    arguments,
                }
            }
            _ => {
                let target = self.component_reference()?;
                if self.eat(Tok::Assign) {
                    Statement::Assignment {
                        target,
                        value: self.expression()?,
                    }
                } else if self.at(Tok::LParen) {
                    Statement::FunctionCall {
                        callee: target,
                        arguments: self.function_call_args()?,
                    }
                } else {
                    return Err(self.unexpected("`:=`"));
                }
            }
        };
        // statements carry an optional comment that the tree does not keep
        self.description()?;
        Ok(statement)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Expressions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn expression(&mut self) -> PResult<Expression> {
        if !self.eat(Tok::If) {
            return self.simple_expression();
        }
        let mut branches = Vec::new();
        let condition = self.expression()?;
        self.expect(Tok::Then)?;
        branches.push((condition, self.expression()?));
        while self.eat(Tok::Elseif) {
            let condition = self.expression()?;
            self.expect(Tok::Then)?;
            branches.push((condition, self.expression()?));
        }
        self.expect(Tok::Else)?;
        let else_branch = Box::new(self.expression()?);
        Ok(Expression::If {
            branches,
            else_branch,
        })
    }

    fn simple_expression(&mut self) -> PResult<Expression> {
        let first = self.logical_expression()?;
        if !self.eat(Tok::Colon) {
            return Ok(first);
        }
        let second = self.logical_expression()?;
        if self.eat(Tok::Colon) {
            let third = self.logical_expression()?;
            Ok(Expression::Range {
                start: Box::new(first),
                step: Some(Box::new(second)),
                end: Box::new(third),
            })
        } else {
            Ok(Expression::Range {
                start: Box::new(first),
                step: None,
                end: Box::new(second),
            })
        }
    }

    fn logical_expression(&mut self) -> PResult<Expression> {
        let mut lhs = self.logical_term()?;
        while self.eat(Tok::Or) {
            let rhs = self.logical_term()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op: OpBinary::Or,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn logical_term(&mut self) -> PResult<Expression> {
        let mut lhs = self.logical_factor()?;
        while self.eat(Tok::And) {
            let rhs = self.logical_factor()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op: OpBinary::And,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn logical_factor(&mut self) -> PResult<Expression> {
        if self.eat(Tok::Not) {
            let rhs = self.relation()?;
            return Ok(Expression::Unary {
                op: OpUnary::Not,
                rhs: Box::new(rhs),
            });
        }
        self.relation()
    }

    fn relation(&mut self) -> PResult<Expression> {
        let lhs = self.arithmetic_expression()?;
        let op = match self.peek() {
            Some(Tok::Lt) => OpBinary::Lt,
            Some(Tok::Le) => OpBinary::Le,
            Some(Tok::Gt) => OpBinary::Gt,
            Some(Tok::Ge) => OpBinary::Ge,
            Some(Tok::EqEq) => OpBinary::Eq,
            Some(Tok::Neq) => OpBinary::Neq,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.arithmetic_expression()?;
        Ok(Expression::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    }

    fn add_operator(&self) -> Option<OpBinary> {
        match self.peek() {
            Some(Tok::Plus) => Some(OpBinary::Add),
            Some(Tok::Minus) => Some(OpBinary::Sub),
            Some(Tok::ElemAdd) => Some(OpBinary::ElemAdd),
            Some(Tok::ElemSub) => Some(OpBinary::ElemSub),
            _ => None,
        }
    }

    fn arithmetic_expression(&mut self) -> PResult<Expression> {
        let unary = match self.peek() {
            Some(Tok::Minus) => Some(OpUnary::Minus),
            Some(Tok::Plus) => Some(OpUnary::Plus),
            Some(Tok::ElemSub) => Some(OpUnary::ElemMinus),
            Some(Tok::ElemAdd) => Some(OpUnary::ElemPlus),
            _ => None,
        };
        if unary.is_some() {
            self.pos += 1;
        }
        let mut lhs = self.term()?;
        if let Some(op) = unary {
            lhs = Expression::Unary {
                op,
                rhs: Box::new(lhs),
            };
        }
        while let Some(op) = self.add_operator() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> PResult<Expression> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => OpBinary::Mul,
                Some(Tok::Slash) => OpBinary::Div,
                Some(Tok::ElemMul) => OpBinary::ElemMul,
                Some(Tok::ElemDiv) => OpBinary::ElemDiv,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }
    }

    fn factor(&mut self) -> PResult<Expression> {
        let lhs = self.primary()?;
        let op = match self.peek() {
            Some(Tok::Caret) => OpBinary::Exp,
            Some(Tok::ElemExp) => OpBinary::ElemExp,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.primary()?;
        Ok(Expression::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    }

    fn primary(&mut self) -> PResult<Expression> {
        match self.peek() {
            Some(Tok::UnsignedInteger) => {
                let token = self.bump();
                match token.text.parse::<i64>() {
                    Ok(value) => Ok(Expression::Integer { value, token }),
                    Err(_) => match token.text.parse::<f64>() {
                        Ok(value) => Ok(Expression::Real { value, token }),
                        Err(_) => Err(ParseError::InvalidNumber {
                            text: token.text,
                            span: token.span,
                        }),
                    },
                }
            }
            Some(Tok::UnsignedReal) => {
                let token = self.bump();
                match token.text.parse::<f64>() {
                    Ok(value) => Ok(Expression::Real { value, token }),
                    Err(_) => Err(ParseError::InvalidNumber {
                        text: token.text,
                        span: token.span,
                    }),
                }
            }
            Some(Tok::String) => {
                let token = self.bump();
                Ok(Expression::String {
                    value: unescape(&token.text),
                    token,
                })
            }
            Some(Tok::True | Tok::False) => {
                let value = self.at(Tok::True);
                let token = self.bump();
                Ok(Expression::Boolean { value, token })
            }
            Some(Tok::End) => {
                self.pos += 1;
                Ok(Expression::End)
            }
            Some(Tok::Der | Tok::Initial | Tok::Pure) => {
                let ident = self.bump();
                let callee = ComponentReference {
                    global: false,
                    parts: vec![ComponentRefPart {
                        ident,
                        subs: Vec::new(),
                    }],
                };
                let arguments = self.function_call_args()?;
                Ok(Expression::FunctionCall { callee, arguments })
            }
            Some(Tok::Ident | Tok::Dot) => {
                let callee = self.component_reference()?;
                if self.at(Tok::LParen) {
                    let arguments = self.function_call_args()?;
                    Ok(Expression::FunctionCall { callee, arguments })
                } else {
                    Ok(Expression::ComponentReference(callee))
                }
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let mut elements = self.output_expression_list()?;
                self.expect(Tok::RParen)?;
                if elements.len() == 1 {
                    if let Some(Some(inner)) = elements.pop() {
                        return Ok(Expression::Parenthesized {
                            inner: Box::new(inner),
                        });
                    }
                    return Ok(Expression::Tuple {
                        elements: vec![None],
                    });
                }
                Ok(Expression::Tuple { elements })
            }
            Some(Tok::LBracket) => {
                self.pos += 1;
                let mut rows = vec![self.expression_list()?];
                while self.eat(Tok::Semi) {
                    rows.push(self.expression_list()?);
                }
                self.expect(Tok::RBracket)?;
                Ok(Expression::Matrix { rows })
            }
            Some(Tok::LBrace) => {
                self.pos += 1;
                if self.eat(Tok::RBrace) {
                    return Ok(Expression::Array {
                        elements: Vec::new(),
                    });
                }
                let first = self.expression()?;
                if self.eat(Tok::For) {
                    let indices = self.for_indices()?;
                    self.expect(Tok::RBrace)?;
                    return Ok(Expression::ArrayComprehension {
                        expr: Box::new(first),
                        indices,
                    });
                }
                let mut elements = vec![first];
                while self.eat(Tok::Comma) {
                    elements.push(self.expression()?);
                }
                self.expect(Tok::RBrace)?;
                Ok(Expression::Array { elements })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn expression_list(&mut self) -> PResult<Vec<Expression>> {
        let mut list = vec![self.expression()?];
        while self.eat(Tok::Comma) {
            list.push(self.expression()?);
        }
        Ok(list)
    }

    fn output_expression_list(&mut self) -> PResult<Vec<Option<Expression>>> {
        let mut list = Vec::new();
        loop {
            if self.at(Tok::Comma) || self.at(Tok::RParen) {
                list.push(None);
            } else {
                list.push(Some(self.expression()?));
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn component_reference(&mut self) -> PResult<ComponentReference> {
        let global = self.eat(Tok::Dot);
        let mut parts = Vec::new();
        loop {
            let ident = self.ident()?;
            let subs = if self.at(Tok::LBracket) {
                self.array_subscripts()?
            } else {
                Vec::new()
            };
            parts.push(ComponentRefPart { ident, subs });
            if !(self.at(Tok::Dot) && self.peek_at(1) == Some(Tok::Ident)) {
                break;
            }
            self.pos += 1;
        }
        Ok(ComponentReference { global, parts })
    }

    fn array_subscripts(&mut self) -> PResult<Vec<Subscript>> {
        self.expect(Tok::LBracket)?;
        let mut subs = Vec::new();
        loop {
            if self.at(Tok::Colon)
                && matches!(self.peek_at(1), Some(Tok::Comma | Tok::RBracket))
            {
                self.pos += 1;
                subs.push(Subscript::Colon);
            } else {
                subs.push(Subscript::Expression(self.expression()?));
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RBracket)?;
        Ok(subs)
    }

    fn for_indices(&mut self) -> PResult<Vec<ForIndex>> {
        let mut indices = Vec::new();
        loop {
            let ident = self.ident()?;
            let range = if self.eat(Tok::In) {
                Some(self.expression()?)
            } else {
                None
            };
            indices.push(ForIndex { ident, range });
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok(indices)
    }

    fn function_call_args(&mut self) -> PResult<FunctionArguments> {
        self.expect(Tok::LParen)?;
        let mut arguments = FunctionArguments::default();
        if self.eat(Tok::RParen) {
            return Ok(arguments);
        }
        loop {
            if self.at(Tok::Ident) && self.peek_at(1) == Some(Tok::Eq) {
                let name = self.ident()?;
                self.expect(Tok::Eq)?;
                let value = self.function_argument()?;
                arguments.named.push(NamedArgument { name, value });
            } else {
                let value = self.function_argument()?;
                if arguments.positional.is_empty()
                    && arguments.named.is_empty()
                    && self.eat(Tok::For)
                {
                    let indices = self.for_indices()?;
                    arguments.comprehension = Some((Box::new(value), indices));
                    break;
                }
                arguments.positional.push(value);
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        Ok(arguments)
    }

    fn function_argument(&mut self) -> PResult<Expression> {
        if !self.eat(Tok::Function) {
            return self.expression();
        }
        let callee = self.name()?;
        self.expect(Tok::LParen)?;
        let mut arguments = Vec::new();
        if !self.at(Tok::RParen) {
            loop {
                let name = self.ident()?;
                self.expect(Tok::Eq)?;
                let value = self.function_argument()?;
                arguments.push(NamedArgument { name, value });
                if !self.eat(Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RParen)?;
        Ok(Expression::PartialApplication { callee, arguments })
    }
}

/// Strips the quotes of a string literal and resolves escape sequences.
fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_test_code(code: &str) -> StoredDefinition {
        parse_stored_definition(code).expect("Failed to parse test code")
    }

    #[test]
    fn test_long_class_with_components() {
        let code = r#"
model Test "a test model"
  parameter Real k = 2.0 "gain";
  Real x[3], y(start = 1);
protected
  Integer n;
equation
  der(y) = -k * y;
end Test;
"#;
        let def = parse_test_code(code);
        let class = def.class("Test").expect("Test class not found");
        assert_eq!(class.class_type(), ClassType::Model);
        assert_eq!(class.description(), "a test model");

        let components: Vec<&ComponentDeclaration> = class
            .elements()
            .iter()
            .filter_map(|e| match e {
                Element::Component(c) => Some(c.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(components.len(), 4);
        assert_eq!(components[0].name.text, "k");
        assert_eq!(components[0].variability, Variability::Parameter);
        assert_eq!(components[1].subscripts.len(), 1);
        assert_eq!(components[3].visibility, Visibility::Protected);

        assert!(class
            .elements()
            .iter()
            .any(|e| matches!(e, Element::EquationSection(s) if s.equations.len() == 1)));
    }

    #[test]
    fn test_short_and_enumeration_classes() {
        let code = r#"
package P
  type Point = Real[2](each unit = "mm");
  type Pattern = enumeration(None, Solid "solid line", Dash);
  connector RealInput = input Real;
end P;
"#;
        let def = parse_test_code(code);
        let package = def.class("P").expect("P not found");
        let classes: Vec<&ClassDefinition> = package
            .elements()
            .iter()
            .filter_map(|e| match e {
                Element::Class(c) => Some(c.as_ref()),
                _ => None,
            })
            .collect();
        match &classes[0].specifier {
            ClassSpecifier::Short {
                type_specifier,
                subscripts,
                class_modification,
                ..
            } => {
                assert_eq!(type_specifier.to_string(), "Real");
                assert_eq!(subscripts.len(), 1);
                assert!(class_modification.is_some());
            }
            other => panic!("expected short class, got {other:?}"),
        }
        match &classes[1].specifier {
            ClassSpecifier::Enumeration { literals, .. } => {
                let names: Vec<&str> = literals.iter().map(|l| l.ident.text.as_str()).collect();
                assert_eq!(names, vec!["None", "Solid", "Dash"]);
            }
            other => panic!("expected enumeration, got {other:?}"),
        }
        match &classes[2].specifier {
            ClassSpecifier::Short { causality, .. } => assert_eq!(*causality, Causality::Input),
            other => panic!("expected short class, got {other:?}"),
        }
    }

    #[test]
    fn test_extends_imports_and_redeclarations() {
        let code = r#"
model M
  import SI = Modelica.Units.SI;
  import Modelica.Constants.*;
  import Modelica.Math.{sin, cos};
  extends Base(x = 3.0, redeclare model Inner = Other) annotation(Icon(graphics = {}));
  replaceable model Inner = Default constrainedby Interface;
end M;
"#;
        let def = parse_test_code(code);
        let class = def.class("M").expect("M not found");
        let elements = class.elements();
        assert!(matches!(&elements[0], Element::Import(i) if matches!(i.kind, ImportKind::Alias { .. })));
        assert!(matches!(&elements[1], Element::Import(i) if matches!(i.kind, ImportKind::Wildcard { .. })));
        assert!(matches!(&elements[2], Element::Import(i) if matches!(&i.kind, ImportKind::Multiple { imports, .. } if imports.len() == 2)));
        match &elements[3] {
            Element::Extends(e) => {
                let args = &e.class_modification.as_ref().expect("no modification").arguments;
                assert_eq!(args.len(), 2);
                assert!(matches!(args[1].as_ref(), Argument::ClassRedeclaration { .. }));
                assert!(e.annotation.is_some());
            }
            other => panic!("expected extends, got {other:?}"),
        }
        match &elements[4] {
            Element::Class(c) => {
                assert!(c.element_prefixes.replaceable);
                assert!(c.constraining.is_some());
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let expr = parse_expression("-2 ^ 2 + 3 * 4").expect("parse failed");
        match expr {
            Expression::Binary { lhs, op, rhs } => {
                assert_eq!(op, OpBinary::Add);
                assert!(matches!(*lhs, Expression::Unary { op: OpUnary::Minus, .. }));
                assert!(matches!(*rhs, Expression::Binary { op: OpBinary::Mul, .. }));
            }
            other => panic!("unexpected expression {other:?}"),
        }
    }

    #[test]
    fn test_ranges_arrays_and_calls() {
        let expr = parse_expression("{f(i, k = 2) for i in 1:2:10}").expect("parse failed");
        match expr {
            Expression::ArrayComprehension { expr, indices } => {
                assert_eq!(indices.len(), 1);
                assert!(matches!(
                    indices[0].range,
                    Some(Expression::Range { step: Some(_), .. })
                ));
                match *expr {
                    Expression::FunctionCall { arguments, .. } => {
                        assert_eq!(arguments.positional.len(), 1);
                        assert_eq!(arguments.named.len(), 1);
                    }
                    other => panic!("expected call, got {other:?}"),
                }
            }
            other => panic!("unexpected expression {other:?}"),
        }

        let matrix = parse_expression("[1, 2; 3, 4]").expect("parse failed");
        assert!(matches!(matrix, Expression::Matrix { rows } if rows.len() == 2));
    }

    #[test]
    fn test_equations_and_statements() {
        let code = r#"
model Test
  Real x;
  Boolean b;
equation
  connect(a.p, b.n) annotation(Line(points = {{0, 0}, {10, 0}}));
  if b then
    x = 1;
  elseif not b then
    x = 2;
  else
    x = 3;
  end if;
  when sample(0, 1) then
    reinit(x, 0);
  end when;
algorithm
  (x, y) := f(1);
  for i in 1:3 loop
    x := x + i;
  end for;
  while x > 0 loop
    x := x - 1;
    break;
  end while;
end Test;
"#;
        let def = parse_test_code(code);
        let class = def.class("Test").expect("Test not found");
        let sections: Vec<&Element> = class
            .elements()
            .iter()
            .filter(|e| matches!(e, Element::EquationSection(_) | Element::AlgorithmSection(_)))
            .collect();
        assert_eq!(sections.len(), 2);
        match sections[0] {
            Element::EquationSection(s) => {
                assert!(matches!(&s.equations[0], Equation::Connect { description, .. } if description.annotation.is_some()));
                assert!(matches!(&s.equations[1], Equation::If { branches, else_branch, .. } if branches.len() == 2 && else_branch.len() == 1));
                assert!(matches!(&s.equations[2], Equation::When { .. }));
            }
            _ => unreachable!(),
        }
        match sections[1] {
            Element::AlgorithmSection(s) => {
                assert_eq!(s.statements.len(), 3);
                assert!(matches!(&s.statements[0], Statement::MultiAssignment { targets, .. } if targets.len() == 2));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_mismatched_end_name() {
        let err = parse_stored_definition("model A end B;").expect_err("should fail");
        assert!(matches!(err, ParseError::MismatchedEnd { .. }));
    }

    #[test]
    fn test_within_and_string_concatenation() {
        let code = r#"
within Modelica.Blocks;
model Test "first" + " second"
end Test;
"#;
        let def = parse_test_code(code);
        assert_eq!(def.within.as_ref().map(|n| n.to_string()), Some("Modelica.Blocks".to_string()));
        assert_eq!(def.classes[0].description(), "first second");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\"b\n""#), "a\"b\n");
    }
}
