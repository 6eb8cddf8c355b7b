//! Typed syntax tree produced by the parser.
//!
//! Every node that the symbol graph keeps a handle on is reference counted
//! (`Arc`) so class instances created by modification can share the same
//! declaration. Nodes carry a [`NodeData`] with a process-unique id, which the
//! analyzer uses to recognise two instances of the same declaration.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(1);

/// Byte range in the source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeData {
    pub id: usize,
    pub span: Span,
}

impl NodeData {
    pub fn new(span: Span) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            span,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Names
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dotted identifier, e.g. `Modelica.Blocks.Sources`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Name {
    pub parts: Vec<Token>,
}

impl Name {
    pub fn identifiers(&self) -> Vec<String> {
        self.parts.iter().map(|t| t.text.clone()).collect()
    }

    pub fn first(&self) -> Option<&str> {
        self.parts.first().map(|t| t.text.as_str())
    }

    pub fn span(&self) -> Span {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::default(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.parts.iter().map(|t| t.text.as_str()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeSpecifier {
    /// Leading `.` forces lookup from the root scope.
    pub global: bool,
    pub name: Name,
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.global {
            write!(f, ".")?;
        }
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Subscript {
    /// `:`
    Colon,
    Expression(Expression),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentRefPart {
    pub ident: Token,
    pub subs: Vec<Subscript>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentReference {
    pub global: bool,
    pub parts: Vec<ComponentRefPart>,
}

impl ComponentReference {
    pub fn identifiers(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.ident.text.clone()).collect()
    }
}

impl fmt::Display for ComponentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.global {
            write!(f, ".")?;
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part.ident)?;
            if !part.subs.is_empty() {
                write!(f, "[..]")?;
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expressions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpBinary {
    Add,
    Sub,
    Mul,
    Div,
    Exp,
    ElemAdd,
    ElemSub,
    ElemMul,
    ElemDiv,
    ElemExp,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
}

impl fmt::Display for OpBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpBinary::Add => "+",
            OpBinary::Sub => "-",
            OpBinary::Mul => "*",
            OpBinary::Div => "/",
            OpBinary::Exp => "^",
            OpBinary::ElemAdd => ".+",
            OpBinary::ElemSub => ".-",
            OpBinary::ElemMul => ".*",
            OpBinary::ElemDiv => "./",
            OpBinary::ElemExp => ".^",
            OpBinary::Lt => "<",
            OpBinary::Le => "<=",
            OpBinary::Gt => ">",
            OpBinary::Ge => ">=",
            OpBinary::Eq => "==",
            OpBinary::Neq => "<>",
            OpBinary::And => "and",
            OpBinary::Or => "or",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpUnary {
    Minus,
    Plus,
    ElemMinus,
    ElemPlus,
    Not,
}

impl fmt::Display for OpUnary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpUnary::Minus => "-",
            OpUnary::Plus => "+",
            OpUnary::ElemMinus => ".-",
            OpUnary::ElemPlus => ".+",
            OpUnary::Not => "not ",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForIndex {
    pub ident: Token,
    pub range: Option<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedArgument {
    pub name: Token,
    pub value: Expression,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionArguments {
    pub positional: Vec<Expression>,
    pub named: Vec<NamedArgument>,
    /// `f(x for x in 1:3)`
    pub comprehension: Option<(Box<Expression>, Vec<ForIndex>)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Boolean {
        value: bool,
        token: Token,
    },
    Integer {
        value: i64,
        token: Token,
    },
    Real {
        value: f64,
        token: Token,
    },
    String {
        value: String,
        token: Token,
    },
    ComponentReference(ComponentReference),
    FunctionCall {
        callee: ComponentReference,
        arguments: FunctionArguments,
    },
    /// `function f(k = 1)` passed as a functional argument.
    PartialApplication {
        callee: Name,
        arguments: Vec<NamedArgument>,
    },
    Binary {
        lhs: Box<Expression>,
        op: OpBinary,
        rhs: Box<Expression>,
    },
    Unary {
        op: OpUnary,
        rhs: Box<Expression>,
    },
    If {
        branches: Vec<(Expression, Expression)>,
        else_branch: Box<Expression>,
    },
    Range {
        start: Box<Expression>,
        step: Option<Box<Expression>>,
        end: Box<Expression>,
    },
    /// `{a, b, c}`
    Array {
        elements: Vec<Expression>,
    },
    /// `{f(i) for i in 1:n}`
    ArrayComprehension {
        expr: Box<Expression>,
        indices: Vec<ForIndex>,
    },
    /// `[a, b; c, d]`
    Matrix {
        rows: Vec<Vec<Expression>>,
    },
    Parenthesized {
        inner: Box<Expression>,
    },
    /// `(a, , b)` output expression list
    Tuple {
        elements: Vec<Option<Expression>>,
    },
    End,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Modifications and annotations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassModification {
    pub arguments: Vec<Arc<Argument>>,
}

impl ClassModification {
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

/// `(args) = expr`, `(args)` or `= expr`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Modification {
    pub class_modification: Option<ClassModification>,
    pub expression: Option<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    ElementModification {
        each: bool,
        final_: bool,
        name: Name,
        modification: Option<Modification>,
        description: Vec<String>,
    },
    ClassRedeclaration {
        each: bool,
        final_: bool,
        definition: Arc<ClassDefinition>,
    },
    ComponentRedeclaration {
        each: bool,
        final_: bool,
        declaration: Arc<ComponentDeclaration>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub node_data: NodeData,
    pub class_modification: ClassModification,
}

/// Description strings and annotation trailing a declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Description {
    pub strings: Vec<String>,
    pub annotation: Option<Arc<Annotation>>,
}

impl Description {
    pub fn text(&self) -> String {
        self.strings.concat()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Equations and statements
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, PartialEq)]
pub struct EquationBlock {
    pub condition: Expression,
    pub equations: Vec<Equation>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Equation {
    Simple {
        lhs: Expression,
        rhs: Expression,
        description: Description,
    },
    Connect {
        lhs: ComponentReference,
        rhs: ComponentReference,
        description: Description,
    },
    If {
        branches: Vec<EquationBlock>,
        else_branch: Vec<Equation>,
        description: Description,
    },
    For {
        indices: Vec<ForIndex>,
        equations: Vec<Equation>,
        description: Description,
    },
    When {
        branches: Vec<EquationBlock>,
        description: Description,
    },
    FunctionCall {
        callee: ComponentReference,
        arguments: FunctionArguments,
        description: Description,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementBlock {
    pub condition: Expression,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Assignment {
        target: ComponentReference,
        value: Expression,
    },
    /// `(a, b) := f(x)`
    MultiAssignment {
        targets: Vec<Option<Expression>>,
        callee: ComponentReference,
        arguments: FunctionArguments,
    },
    FunctionCall {
        callee: ComponentReference,
        arguments: FunctionArguments,
    },
    If {
        branches: Vec<StatementBlock>,
        else_branch: Vec<Statement>,
    },
    For {
        indices: Vec<ForIndex>,
        statements: Vec<Statement>,
    },
    While {
        condition: Expression,
        statements: Vec<Statement>,
    },
    When {
        branches: Vec<StatementBlock>,
    },
    Break,
    Return,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EquationSection {
    pub node_data: NodeData,
    pub initial: bool,
    pub equations: Vec<Equation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlgorithmSection {
    pub node_data: NodeData,
    pub initial: bool,
    pub statements: Vec<Statement>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Elements
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connection {
    #[default]
    Empty,
    Flow,
    Stream,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variability {
    #[default]
    Empty,
    Constant,
    Discrete,
    Parameter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Causality {
    #[default]
    Empty,
    Input,
    Output,
}

/// Prefixes shared by every element kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementPrefixes {
    pub redeclare: bool,
    pub final_: bool,
    pub inner: bool,
    pub outer: bool,
    pub replaceable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstrainingClause {
    pub type_specifier: TypeSpecifier,
    pub class_modification: Option<ClassModification>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDeclaration {
    pub node_data: NodeData,
    pub visibility: Visibility,
    pub prefixes: ElementPrefixes,
    pub connection: Connection,
    pub variability: Variability,
    pub causality: Causality,
    pub type_specifier: TypeSpecifier,
    /// Subscripts written on the type, shared by every name in the clause.
    pub type_subscripts: Vec<Subscript>,
    pub name: Token,
    pub subscripts: Vec<Subscript>,
    pub modification: Option<Modification>,
    pub condition: Option<Expression>,
    pub description: Description,
    pub constraining: Option<ConstrainingClause>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtendsClause {
    pub node_data: NodeData,
    pub visibility: Visibility,
    pub type_specifier: TypeSpecifier,
    pub class_modification: Option<ClassModification>,
    pub annotation: Option<Arc<Annotation>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportKind {
    /// `import A.B.C;`
    Qualified { name: Name },
    /// `import D = A.B.C;`
    Alias { alias: Token, name: Name },
    /// `import A.B.*;`
    Wildcard { name: Name },
    /// `import A.B.{C, D};`
    Multiple { name: Name, imports: Vec<Token> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportClause {
    pub node_data: NodeData,
    pub visibility: Visibility,
    pub kind: ImportKind,
    pub description: Description,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Class(Arc<ClassDefinition>),
    Component(Arc<ComponentDeclaration>),
    Extends(Arc<ExtendsClause>),
    Import(Arc<ImportClause>),
    EquationSection(Arc<EquationSection>),
    AlgorithmSection(Arc<AlgorithmSection>),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClassType {
    #[default]
    Class,
    Model,
    Block,
    Connector,
    Record,
    Function,
    Package,
    Type,
    Operator,
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassType::Class => "class",
            ClassType::Model => "model",
            ClassType::Block => "block",
            ClassType::Connector => "connector",
            ClassType::Record => "record",
            ClassType::Function => "function",
            ClassType::Package => "package",
            ClassType::Type => "type",
            ClassType::Operator => "operator",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassPrefixes {
    pub partial: bool,
    pub encapsulated: bool,
    pub expandable: bool,
    pub pure: bool,
    pub impure: bool,
    pub operator: bool,
    pub class_type: ClassType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumerationLiteral {
    pub ident: Token,
    pub description: Description,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalClause {
    pub language: Option<String>,
    pub call: Option<Expression>,
    pub annotation: Option<Arc<Annotation>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClassSpecifier {
    Long {
        description: Vec<String>,
        /// `model extends Base(...)` redefinition form.
        extends_modification: Option<ClassModification>,
        elements: Vec<Element>,
        external: Option<ExternalClause>,
        annotation: Option<Arc<Annotation>>,
    },
    /// `type T = input Base[2](m) "descr"`
    Short {
        causality: Causality,
        type_specifier: TypeSpecifier,
        subscripts: Vec<Subscript>,
        class_modification: Option<ClassModification>,
        description: Description,
    },
    Enumeration {
        literals: Vec<EnumerationLiteral>,
        /// `enumeration(:)`
        open: bool,
        description: Description,
    },
    Derivative {
        type_specifier: TypeSpecifier,
        arguments: Vec<Token>,
        description: Description,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDefinition {
    pub node_data: NodeData,
    pub visibility: Visibility,
    pub element_prefixes: ElementPrefixes,
    pub prefixes: ClassPrefixes,
    pub name: Token,
    pub specifier: ClassSpecifier,
    pub constraining: Option<ConstrainingClause>,
}

impl ClassDefinition {
    pub fn class_type(&self) -> ClassType {
        self.prefixes.class_type
    }

    pub fn elements(&self) -> &[Element] {
        match &self.specifier {
            ClassSpecifier::Long { elements, .. } => elements,
            _ => &[],
        }
    }

    /// Class annotation, wherever the specifier form places it.
    pub fn annotation(&self) -> Option<&Arc<Annotation>> {
        match &self.specifier {
            ClassSpecifier::Long { annotation, .. } => annotation.as_ref(),
            ClassSpecifier::Short { description, .. }
            | ClassSpecifier::Enumeration { description, .. }
            | ClassSpecifier::Derivative { description, .. } => description.annotation.as_ref(),
        }
    }

    pub fn description(&self) -> String {
        match &self.specifier {
            ClassSpecifier::Long { description, .. } => description.concat(),
            ClassSpecifier::Short { description, .. }
            | ClassSpecifier::Enumeration { description, .. }
            | ClassSpecifier::Derivative { description, .. } => description.text(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredDefinition {
    pub node_data: NodeData,
    pub within: Option<Name>,
    pub classes: Vec<Arc<ClassDefinition>>,
}

impl StoredDefinition {
    pub fn class(&self, name: &str) -> Option<&Arc<ClassDefinition>> {
        self.classes.iter().find(|c| c.name.text == name)
    }
}
