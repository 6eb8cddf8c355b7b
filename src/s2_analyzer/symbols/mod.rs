//! Symbol graph.
//!
//! Symbols live in arenas owned by the [`Context`](super::context::Context)
//! and are addressed by copyable ids. Every symbol records the scope that
//! owns it and is expanded lazily, exactly once, by the passes implemented
//! in the submodules:
//!
//! - `class`: element projection, base classes and components passes, the
//!   derived member views and member lookup.
//! - `component`: declared type and value of a component.
//! - `extends`: base class resolution.
//! - `import`: import clause targets.
//! - `construct`: default record construction.
//! - `annotation`: annotation clauses as classes.
//! - `object`: constant values.

pub mod annotation;
pub mod class;
pub mod component;
pub mod construct;
pub mod extends;
pub mod import;
pub mod object;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::s1_parser::ast;

pub use class::{ClassKind, ClassSymbol, StructuredSource};
pub use component::{ComponentKind, ComponentSymbol};
pub use construct::ConstructorArguments;
pub use extends::{ExtendsSymbol, ExtendsSyntax};
pub use import::ImportSymbol;
pub use object::{ObjectSymbol, ObjectValue};

macro_rules! arena_id {
    ($($name:ident),*) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
            pub struct $name(pub(crate) usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id!(ClassId, ComponentId, ExtendsId, ImportId, LibraryId, DocumentId);

/// Progress of one lazy pass on one symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstantiationState {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

/// The lazily computed steps the cycle guard tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Pass {
    Elements,
    BaseClasses,
    Components,
    Component,
    Extends,
    Construct,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pass::Elements => "elements",
            Pass::BaseClasses => "base classes",
            Pass::Components => "components",
            Pass::Component => "component",
            Pass::Extends => "extends",
            Pass::Construct => "construction",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ClassRestriction {
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

impl From<ast::ClassType> for ClassRestriction {
    fn from(value: ast::ClassType) -> Self {
        match value {
            ast::ClassType::Class => ClassRestriction::Class,
            ast::ClassType::Model => ClassRestriction::Model,
            ast::ClassType::Block => ClassRestriction::Block,
            ast::ClassType::Connector => ClassRestriction::Connector,
            ast::ClassType::Record => ClassRestriction::Record,
            ast::ClassType::Function => ClassRestriction::Function,
            ast::ClassType::Package => ClassRestriction::Package,
            ast::ClassType::Type => ClassRestriction::Type,
            ast::ClassType::Operator => ClassRestriction::Operator,
        }
    }
}

impl fmt::Display for ClassRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassRestriction::Class => "class",
            ClassRestriction::Model => "model",
            ClassRestriction::Block => "block",
            ClassRestriction::Connector => "connector",
            ClassRestriction::Record => "record",
            ClassRestriction::Function => "function",
            ClassRestriction::Package => "package",
            ClassRestriction::Type => "type",
            ClassRestriction::Operator => "operator",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinType {
    Boolean,
    Integer,
    Real,
    String,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 4] = [
        BuiltinType::Boolean,
        BuiltinType::Integer,
        BuiltinType::Real,
        BuiltinType::String,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Boolean => "Boolean",
            BuiltinType::Integer => "Integer",
            BuiltinType::Real => "Real",
            BuiltinType::String => "String",
        }
    }

    pub fn from_name(name: &str) -> Option<BuiltinType> {
        BuiltinType::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// An element owned by a class after the elements pass.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementSymbol {
    Class(ClassId),
    Component(ComponentId),
    Extends(ExtendsId),
    Import(ImportId),
    EquationSection(Arc<ast::EquationSection>),
    AlgorithmSection(Arc<ast::AlgorithmSection>),
}

/// A `connect` equation together with the class it is declared in.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionSymbol {
    pub owner: ClassId,
    pub lhs: ast::ComponentReference,
    pub rhs: ast::ComponentReference,
    pub annotation: Option<Arc<ast::Annotation>>,
}

/// One short-circuited reentrant request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub pass: Pass,
    pub name: String,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cyclic {} of `{}`", self.pass, self.name)
    }
}
