//! Name resolution capability.
//!
//! Anything a dotted name can be resolved against is a [`Scope`]: the root
//! [`Context`], a [`Library`](super::library::Library), an open
//! [`Document`](super::document::Document) or a class instance. Lookups
//! walk outward through parents and end at the context, which consults
//! documents, the workspace, the library search path, the annotations
//! package and finally the builtin primitives.

use std::fmt;

use crate::s1_parser::ast;

use super::context::Context;
use super::symbols::{ClassId, ComponentId, DocumentId, LibraryId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeId {
    Context,
    Library(LibraryId),
    Document(DocumentId),
    Class(ClassId),
}

impl From<ClassId> for ScopeId {
    fn from(value: ClassId) -> Self {
        ScopeId::Class(value)
    }
}

impl From<LibraryId> for ScopeId {
    fn from(value: LibraryId) -> Self {
        ScopeId::Library(value)
    }
}

impl From<DocumentId> for ScopeId {
    fn from(value: DocumentId) -> Self {
        ScopeId::Document(value)
    }
}

/// Result of a successful lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamedElement {
    Class(ClassId),
    Component(ComponentId),
}

impl NamedElement {
    pub fn class(self) -> Option<ClassId> {
        match self {
            NamedElement::Class(id) => Some(id),
            NamedElement::Component(_) => None,
        }
    }

    pub fn component(self) -> Option<ComponentId> {
        match self {
            NamedElement::Component(id) => Some(id),
            NamedElement::Class(_) => None,
        }
    }
}

/// A dotted name plus the array subscripts written after it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reference {
    pub global: bool,
    pub identifiers: Vec<String>,
    pub subscripts: Vec<ast::Subscript>,
}

impl Reference {
    /// Parses `A.B.C` or `.A.B` (global).
    pub fn parse(dotted: &str) -> Self {
        let global = dotted.starts_with('.');
        let identifiers = dotted
            .trim_start_matches('.')
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            global,
            identifiers,
            subscripts: Vec::new(),
        }
    }

    pub fn from_name(name: &ast::Name) -> Self {
        Self {
            global: false,
            identifiers: name.identifiers(),
            subscripts: Vec::new(),
        }
    }

    pub fn from_type_specifier(specifier: &ast::TypeSpecifier, subscripts: Vec<ast::Subscript>) -> Self {
        Self {
            global: specifier.global,
            identifiers: specifier.name.identifiers(),
            subscripts,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.identifiers.first().map(String::as_str)
    }

    /// The same name without its first identifier.
    pub fn rest(&self) -> &[String] {
        self.identifiers.get(1..).unwrap_or(&[])
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.global {
            write!(f, ".")?;
        }
        write!(f, "{}", self.identifiers.join("."))?;
        if !self.subscripts.is_empty() {
            write!(f, "[{}]", vec![":"; self.subscripts.len()].join(", "))?;
        }
        Ok(())
    }
}

pub trait Scope {
    /// Resolves `reference` to a class or component. `global` (or a
    /// reference written with a leading dot) skips local lookup. Misses are
    /// `None`, never errors.
    fn resolve(&self, cx: &mut Context, reference: &Reference, global: bool) -> Option<NamedElement>;

    /// Resolves a call target; only `function` and `record` classes match.
    fn resolve_function(
        &self,
        cx: &mut Context,
        reference: &ast::ComponentReference,
        global: bool,
    ) -> Option<ClassId>;
}

impl Scope for ScopeId {
    fn resolve(&self, cx: &mut Context, reference: &Reference, global: bool) -> Option<NamedElement> {
        cx.resolve(*self, reference, global)
    }

    fn resolve_function(
        &self,
        cx: &mut Context,
        reference: &ast::ComponentReference,
        global: bool,
    ) -> Option<ClassId> {
        cx.resolve_function(*self, reference, global)
    }
}

macro_rules! scope_via_id {
    ($($ty:ty),*) => {
        $(
            impl Scope for $ty {
                fn resolve(&self, cx: &mut Context, reference: &Reference, global: bool) -> Option<NamedElement> {
                    cx.resolve(ScopeId::from(*self), reference, global)
                }

                fn resolve_function(
                    &self,
                    cx: &mut Context,
                    reference: &ast::ComponentReference,
                    global: bool,
                ) -> Option<ClassId> {
                    cx.resolve_function(ScopeId::from(*self), reference, global)
                }
            }
        )*
    };
}

scope_via_id!(ClassId, LibraryId, DocumentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parse() {
        let reference = Reference::parse(".Modelica.Blocks");
        assert!(reference.global);
        assert_eq!(reference.identifiers, vec!["Modelica", "Blocks"]);
        assert_eq!(reference.first(), Some("Modelica"));
        assert_eq!(reference.rest(), &["Blocks".to_string()]);
        assert_eq!(reference.to_string(), ".Modelica.Blocks");
    }
}
