//! Import clauses. Imports are consulted after a class's own and inherited
//! members and always resolve their target from the root.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::scope::{NamedElement, Reference, ScopeId};
use super::{ClassId, ImportId};

#[derive(Clone, Debug)]
pub struct ImportSymbol {
    pub parent: ClassId,
    pub syntax: Arc<ast::ImportClause>,
    /// Resolved target of a single-name import.
    memo: Option<Option<NamedElement>>,
}

impl ImportSymbol {
    pub fn new(parent: ClassId, syntax: Arc<ast::ImportClause>) -> Self {
        Self {
            parent,
            syntax,
            memo: None,
        }
    }

    /// Name the import binds locally, for single-name imports.
    pub fn alias(&self) -> Option<&str> {
        match &self.syntax.kind {
            ast::ImportKind::Qualified { name } => name.parts.last().map(|t| t.text.as_str()),
            ast::ImportKind::Alias { alias, .. } => Some(&alias.text),
            ast::ImportKind::Wildcard { .. } | ast::ImportKind::Multiple { .. } => None,
        }
    }
}

impl Context {
    fn import_target(&mut self, import: ImportId) -> Option<NamedElement> {
        if let Some(memo) = self.import_symbol(import).memo {
            return memo;
        }
        let symbol = self.import_symbol(import);
        let parent = symbol.parent;
        let target = match &symbol.syntax.kind {
            ast::ImportKind::Qualified { name } | ast::ImportKind::Alias { name, .. } => {
                Some(Reference::from_name(name))
            }
            _ => None,
        };
        let found = target.and_then(|target| self.resolve(ScopeId::Class(parent), &target, true));
        self.import_mut(import).memo = Some(found);
        found
    }

    /// Resolves `identifier` through the import clauses of `class`.
    pub(crate) fn import_lookup(&mut self, class: ClassId, identifier: &str) -> Option<NamedElement> {
        for import in self.imports(class) {
            let symbol = self.import_symbol(import);
            let parent = symbol.parent;
            let syntax = symbol.syntax.clone();
            let found = match &syntax.kind {
                ast::ImportKind::Qualified { .. } | ast::ImportKind::Alias { .. } => {
                    if self.import_symbol(import).alias() != Some(identifier) {
                        continue;
                    }
                    self.import_target(import)
                }
                ast::ImportKind::Multiple { name, imports } => {
                    if !imports.iter().any(|t| t.text == identifier) {
                        continue;
                    }
                    let mut target = Reference::from_name(name);
                    target.identifiers.push(identifier.to_string());
                    self.resolve(ScopeId::Class(parent), &target, true)
                }
                ast::ImportKind::Wildcard { name } => {
                    let package = Reference::from_name(name);
                    self.resolve(ScopeId::Class(parent), &package, true)
                        .and_then(NamedElement::class)
                        .and_then(|package| self.get_named_element(package, identifier))
                }
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::symbols::ObjectValue;

    fn value_of(cx: &mut Context, dotted: &str) -> Option<ObjectValue> {
        let component = cx
            .resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::component)?;
        cx.component_value(component).map(|v| v.value)
    }

    #[test]
    fn test_import_forms() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
package Lib
  constant Integer a = 1;
  constant Integer b = 2;
  package Sub
    constant Integer c = 3;
  end Sub;
end Lib;
model Qualified
  import Lib.Sub;
  Integer x = Sub.c;
end Qualified;
model Aliased
  import S = Lib.Sub;
  Integer x = S.c;
end Aliased;
model Wildcard
  import Lib.*;
  Integer x = b;
end Wildcard;
model Multiple
  import Lib.{a, b};
  Integer x = a + b;
end Multiple;
model Shadowed
  import Lib.*;
  Integer a = 10;
  Integer x = a;
end Shadowed;
"#,
        );
        assert_eq!(value_of(&mut cx, "Qualified.x"), Some(ObjectValue::Integer(3)));
        assert_eq!(value_of(&mut cx, "Aliased.x"), Some(ObjectValue::Integer(3)));
        assert_eq!(value_of(&mut cx, "Wildcard.x"), Some(ObjectValue::Integer(2)));
        assert_eq!(value_of(&mut cx, "Multiple.x"), Some(ObjectValue::Integer(3)));
        assert_eq!(value_of(&mut cx, "Shadowed.x"), Some(ObjectValue::Integer(10)));
    }

    #[test]
    fn test_imports_are_not_members() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            "package P constant Integer k = 1; end P; model M import P.k; end M;",
        );
        let m = cx
            .resolve(ScopeId::Context, &Reference::parse("M"), false)
            .and_then(NamedElement::class)
            .expect("M not found");
        assert_eq!(cx.imports(m).len(), 1);
        assert!(cx.get_named_element(m, "k").is_none());
        assert!(cx.import_lookup(m, "k").is_some());
    }
}
