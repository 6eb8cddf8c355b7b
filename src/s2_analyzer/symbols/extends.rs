//! Extends symbols: one per `extends` clause, or the single implicit base of
//! a short class definition.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::modification::ModificationEnvironment;
use super::super::scope::{Reference, ScopeId};
use super::{ClassId, ExtendsId, InstantiationState, Pass};

#[derive(Clone, Debug, PartialEq)]
pub enum ExtendsSyntax {
    Clause(Arc<ast::ExtendsClause>),
    /// `type T = Base(...)`
    Short(Arc<ast::ClassDefinition>),
}

impl ExtendsSyntax {
    fn node_id(&self) -> usize {
        match self {
            ExtendsSyntax::Clause(clause) => clause.node_data.id,
            ExtendsSyntax::Short(definition) => definition.node_data.id,
        }
    }

    fn parts(&self) -> (Reference, Option<&ast::ClassModification>) {
        match self {
            ExtendsSyntax::Clause(clause) => (
                Reference::from_type_specifier(&clause.type_specifier, Vec::new()),
                clause.class_modification.as_ref(),
            ),
            ExtendsSyntax::Short(definition) => match &definition.specifier {
                ast::ClassSpecifier::Short {
                    type_specifier,
                    subscripts,
                    class_modification,
                    ..
                } => (
                    Reference::from_type_specifier(type_specifier, subscripts.clone()),
                    class_modification.as_ref(),
                ),
                _ => (Reference::default(), None),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtendsSymbol {
    pub parent: ClassId,
    /// The whole environment of the extending class.
    pub environment: ModificationEnvironment,
    pub syntax: ExtendsSyntax,
    pub(crate) state: InstantiationState,
    pub(crate) class_symbol: Option<ClassId>,
}

impl ExtendsSymbol {
    pub fn new(parent: ClassId, syntax: ExtendsSyntax, environment: ModificationEnvironment) -> Self {
        Self {
            parent,
            environment,
            syntax,
            state: InstantiationState::NotStarted,
            class_symbol: None,
        }
    }

    /// Resolved base class, once the owner's base classes pass ran.
    pub fn class_symbol(&self) -> Option<ClassId> {
        self.class_symbol
    }
}

impl Context {
    /// Resolves the base class and instantiates it with the extending
    /// class's environment in front of the clause's own modification.
    pub(crate) fn instantiate_extends(&mut self, extends: ExtendsId) {
        if self.extends_symbol(extends).state == InstantiationState::Done {
            return;
        }
        let symbol = self.extends_symbol(extends);
        let owner = symbol.parent;
        let syntax = symbol.syntax.clone();
        let environment = symbol.environment.clone();
        let declaration = Some(syntax.node_id());
        if !self.enter(Pass::Extends, extends.index(), declaration, &environment) {
            self.report_cycle(Pass::Extends, self.qualified_name(owner));
            return;
        }
        self.extends_mut(extends).state = InstantiationState::InProgress;

        let (reference, class_modification) = syntax.parts();
        let base = self.resolve_base(owner, &reference).map(|base| {
            let base_environment = environment.merge(&ModificationEnvironment::from_class_modification(
                class_modification,
                ScopeId::Class(owner),
            ));
            let parent = self.class(base).parent;
            self.instantiate_class(base, parent, base_environment)
        });
        let base = match base {
            Some(base) if !reference.subscripts.is_empty() => {
                let shape = self.evaluate_shape(ScopeId::Class(owner), &reference.subscripts);
                Some(self.array_class(base, shape))
            }
            other => other,
        };
        if base.is_none() {
            log::debug!(
                "unresolved base class `{reference}` of `{}`",
                self.qualified_name(owner)
            );
        }

        let symbol = self.extends_mut(extends);
        symbol.class_symbol = base;
        symbol.state = InstantiationState::Done;
        if let Some(base) = base {
            self.ensure_base_classes(base);
        }
        self.leave(Pass::Extends, extends.index());
    }

    /// Base names are looked up outward from the owner's parent, never
    /// inside the class being defined.
    fn resolve_base(&mut self, owner: ClassId, reference: &Reference) -> Option<ClassId> {
        let parent = self.class(owner).parent;
        self.lookup(parent, &reference.identifiers, reference.global)?
            .class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::NamedElement;
    use crate::s2_analyzer::symbols::{BuiltinType, ObjectValue};

    fn class_named(cx: &mut Context, dotted: &str) -> ClassId {
        cx.resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::class)
            .unwrap_or_else(|| panic!("{dotted} not found"))
    }

    #[test]
    fn test_short_class_extends_its_target() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
type Voltage = Real(unit = "V");
type Triple = Integer[3];
"#,
        );
        let voltage = class_named(&mut cx, "Voltage");
        let bases = cx.base_classes(voltage);
        assert_eq!(bases.len(), 1);
        assert_eq!(cx.class(bases[0]).identifier, "Real");
        assert_eq!(cx.class(bases[0]).environment.len(), 1);

        let triple = class_named(&mut cx, "Triple");
        let bases = cx.base_classes(triple);
        let int = cx.builtin(BuiltinType::Integer);
        assert_eq!(bases, vec![cx.array_class(int, vec![Some(3)])]);
    }

    #[test]
    fn test_base_class_is_resolved_outside_the_class() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
model Base Real outer_x; end Base;
model M
  model Base Real inner_x; end Base;
  extends Base;
end M;
"#,
        );
        let m = class_named(&mut cx, "M");
        let x = cx
            .get_named_element(m, "inner_x")
            .and_then(NamedElement::component);
        assert!(x.is_none());
        assert!(cx.get_named_element(m, "outer_x").is_some());
        assert_eq!(cx.classes(m).len(), 1);
    }

    #[test]
    fn test_unresolved_base_is_skipped() {
        let mut cx = Context::new();
        cx.open_document("test.mo", "model M extends Missing; Real x = 2; end M;");
        let m = class_named(&mut cx, "M");
        assert!(cx.base_classes(m).is_empty());
        let x = cx
            .get_named_element(m, "x")
            .and_then(NamedElement::component)
            .expect("x not found");
        assert_eq!(cx.component_value(x).map(|v| v.value), Some(ObjectValue::Real(2.0)));
    }
}
