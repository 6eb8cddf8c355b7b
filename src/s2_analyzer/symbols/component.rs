//! Component symbols: a declared type plus a constant value.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::modification::ModificationEnvironment;
use super::super::scope::{NamedElement, Reference, ScopeId};
use super::{
    BuiltinType, ClassId, ClassKind, ComponentId, InstantiationState, ObjectSymbol, ObjectValue, Pass,
};

#[derive(Clone, Debug, PartialEq)]
pub enum ComponentKind {
    /// `scope` is where the declaration was written: the owning class, or
    /// the class holding a `redeclare` that replaced it.
    Declared {
        syntax: Arc<ast::ComponentDeclaration>,
        scope: ScopeId,
    },
    EnumerationLiteral { ordinal: i64, description: String },
}

#[derive(Clone, Debug)]
pub struct ComponentSymbol {
    pub identifier: String,
    pub parent: ClassId,
    /// Arguments routed to this component by the owner's environment.
    pub environment: ModificationEnvironment,
    pub kind: ComponentKind,
    pub(crate) state: InstantiationState,
    /// Set once the declared type was resolved; `class_symbol` is final then.
    pub(crate) typed: bool,
    pub(crate) class_symbol: Option<ClassId>,
    pub(crate) value: Option<ObjectSymbol>,
    pub(crate) annotation: Option<Option<ClassId>>,
}

impl ComponentSymbol {
    pub fn declared(
        parent: ClassId,
        syntax: Arc<ast::ComponentDeclaration>,
        scope: ScopeId,
        environment: ModificationEnvironment,
    ) -> Self {
        Self {
            identifier: syntax.name.text.clone(),
            parent,
            environment,
            kind: ComponentKind::Declared { syntax, scope },
            state: InstantiationState::NotStarted,
            typed: false,
            class_symbol: None,
            value: None,
            annotation: None,
        }
    }

    /// Literal of enumeration `parent`; its type and value are known up front.
    pub fn literal(parent: ClassId, identifier: String, ordinal: i64, description: String) -> Self {
        let value = ObjectSymbol::new(
            parent,
            ObjectValue::Enumeration {
                literal: identifier.clone(),
                ordinal,
            },
        );
        Self {
            identifier,
            parent,
            environment: ModificationEnvironment::default(),
            kind: ComponentKind::EnumerationLiteral {
                ordinal,
                description,
            },
            state: InstantiationState::Done,
            typed: true,
            class_symbol: Some(parent),
            value: Some(value),
            annotation: Some(None),
        }
    }

    pub fn syntax(&self) -> Option<&Arc<ast::ComponentDeclaration>> {
        match &self.kind {
            ComponentKind::Declared { syntax, .. } => Some(syntax),
            ComponentKind::EnumerationLiteral { .. } => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ComponentKind::EnumerationLiteral { .. })
    }

    pub fn description(&self) -> String {
        match &self.kind {
            ComponentKind::Declared { syntax, .. } => syntax.description.text(),
            ComponentKind::EnumerationLiteral { description, .. } => description.clone(),
        }
    }
}

impl Context {
    /// Resolves the declared type and computes the value, once.
    ///
    /// The value is, in order: a binding from the owner's environment
    /// (evaluated where it was written), the declaration's own binding, or
    /// the default construction of the type. A value computed while a cycle
    /// further up was cut short is kept only until that cycle's outermost
    /// pass finishes; the type is kept for good.
    pub(crate) fn instantiate_component(&mut self, component: ComponentId) {
        if self.component(component).state == InstantiationState::Done {
            self.read_memo(component);
            return;
        }
        let symbol = self.component(component);
        let ComponentKind::Declared { syntax, scope } = symbol.kind.clone() else {
            return;
        };
        let identifier = symbol.identifier.clone();
        let environment = symbol.environment.clone();
        let parent = symbol.parent;
        let declaration = Some(syntax.node_data.id);
        if !self.enter(Pass::Component, component.index(), declaration, &environment) {
            let name = format!("{}.{}", self.qualified_name(parent), identifier);
            self.report_cycle(Pass::Component, name);
            return;
        }
        self.component_mut(component).state = InstantiationState::InProgress;

        if !self.component(component).typed {
            let class_modification = syntax
                .modification
                .as_ref()
                .and_then(|m| m.class_modification.as_ref());
            let type_environment = environment
                .descend(&identifier)
                .merge(&ModificationEnvironment::from_class_modification(class_modification, scope));
            let ty = self.resolve_declared_type(&syntax, scope, type_environment);
            let symbol = self.component_mut(component);
            symbol.class_symbol = ty;
            symbol.typed = true;
        }
        let ty = self.component(component).class_symbol;

        let value = if let Some((expr, at)) = environment.get_binding(&identifier) {
            let expr = expr.clone();
            self.evaluate(at, &expr)
        } else if let Some(expr) = syntax.modification.as_ref().and_then(|m| m.expression.as_ref()) {
            self.evaluate(scope, expr)
        } else {
            ty.and_then(|ty| self.construct(ty, None))
        };
        let value = match (value, ty) {
            (Some(value), Some(ty)) => Some(self.coerce(value, ty)),
            (value, _) => value,
        };

        let pending = self.leave(Pass::Component, component.index());
        let symbol = self.component_mut(component);
        symbol.value = value;
        symbol.state = InstantiationState::Done;
        if let Some(head) = pending {
            self.defer(head, component);
        }
    }

    fn resolve_declared_type(
        &mut self,
        syntax: &ast::ComponentDeclaration,
        scope: ScopeId,
        environment: ModificationEnvironment,
    ) -> Option<ClassId> {
        let reference = Reference::from_type_specifier(&syntax.type_specifier, Vec::new());
        let Some(class) = self.resolve(scope, &reference, false).and_then(NamedElement::class) else {
            log::debug!("unresolved type `{}` of `{}`", syntax.type_specifier, syntax.name);
            return None;
        };
        let parent = self.class(class).parent;
        let class = self.instantiate_class(class, parent, environment);

        let mut subscripts = syntax.type_subscripts.clone();
        subscripts.extend(syntax.subscripts.iter().cloned());
        if subscripts.is_empty() {
            return Some(class);
        }
        let shape = self.evaluate_shape(scope, &subscripts);
        Some(self.array_class(class, shape))
    }

    /// Integer values (and arrays of them) stored where a `Real` is
    /// declared become reals.
    pub(crate) fn coerce(&mut self, value: ObjectSymbol, ty: ClassId) -> ObjectSymbol {
        if self.is_real_type(ty) {
            self.widen(value)
        } else {
            value
        }
    }

    fn widen(&self, value: ObjectSymbol) -> ObjectSymbol {
        match value.value {
            ObjectValue::Integer(n) => {
                ObjectSymbol::new(self.builtin(BuiltinType::Real), ObjectValue::Real(n as f64))
            }
            ObjectValue::Array(elements) => ObjectSymbol::new(
                value.ty,
                ObjectValue::Array(
                    elements
                        .into_iter()
                        .map(|e| e.map(|e| self.widen(e)))
                        .collect(),
                ),
            ),
            ObjectValue::Filled { shape, element } => ObjectSymbol::new(
                value.ty,
                ObjectValue::Filled {
                    shape,
                    element: element.map(|e| Box::new(self.widen(*e))),
                },
            ),
            _ => value,
        }
    }

    /// `Real`, arrays of it and short classes derived from either.
    fn is_real_type(&mut self, ty: ClassId) -> bool {
        let mut seen = Vec::new();
        let mut current = ty;
        loop {
            if seen.contains(&current) {
                return false;
            }
            seen.push(current);
            current = match self.class(current).kind.clone() {
                ClassKind::Builtin(builtin) => return builtin == BuiltinType::Real,
                ClassKind::Array { dtype, .. } => dtype,
                ClassKind::Declared { syntax, .. }
                    if matches!(syntax.specifier, ast::ClassSpecifier::Short { .. }) =>
                {
                    match self.base_classes(current).first() {
                        Some(base) => *base,
                        None => return false,
                    }
                }
                ClassKind::Declared { .. } | ClassKind::Annotation { .. } => return false,
            };
        }
    }

    /// Declared type, instantiated with the routed modifications.
    pub fn component_class(&mut self, component: ComponentId) -> Option<ClassId> {
        self.instantiate_component(component);
        self.component(component).class_symbol
    }

    pub fn component_value(&mut self, component: ComponentId) -> Option<ObjectSymbol> {
        self.instantiate_component(component);
        self.component(component).value.clone()
    }
}
