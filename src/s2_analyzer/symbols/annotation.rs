//! Annotations as classes.
//!
//! An annotation clause such as `annotation(Icon(graphics = {...}),
//! Documentation(info = "..."))` becomes a class whose elements are the
//! predefined records it names, each instantiated with the written
//! arguments. Entries that name nothing known are ignored.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::modification::ModificationEnvironment;
use super::super::scope::{NamedElement, Reference, ScopeId};
use super::{ClassId, ClassSymbol, ComponentId, ComponentKind, ExtendsId, ExtendsSyntax, ObjectSymbol};

impl Context {
    /// Builds the annotation class for `annotation`, written in `scope`.
    pub fn instantiate_annotation(&mut self, annotation: &ast::Annotation, scope: ScopeId) -> ClassId {
        let mut elements = Vec::new();
        for argument in &annotation.class_modification.arguments {
            let ast::Argument::ElementModification {
                name,
                modification: Some(modification),
                ..
            } = argument.as_ref()
            else {
                continue;
            };
            let Some(class_modification) = &modification.class_modification else {
                continue;
            };
            let found = self
                .resolve(scope, &Reference::from_name(name), true)
                .and_then(NamedElement::class);
            let Some(found) = found else {
                log::debug!("ignoring unknown annotation `{name}`");
                continue;
            };
            let environment = ModificationEnvironment::from_class_modification(Some(class_modification), scope);
            let parent = self.class(found).parent;
            elements.push(self.instantiate_class(found, parent, environment));
        }
        self.alloc_class(ClassSymbol::annotation(elements, scope))
    }

    fn annotation_class(&mut self, annotation: Option<Arc<ast::Annotation>>, scope: ScopeId) -> Option<ClassId> {
        annotation.map(|a| self.instantiate_annotation(&a, scope))
    }

    /// Annotation of the class declaration, evaluated in the class itself.
    pub fn class_annotation(&mut self, class: ClassId) -> Option<ClassId> {
        if let Some(memo) = self.class(class).annotation {
            return memo;
        }
        let annotation = self.class(class).syntax().and_then(|s| s.annotation().cloned());
        let found = self.annotation_class(annotation, ScopeId::Class(class));
        self.class_mut(class).annotation = Some(found);
        found
    }

    /// Annotation of a component declaration, evaluated in its owner.
    pub fn component_annotation(&mut self, component: ComponentId) -> Option<ClassId> {
        if let Some(memo) = self.component(component).annotation {
            return memo;
        }
        let symbol = self.component(component);
        let (annotation, scope) = match &symbol.kind {
            ComponentKind::Declared { syntax, scope } => (syntax.description.annotation.clone(), *scope),
            ComponentKind::EnumerationLiteral { .. } => (None, ScopeId::Class(symbol.parent)),
        };
        let found = self.annotation_class(annotation, scope);
        self.component_mut(component).annotation = Some(found);
        found
    }

    pub fn extends_annotation(&mut self, extends: ExtendsId) -> Option<ClassId> {
        let symbol = self.extends_symbol(extends);
        let scope = ScopeId::Class(symbol.parent);
        let annotation = match &symbol.syntax {
            ExtendsSyntax::Clause(clause) => clause.annotation.clone(),
            ExtendsSyntax::Short(_) => None,
        };
        self.annotation_class(annotation, scope)
    }

    /// Value of an annotation class: one constructed record per entry.
    pub fn evaluate_annotation(&mut self, annotation: ClassId) -> Option<ObjectSymbol> {
        self.construct(annotation, None)
    }

    /// The constructed entry named `identifier`, e.g. `Icon`.
    pub fn annotation_entry(&mut self, annotation: ClassId, identifier: &str) -> Option<ObjectSymbol> {
        let entry = self
            .elements(annotation)
            .into_iter()
            .filter_map(|e| match e {
                super::ElementSymbol::Class(id) => Some(id),
                _ => None,
            })
            .find(|id| self.class(*id).identifier == identifier)?;
        self.construct(entry, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::symbols::ObjectValue;
    use serde_json::json;

    fn class_named(cx: &mut Context, dotted: &str) -> ClassId {
        cx.resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::class)
            .unwrap_or_else(|| panic!("{dotted} not found"))
    }

    #[test]
    fn test_class_annotation() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
model M
  constant Real w = 20;
  annotation(
    Icon(graphics = {Rectangle(extent = {{-w, -w}, {w, w}})}),
    Documentation(info = "<html>M</html>"),
    experiment(StopTime = 1));
end M;
"#,
        );
        let m = class_named(&mut cx, "M");
        let annotation = cx.class_annotation(m).expect("no annotation");
        assert_eq!(cx.class_annotation(m), Some(annotation));
        assert_eq!(cx.elements(annotation).len(), 2);

        let docs = cx.annotation_entry(annotation, "Documentation").expect("no documentation");
        assert_eq!(docs.field("info").and_then(ObjectSymbol::as_str), Some("<html>M</html>"));

        let icon = cx.annotation_entry(annotation, "Icon").expect("no icon");
        let graphics = icon.field("graphics").and_then(ObjectSymbol::elements).expect("no graphics");
        assert_eq!(graphics.len(), 1);
        let rectangle = graphics[0].as_ref().expect("no rectangle");
        assert_eq!(cx.class(rectangle.ty).identifier, "Rectangle");
        assert_eq!(
            rectangle.field("extent").map(|e| e.to_json(&cx)),
            Some(json!([[-20.0, -20.0], [20.0, 20.0]]))
        );
        assert_eq!(rectangle.field("visible").and_then(ObjectSymbol::as_bool), Some(true));

        let value = cx.evaluate_annotation(annotation).expect("no value");
        assert!(matches!(value.value, ObjectValue::Array(ref items) if items.len() == 2));
    }

    #[test]
    fn test_component_annotation() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
model M
  Real x annotation(Placement(transformation(extent = {{-10, -10}, {10, 10}})));
  Real y;
end M;
"#,
        );
        let m = class_named(&mut cx, "M");
        let components = cx.components(m);
        let placement = cx
            .component_annotation(components[0])
            .and_then(|a| cx.annotation_entry(a, "Placement"))
            .expect("no placement");
        let extent = placement
            .field("transformation")
            .and_then(|t| t.field("extent"))
            .map(|e| e.to_json(&cx));
        assert_eq!(extent, Some(json!([[-10.0, -10.0], [10.0, 10.0]])));
        assert!(cx.component_annotation(components[1]).is_none());
    }
}
