//! Serialisable snapshot of an instantiated class, used by the command line
//! printer, the `--json` output and the template generator.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::s1_parser::ast;

use super::context::Context;
use super::symbols::{ClassId, ComponentId};

#[derive(Clone, Debug, Serialize)]
pub struct ComponentView {
    pub name: String,
    pub type_name: Option<String>,
    pub variability: String,
    pub causality: String,
    pub description: String,
    pub value: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassView {
    pub name: String,
    pub restriction: Option<String>,
    pub description: String,
    pub base_classes: Vec<String>,
    pub classes: Vec<String>,
    pub components: Vec<ComponentView>,
    pub connections: Vec<(String, String)>,
    pub equation_sections: usize,
    pub algorithm_sections: usize,
}

impl ClassView {
    /// Instantiates `class` fully and records what it resolved to.
    pub fn new(cx: &mut Context, class: ClassId) -> Self {
        let base_classes = cx
            .base_classes(class)
            .into_iter()
            .map(|b| cx.qualified_name(b))
            .collect();
        let classes = cx
            .classes(class)
            .into_iter()
            .map(|c| cx.class(c).identifier.clone())
            .collect();
        let components = cx
            .components(class)
            .into_iter()
            .map(|c| component_view(cx, c))
            .collect();
        let connections = cx
            .connections(class)
            .into_iter()
            .map(|c| (c.lhs.to_string(), c.rhs.to_string()))
            .collect();
        let symbol = cx.class(class);
        Self {
            name: cx.qualified_name(class),
            restriction: symbol.restriction.map(|r| r.to_string()),
            description: symbol.syntax().map(|s| s.description()).unwrap_or_default(),
            base_classes,
            classes,
            components,
            connections,
            equation_sections: cx.equation_sections(class).len(),
            algorithm_sections: cx.algorithm_sections(class).len(),
        }
    }
}

fn component_view(cx: &mut Context, component: ComponentId) -> ComponentView {
    let type_name = cx.component_class(component).map(|ty| cx.class(ty).identifier.clone());
    let value = cx
        .component_value(component)
        .map_or(Value::Null, |v| v.to_json(cx));
    let symbol = cx.component(component);
    let (variability, causality) = match symbol.syntax() {
        Some(syntax) => (
            match syntax.variability {
                ast::Variability::Constant => "constant",
                ast::Variability::Parameter => "parameter",
                ast::Variability::Discrete => "discrete",
                ast::Variability::Empty => "",
            },
            match syntax.causality {
                ast::Causality::Input => "input",
                ast::Causality::Output => "output",
                ast::Causality::Empty => "",
            },
        ),
        None => ("constant", ""),
    };
    ComponentView {
        name: symbol.identifier.clone(),
        type_name,
        variability: variability.to_string(),
        causality: causality.to_string(),
        description: symbol.description(),
        value,
    }
}

impl fmt::Display for ClassView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let restriction = self.restriction.as_deref().unwrap_or("class");
        write!(f, "{restriction} {}", self.name)?;
        if !self.description.is_empty() {
            write!(f, " \"{}\"", self.description)?;
        }
        writeln!(f)?;
        for base in &self.base_classes {
            writeln!(f, "  extends {base}")?;
        }
        for class in &self.classes {
            writeln!(f, "  class {class}")?;
        }
        for component in &self.components {
            write!(f, "  ")?;
            for prefix in [&component.variability, &component.causality] {
                if !prefix.is_empty() {
                    write!(f, "{prefix} ")?;
                }
            }
            let type_name = component.type_name.as_deref().unwrap_or("?");
            write!(f, "{type_name} {}", component.name)?;
            if !component.value.is_null() {
                write!(f, " = {}", component.value)?;
            }
            writeln!(f)?;
        }
        for (lhs, rhs) in &self.connections {
            writeln!(f, "  connect({lhs}, {rhs})")?;
        }
        write!(f, "end {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::{NamedElement, Reference, ScopeId};
    use unindent::unindent;

    #[test]
    fn test_display() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
model A
  parameter Real k = 2 "gain";
end A;
model B "derived"
  extends A(k = 3);
  input Integer u;
  Missing m;
end B;
"#,
        );
        let b = cx
            .resolve(ScopeId::Context, &Reference::parse("B"), false)
            .and_then(NamedElement::class)
            .expect("B not found");
        let view = ClassView::new(&mut cx, b);
        assert_eq!(view.components.len(), 3);
        assert_eq!(view.components[2].description, "gain");
        let expected = unindent(
            r#"
            model B "derived"
              extends A
              input Integer u = 0
              ? m
              parameter Real k = 3.0
            end B"#,
        );
        assert_eq!(view.to_string(), expected);
    }
}
