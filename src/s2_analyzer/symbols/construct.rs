//! Default construction of class instances.
//!
//! Builtins get their zero value, fixed-size arrays are filled element by
//! element (or kept as a shape plus one element once they grow past
//! [`MAX_EXPANDED_ELEMENTS`]), enumerations take their first literal and
//! records collect the value of every component. Record constructor calls
//! reuse the same path with the call arguments taking precedence.

use ordermap::OrderMap;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::scope::ScopeId;
use super::{BuiltinType, ClassId, ClassKind, ElementSymbol, ObjectSymbol, ObjectValue, Pass};

/// Default arrays with more elements than this are not expanded.
pub const MAX_EXPANDED_ELEMENTS: usize = 4096;

/// Arguments of a record constructor call, evaluated in `scope`.
#[derive(Clone, Copy, Debug)]
pub struct ConstructorArguments<'a> {
    pub scope: ScopeId,
    pub positional: &'a [ast::Expression],
    pub named: &'a [ast::NamedArgument],
}

impl Context {
    pub fn construct(
        &mut self,
        class: ClassId,
        arguments: Option<&ConstructorArguments<'_>>,
    ) -> Option<ObjectSymbol> {
        match self.class(class).kind.clone() {
            ClassKind::Builtin(builtin) => {
                let value = match builtin {
                    BuiltinType::Boolean => ObjectValue::Boolean(false),
                    BuiltinType::Integer => ObjectValue::Integer(0),
                    BuiltinType::Real => ObjectValue::Real(0.0),
                    BuiltinType::String => ObjectValue::String(String::new()),
                };
                Some(ObjectSymbol::new(class, value))
            }
            ClassKind::Array { dtype, shape } => {
                if shape.iter().any(Option::is_none) {
                    return Some(ObjectSymbol::new(class, ObjectValue::Array(Vec::new())));
                }
                let dims: Vec<i64> = shape.into_iter().flatten().map(|n| n.max(0)).collect();
                let count = dims
                    .iter()
                    .try_fold(1usize, |count, n| count.checked_mul(*n as usize));
                match count {
                    Some(count) if count <= MAX_EXPANDED_ELEMENTS => {
                        Some(self.construct_array(class, dtype, &dims))
                    }
                    _ => {
                        let element = self.construct(dtype, None).map(Box::new);
                        Some(ObjectSymbol::new(class, ObjectValue::Filled { shape: dims, element }))
                    }
                }
            }
            ClassKind::Annotation { elements } => {
                let values = elements.into_iter().map(|e| self.construct(e, None)).collect();
                Some(ObjectSymbol::new(class, ObjectValue::Array(values)))
            }
            ClassKind::Declared { syntax, .. } => {
                if self.class(class).is_enumeration() {
                    return self.first_literal(class);
                }
                let environment = self.class(class).environment.clone();
                let declaration = Some(syntax.node_data.id);
                if !self.enter(Pass::Construct, class.index(), declaration, &environment) {
                    self.report_cycle(Pass::Construct, self.qualified_name(class));
                    return Some(ObjectSymbol::new(class, ObjectValue::Record(OrderMap::new())));
                }
                let value = self.construct_record(class, arguments);
                self.leave(Pass::Construct, class.index());
                value
            }
        }
    }

    fn construct_array(&mut self, class: ClassId, dtype: ClassId, dims: &[i64]) -> ObjectSymbol {
        let Some((&n, rest)) = dims.split_first() else {
            return self
                .construct(dtype, None)
                .unwrap_or_else(|| ObjectSymbol::new(class, ObjectValue::Array(Vec::new())));
        };
        let inner = if rest.is_empty() {
            dtype
        } else {
            self.array_class(dtype, rest.iter().copied().map(Some).collect())
        };
        let values = (0..n)
            .map(|_| {
                if rest.is_empty() {
                    self.construct(dtype, None)
                } else {
                    Some(self.construct_array(inner, dtype, rest))
                }
            })
            .collect();
        ObjectSymbol::new(class, ObjectValue::Array(values))
    }

    fn first_literal(&mut self, class: ClassId) -> Option<ObjectSymbol> {
        self.elements(class).into_iter().find_map(|e| match e {
            ElementSymbol::Component(id) => self.component(id).value.clone(),
            _ => None,
        })
    }

    fn construct_record(
        &mut self,
        class: ClassId,
        arguments: Option<&ConstructorArguments<'_>>,
    ) -> Option<ObjectSymbol> {
        let components = self.components(class);
        if components.is_empty() {
            // `type T = Real[3]` and friends take the value of their base.
            let base = self.base_classes(class).into_iter().find(|b| {
                let base = self.class(*b);
                !matches!(base.kind, ClassKind::Declared { .. }) || base.is_enumeration()
            });
            if let Some(base) = base {
                return self.construct(base, None);
            }
        }

        let mut fields = OrderMap::new();
        for (index, component) in components.into_iter().enumerate() {
            let name = self.component(component).identifier.clone();
            let argument = arguments.and_then(|args| {
                args.named
                    .iter()
                    .find(|a| a.name.text == name)
                    .map(|a| &a.value)
                    .or_else(|| args.positional.get(index))
                    .map(|expr| (args.scope, expr))
            });
            let value = match argument {
                Some((scope, expr)) => {
                    let value = self.evaluate(scope, expr);
                    match (value, self.component_class(component)) {
                        (Some(value), Some(ty)) => Some(self.coerce(value, ty)),
                        (value, _) => value,
                    }
                }
                None => match self.component_value(component) {
                    Some(value) => Some(value),
                    None => self
                        .component_class(component)
                        .and_then(|ty| self.construct(ty, None)),
                },
            };
            fields.insert(name, value);
        }
        Some(ObjectSymbol::new(class, ObjectValue::Record(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::{NamedElement, Reference};
    use serde_json::json;

    fn construct_named(cx: &mut Context, dotted: &str) -> ObjectSymbol {
        let class = cx
            .resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::class)
            .unwrap_or_else(|| panic!("{dotted} not found"));
        cx.construct(class, None).expect("construction failed")
    }

    #[test]
    fn test_defaults() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
type E = enumeration(First, Second);
type Pair = Real[2];
record Point
  Real x;
  Real y = 2;
end Point;
record Segment
  Point a;
  Point b(x = 1);
  E e;
  Boolean flag;
  String label;
  Integer n[2, 2];
end Segment;
"#,
        );
        let e = construct_named(&mut cx, "E");
        assert_eq!(
            e.value,
            ObjectValue::Enumeration {
                literal: "First".to_string(),
                ordinal: 0
            }
        );
        let pair = construct_named(&mut cx, "Pair");
        assert_eq!(pair.to_json(&cx), json!([0.0, 0.0]));

        let segment = construct_named(&mut cx, "Segment");
        assert_eq!(
            segment.to_json(&cx),
            json!({
                "@type": "Segment",
                "a": {"@type": "Point", "x": 0.0, "y": 2.0},
                "b": {"@type": "Point", "x": 1.0, "y": 2.0},
                "e": 0,
                "flag": false,
                "label": "",
                "n": [[0, 0], [0, 0]],
            })
        );
    }

    #[test]
    fn test_recursive_record_terminates() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
record A B b; Real x = 1; end A;
record B A a; end B;
"#,
        );
        let a = construct_named(&mut cx, "A");
        assert_eq!(a.field("x").and_then(ObjectSymbol::as_f64), Some(1.0));
        assert!(a.field("b").is_some());
    }
}
