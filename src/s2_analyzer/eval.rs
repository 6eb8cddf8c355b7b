//! Constant folding.
//!
//! [`Context::evaluate`] turns an expression into an [`ObjectSymbol`] or
//! `None` when the expression is not a constant this engine can fold:
//! type mismatches, integer overflow or division by zero, conditional and
//! range expressions, and calls to anything but a record constructor.

use crate::s1_parser::ast;

use super::context::Context;
use super::scope::{NamedElement, ScopeId};
use super::symbols::{
    BuiltinType, ClassKind, ClassRestriction, ConstructorArguments, ObjectSymbol, ObjectValue,
};

/// Partial result while walking a dotted reference.
enum Step {
    Element(NamedElement),
    Value(ObjectSymbol),
}

impl Context {
    pub fn evaluate(&mut self, scope: ScopeId, expr: &ast::Expression) -> Option<ObjectSymbol> {
        match expr {
            ast::Expression::Boolean { value, .. } => Some(self.scalar(ObjectValue::Boolean(*value))),
            ast::Expression::Integer { value, .. } => Some(self.scalar(ObjectValue::Integer(*value))),
            ast::Expression::Real { value, .. } => Some(self.scalar(ObjectValue::Real(*value))),
            ast::Expression::String { value, .. } => {
                Some(self.scalar(ObjectValue::String(value.clone())))
            }
            ast::Expression::Parenthesized { inner } => self.evaluate(scope, inner),
            ast::Expression::Unary { op, rhs } => {
                let rhs = self.evaluate(scope, rhs)?;
                self.unary(*op, rhs)
            }
            ast::Expression::Binary { lhs, op, rhs } => {
                let lhs = self.evaluate(scope, lhs)?;
                let rhs = self.evaluate(scope, rhs)?;
                self.binary(lhs, *op, rhs)
            }
            ast::Expression::Array { elements } => {
                let values: Vec<Option<ObjectSymbol>> =
                    elements.iter().map(|e| self.evaluate(scope, e)).collect();
                Some(self.array(values))
            }
            ast::Expression::Matrix { rows } => {
                let rows: Vec<Option<ObjectSymbol>> = rows
                    .iter()
                    .map(|row| {
                        let values = row.iter().map(|e| self.evaluate(scope, e)).collect();
                        Some(self.array(values))
                    })
                    .collect();
                Some(self.array(rows))
            }
            ast::Expression::ComponentReference(reference) => self.evaluate_reference(scope, reference),
            ast::Expression::FunctionCall { callee, arguments } => {
                if arguments.comprehension.is_some() {
                    return None;
                }
                let class = self.resolve_function(scope, callee, false)?;
                if self.class(class).restriction != Some(ClassRestriction::Record) {
                    log::trace!("not folding call to function `{callee}`");
                    return None;
                }
                let arguments = ConstructorArguments {
                    scope,
                    positional: &arguments.positional,
                    named: &arguments.named,
                };
                self.construct(class, Some(&arguments))
            }
            ast::Expression::PartialApplication { .. }
            | ast::Expression::If { .. }
            | ast::Expression::Range { .. }
            | ast::Expression::ArrayComprehension { .. }
            | ast::Expression::Tuple { .. }
            | ast::Expression::End => None,
        }
    }

    fn scalar(&self, value: ObjectValue) -> ObjectSymbol {
        let builtin = match value {
            ObjectValue::Boolean(_) => BuiltinType::Boolean,
            ObjectValue::Integer(_) => BuiltinType::Integer,
            ObjectValue::String(_) => BuiltinType::String,
            _ => BuiltinType::Real,
        };
        ObjectSymbol::new(self.builtin(builtin), value)
    }

    /// Array value typed after its first element; nested arrays extend the
    /// shape instead of nesting array classes.
    fn array(&mut self, values: Vec<Option<ObjectSymbol>>) -> ObjectSymbol {
        let n = values.len() as i64;
        let element = values.iter().flatten().next().map(|v| v.ty);
        let ty = match element.map(|ty| self.class(ty).kind.clone()) {
            Some(ClassKind::Array { dtype, shape }) => {
                let mut dims = vec![Some(n)];
                dims.extend(shape);
                self.array_class(dtype, dims)
            }
            _ => {
                let dtype = element.unwrap_or_else(|| self.builtin(BuiltinType::Real));
                self.array_class(dtype, vec![Some(n)])
            }
        };
        ObjectSymbol::new(ty, ObjectValue::Array(values))
    }

    fn unary(&self, op: ast::OpUnary, rhs: ObjectSymbol) -> Option<ObjectSymbol> {
        let value = match (op, rhs.value) {
            (ast::OpUnary::Minus, ObjectValue::Integer(n)) => {
                ObjectValue::Integer(n.checked_neg()?)
            }
            (ast::OpUnary::Minus, ObjectValue::Real(x)) => ObjectValue::Real(-x),
            (ast::OpUnary::Plus, value @ (ObjectValue::Integer(_) | ObjectValue::Real(_))) => {
                value
            }
            (ast::OpUnary::Not, ObjectValue::Boolean(b)) => ObjectValue::Boolean(!b),
            _ => return None,
        };
        Some(self.scalar(value))
    }

    fn binary(&self, lhs: ObjectSymbol, op: ast::OpBinary, rhs: ObjectSymbol) -> Option<ObjectSymbol> {
        use ast::OpBinary as Op;
        use ObjectValue as V;

        let value = match (op, &lhs.value, &rhs.value) {
            (Op::Add, V::String(a), V::String(b)) => V::String(format!("{a}{b}")),

            (Op::And, V::Boolean(a), V::Boolean(b)) => V::Boolean(*a && *b),
            (Op::Or, V::Boolean(a), V::Boolean(b)) => V::Boolean(*a || *b),

            (Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Neq, _, _) => {
                V::Boolean(compare(op, &lhs.value, &rhs.value)?)
            }

            (_, V::Integer(a), V::Integer(b)) => V::Integer(integer_arithmetic(op, *a, *b)?),
            (_, V::Integer(_) | V::Real(_), V::Integer(_) | V::Real(_)) => {
                V::Real(real_arithmetic(op, lhs.as_f64()?, rhs.as_f64()?)?)
            }
            _ => return None,
        };
        Some(self.scalar(value))
    }

    fn evaluate_reference(&mut self, scope: ScopeId, reference: &ast::ComponentReference) -> Option<ObjectSymbol> {
        let (first, rest) = reference.parts.split_first()?;
        let element = self.lookup(scope, std::slice::from_ref(&first.ident.text), reference.global)?;
        let mut step = self.subscript(scope, Step::Element(element), &first.subs)?;

        for part in rest {
            step = match step {
                Step::Element(NamedElement::Class(class)) => {
                    Step::Element(self.get_named_element(class, &part.ident.text)?)
                }
                Step::Element(NamedElement::Component(component)) => {
                    let value = self.component_value(component)?;
                    Step::Value(value.field(&part.ident.text)?.clone())
                }
                Step::Value(value) => Step::Value(value.field(&part.ident.text)?.clone()),
            };
            step = self.subscript(scope, step, &part.subs)?;
        }

        match step {
            Step::Value(value) => Some(value),
            Step::Element(NamedElement::Component(component)) => self.component_value(component),
            Step::Element(NamedElement::Class(_)) => None,
        }
    }

    /// Applies 1-based constant subscripts to an array value.
    fn subscript(&mut self, scope: ScopeId, step: Step, subs: &[ast::Subscript]) -> Option<Step> {
        if subs.is_empty() {
            return Some(step);
        }
        let mut value = match step {
            Step::Value(value) => value,
            Step::Element(NamedElement::Component(component)) => self.component_value(component)?,
            Step::Element(NamedElement::Class(_)) => return None,
        };
        for sub in subs {
            let ast::Subscript::Expression(expr) = sub else {
                return None;
            };
            let index = self.evaluate(scope, expr)?.as_i64()?;
            value = self.element(value, index)?;
        }
        Some(Step::Value(value))
    }

    /// Element `index` (1-based) along the outermost dimension.
    fn element(&mut self, value: ObjectSymbol, index: i64) -> Option<ObjectSymbol> {
        if index < 1 || index as usize > value.len()? {
            return None;
        }
        match value.value {
            ObjectValue::Array(elements) => elements.into_iter().nth(index as usize - 1)?,
            ObjectValue::Filled { shape, element } => {
                let rest = shape[1..].to_vec();
                if rest.is_empty() {
                    return element.map(|e| *e);
                }
                let ClassKind::Array { dtype, .. } = self.class(value.ty).kind.clone() else {
                    return None;
                };
                let ty = self.array_class(dtype, rest.iter().copied().map(Some).collect());
                Some(ObjectSymbol::new(ty, ObjectValue::Filled { shape: rest, element }))
            }
            _ => None,
        }
    }
}

fn integer_arithmetic(op: ast::OpBinary, a: i64, b: i64) -> Option<i64> {
    use ast::OpBinary as Op;
    match op {
        Op::Add => a.checked_add(b),
        Op::Sub => a.checked_sub(b),
        Op::Mul => a.checked_mul(b),
        Op::Div => a.checked_div(b),
        Op::Exp => a.checked_pow(u32::try_from(b).ok()?),
        _ => None,
    }
}

fn real_arithmetic(op: ast::OpBinary, a: f64, b: f64) -> Option<f64> {
    use ast::OpBinary as Op;
    match op {
        Op::Add => Some(a + b),
        Op::Sub => Some(a - b),
        Op::Mul => Some(a * b),
        Op::Div => Some(a / b),
        Op::Exp => Some(a.powf(b)),
        _ => None,
    }
}

/// Both operands must be numbers, booleans or strings.
fn compare(op: ast::OpBinary, lhs: &ObjectValue, rhs: &ObjectValue) -> Option<bool> {
    use std::cmp::Ordering;
    use ObjectValue as V;

    let ordering = match (lhs, rhs) {
        (V::Integer(a), V::Integer(b)) => a.cmp(b),
        (V::Integer(_) | V::Real(_), V::Integer(_) | V::Real(_)) => {
            let a = match lhs {
                V::Integer(n) => *n as f64,
                V::Real(x) => *x,
                _ => return None,
            };
            let b = match rhs {
                V::Integer(n) => *n as f64,
                V::Real(x) => *x,
                _ => return None,
            };
            a.partial_cmp(&b)?
        }
        (V::Boolean(a), V::Boolean(b)) => a.cmp(b),
        (V::String(a), V::String(b)) => a.cmp(b),
        _ => return None,
    };
    Some(match op {
        ast::OpBinary::Lt => ordering == Ordering::Less,
        ast::OpBinary::Le => ordering != Ordering::Greater,
        ast::OpBinary::Gt => ordering == Ordering::Greater,
        ast::OpBinary::Ge => ordering != Ordering::Less,
        ast::OpBinary::Eq => ordering == Ordering::Equal,
        ast::OpBinary::Neq => ordering != Ordering::Equal,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s1_parser::parse_expression;
    use crate::s2_analyzer::scope::Reference;
    use rstest::rstest;

    fn eval(cx: &mut Context, code: &str) -> Option<ObjectValue> {
        let expr = parse_expression(code).expect("Failed to parse test expression");
        cx.evaluate(ScopeId::Context, &expr).map(|v| v.value)
    }

    #[rstest]
    #[case("1 + 2", ObjectValue::Integer(3))]
    #[case("1 + 2.5", ObjectValue::Real(3.5))]
    #[case("2.0 * 3", ObjectValue::Real(6.0))]
    #[case("7 / 2", ObjectValue::Integer(3))]
    #[case("7.0 / 2", ObjectValue::Real(3.5))]
    #[case("2 ^ 10", ObjectValue::Integer(1024))]
    #[case("4 ^ 0.5", ObjectValue::Real(2.0))]
    #[case("\"a\" + \"b\"", ObjectValue::String("ab".to_string()))]
    #[case("-3", ObjectValue::Integer(-3))]
    #[case("-(1.5)", ObjectValue::Real(-1.5))]
    #[case("(1 + 2) * 3", ObjectValue::Integer(9))]
    #[case("1 < 2", ObjectValue::Boolean(true))]
    #[case("2 >= 2.5", ObjectValue::Boolean(false))]
    #[case("1 == 1.0", ObjectValue::Boolean(true))]
    #[case("\"a\" <> \"b\"", ObjectValue::Boolean(true))]
    #[case("true and false", ObjectValue::Boolean(false))]
    #[case("false or true", ObjectValue::Boolean(true))]
    #[case("not true", ObjectValue::Boolean(false))]
    fn test_folds(#[case] code: &str, #[case] expected: ObjectValue) {
        let mut cx = Context::new();
        assert_eq!(eval(&mut cx, code), Some(expected));
    }

    #[rstest]
    #[case("true + 1")]
    #[case("\"a\" + 1")]
    #[case("\"a\" - \"b\"")]
    #[case("1 / 0")]
    #[case("2 ^ 63")]
    #[case("2 ^ (-1)")]
    #[case("1 and true")]
    #[case("not 1")]
    #[case("-true")]
    #[case("true < 1")]
    #[case("if true then 1 else 2")]
    #[case("1:3")]
    #[case("unknown")]
    #[case("sin(1.0)")]
    #[case("1 .+ 2")]
    #[case("2.0 .* 3.0")]
    #[case("\"a\" .+ \"b\"")]
    fn test_not_foldable(#[case] code: &str) {
        let mut cx = Context::new();
        assert_eq!(eval(&mut cx, code), None);
    }

    #[test]
    fn test_arrays_and_subscripts() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
package P
  constant Real v[3] = {1, 2, 3};
  constant Integer m[2, 2] = {{1, 2}, {3, 4}};
  constant Real second = v[2];
  constant Integer corner = m[2, 1];
  constant Real outside = v[4];
  constant Real zero = v[0];
end P;
"#,
        );
        let scope = ScopeId::Context;
        let value = |cx: &mut Context, name: &str| {
            let expr = parse_expression(name).expect("Failed to parse test expression");
            cx.evaluate(scope, &expr).map(|v| v.value)
        };
        assert_eq!(value(&mut cx, "P.second"), Some(ObjectValue::Real(2.0)));
        assert_eq!(value(&mut cx, "P.corner"), Some(ObjectValue::Integer(3)));
        assert_eq!(value(&mut cx, "P.outside"), None);
        assert_eq!(value(&mut cx, "P.zero"), None);

        let matrix = parse_expression("{{1, 2}, {3, 4}}").expect("Failed to parse test expression");
        let matrix = cx.evaluate(scope, &matrix).expect("not folded");
        let int = cx.builtin(BuiltinType::Integer);
        assert_eq!(matrix.ty, cx.array_class(int, vec![Some(2), Some(2)]));
    }

    #[test]
    fn test_subscripts_into_large_arrays() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
package P
  Real big[100000, 2];
  constant Real cell = big[99999, 2];
  constant Real past = big[100001, 1];
end P;
"#,
        );
        let value = |cx: &mut Context, name: &str| {
            let expr = parse_expression(name).expect("Failed to parse test expression");
            cx.evaluate(ScopeId::Context, &expr)
        };
        assert_eq!(value(&mut cx, "P.cell").map(|v| v.value), Some(ObjectValue::Real(0.0)));
        assert_eq!(value(&mut cx, "P.past").map(|v| v.value), None);

        let row = value(&mut cx, "P.big[7]").expect("row not folded");
        assert_eq!(row.len(), Some(2));
        let real = cx.builtin(BuiltinType::Real);
        assert_eq!(row.ty, cx.array_class(real, vec![Some(2)]));
    }

    #[test]
    fn test_local_shadows_global() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
package Outer
  constant Integer k = 1;
end Outer;
package P
  package Outer
    constant Integer k = 2;
  end Outer;
end P;
"#,
        );
        let p = cx
            .resolve(ScopeId::Context, &Reference::parse("P"), false)
            .and_then(NamedElement::class)
            .expect("P not found");
        let local = parse_expression("Outer.k").expect("Failed to parse test expression");
        assert_eq!(
            cx.evaluate(ScopeId::Class(p), &local).map(|v| v.value),
            Some(ObjectValue::Integer(2))
        );
        let global = parse_expression(".Outer.k").expect("Failed to parse test expression");
        assert_eq!(
            cx.evaluate(ScopeId::Class(p), &global).map(|v| v.value),
            Some(ObjectValue::Integer(1))
        );
    }

    #[test]
    fn test_record_constructor_and_enumerations() {
        let mut cx = Context::new();
        cx.open_document(
            "test.mo",
            r#"
record Point
  Real x;
  Real y = 5;
end Point;
package P
  constant Point a = Point(1, 2);
  constant Point b = Point(y = 3);
  constant Real ax = a.x;
end P;
"#,
        );
        let value = |cx: &mut Context, name: &str| {
            let expr = parse_expression(name).expect("Failed to parse test expression");
            cx.evaluate(ScopeId::Context, &expr)
        };
        let a = value(&mut cx, "P.a").expect("not folded");
        assert_eq!(a.field("y").and_then(ObjectSymbol::as_f64), Some(2.0));
        let b = value(&mut cx, "P.b").expect("not folded");
        assert_eq!(b.field("x").and_then(ObjectSymbol::as_f64), Some(0.0));
        assert_eq!(b.field("y").and_then(ObjectSymbol::as_f64), Some(3.0));
        assert_eq!(value(&mut cx, "P.ax").map(|v| v.value), Some(ObjectValue::Real(1.0)));
        assert_eq!(
            value(&mut cx, "LinePattern.Dash").and_then(|v| v.as_i64()),
            Some(2)
        );
    }
}
