//! Constant values produced by evaluation and default construction.

use ordermap::OrderMap;
use serde_json::{json, Map, Value};

use super::super::context::Context;
use super::ClassId;

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Enumeration { literal: String, ordinal: i64 },
    /// Elements that failed to evaluate are `None`.
    Array(Vec<Option<ObjectSymbol>>),
    /// An array of `shape` whose elements all equal `element`; large default
    /// constructed arrays are kept in this form.
    Filled {
        shape: Vec<i64>,
        element: Option<Box<ObjectSymbol>>,
    },
    /// Fields in component order.
    Record(OrderMap<String, Option<ObjectSymbol>>),
}

/// A value together with the class it is an instance of.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSymbol {
    pub ty: ClassId,
    pub value: ObjectValue,
}

impl ObjectSymbol {
    pub fn new(ty: ClassId, value: ObjectValue) -> Self {
        Self { ty, value }
    }

    /// Numeric value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            ObjectValue::Integer(n) => Some(n as f64),
            ObjectValue::Real(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            ObjectValue::Integer(n) => Some(n),
            ObjectValue::Enumeration { ordinal, .. } => Some(ordinal),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            ObjectValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ObjectValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an expanded array.
    pub fn elements(&self) -> Option<&[Option<ObjectSymbol>]> {
        match &self.value {
            ObjectValue::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Size of the outermost dimension of an array value.
    pub fn len(&self) -> Option<usize> {
        match &self.value {
            ObjectValue::Array(elements) => Some(elements.len()),
            ObjectValue::Filled { shape, .. } => shape.first().map(|n| (*n).max(0) as usize),
            _ => None,
        }
    }

    /// Field `name` of a record value.
    pub fn field(&self, name: &str) -> Option<&ObjectSymbol> {
        match &self.value {
            ObjectValue::Record(fields) => fields.get(name).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// JSON form: records become objects tagged with `@type`, enumeration
    /// literals their ordinal, non-finite reals `null`. Filled arrays stay
    /// compact as `{"@shape": [..], "@fill": element}`.
    pub fn to_json(&self, cx: &Context) -> Value {
        match &self.value {
            ObjectValue::Boolean(b) => json!(b),
            ObjectValue::Integer(n) => json!(n),
            ObjectValue::Real(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ObjectValue::String(s) => json!(s),
            ObjectValue::Enumeration { ordinal, .. } => json!(ordinal),
            ObjectValue::Array(elements) => Value::Array(
                elements
                    .iter()
                    .map(|e| e.as_ref().map_or(Value::Null, |e| e.to_json(cx)))
                    .collect(),
            ),
            ObjectValue::Filled { shape, element } => json!({
                "@shape": shape,
                "@fill": element.as_ref().map_or(Value::Null, |e| e.to_json(cx)),
            }),
            ObjectValue::Record(fields) => {
                let mut map = Map::new();
                map.insert("@type".to_string(), json!(cx.class(self.ty).identifier));
                for (name, field) in fields {
                    map.insert(
                        name.clone(),
                        field.as_ref().map_or(Value::Null, |f| f.to_json(cx)),
                    );
                }
                Value::Object(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::symbols::BuiltinType;

    #[test]
    fn test_to_json() {
        let cx = Context::new();
        let real = cx.builtin(BuiltinType::Real);
        let int = cx.builtin(BuiltinType::Integer);

        let array = ObjectSymbol::new(
            real,
            ObjectValue::Array(vec![
                Some(ObjectSymbol::new(real, ObjectValue::Real(1.5))),
                Some(ObjectSymbol::new(real, ObjectValue::Real(f64::NAN))),
                None,
            ]),
        );
        assert_eq!(array.to_json(&cx), json!([1.5, null, null]));

        let mut fields = OrderMap::new();
        fields.insert("n".to_string(), Some(ObjectSymbol::new(int, ObjectValue::Integer(2))));
        fields.insert(
            "e".to_string(),
            Some(ObjectSymbol::new(
                int,
                ObjectValue::Enumeration {
                    literal: "B".to_string(),
                    ordinal: 1,
                },
            )),
        );
        let record = ObjectSymbol::new(int, ObjectValue::Record(fields));
        assert_eq!(record.to_json(&cx), json!({"@type": "Integer", "n": 2, "e": 1}));
        assert_eq!(record.field("n").and_then(ObjectSymbol::as_f64), Some(2.0));
    }

    #[test]
    fn test_filled_array_stays_compact() {
        let cx = Context::new();
        let real = cx.builtin(BuiltinType::Real);
        let filled = ObjectSymbol::new(
            real,
            ObjectValue::Filled {
                shape: vec![100_000, 3],
                element: Some(Box::new(ObjectSymbol::new(real, ObjectValue::Real(0.0)))),
            },
        );
        assert_eq!(filled.len(), Some(100_000));
        assert!(filled.elements().is_none());
        assert_eq!(filled.to_json(&cx), json!({"@shape": [100_000, 3], "@fill": 0.0}));
    }
}
