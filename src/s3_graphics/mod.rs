//! Graphics boundary.
//!
//! Collects the `Icon` and `Diagram` annotation values of a class as plain
//! JSON (records keep their `@type` tag) and hands them to a
//! [`GraphicsRenderer`]. Drawing is left to the renderer.
//!
//! - [`icon`]: icon layers of the class and its base classes (base classes
//!   first), plus the icons of connector components at their icon
//!   placement.
//! - [`simple_icon`]: the class's own icon layer only.
//! - [`diagram`]: diagram layers, connection lines and the icons of every
//!   placed component.

use serde::Serialize;
use serde_json::Value;

use crate::s2_analyzer::context::Context;
use crate::s2_analyzer::scope::ScopeId;
use crate::s2_analyzer::symbols::{ClassId, ClassKind, ClassRestriction, ComponentId, ElementSymbol};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LayerGraphics {
    pub class_name: String,
    /// `Icon` or `Diagram` records, base classes first.
    pub layers: Vec<Value>,
    /// `Line` records of `connect` equations.
    pub connections: Vec<Value>,
    pub components: Vec<PlacedComponent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacedComponent {
    pub name: String,
    /// `Transformation` record, `null` when the component has no placement.
    pub transformation: Value,
    pub icon: LayerGraphics,
}

pub trait GraphicsRenderer {
    type Output;

    fn render(&self, graphics: &LayerGraphics) -> Self::Output;
}

/// Serializes the collected layers as JSON text.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl GraphicsRenderer for JsonRenderer {
    type Output = serde_json::Result<String>;

    fn render(&self, graphics: &LayerGraphics) -> Self::Output {
        if self.pretty {
            serde_json::to_string_pretty(graphics)
        } else {
            serde_json::to_string(graphics)
        }
    }
}

pub fn icon(cx: &mut Context, class: ClassId) -> LayerGraphics {
    collect_icon(cx, class, &mut Vec::new())
}

pub fn simple_icon(cx: &mut Context, class: ClassId) -> LayerGraphics {
    LayerGraphics {
        class_name: cx.qualified_name(class),
        layers: layer(cx, class, "Icon").into_iter().collect(),
        ..Default::default()
    }
}

pub fn diagram(cx: &mut Context, class: ClassId) -> LayerGraphics {
    let mut visiting = vec![cx.qualified_name(class)];
    let mut graphics = LayerGraphics {
        class_name: cx.qualified_name(class),
        layers: layers(cx, class, "Diagram"),
        ..Default::default()
    };

    for connection in cx.connections(class) {
        let Some(annotation) = connection.annotation else {
            continue;
        };
        let annotation = cx.instantiate_annotation(&annotation, ScopeId::Class(connection.owner));
        for element in cx.elements(annotation) {
            let ElementSymbol::Class(entry) = element else {
                continue;
            };
            if let Some(value) = cx.construct(entry, None) {
                graphics.connections.push(value.to_json(cx));
            }
        }
    }

    for component in cx.components(class) {
        let Some(ty) = cx.component_class(component) else {
            continue;
        };
        let placement = placement(cx, component);
        if placement.as_ref().and_then(|p| p.get("visible")) == Some(&Value::Bool(false)) {
            continue;
        }
        let transformation = placement
            .as_ref()
            .and_then(|p| p.get("transformation"))
            .cloned()
            .unwrap_or(Value::Null);
        graphics.components.push(PlacedComponent {
            name: cx.component(component).identifier.clone(),
            transformation,
            icon: collect_icon(cx, ty, &mut visiting),
        });
    }
    graphics
}

fn collect_icon(cx: &mut Context, class: ClassId, visiting: &mut Vec<String>) -> LayerGraphics {
    let name = cx.qualified_name(class);
    let mut graphics = LayerGraphics {
        class_name: name.clone(),
        layers: layers(cx, class, "Icon"),
        ..Default::default()
    };
    if visiting.contains(&name) {
        return graphics;
    }
    visiting.push(name);

    for component in cx.components(class) {
        let Some(ty) = cx.component_class(component) else {
            continue;
        };
        if !is_connector(cx, ty) {
            continue;
        }
        let placement = placement(cx, component);
        if placement.as_ref().and_then(|p| p.get("visible")) == Some(&Value::Bool(false)) {
            continue;
        }
        let transformation = placement
            .as_ref()
            .and_then(|p| {
                p.get("iconTransformation")
                    .filter(|t| is_placed(t))
                    .or_else(|| p.get("transformation"))
            })
            .cloned()
            .unwrap_or(Value::Null);
        graphics.components.push(PlacedComponent {
            name: cx.component(component).identifier.clone(),
            transformation,
            icon: collect_icon(cx, ty, visiting),
        });
    }

    visiting.pop();
    graphics
}

/// The `entry` layer of every base class, then of `class` itself.
fn layers(cx: &mut Context, class: ClassId, entry: &str) -> Vec<Value> {
    let mut out: Vec<Value> = cx
        .base_classes(class)
        .into_iter()
        .rev()
        .filter_map(|base| layer(cx, base, entry))
        .collect();
    out.extend(layer(cx, class, entry));
    out
}

fn layer(cx: &mut Context, class: ClassId, entry: &str) -> Option<Value> {
    let annotation = cx.class_annotation(class)?;
    let value = cx.annotation_entry(annotation, entry)?.to_json(cx);
    (value.get("@type").and_then(Value::as_str) == Some(entry)).then_some(value)
}

fn placement(cx: &mut Context, component: ComponentId) -> Option<Value> {
    let annotation = cx.component_annotation(component)?;
    let value = cx.annotation_entry(annotation, "Placement")?.to_json(cx);
    (value.get("@type").and_then(Value::as_str) == Some("Placement")).then_some(value)
}

fn is_connector(cx: &Context, class: ClassId) -> bool {
    let symbol = cx.class(class);
    !matches!(symbol.kind, ClassKind::Array { .. })
        && symbol.restriction == Some(ClassRestriction::Connector)
}

/// A transformation whose extent is not the all-zero default.
fn is_placed(transformation: &Value) -> bool {
    transformation
        .get("extent")
        .and_then(Value::as_array)
        .is_some_and(|points| {
            points.iter().flat_map(|p| p.as_array().into_iter().flatten()).any(|x| x.as_f64() != Some(0.0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::{NamedElement, Reference};
    use serde_json::json;

    const CIRCUIT: &str = r#"
connector Pin
  Real v;
  flow Real i;
  annotation(Icon(graphics = {Rectangle(extent = {{-100, -100}, {100, 100}})}));
end Pin;
partial model TwoPin
  Pin p annotation(Placement(transformation(extent = {{-110, -10}, {-90, 10}})));
  Pin n annotation(Placement(
    transformation(extent = {{90, -10}, {110, 10}}),
    iconTransformation(extent = {{80, -10}, {100, 10}})));
  annotation(Icon(graphics = {Line(points = {{-90, 0}, {90, 0}})}));
end TwoPin;
model Resistor
  extends TwoPin;
  parameter Real R = 1;
  annotation(Icon(graphics = {Rectangle(extent = {{-70, -30}, {70, 30}})}));
end Resistor;
model Circuit
  Resistor r1 annotation(Placement(transformation(extent = {{-10, -10}, {10, 10}})));
  Resistor r2 annotation(Placement(visible = false));
  Resistor r3;
equation
  connect(r1.n, r3.p) annotation(Line(points = {{10, 0}, {20, 0}}, color = {0, 0, 255}));
  annotation(Diagram(graphics = {Text(extent = {{-50, 60}, {50, 80}}, textString = "circuit")}));
end Circuit;
"#;

    fn class_named(cx: &mut Context, dotted: &str) -> ClassId {
        cx.resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::class)
            .unwrap_or_else(|| panic!("{dotted} not found"))
    }

    #[test]
    fn test_icon_collects_bases_and_connectors() {
        let mut cx = Context::new();
        cx.open_document("circuit.mo", CIRCUIT);
        let resistor = class_named(&mut cx, "Resistor");
        let graphics = icon(&mut cx, resistor);

        assert_eq!(graphics.layers.len(), 2);
        assert_eq!(graphics.layers[0]["graphics"][0]["@type"], json!("Line"));
        assert_eq!(graphics.layers[1]["graphics"][0]["@type"], json!("Rectangle"));
        assert_eq!(
            graphics.layers[1]["coordinateSystem"]["extent"],
            json!([[-100.0, -100.0], [100.0, 100.0]])
        );

        let names: Vec<&str> = graphics.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["p", "n"]);
        assert_eq!(
            graphics.components[0].transformation["extent"],
            json!([[-110.0, -10.0], [-90.0, 10.0]])
        );
        assert_eq!(
            graphics.components[1].transformation["extent"],
            json!([[80.0, -10.0], [100.0, 10.0]])
        );
        assert_eq!(graphics.components[0].icon.layers.len(), 1);

        let simple = simple_icon(&mut cx, resistor);
        assert_eq!(simple.layers.len(), 1);
        assert!(simple.components.is_empty());
    }

    #[test]
    fn test_diagram() {
        let mut cx = Context::new();
        cx.open_document("circuit.mo", CIRCUIT);
        let circuit = class_named(&mut cx, "Circuit");
        let graphics = diagram(&mut cx, circuit);

        assert_eq!(graphics.layers.len(), 1);
        assert_eq!(graphics.layers[0]["graphics"][0]["textString"], json!("circuit"));
        assert_eq!(graphics.connections.len(), 1);
        assert_eq!(graphics.connections[0]["color"], json!([0, 0, 255]));
        assert_eq!(graphics.connections[0]["thickness"], json!(0.25));

        let names: Vec<&str> = graphics.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r3"]);
        assert_eq!(graphics.components[1].transformation, Value::Null);
        assert_eq!(graphics.components[0].icon.components.len(), 2);

        let rendered = JsonRenderer::default().render(&graphics).expect("render failed");
        assert!(rendered.contains("\"class_name\":\"Circuit\""));
    }
}
