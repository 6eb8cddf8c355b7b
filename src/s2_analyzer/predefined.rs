//! The predefined annotation records.
//!
//! Annotation entries such as `Icon(...)` or `Placement(...)` resolve
//! against this package after every document and library, so user code can
//! shadow them. Conditional defaults are replaced by their common value
//! since conditional expressions do not fold.

pub const MODELICA_ANNOTATIONS: &str = r#"
package ModelicaAnnotations

  type Arrow = enumeration(None, Open, Filled, Half);
  type BorderPattern = enumeration(None, Raised, Sunken, Engraved);
  type EllipseClosure = enumeration(None, Chord, Radial);
  type FillPattern = enumeration(None, Solid, Horizontal, Vertical,
    Cross, Forward, Backward, CrossDiag,
    HorizontalCylinder, VerticalCylinder, Sphere);
  type LinePattern = enumeration(None, Solid, Dash, Dot, DashDot, DashDotDot);
  type Smooth = enumeration(None, Bezier);
  type TextAlignment = enumeration(Left, Center, Right);
  type TextStyle = enumeration(Bold, Italic, UnderLine);

  type Color = Integer[3](min = 0, max = 255) "RGB representation";
  type DrawingUnit = Real(final unit = "mm");
  type Point = DrawingUnit[2] "{x, y}";
  type Extent = Point[2] "Defines a rectangular area {{x1, y1}, {x2, y2}}";

  constant Color Black = {0, 0, 0};

  partial record GraphicItem
    Boolean visible = true;
    Point origin = {0, 0};
    Real rotation(quantity = "angle", unit = "deg") = 0;
  end GraphicItem;

  record FilledShape "Style attributes for filled shapes"
    Color lineColor = Black "Color of border line";
    Color fillColor = Black "Interior fill color";
    LinePattern pattern = LinePattern.Solid "Border line pattern";
    FillPattern fillPattern = FillPattern.None "Interior fill pattern";
    DrawingUnit lineThickness = 0.25 "Line thickness";
  end FilledShape;

  record Line
    extends GraphicItem;
    Point points[:];
    Color color = Black;
    LinePattern pattern = LinePattern.Solid;
    DrawingUnit thickness = 0.25;
    Arrow arrow[2] = {Arrow.None, Arrow.None} "{start arrow, end arrow}";
    DrawingUnit arrowSize = 3;
    Smooth smooth = Smooth.None "Spline";
  end Line;

  record Polygon
    extends GraphicItem;
    extends FilledShape;
    Point points[:];
    Smooth smooth = Smooth.None "Spline outline";
  end Polygon;

  record Rectangle
    extends GraphicItem;
    extends FilledShape;
    BorderPattern borderPattern = BorderPattern.None;
    Extent extent;
    DrawingUnit radius = 0 "Corner radius";
  end Rectangle;

  record Ellipse
    extends GraphicItem;
    extends FilledShape;
    Extent extent;
    Real startAngle(quantity = "angle", unit = "deg") = 0;
    Real endAngle(quantity = "angle", unit = "deg") = 360;
    EllipseClosure closure = EllipseClosure.Chord;
  end Ellipse;

  record Text
    extends GraphicItem;
    extends FilledShape;
    Extent extent;
    String string;
    String textString;
    Real fontSize = 0 "unit pt";
    String fontName;
    TextStyle textStyle[:];
    Color textColor = lineColor;
    TextAlignment horizontalAlignment = TextAlignment.Center;
    Integer index;
  end Text;

  record Bitmap
    extends GraphicItem;
    Extent extent;
    String fileName "Name of bitmap file";
    String imageSource "Base64 representation of bitmap";
  end Bitmap;

  record CoordinateSystem
    Extent extent;
    Boolean preserveAspectRatio = true;
    Real initialScale = 0.1;
    DrawingUnit grid[2];
  end CoordinateSystem;

  record Icon "Representation of the icon layer"
    CoordinateSystem coordinateSystem(extent = {{-100, -100}, {100, 100}});
    GraphicItem[:] graphics;
  end Icon;

  record Diagram "Representation of the diagram layer"
    CoordinateSystem coordinateSystem(extent = {{-100, -100}, {100, 100}});
    GraphicItem[:] graphics;
  end Diagram;

  record IconMap
    Extent extent = {{0, 0}, {0, 0}};
    Boolean primitivesVisible = true;
  end IconMap;

  record DiagramMap
    Extent extent = {{0, 0}, {0, 0}};
    Boolean primitivesVisible = true;
  end DiagramMap;

  record Transformation
    Point origin = {0, 0};
    Extent extent;
    Real rotation(quantity = "angle", unit = "deg") = 0;
  end Transformation;

  record Placement
    Boolean visible = true;
    Transformation transformation "Placement in the diagram layer";
    Boolean iconVisible "Visible in icon layer; for public connector";
    Transformation iconTransformation "Placement in the icon layer; for public connector";
  end Placement;

  record Documentation
    String info = "" "Description of the class";
    String revisions = "" "Revision history";
  end Documentation;

  record Selector
    parameter String filter = "";
    parameter String caption = "";
  end Selector;

  record Dialog
    parameter String tab = "General";
    parameter String group = "Parameters";
    parameter Boolean enable = true;
    parameter Boolean showStartAttribute = false;
    parameter Boolean colorSelector = false;
    parameter Selector loadSelector;
    parameter Selector saveSelector;
    parameter String groupImage = "";
    parameter Boolean connectorSizing = false;
  end Dialog;

end ModelicaAnnotations;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s1_parser::parse_stored_definition;

    #[test]
    fn test_predefined_parses() {
        let def = parse_stored_definition(MODELICA_ANNOTATIONS).expect("Failed to parse annotations");
        assert_eq!(def.classes.len(), 1);
        let package = &def.classes[0];
        assert_eq!(package.name.text, "ModelicaAnnotations");
        assert!(package.elements().len() > 30);
    }
}
