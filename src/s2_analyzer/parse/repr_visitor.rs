use super::node::{Node, NodeRef, Visitor};
use crate::s1_parser::ast;

/// Renders the syntax tree as an indented outline, one node per line.
#[derive(Default)]
pub struct ReprVisitor {
    pub level: usize,
    pub repr: String,
}

impl ReprVisitor {
    fn line(&mut self, text: &str) {
        for _ in 1..self.level {
            self.repr.push_str("  ");
        }
        self.repr.push_str(text);
        self.repr.push('\n');
    }
}

impl Visitor for ReprVisitor {
    fn enter_any(&mut self, n: NodeRef, _parent_id: Option<usize>) {
        self.level += 1;
        let label = n.label();
        if label.is_empty() {
            self.line(n.kind());
        } else {
            self.line(&format!("{} {}", n.kind(), label));
        }
    }

    fn exit_any(&mut self, _n: NodeRef, _parent_id: Option<usize>) {
        self.level -= 1;
    }

    fn enter_component_declaration(
        &mut self,
        n: &ast::ComponentDeclaration,
        _parent_id: Option<usize>,
    ) {
        let description = n.description.text();
        if !description.is_empty() {
            self.level += 1;
            self.line(&format!("\"{description}\""));
            self.level -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s1_parser::parse_stored_definition;
    use crate::s2_analyzer::parse::node::Visitable;

    #[test]
    fn test_outline() {
        let code = r#"
model Test
  parameter Real k = 2 "gain";
end Test;
"#;
        let def = parse_stored_definition(code).expect("Failed to parse test code");
        let mut visitor = ReprVisitor::default();
        def.accept(&mut visitor, None);
        let expected = unindent::unindent(
            r#"
            StoredDefinition
              ClassDefinition model Test
                ComponentDeclaration Real k
                  "gain"
                  Integer 2
            "#,
        );
        assert_eq!(visitor.repr, expected);
    }
}
