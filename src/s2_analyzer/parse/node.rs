//! Uniform view over the syntax tree: a kind tag, ordered children and a
//! span for every node, plus a generated [`Visitor`] with `enter_*` /
//! `exit_*` hooks per node type.

use paste::paste;

use crate::s1_parser::ast;
use crate::s1_parser::ast::Span;

pub trait Node {
    fn kind(&self) -> &'static str;

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    /// Short human readable summary, e.g. the declared name.
    fn label(&self) -> String {
        String::new()
    }

    /// Only declarations carry node ids; expressions and equations do not.
    fn id(&self) -> Option<usize> {
        None
    }

    fn span(&self) -> Option<Span> {
        None
    }
}

macro_rules! node_macros {
    ($($name:ident),*) => {
        paste! {

            pub trait Visitable {
                fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V, parent: Option<usize>);
            }

            #[derive(Clone, Copy, Debug, PartialEq)]
            pub enum NodeRef<'a> {
                $(
                    $name(&'a ast::$name),
                )*
            }

            impl<'a> Node for NodeRef<'a> {
                fn kind(&self) -> &'static str {
                    match self {
                        $(
                            NodeRef::$name(node) => node.kind(),
                        )*
                    }
                }

                fn children(&self) -> Vec<NodeRef<'_>> {
                    match self {
                        $(
                            NodeRef::$name(node) => node.children(),
                        )*
                    }
                }

                fn label(&self) -> String {
                    match self {
                        $(
                            NodeRef::$name(node) => node.label(),
                        )*
                    }
                }

                fn id(&self) -> Option<usize> {
                    match self {
                        $(
                            NodeRef::$name(node) => node.id(),
                        )*
                    }
                }

                fn span(&self) -> Option<Span> {
                    match self {
                        $(
                            NodeRef::$name(node) => node.span(),
                        )*
                    }
                }
            }

            $(
                impl<'a> From<&'a ast::$name> for NodeRef<'a> {
                    fn from(value: &'a ast::$name) -> Self {
                        NodeRef::$name(value)
                    }
                }

                impl Visitable for ast::$name {
                    fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V, parent_id: Option<usize>) {
                        visitor.enter_any(NodeRef::$name(self), parent_id);
                        visitor.[<enter_ $name:snake>](self, parent_id);
                        let id = self.id().or(parent_id);
                        for child in self.children() {
                            child.accept(visitor, id);
                        }
                        visitor.[<exit_ $name:snake>](self, parent_id);
                        visitor.exit_any(NodeRef::$name(self), parent_id)
                    }
                }
            )*

            impl<'a> Visitable for NodeRef<'a> {
                fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V, parent_id: Option<usize>) {
                    match self {
                        $(
                            NodeRef::$name(node) => node.accept(visitor, parent_id),
                        )*
                    }
                }
            }

            #[allow(unused_variables)]
            pub trait Visitor {
                fn enter_any(&mut self, n: NodeRef, parent_id: Option<usize>) {}
                fn exit_any(&mut self, n: NodeRef, parent_id: Option<usize>) {}
                $(
                    fn [<enter_ $name:snake>](&mut self, n: &ast::$name, parent_id: Option<usize>) {}
                    fn [<exit_ $name:snake>](&mut self, n: &ast::$name, parent_id: Option<usize>) {}
                )*
            }
        }
    };
}

node_macros!(
    // File Level Nodes
    StoredDefinition,
    // Class Level Nodes
    ClassDefinition,
    ImportClause,
    ExtendsClause,
    ComponentDeclaration,
    // Sections
    EquationSection,
    AlgorithmSection,
    Equation,
    Statement,
    // Modifications
    Annotation,
    Argument,
    // Expressions
    Expression,
    ComponentReference
);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-node children
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn push_modification<'a>(out: &mut Vec<NodeRef<'a>>, modification: &'a ast::Modification) {
    if let Some(class_modification) = &modification.class_modification {
        push_class_modification(out, class_modification);
    }
    if let Some(expr) = &modification.expression {
        out.push(NodeRef::Expression(expr));
    }
}

fn push_class_modification<'a>(out: &mut Vec<NodeRef<'a>>, modification: &'a ast::ClassModification) {
    out.extend(modification.arguments.iter().map(|a| NodeRef::Argument(a.as_ref())));
}

fn push_description<'a>(out: &mut Vec<NodeRef<'a>>, description: &'a ast::Description) {
    if let Some(annotation) = &description.annotation {
        out.push(NodeRef::Annotation(annotation.as_ref()));
    }
}

fn push_subscripts<'a>(out: &mut Vec<NodeRef<'a>>, subs: &'a [ast::Subscript]) {
    for sub in subs {
        if let ast::Subscript::Expression(expr) = sub {
            out.push(NodeRef::Expression(expr));
        }
    }
}

fn push_arguments<'a>(out: &mut Vec<NodeRef<'a>>, arguments: &'a ast::FunctionArguments) {
    out.extend(arguments.positional.iter().map(NodeRef::Expression));
    out.extend(arguments.named.iter().map(|n| NodeRef::Expression(&n.value)));
    if let Some((expr, indices)) = &arguments.comprehension {
        out.push(NodeRef::Expression(expr));
        out.extend(indices.iter().filter_map(|i| i.range.as_ref()).map(NodeRef::Expression));
    }
}

impl Node for ast::StoredDefinition {
    fn kind(&self) -> &'static str {
        "StoredDefinition"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.classes.iter().map(|c| NodeRef::ClassDefinition(c.as_ref())).collect()
    }

    fn label(&self) -> String {
        self.within
            .as_ref()
            .map(|w| format!("within {w}"))
            .unwrap_or_default()
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::ClassDefinition {
    fn kind(&self) -> &'static str {
        "ClassDefinition"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        match &self.specifier {
            ast::ClassSpecifier::Long {
                extends_modification,
                elements,
                annotation,
                ..
            } => {
                if let Some(modification) = extends_modification {
                    push_class_modification(&mut out, modification);
                }
                for element in elements {
                    out.push(match element {
                        ast::Element::Class(c) => NodeRef::ClassDefinition(c.as_ref()),
                        ast::Element::Component(c) => NodeRef::ComponentDeclaration(c.as_ref()),
                        ast::Element::Extends(e) => NodeRef::ExtendsClause(e.as_ref()),
                        ast::Element::Import(i) => NodeRef::ImportClause(i.as_ref()),
                        ast::Element::EquationSection(s) => NodeRef::EquationSection(s.as_ref()),
                        ast::Element::AlgorithmSection(s) => NodeRef::AlgorithmSection(s.as_ref()),
                    });
                }
                if let Some(annotation) = annotation {
                    out.push(NodeRef::Annotation(annotation.as_ref()));
                }
            }
            ast::ClassSpecifier::Short {
                subscripts,
                class_modification,
                description,
                ..
            } => {
                push_subscripts(&mut out, subscripts);
                if let Some(modification) = class_modification {
                    push_class_modification(&mut out, modification);
                }
                push_description(&mut out, description);
            }
            ast::ClassSpecifier::Enumeration { description, .. }
            | ast::ClassSpecifier::Derivative { description, .. } => {
                push_description(&mut out, description);
            }
        }
        out
    }

    fn label(&self) -> String {
        format!("{} {}", self.class_type(), self.name)
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::ComponentDeclaration {
    fn kind(&self) -> &'static str {
        "ComponentDeclaration"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        push_subscripts(&mut out, &self.type_subscripts);
        push_subscripts(&mut out, &self.subscripts);
        if let Some(modification) = &self.modification {
            push_modification(&mut out, modification);
        }
        if let Some(condition) = &self.condition {
            out.push(NodeRef::Expression(condition));
        }
        push_description(&mut out, &self.description);
        out
    }

    fn label(&self) -> String {
        format!("{} {}", self.type_specifier, self.name)
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::ExtendsClause {
    fn kind(&self) -> &'static str {
        "ExtendsClause"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        if let Some(modification) = &self.class_modification {
            push_class_modification(&mut out, modification);
        }
        if let Some(annotation) = &self.annotation {
            out.push(NodeRef::Annotation(annotation.as_ref()));
        }
        out
    }

    fn label(&self) -> String {
        self.type_specifier.to_string()
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::ImportClause {
    fn kind(&self) -> &'static str {
        "ImportClause"
    }

    fn label(&self) -> String {
        match &self.kind {
            ast::ImportKind::Qualified { name } => name.to_string(),
            ast::ImportKind::Alias { alias, name } => format!("{alias} = {name}"),
            ast::ImportKind::Wildcard { name } => format!("{name}.*"),
            ast::ImportKind::Multiple { name, imports } => {
                let names: Vec<&str> = imports.iter().map(|t| t.text.as_str()).collect();
                format!("{name}.{{{}}}", names.join(", "))
            }
        }
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::EquationSection {
    fn kind(&self) -> &'static str {
        "EquationSection"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.equations.iter().map(NodeRef::Equation).collect()
    }

    fn label(&self) -> String {
        if self.initial { "initial".to_string() } else { String::new() }
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::AlgorithmSection {
    fn kind(&self) -> &'static str {
        "AlgorithmSection"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.statements.iter().map(NodeRef::Statement).collect()
    }

    fn label(&self) -> String {
        if self.initial { "initial".to_string() } else { String::new() }
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::Equation {
    fn kind(&self) -> &'static str {
        match self {
            ast::Equation::Simple { .. } => "EquationSimple",
            ast::Equation::Connect { .. } => "EquationConnect",
            ast::Equation::If { .. } => "EquationIf",
            ast::Equation::For { .. } => "EquationFor",
            ast::Equation::When { .. } => "EquationWhen",
            ast::Equation::FunctionCall { .. } => "EquationFunctionCall",
        }
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        match self {
            ast::Equation::Simple { lhs, rhs, description } => {
                out.push(NodeRef::Expression(lhs));
                out.push(NodeRef::Expression(rhs));
                push_description(&mut out, description);
            }
            ast::Equation::Connect { lhs, rhs, description } => {
                out.push(NodeRef::ComponentReference(lhs));
                out.push(NodeRef::ComponentReference(rhs));
                push_description(&mut out, description);
            }
            ast::Equation::If {
                branches,
                else_branch,
                description,
            } => {
                for branch in branches {
                    out.push(NodeRef::Expression(&branch.condition));
                    out.extend(branch.equations.iter().map(NodeRef::Equation));
                }
                out.extend(else_branch.iter().map(NodeRef::Equation));
                push_description(&mut out, description);
            }
            ast::Equation::For {
                indices,
                equations,
                description,
            } => {
                out.extend(indices.iter().filter_map(|i| i.range.as_ref()).map(NodeRef::Expression));
                out.extend(equations.iter().map(NodeRef::Equation));
                push_description(&mut out, description);
            }
            ast::Equation::When { branches, description } => {
                for branch in branches {
                    out.push(NodeRef::Expression(&branch.condition));
                    out.extend(branch.equations.iter().map(NodeRef::Equation));
                }
                push_description(&mut out, description);
            }
            ast::Equation::FunctionCall {
                callee,
                arguments,
                description,
            } => {
                out.push(NodeRef::ComponentReference(callee));
                push_arguments(&mut out, arguments);
                push_description(&mut out, description);
            }
        }
        out
    }
}

impl Node for ast::Statement {
    fn kind(&self) -> &'static str {
        match self {
            ast::Statement::Assignment { .. } => "StatementAssignment",
            ast::Statement::MultiAssignment { .. } => "StatementMultiAssignment",
            ast::Statement::FunctionCall { .. } => "StatementFunctionCall",
            ast::Statement::If { .. } => "StatementIf",
            ast::Statement::For { .. } => "StatementFor",
            ast::Statement::While { .. } => "StatementWhile",
            ast::Statement::When { .. } => "StatementWhen",
            ast::Statement::Break => "StatementBreak",
            ast::Statement::Return => "StatementReturn",
        }
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        match self {
            ast::Statement::Assignment { target, value } => {
                out.push(NodeRef::ComponentReference(target));
                out.push(NodeRef::Expression(value));
            }
            ast::Statement::MultiAssignment {
                targets,
                callee,
                arguments,
            } => {
                out.extend(targets.iter().flatten().map(NodeRef::Expression));
                out.push(NodeRef::ComponentReference(callee));
                push_arguments(&mut out, arguments);
            }
            ast::Statement::FunctionCall { callee, arguments } => {
                out.push(NodeRef::ComponentReference(callee));
                push_arguments(&mut out, arguments);
            }
            ast::Statement::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    out.push(NodeRef::Expression(&branch.condition));
                    out.extend(branch.statements.iter().map(NodeRef::Statement));
                }
                out.extend(else_branch.iter().map(NodeRef::Statement));
            }
            ast::Statement::When { branches } => {
                for branch in branches {
                    out.push(NodeRef::Expression(&branch.condition));
                    out.extend(branch.statements.iter().map(NodeRef::Statement));
                }
            }
            ast::Statement::For {
                indices,
                statements,
            } => {
                out.extend(indices.iter().filter_map(|i| i.range.as_ref()).map(NodeRef::Expression));
                out.extend(statements.iter().map(NodeRef::Statement));
            }
            ast::Statement::While {
                condition,
                statements,
            } => {
                out.push(NodeRef::Expression(condition));
                out.extend(statements.iter().map(NodeRef::Statement));
            }
            ast::Statement::Break | ast::Statement::Return => {}
        }
        out
    }
}

impl Node for ast::Annotation {
    fn kind(&self) -> &'static str {
        "Annotation"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        push_class_modification(&mut out, &self.class_modification);
        out
    }

    fn id(&self) -> Option<usize> {
        Some(self.node_data.id)
    }

    fn span(&self) -> Option<Span> {
        Some(self.node_data.span)
    }
}

impl Node for ast::Argument {
    fn kind(&self) -> &'static str {
        match self {
            ast::Argument::ElementModification { .. } => "ElementModification",
            ast::Argument::ClassRedeclaration { .. } => "ClassRedeclaration",
            ast::Argument::ComponentRedeclaration { .. } => "ComponentRedeclaration",
        }
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        match self {
            ast::Argument::ElementModification { modification, .. } => {
                if let Some(modification) = modification {
                    push_modification(&mut out, modification);
                }
            }
            ast::Argument::ClassRedeclaration { definition, .. } => {
                out.push(NodeRef::ClassDefinition(definition.as_ref()));
            }
            ast::Argument::ComponentRedeclaration { declaration, .. } => {
                out.push(NodeRef::ComponentDeclaration(declaration.as_ref()));
            }
        }
        out
    }

    fn label(&self) -> String {
        match self {
            ast::Argument::ElementModification { name, .. } => name.to_string(),
            ast::Argument::ClassRedeclaration { definition, .. } => definition.name.to_string(),
            ast::Argument::ComponentRedeclaration { declaration, .. } => {
                declaration.name.to_string()
            }
        }
    }
}

impl Node for ast::Expression {
    fn kind(&self) -> &'static str {
        match self {
            ast::Expression::Boolean { .. } => "Boolean",
            ast::Expression::Integer { .. } => "Integer",
            ast::Expression::Real { .. } => "Real",
            ast::Expression::String { .. } => "String",
            ast::Expression::ComponentReference(_) => "Reference",
            ast::Expression::FunctionCall { .. } => "FunctionCall",
            ast::Expression::PartialApplication { .. } => "PartialApplication",
            ast::Expression::Binary { .. } => "Binary",
            ast::Expression::Unary { .. } => "Unary",
            ast::Expression::If { .. } => "If",
            ast::Expression::Range { .. } => "Range",
            ast::Expression::Array { .. } => "Array",
            ast::Expression::ArrayComprehension { .. } => "ArrayComprehension",
            ast::Expression::Matrix { .. } => "Matrix",
            ast::Expression::Parenthesized { .. } => "Parenthesized",
            ast::Expression::Tuple { .. } => "Tuple",
            ast::Expression::End => "End",
        }
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        match self {
            ast::Expression::Boolean { .. }
            | ast::Expression::Integer { .. }
            | ast::Expression::Real { .. }
            | ast::Expression::String { .. }
            | ast::Expression::End => {}
            ast::Expression::ComponentReference(cref) => {
                out.push(NodeRef::ComponentReference(cref));
            }
            ast::Expression::FunctionCall { callee, arguments } => {
                out.push(NodeRef::ComponentReference(callee));
                push_arguments(&mut out, arguments);
            }
            ast::Expression::PartialApplication { arguments, .. } => {
                out.extend(arguments.iter().map(|a| NodeRef::Expression(&a.value)));
            }
            ast::Expression::Binary { lhs, rhs, .. } => {
                out.push(NodeRef::Expression(lhs));
                out.push(NodeRef::Expression(rhs));
            }
            ast::Expression::Unary { rhs, .. } => out.push(NodeRef::Expression(rhs)),
            ast::Expression::If {
                branches,
                else_branch,
            } => {
                for (condition, value) in branches {
                    out.push(NodeRef::Expression(condition));
                    out.push(NodeRef::Expression(value));
                }
                out.push(NodeRef::Expression(else_branch));
            }
            ast::Expression::Range { start, step, end } => {
                out.push(NodeRef::Expression(start));
                if let Some(step) = step {
                    out.push(NodeRef::Expression(step));
                }
                out.push(NodeRef::Expression(end));
            }
            ast::Expression::Array { elements } => {
                out.extend(elements.iter().map(NodeRef::Expression));
            }
            ast::Expression::ArrayComprehension { expr, indices } => {
                out.push(NodeRef::Expression(expr));
                out.extend(indices.iter().filter_map(|i| i.range.as_ref()).map(NodeRef::Expression));
            }
            ast::Expression::Matrix { rows } => {
                out.extend(rows.iter().flatten().map(NodeRef::Expression));
            }
            ast::Expression::Parenthesized { inner } => out.push(NodeRef::Expression(inner)),
            ast::Expression::Tuple { elements } => {
                out.extend(elements.iter().flatten().map(NodeRef::Expression));
            }
        }
        out
    }

    fn label(&self) -> String {
        match self {
            ast::Expression::Boolean { token, .. }
            | ast::Expression::Integer { token, .. }
            | ast::Expression::Real { token, .. }
            | ast::Expression::String { token, .. } => token.text.clone(),
            ast::Expression::Binary { op, .. } => op.to_string(),
            ast::Expression::Unary { op, .. } => op.to_string().trim().to_string(),
            ast::Expression::PartialApplication { callee, .. } => callee.to_string(),
            _ => String::new(),
        }
    }

    fn span(&self) -> Option<Span> {
        match self {
            ast::Expression::Boolean { token, .. }
            | ast::Expression::Integer { token, .. }
            | ast::Expression::Real { token, .. }
            | ast::Expression::String { token, .. } => Some(token.span),
            ast::Expression::ComponentReference(cref)
            | ast::Expression::FunctionCall { callee: cref, .. } => cref.span(),
            _ => None,
        }
    }
}

impl Node for ast::ComponentReference {
    fn kind(&self) -> &'static str {
        "ComponentReference"
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        for part in &self.parts {
            push_subscripts(&mut out, &part.subs);
        }
        out
    }

    fn label(&self) -> String {
        self.to_string()
    }

    fn span(&self) -> Option<Span> {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => Some(first.ident.span.to(last.ident.span)),
            _ => None,
        }
    }
}
