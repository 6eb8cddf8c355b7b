//! Modification environments.
//!
//! An environment is the ordered list of override arguments in force for a
//! class or component instance. Arguments written closer to the
//! instantiation site come first, and every query takes the first match, so
//! outer modifications win over declared defaults. Environments are never
//! mutated; [`ModificationEnvironment::merge`] returns a new one.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::scope::ScopeId;

#[derive(Clone, Debug, PartialEq)]
pub struct ModificationArgument {
    /// Dotted target, relative to the instance the environment belongs to.
    pub path: Vec<String>,
    pub syntax: Arc<ast::Argument>,
    /// Where the argument was written; its expressions and type names are
    /// resolved there.
    pub scope: ScopeId,
}

impl ModificationArgument {
    pub fn new(syntax: Arc<ast::Argument>, scope: ScopeId) -> Self {
        let path = match syntax.as_ref() {
            ast::Argument::ElementModification { name, .. } => name.identifiers(),
            ast::Argument::ClassRedeclaration { definition, .. } => {
                vec![definition.name.text.clone()]
            }
            ast::Argument::ComponentRedeclaration { declaration, .. } => {
                vec![declaration.name.text.clone()]
            }
        };
        Self {
            path,
            syntax,
            scope,
        }
    }

    pub fn modification(&self) -> Option<&ast::Modification> {
        match self.syntax.as_ref() {
            ast::Argument::ElementModification { modification, .. } => modification.as_ref(),
            _ => None,
        }
    }

    pub fn is_element_modification(&self) -> bool {
        matches!(self.syntax.as_ref(), ast::Argument::ElementModification { .. })
    }

    pub fn is_final(&self) -> bool {
        match self.syntax.as_ref() {
            ast::Argument::ElementModification { final_, .. }
            | ast::Argument::ClassRedeclaration { final_, .. }
            | ast::Argument::ComponentRedeclaration { final_, .. } => *final_,
        }
    }

    fn targets(&self, name: &str) -> bool {
        self.path.len() == 1 && self.path[0] == name
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModificationEnvironment {
    arguments: Vec<ModificationArgument>,
}

impl ModificationEnvironment {
    pub fn new(arguments: Vec<ModificationArgument>) -> Self {
        Self { arguments }
    }

    /// Wraps the arguments of a class modification written in `scope`.
    pub fn from_class_modification(
        modification: Option<&ast::ClassModification>,
        scope: ScopeId,
    ) -> Self {
        let arguments = modification
            .map(|m| {
                m.arguments
                    .iter()
                    .map(|a| ModificationArgument::new(a.clone(), scope))
                    .collect()
            })
            .unwrap_or_default();
        Self { arguments }
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn arguments(&self) -> &[ModificationArgument] {
        &self.arguments
    }

    /// First element modification whose whole path is `name`.
    pub fn get_element_modification(&self, name: &str) -> Option<&ModificationArgument> {
        self.arguments
            .iter()
            .find(|a| a.is_element_modification() && a.targets(name))
    }

    /// First element modification of `name` that carries a value, with the
    /// scope to evaluate it in.
    pub fn get_binding(&self, name: &str) -> Option<(&ast::Expression, ScopeId)> {
        self.arguments
            .iter()
            .filter(|a| a.targets(name))
            .find_map(|a| {
                a.modification()
                    .and_then(|m| m.expression.as_ref())
                    .map(|expr| (expr, a.scope))
            })
    }

    /// Every argument whose first path segment is `name`.
    pub fn get_modification_environment(&self, name: &str) -> ModificationEnvironment {
        ModificationEnvironment {
            arguments: self
                .arguments
                .iter()
                .filter(|a| a.path.first().map(String::as_str) == Some(name))
                .cloned()
                .collect(),
        }
    }

    /// Environment for the type of member `name`: the nested arguments of
    /// `name(...)` and the remainder of dotted arguments `name.rest`.
    pub fn descend(&self, name: &str) -> ModificationEnvironment {
        let mut arguments = Vec::new();
        for argument in &self.arguments {
            if argument.path.first().map(String::as_str) != Some(name) {
                continue;
            }
            if argument.path.len() > 1 {
                arguments.push(ModificationArgument {
                    path: argument.path[1..].to_vec(),
                    syntax: argument.syntax.clone(),
                    scope: argument.scope,
                });
                continue;
            }
            let nested = argument
                .modification()
                .and_then(|m| m.class_modification.as_ref());
            if let Some(nested) = nested {
                arguments.extend(
                    nested
                        .arguments
                        .iter()
                        .map(|a| ModificationArgument::new(a.clone(), argument.scope)),
                );
            }
        }
        ModificationEnvironment { arguments }
    }

    /// First `redeclare <class>` targeting `name`.
    pub fn class_redeclaration(&self, name: &str) -> Option<(Arc<ast::ClassDefinition>, ScopeId)> {
        self.arguments.iter().find_map(|a| match a.syntax.as_ref() {
            ast::Argument::ClassRedeclaration { definition, .. } if a.targets(name) => {
                Some((definition.clone(), a.scope))
            }
            _ => None,
        })
    }

    /// First `redeclare <component>` targeting `name`.
    pub fn component_redeclaration(
        &self,
        name: &str,
    ) -> Option<(Arc<ast::ComponentDeclaration>, ScopeId)> {
        self.arguments.iter().find_map(|a| match a.syntax.as_ref() {
            ast::Argument::ComponentRedeclaration { declaration, .. } if a.targets(name) => {
                Some((declaration.clone(), a.scope))
            }
            _ => None,
        })
    }

    /// `[...self, ...other]`
    pub fn merge(&self, other: &ModificationEnvironment) -> ModificationEnvironment {
        let mut arguments = Vec::with_capacity(self.arguments.len() + other.arguments.len());
        arguments.extend(self.arguments.iter().cloned());
        arguments.extend(other.arguments.iter().cloned());
        ModificationEnvironment { arguments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s1_parser::parse_stored_definition;

    /// Class modification of the single extends clause in `code`.
    fn extends_modification(code: &str) -> ast::ClassModification {
        let def = parse_stored_definition(code).expect("Failed to parse test code");
        def.classes[0]
            .elements()
            .iter()
            .find_map(|e| match e {
                ast::Element::Extends(e) => e.class_modification.clone(),
                _ => None,
            })
            .expect("no extends modification")
    }

    fn binding_text(env: &ModificationEnvironment, name: &str) -> Option<String> {
        env.get_binding(name).map(|(expr, _)| match expr {
            ast::Expression::Integer { token, .. } | ast::Expression::Real { token, .. } => {
                token.text.clone()
            }
            other => format!("{other:?}"),
        })
    }

    #[test]
    fn test_first_match_wins_after_merge() {
        let outer = ModificationEnvironment::from_class_modification(
            Some(&extends_modification("model A extends B(x = 1); end A;")),
            ScopeId::Context,
        );
        let inner = ModificationEnvironment::from_class_modification(
            Some(&extends_modification("model A extends B(x = 2, y = 3); end A;")),
            ScopeId::Context,
        );
        let merged = outer.merge(&inner);
        assert_eq!(merged.len(), 3);
        assert_eq!(binding_text(&merged, "x").as_deref(), Some("1"));
        assert_eq!(binding_text(&merged, "y").as_deref(), Some("3"));

        let reversed = inner.merge(&outer);
        assert_eq!(binding_text(&reversed, "x").as_deref(), Some("2"));
        // merge never mutates its inputs
        assert_eq!(outer.len(), 1);
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_routing_and_descend() {
        let env = ModificationEnvironment::from_class_modification(
            Some(&extends_modification(
                "model A extends B(p(x = 1, y(z = 2)), p.w = 3, q = 4); end A;",
            )),
            ScopeId::Context,
        );
        let routed = env.get_modification_environment("p");
        assert_eq!(routed.len(), 2);
        assert!(routed.get_element_modification("p").is_some());
        assert!(routed.get_binding("p").is_none());

        let nested = env.descend("p");
        let paths: Vec<Vec<String>> = nested.arguments().iter().map(|a| a.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec!["x".to_string()],
                vec!["y".to_string()],
                vec!["w".to_string()]
            ]
        );
        assert_eq!(binding_text(&nested, "w").as_deref(), Some("3"));
        assert_eq!(nested.descend("y").len(), 1);
        assert!(env.descend("missing").is_empty());
    }

    #[test]
    fn test_binding_skips_modifications_without_value() {
        let env = ModificationEnvironment::from_class_modification(
            Some(&extends_modification("model A extends B(x(unit = \"m\"), x = 5); end A;")),
            ScopeId::Context,
        );
        let first = env.get_element_modification("x").expect("no modification");
        assert!(first.modification().and_then(|m| m.expression.as_ref()).is_none());
        assert_eq!(binding_text(&env, "x").as_deref(), Some("5"));
    }

    #[test]
    fn test_redeclarations() {
        let env = ModificationEnvironment::from_class_modification(
            Some(&extends_modification(
                "model A extends B(redeclare model M = C, redeclare Real k = 2); end A;",
            )),
            ScopeId::Context,
        );
        let (class, _) = env.class_redeclaration("M").expect("no class redeclaration");
        assert_eq!(class.name.text, "M");
        let (component, _) = env.component_redeclaration("k").expect("no component redeclaration");
        assert_eq!(component.type_specifier.to_string(), "Real");
        assert!(env.get_element_modification("M").is_none());
    }
}
