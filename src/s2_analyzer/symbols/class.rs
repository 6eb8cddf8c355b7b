//! Class symbols and their three lazy passes.
//!
//! 1. **elements** projects the declaration into owned symbols, routing the
//!    modification environment to each named element.
//! 2. **base classes** resolves every extends clause (requires 1).
//! 3. **components** instantiates every component, own and inherited
//!    (requires 2).
//!
//! Each pass runs at most once per symbol. A pass requested while it is
//! running on the same symbol returns at once and leaves the partial state
//! visible. Instances of one declaration only collide once they nest inside
//! their own pass past a fixed depth.

use std::sync::Arc;

use crate::s1_parser::ast;

use super::super::context::Context;
use super::super::modification::ModificationEnvironment;
use super::super::scope::{NamedElement, ScopeId};
use super::{
    BuiltinType, ClassId, ClassRestriction, ComponentId, ComponentSymbol, ConnectionSymbol,
    ElementSymbol, ExtendsSymbol, ExtendsSyntax, ImportId, ImportSymbol, InstantiationState,
    LibraryId, Pass,
};

/// Directory-backed package: its children are listed from storage.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredSource {
    pub library: LibraryId,
    pub path: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClassKind {
    Declared {
        syntax: Arc<ast::ClassDefinition>,
        structured: Option<StructuredSource>,
    },
    Builtin(BuiltinType),
    Array {
        dtype: ClassId,
        shape: Vec<Option<i64>>,
    },
    /// An evaluated annotation clause; each element is a class instance.
    Annotation { elements: Vec<ClassId> },
}

#[derive(Clone, Debug)]
pub struct ClassSymbol {
    pub identifier: String,
    pub parent: ScopeId,
    pub environment: ModificationEnvironment,
    pub kind: ClassKind,
    pub restriction: Option<ClassRestriction>,
    pub(crate) elements: Option<Vec<ElementSymbol>>,
    pub(crate) elements_state: InstantiationState,
    pub(crate) base_classes_state: InstantiationState,
    pub(crate) components_state: InstantiationState,
    pub(crate) named_cache: Option<Vec<NamedElement>>,
    pub(crate) annotation: Option<Option<ClassId>>,
}

impl ClassSymbol {
    fn new(identifier: String, parent: ScopeId, kind: ClassKind, restriction: Option<ClassRestriction>) -> Self {
        Self {
            identifier,
            parent,
            environment: ModificationEnvironment::default(),
            kind,
            restriction,
            elements: None,
            elements_state: InstantiationState::NotStarted,
            base_classes_state: InstantiationState::NotStarted,
            components_state: InstantiationState::NotStarted,
            named_cache: None,
            annotation: None,
        }
    }

    pub fn declared(
        syntax: Arc<ast::ClassDefinition>,
        parent: ScopeId,
        structured: Option<StructuredSource>,
    ) -> Self {
        let restriction = Some(syntax.class_type().into());
        Self::new(
            syntax.name.text.clone(),
            parent,
            ClassKind::Declared { syntax, structured },
            restriction,
        )
    }

    pub fn builtin(builtin: BuiltinType) -> Self {
        Self::new(
            builtin.name().to_string(),
            ScopeId::Context,
            ClassKind::Builtin(builtin),
            Some(ClassRestriction::Type),
        )
    }

    pub fn array(identifier: String, dtype: ClassId, shape: Vec<Option<i64>>) -> Self {
        Self::new(
            identifier,
            ScopeId::Context,
            ClassKind::Array { dtype, shape },
            Some(ClassRestriction::Type),
        )
    }

    pub fn annotation(elements: Vec<ClassId>, parent: ScopeId) -> Self {
        Self::new(
            "annotation".to_string(),
            parent,
            ClassKind::Annotation { elements },
            None,
        )
    }

    pub fn syntax(&self) -> Option<&Arc<ast::ClassDefinition>> {
        match &self.kind {
            ClassKind::Declared { syntax, .. } => Some(syntax),
            _ => None,
        }
    }

    pub fn builtin_type(&self) -> Option<BuiltinType> {
        match self.kind {
            ClassKind::Builtin(builtin) => Some(builtin),
            _ => None,
        }
    }

    pub fn is_enumeration(&self) -> bool {
        matches!(
            self.syntax().map(|s| &s.specifier),
            Some(ast::ClassSpecifier::Enumeration { .. })
        )
    }

    /// Node id of the declaration shared by every instance of this class.
    pub(crate) fn declaration_id(&self) -> Option<usize> {
        self.syntax().map(|s| s.node_data.id)
    }
}

/// Identity used to stop inheritance walks on cyclic hierarchies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SymbolKey {
    Declaration(usize),
    Class(ClassId),
}

impl Context {
    pub(crate) fn symbol_key(&self, class: ClassId) -> SymbolKey {
        match self.class(class).declaration_id() {
            Some(id) => SymbolKey::Declaration(id),
            None => SymbolKey::Class(class),
        }
    }

    /// Applies `environment` to `class`. An empty environment returns the
    /// class itself; otherwise a new class sharing the declaration is
    /// created with `environment` in front of the class's own environment.
    pub fn instantiate_class(
        &mut self,
        class: ClassId,
        parent: ScopeId,
        environment: ModificationEnvironment,
    ) -> ClassId {
        if environment.is_empty() {
            return class;
        }
        let source = self.class(class);
        let mut symbol = ClassSymbol::new(
            source.identifier.clone(),
            parent,
            source.kind.clone(),
            source.restriction,
        );
        symbol.environment = environment.merge(&source.environment);
        self.alloc_class(symbol)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Passes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub(crate) fn ensure_elements(&mut self, class: ClassId) {
        match self.class(class).elements_state {
            InstantiationState::Done => return,
            InstantiationState::InProgress => {
                self.report_cycle(Pass::Elements, self.qualified_name(class));
                return;
            }
            InstantiationState::NotStarted => {}
        }
        self.class_mut(class).elements_state = InstantiationState::InProgress;

        let symbol = self.class(class);
        let kind = symbol.kind.clone();
        let environment = symbol.environment.clone();
        let elements = match kind {
            ClassKind::Declared { syntax, structured } => {
                let mut elements = self.project_elements(class, &syntax, &environment);
                if let Some(source) = structured {
                    self.load_structured_children(class, &source, &environment, &mut elements);
                }
                elements
            }
            ClassKind::Annotation { elements } => {
                elements.into_iter().map(ElementSymbol::Class).collect()
            }
            ClassKind::Builtin(_) | ClassKind::Array { .. } => Vec::new(),
        };

        let symbol = self.class_mut(class);
        symbol.elements = Some(elements);
        symbol.elements_state = InstantiationState::Done;
    }

    fn project_elements(
        &mut self,
        class: ClassId,
        syntax: &Arc<ast::ClassDefinition>,
        environment: &ModificationEnvironment,
    ) -> Vec<ElementSymbol> {
        let mut out = Vec::new();
        match &syntax.specifier {
            ast::ClassSpecifier::Long { elements, .. } => {
                for element in elements {
                    let symbol = match element {
                        ast::Element::Class(definition) => {
                            ElementSymbol::Class(self.project_class(class, definition, environment))
                        }
                        ast::Element::Component(declaration) => ElementSymbol::Component(
                            self.project_component(class, declaration, environment),
                        ),
                        ast::Element::Extends(clause) => {
                            ElementSymbol::Extends(self.alloc_extends(ExtendsSymbol::new(
                                class,
                                ExtendsSyntax::Clause(clause.clone()),
                                environment.clone(),
                            )))
                        }
                        ast::Element::Import(clause) => {
                            ElementSymbol::Import(self.alloc_import(ImportSymbol::new(class, clause.clone())))
                        }
                        ast::Element::EquationSection(section) => {
                            ElementSymbol::EquationSection(section.clone())
                        }
                        ast::Element::AlgorithmSection(section) => {
                            ElementSymbol::AlgorithmSection(section.clone())
                        }
                    };
                    out.push(symbol);
                }
            }
            ast::ClassSpecifier::Short { .. } => {
                out.push(ElementSymbol::Extends(self.alloc_extends(ExtendsSymbol::new(
                    class,
                    ExtendsSyntax::Short(syntax.clone()),
                    environment.clone(),
                ))));
            }
            ast::ClassSpecifier::Enumeration { literals, .. } => {
                for (ordinal, literal) in literals.iter().enumerate() {
                    let symbol = ComponentSymbol::literal(
                        class,
                        literal.ident.text.clone(),
                        ordinal as i64,
                        literal.description.text(),
                    );
                    out.push(ElementSymbol::Component(self.alloc_component(symbol)));
                }
            }
            ast::ClassSpecifier::Derivative { .. } => {}
        }
        out
    }

    /// Nested class, replaced by a `redeclare` targeting it if present.
    pub(crate) fn project_class(
        &mut self,
        class: ClassId,
        definition: &Arc<ast::ClassDefinition>,
        environment: &ModificationEnvironment,
    ) -> ClassId {
        let name = &definition.name.text;
        let mut symbol = match environment.class_redeclaration(name) {
            Some((replacement, scope)) => ClassSymbol::declared(replacement, scope, None),
            None => ClassSymbol::declared(definition.clone(), ScopeId::Class(class), None),
        };
        symbol.environment = environment.descend(name);
        self.alloc_class(symbol)
    }

    fn project_component(
        &mut self,
        class: ClassId,
        declaration: &Arc<ast::ComponentDeclaration>,
        environment: &ModificationEnvironment,
    ) -> ComponentId {
        let name = &declaration.name.text;
        let routed = environment.get_modification_environment(name);
        let (syntax, scope) = match routed.component_redeclaration(name) {
            Some((replacement, scope)) => (replacement, scope),
            None => (declaration.clone(), ScopeId::Class(class)),
        };
        self.alloc_component(ComponentSymbol::declared(class, syntax, scope, routed))
    }

    pub(crate) fn ensure_base_classes(&mut self, class: ClassId) {
        if self.class(class).base_classes_state == InstantiationState::Done {
            return;
        }
        let declaration = self.class(class).declaration_id();
        let environment = self.class(class).environment.clone();
        if !self.enter(Pass::BaseClasses, class.index(), declaration, &environment) {
            self.report_cycle(Pass::BaseClasses, self.qualified_name(class));
            return;
        }
        self.class_mut(class).base_classes_state = InstantiationState::InProgress;

        self.ensure_elements(class);
        for extends in self.own_extends(class) {
            self.instantiate_extends(extends);
        }

        let symbol = self.class_mut(class);
        symbol.base_classes_state = InstantiationState::Done;
        symbol.named_cache = None;
        self.leave(Pass::BaseClasses, class.index());
    }

    pub(crate) fn ensure_components(&mut self, class: ClassId) {
        if self.class(class).components_state == InstantiationState::Done {
            return;
        }
        let declaration = self.class(class).declaration_id();
        let environment = self.class(class).environment.clone();
        if !self.enter(Pass::Components, class.index(), declaration, &environment) {
            self.report_cycle(Pass::Components, self.qualified_name(class));
            return;
        }
        self.class_mut(class).components_state = InstantiationState::InProgress;

        self.ensure_base_classes(class);
        for component in self.collect_components(class) {
            self.instantiate_component(component);
        }

        self.class_mut(class).components_state = InstantiationState::Done;
        self.leave(Pass::Components, class.index());
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Derived views
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn own_extends(&self, class: ClassId) -> Vec<super::ExtendsId> {
        self.class(class)
            .elements
            .iter()
            .flatten()
            .filter_map(|e| match e {
                ElementSymbol::Extends(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Own elements of every class in the hierarchy, each with the class
    /// that owns it: own first, then each resolved base in order. Bases
    /// already on the walk are skipped.
    fn inherited_elements(&mut self, class: ClassId) -> Vec<(ClassId, ElementSymbol)> {
        let mut out = Vec::new();
        let mut visiting = Vec::new();
        self.collect_inherited(class, &mut out, &mut visiting);
        out
    }

    fn collect_inherited(
        &mut self,
        class: ClassId,
        out: &mut Vec<(ClassId, ElementSymbol)>,
        visiting: &mut Vec<SymbolKey>,
    ) {
        let key = self.symbol_key(class);
        if visiting.contains(&key) {
            return;
        }
        visiting.push(key);
        self.ensure_elements(class);
        let elements = self.class(class).elements.clone().unwrap_or_default();
        let mut bases = Vec::new();
        for element in elements {
            match element {
                ElementSymbol::Extends(extends) => {
                    if let Some(base) = self.extends_symbol(extends).class_symbol {
                        bases.push(base);
                    }
                }
                other => out.push((class, other)),
            }
        }
        for base in bases {
            self.collect_inherited(base, out, visiting);
        }
        visiting.pop();
    }

    fn element_identifier(&self, element: NamedElement) -> &str {
        match element {
            NamedElement::Class(id) => &self.class(id).identifier,
            NamedElement::Component(id) => &self.component(id).identifier,
        }
    }

    fn collect_named(&mut self, class: ClassId) -> Vec<NamedElement> {
        if let Some(cached) = &self.class(class).named_cache {
            return cached.clone();
        }
        let named: Vec<NamedElement> = self
            .inherited_elements(class)
            .into_iter()
            .filter_map(|(_, element)| match element {
                ElementSymbol::Class(id) => Some(NamedElement::Class(id)),
                ElementSymbol::Component(id) => Some(NamedElement::Component(id)),
                _ => None,
            })
            .collect();
        if self.class(class).base_classes_state == InstantiationState::Done {
            self.class_mut(class).named_cache = Some(named.clone());
        }
        named
    }

    fn collect_components(&mut self, class: ClassId) -> Vec<ComponentId> {
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for element in self.collect_named(class) {
            if let NamedElement::Component(id) = element {
                let identifier = &self.component(id).identifier;
                if !seen.contains(identifier) {
                    seen.push(identifier.clone());
                    out.push(id);
                }
            }
        }
        out
    }

    /// Own elements in declaration order.
    pub fn elements(&mut self, class: ClassId) -> Vec<ElementSymbol> {
        self.ensure_elements(class);
        self.class(class).elements.clone().unwrap_or_default()
    }

    /// Own and inherited classes and components.
    pub fn named_elements(&mut self, class: ClassId) -> Vec<NamedElement> {
        self.ensure_elements(class);
        self.ensure_base_classes(class);
        self.collect_named(class)
    }

    /// First own or inherited class or component called `identifier`.
    pub fn get_named_element(&mut self, class: ClassId, identifier: &str) -> Option<NamedElement> {
        self.ensure_elements(class);
        self.ensure_base_classes(class);
        if let Some(cached) = &self.class(class).named_cache {
            return cached
                .iter()
                .copied()
                .find(|e| self.element_identifier(*e) == identifier);
        }
        self.collect_named(class)
            .into_iter()
            .find(|e| self.element_identifier(*e) == identifier)
    }

    pub fn classes(&mut self, class: ClassId) -> Vec<ClassId> {
        self.named_elements(class)
            .into_iter()
            .filter_map(NamedElement::class)
            .collect()
    }

    /// Flattened base classes: each direct base followed by its own bases.
    pub fn base_classes(&mut self, class: ClassId) -> Vec<ClassId> {
        self.ensure_base_classes(class);
        let mut out = Vec::new();
        let mut visiting = vec![self.symbol_key(class)];
        self.collect_bases(class, &mut out, &mut visiting);
        out
    }

    fn collect_bases(&mut self, class: ClassId, out: &mut Vec<ClassId>, visiting: &mut Vec<SymbolKey>) {
        for extends in self.own_extends(class) {
            let Some(base) = self.extends_symbol(extends).class_symbol else {
                continue;
            };
            let key = self.symbol_key(base);
            if visiting.contains(&key) {
                continue;
            }
            out.push(base);
            visiting.push(key);
            self.collect_bases(base, out, visiting);
            visiting.pop();
        }
    }

    /// Own and inherited components, all instantiated. Inherited components
    /// shadowed by an own component of the same name are dropped.
    pub fn components(&mut self, class: ClassId) -> Vec<ComponentId> {
        self.ensure_components(class);
        self.collect_components(class)
    }

    /// Own import clauses; imports are not inherited.
    pub fn imports(&mut self, class: ClassId) -> Vec<ImportId> {
        self.elements(class)
            .into_iter()
            .filter_map(|e| match e {
                ElementSymbol::Import(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn equation_sections(&mut self, class: ClassId) -> Vec<Arc<ast::EquationSection>> {
        self.ensure_base_classes(class);
        self.inherited_elements(class)
            .into_iter()
            .filter_map(|(_, e)| match e {
                ElementSymbol::EquationSection(section) => Some(section),
                _ => None,
            })
            .collect()
    }

    pub fn algorithm_sections(&mut self, class: ClassId) -> Vec<Arc<ast::AlgorithmSection>> {
        self.ensure_base_classes(class);
        self.inherited_elements(class)
            .into_iter()
            .filter_map(|(_, e)| match e {
                ElementSymbol::AlgorithmSection(section) => Some(section),
                _ => None,
            })
            .collect()
    }

    /// `connect` equations at the top level of every equation section.
    pub fn connections(&mut self, class: ClassId) -> Vec<ConnectionSymbol> {
        self.ensure_base_classes(class);
        let mut out = Vec::new();
        for (owner, element) in self.inherited_elements(class) {
            let ElementSymbol::EquationSection(section) = element else {
                continue;
            };
            for equation in &section.equations {
                if let ast::Equation::Connect {
                    lhs,
                    rhs,
                    description,
                } = equation
                {
                    out.push(ConnectionSymbol {
                        owner,
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                        annotation: description.annotation.clone(),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::Reference;

    fn open(code: &str) -> Context {
        let mut cx = Context::new();
        cx.open_document("test.mo", code);
        cx
    }

    fn class_named(cx: &mut Context, name: &str) -> ClassId {
        cx.resolve(ScopeId::Context, &Reference::parse(name), false)
            .and_then(NamedElement::class)
            .unwrap_or_else(|| panic!("{name} not found"))
    }

    fn names(cx: &Context, classes: &[ClassId]) -> Vec<String> {
        classes.iter().map(|c| cx.class(*c).identifier.clone()).collect()
    }

    #[test]
    fn test_base_classes_flatten_in_order() {
        let mut cx = open(
            r#"
model A Real a; end A;
model B extends A; Real b; end B;
model C extends B; Real c; end C;
"#,
        );
        let c = class_named(&mut cx, "C");
        let bases = cx.base_classes(c);
        assert_eq!(names(&cx, &bases), vec!["B", "A"]);

        let components: Vec<String> = cx
            .components(c)
            .iter()
            .map(|k| cx.component(*k).identifier.clone())
            .collect();
        assert_eq!(components, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_named_elements_include_inherited_classes() {
        let mut cx = open(
            r#"
package P
  model Base
    model Inner end Inner;
  end Base;
  model Derived
    extends Base;
    Inner i;
  end Derived;
end P;
"#,
        );
        let derived = class_named(&mut cx, "P.Derived");
        let inner = cx
            .get_named_element(derived, "Inner")
            .and_then(NamedElement::class)
            .expect("inherited class not found");
        assert_eq!(cx.class(inner).identifier, "Inner");
        let classes = cx.classes(derived);
        assert_eq!(names(&cx, &classes), vec!["Inner"]);
    }

    #[test]
    fn test_self_extension_terminates() {
        let mut cx = open("model R extends R; Real x; end R;");
        let r = class_named(&mut cx, "R");
        assert!(cx.base_classes(r).is_empty());
        assert_eq!(cx.components(r).len(), 1);
        assert!(!cx.cycles().is_empty());
    }

    #[test]
    fn test_mutual_extension_terminates() {
        let mut cx = open(
            r#"
model A extends B(x = 1); Real y; end A;
model B extends A(y = 2); Real x; end B;
"#,
        );
        let a = class_named(&mut cx, "A");
        let bases = cx.base_classes(a);
        assert_eq!(names(&cx, &bases), vec!["B"]);
        let components: Vec<String> = cx
            .components(a)
            .iter()
            .map(|k| cx.component(*k).identifier.clone())
            .collect();
        assert_eq!(components, vec!["y", "x"]);
    }

    #[test]
    fn test_instantiate_with_empty_environment_is_identity() {
        let mut cx = open("model A end A;");
        let a = class_named(&mut cx, "A");
        let count = cx.class_count();
        assert_eq!(
            cx.instantiate_class(a, ScopeId::Context, ModificationEnvironment::default()),
            a
        );
        assert_eq!(cx.class_count(), count);
    }

    #[test]
    fn test_passes_are_memoized() {
        let mut cx = open("model A extends B; Real x; end A; model B Real y; end B;");
        let a = class_named(&mut cx, "A");
        let first = cx.components(a);
        let count = cx.class_count();
        let second = cx.components(a);
        assert_eq!(first, second);
        assert_eq!(cx.base_classes(a), cx.base_classes(a));
        assert_eq!(cx.class_count(), count);
    }

    #[test]
    fn test_sections_and_connections_are_inherited() {
        let mut cx = open(
            r#"
connector Pin Real v; flow Real i; end Pin;
model Base
  Pin p, n;
equation
  connect(p, n) annotation(Line(points = {{0, 0}, {1, 1}}));
algorithm
end Base;
model Derived
  extends Base;
  Pin q;
equation
  connect(q, p);
end Derived;
"#,
        );
        let derived = class_named(&mut cx, "Derived");
        assert_eq!(cx.equation_sections(derived).len(), 2);
        assert_eq!(cx.algorithm_sections(derived).len(), 1);
        let connections = cx.connections(derived);
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].lhs.to_string(), "q");
        assert!(connections[1].annotation.is_some());
        assert_ne!(connections[0].owner, connections[1].owner);
    }

    #[test]
    fn test_class_redeclaration_replaces_nested_class() {
        let mut cx = open(
            r#"
model Other Real z; end Other;
model Base
  replaceable model M Real y; end M;
  M m;
end Base;
model Derived
  extends Base(redeclare model M = Other);
end Derived;
"#,
        );
        let derived = class_named(&mut cx, "Derived");
        let m = cx
            .get_named_element(derived, "m")
            .and_then(NamedElement::component)
            .expect("m not found");
        let ty = cx.component_class(m).expect("m has no type");
        let members: Vec<String> = cx
            .components(ty)
            .iter()
            .map(|k| cx.component(*k).identifier.clone())
            .collect();
        assert_eq!(members, vec!["z"]);
    }
}
