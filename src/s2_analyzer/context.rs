//! The root scope.
//!
//! A [`Context`] owns every symbol (arena storage), the builtin primitive
//! types, the open documents, the workspace library and the library search
//! path. It is also where every unresolved lookup ends up: documents in
//! opening order, then the workspace, then the libraries in search order,
//! then the predefined annotations package and finally the primitives.

use std::collections::HashMap;
use std::sync::Arc;

use ordermap::OrderMap;

use crate::s1_parser::ast;
use crate::s1_parser::{ModelicaParser, SourceParser};

use super::document::Document;
use super::library::Library;
use super::modification::ModificationEnvironment;
use super::predefined::MODELICA_ANNOTATIONS;
use super::scope::{NamedElement, Reference, ScopeId};
use super::storage::StorageBackend;
use super::symbols::{
    BuiltinType, ClassId, ClassKind, ClassRestriction, ClassSymbol, ComponentId, ComponentSymbol,
    CycleReport, DocumentId, ExtendsId, ExtendsSymbol, ImportId, ImportSymbol, LibraryId,
    InstantiationState, ObjectValue, Pass,
};
use super::symbols::class::SymbolKey;

/// Passes over instances of one declaration with the same arguments that may
/// run nested inside each other before the innermost is cut short.
const MAX_REPEATED_INSTANCES: usize = 4;

/// Same, whatever the arguments.
const MAX_NESTED_INSTANCES: usize = 64;

/// What to do when a lazy pass is requested while already running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Short-circuit, log a warning and keep a [`CycleReport`].
    #[default]
    Report,
    /// Short-circuit without any trace.
    Silent,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContextOptions {
    pub cycle_policy: CyclePolicy,
}

pub struct Context {
    options: ContextOptions,
    parser: Arc<dyn SourceParser>,
    pub(crate) classes: Vec<ClassSymbol>,
    pub(crate) components: Vec<ComponentSymbol>,
    pub(crate) extends: Vec<ExtendsSymbol>,
    pub(crate) imports: Vec<ImportSymbol>,
    builtins: Vec<ClassId>,
    array_classes: HashMap<(ClassId, Vec<Option<i64>>), ClassId>,
    pub(crate) documents: OrderMap<DocumentId, Document>,
    next_document: usize,
    pub(crate) libraries: Vec<Library>,
    workspace: Option<LibraryId>,
    search_path: Vec<LibraryId>,
    annotations: Option<Option<ClassId>>,
    /// Passes currently running, outermost first.
    active: Vec<Frame>,
    /// Component values computed while a cycle through a frame further up
    /// was cut short, with the index of that frame. They are discarded once
    /// it finishes.
    provisional: Vec<(usize, ComponentId)>,
    cycles: Vec<CycleReport>,
}

/// A pass running on one symbol.
#[derive(Clone, Debug)]
struct Frame {
    pass: Pass,
    symbol: usize,
    declaration: Option<usize>,
    arguments: Vec<ArgumentKey>,
    /// Index of the outermost frame that a short-circuit below this one hit.
    lowest: usize,
}

/// An environment argument, independent of which instance it was written in.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ArgumentKey {
    path: Vec<String>,
    syntax: usize,
    scope: ArgumentScope,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArgumentScope {
    Class(SymbolKey),
    Other(ScopeId),
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        let mut cx = Context {
            options,
            parser: Arc::new(ModelicaParser),
            classes: Vec::new(),
            components: Vec::new(),
            extends: Vec::new(),
            imports: Vec::new(),
            builtins: Vec::new(),
            array_classes: HashMap::new(),
            documents: OrderMap::new(),
            next_document: 0,
            libraries: Vec::new(),
            workspace: None,
            search_path: Vec::new(),
            annotations: None,
            active: Vec::new(),
            provisional: Vec::new(),
            cycles: Vec::new(),
        };
        for builtin in BuiltinType::ALL {
            let id = cx.alloc_class(ClassSymbol::builtin(builtin));
            cx.builtins.push(id);
        }
        cx
    }

    /// Replaces the parser used for documents and library files.
    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub(crate) fn parser(&self) -> Arc<dyn SourceParser> {
        self.parser.clone()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Arena
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn class(&self, id: ClassId) -> &ClassSymbol {
        &self.classes[id.0]
    }

    pub fn component(&self, id: ComponentId) -> &ComponentSymbol {
        &self.components[id.0]
    }

    pub fn extends_symbol(&self, id: ExtendsId) -> &ExtendsSymbol {
        &self.extends[id.0]
    }

    pub fn import_symbol(&self, id: ImportId) -> &ImportSymbol {
        &self.imports[id.0]
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> &mut ClassSymbol {
        &mut self.classes[id.0]
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> &mut ComponentSymbol {
        &mut self.components[id.0]
    }

    pub(crate) fn extends_mut(&mut self, id: ExtendsId) -> &mut ExtendsSymbol {
        &mut self.extends[id.0]
    }

    pub(crate) fn import_mut(&mut self, id: ImportId) -> &mut ImportSymbol {
        &mut self.imports[id.0]
    }

    pub(crate) fn alloc_class(&mut self, symbol: ClassSymbol) -> ClassId {
        self.classes.push(symbol);
        ClassId(self.classes.len() - 1)
    }

    pub(crate) fn alloc_component(&mut self, symbol: ComponentSymbol) -> ComponentId {
        self.components.push(symbol);
        ComponentId(self.components.len() - 1)
    }

    pub(crate) fn alloc_extends(&mut self, symbol: ExtendsSymbol) -> ExtendsId {
        self.extends.push(symbol);
        ExtendsId(self.extends.len() - 1)
    }

    pub(crate) fn alloc_import(&mut self, symbol: ImportSymbol) -> ImportId {
        self.imports.push(symbol);
        ImportId(self.imports.len() - 1)
    }

    /// Number of class symbols created so far.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn builtin(&self, builtin: BuiltinType) -> ClassId {
        self.builtins[builtin as usize]
    }

    /// Array class of `dtype` with the given dimensions; `None` is an
    /// unknown length. Classes without an environment are shared.
    pub fn array_class(&mut self, dtype: ClassId, shape: Vec<Option<i64>>) -> ClassId {
        let key = (dtype, shape);
        if let Some(id) = self.array_classes.get(&key) {
            return *id;
        }
        let dims: Vec<String> = key
            .1
            .iter()
            .map(|d| d.map_or_else(|| ":".to_string(), |n| n.to_string()))
            .collect();
        let identifier = format!("{}[{}]", self.class(dtype).identifier, dims.join(", "));
        let id = self.alloc_class(ClassSymbol::array(identifier, dtype, key.1.clone()));
        self.array_classes.insert(key, id);
        id
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Libraries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Appends a library to the search path.
    pub fn add_library(&mut self, storage: Box<dyn StorageBackend>) -> LibraryId {
        let id = LibraryId(self.libraries.len());
        self.libraries.push(Library::new(id, storage));
        self.search_path.push(id);
        id
    }

    /// Sets the workspace library, searched before the search path.
    pub fn set_workspace(&mut self, storage: Box<dyn StorageBackend>) -> LibraryId {
        let id = LibraryId(self.libraries.len());
        self.libraries.push(Library::new(id, storage));
        self.workspace = Some(id);
        id
    }

    pub fn library(&self, id: LibraryId) -> &Library {
        &self.libraries[id.0]
    }

    pub(crate) fn library_mut(&mut self, id: LibraryId) -> &mut Library {
        &mut self.libraries[id.0]
    }

    pub(crate) fn next_document_id(&mut self) -> DocumentId {
        let id = DocumentId(self.next_document);
        self.next_document += 1;
        id
    }

    /// The predefined annotations package, parsed on first use.
    pub fn annotations_class(&mut self) -> Option<ClassId> {
        if let Some(annotations) = self.annotations {
            return annotations;
        }
        let parsed = self.parser().parse(MODELICA_ANNOTATIONS, None);
        let annotations = match parsed {
            Ok(def) => def.classes.first().map(|class| {
                let symbol = ClassSymbol::declared(class.clone(), ScopeId::Context, None);
                self.alloc_class(symbol)
            }),
            Err(err) => {
                log::error!("predefined annotations do not parse: {err}");
                None
            }
        };
        self.annotations = Some(annotations);
        annotations
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Cycle guard
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Marks `pass` as running on `symbol`. Returns `false`, and cuts the
    /// request short, if it already runs on that symbol further up the
    /// stack, or if too many instances of the same `declaration` are nested
    /// inside their own pass.
    pub(crate) fn enter(
        &mut self,
        pass: Pass,
        symbol: usize,
        declaration: Option<usize>,
        environment: &ModificationEnvironment,
    ) -> bool {
        let arguments = self.argument_keys(environment);
        if let Some(blocking) = self.blocking_frame(pass, symbol, declaration, &arguments) {
            if let Some(top) = self.active.last_mut() {
                top.lowest = top.lowest.min(blocking);
            }
            return false;
        }
        let index = self.active.len();
        self.active.push(Frame {
            pass,
            symbol,
            declaration,
            arguments,
            lowest: index,
        });
        true
    }

    /// Pops the frame pushed by `enter`. Returns the index of the frame
    /// further up that the result still depends on, if a cycle through it
    /// was cut short while this pass ran.
    pub(crate) fn leave(&mut self, pass: Pass, symbol: usize) -> Option<usize> {
        let index = self
            .active
            .iter()
            .rposition(|frame| frame.pass == pass && frame.symbol == symbol)?;
        let frame = self.active.remove(index);
        if frame.lowest >= index {
            self.discard_provisional(index);
            return None;
        }
        if let Some(parent) = self.active.last_mut() {
            parent.lowest = parent.lowest.min(frame.lowest);
        }
        for (head, _) in &mut self.provisional {
            if *head >= index {
                *head = frame.lowest;
            }
        }
        Some(frame.lowest)
    }

    /// Keeps `component`'s value until frame `head` finishes.
    pub(crate) fn defer(&mut self, head: usize, component: ComponentId) {
        self.provisional.push((head, component));
    }

    /// Whoever reads a value kept by [`Context::defer`] depends on the same
    /// frame.
    pub(crate) fn read_memo(&mut self, component: ComponentId) {
        let head = self
            .provisional
            .iter()
            .filter(|(_, c)| *c == component)
            .map(|(head, _)| *head)
            .min();
        if let (Some(head), Some(top)) = (head, self.active.last_mut()) {
            top.lowest = top.lowest.min(head);
        }
    }

    fn discard_provisional(&mut self, index: usize) {
        let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.provisional)
            .into_iter()
            .partition(|(head, _)| *head >= index);
        self.provisional = kept;
        for (_, component) in stale {
            let symbol = self.component_mut(component);
            symbol.value = None;
            symbol.state = InstantiationState::NotStarted;
        }
    }

    fn blocking_frame(
        &self,
        pass: Pass,
        symbol: usize,
        declaration: Option<usize>,
        arguments: &[ArgumentKey],
    ) -> Option<usize> {
        if let Some(index) = self
            .active
            .iter()
            .position(|frame| frame.pass == pass && frame.symbol == symbol)
        {
            return Some(index);
        }
        let declaration = declaration?;
        let nested: Vec<usize> = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.pass == pass && frame.declaration == Some(declaration))
            .map(|(index, _)| index)
            .collect();
        let repeated: Vec<usize> = nested
            .iter()
            .copied()
            .filter(|index| self.active[*index].arguments == arguments)
            .collect();
        if repeated.len() >= MAX_REPEATED_INSTANCES {
            return repeated.first().copied();
        }
        if nested.len() >= MAX_NESTED_INSTANCES {
            return nested.first().copied();
        }
        None
    }

    fn argument_keys(&self, environment: &ModificationEnvironment) -> Vec<ArgumentKey> {
        environment
            .arguments()
            .iter()
            .map(|argument| ArgumentKey {
                path: argument.path.clone(),
                syntax: Arc::as_ptr(&argument.syntax) as usize,
                scope: match argument.scope {
                    ScopeId::Class(class) => ArgumentScope::Class(self.symbol_key(class)),
                    other => ArgumentScope::Other(other),
                },
            })
            .collect()
    }

    pub(crate) fn report_cycle(&mut self, pass: Pass, name: String) {
        if self.options.cycle_policy == CyclePolicy::Silent {
            return;
        }
        let report = CycleReport { pass, name };
        if !self.cycles.contains(&report) {
            log::warn!("{report}, continuing with partial results");
            self.cycles.push(report);
        }
    }

    /// Reentrant requests that were short-circuited so far.
    pub fn cycles(&self) -> &[CycleReport] {
        &self.cycles
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Resolution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Resolves `reference` starting at `scope`. Subscripts are evaluated in
    /// `scope` and turn a class into an array class; subscripts on anything
    /// else do not resolve.
    pub fn resolve(
        &mut self,
        scope: ScopeId,
        reference: &Reference,
        global: bool,
    ) -> Option<NamedElement> {
        let global = global || reference.global;
        let element = self.lookup(scope, &reference.identifiers, global)?;
        if reference.subscripts.is_empty() {
            return Some(element);
        }
        let class = element.class()?;
        let shape = self.evaluate_shape(scope, &reference.subscripts);
        Some(NamedElement::Class(self.array_class(class, shape)))
    }

    /// Array dimensions; `:` and non-constant sizes are unknown.
    pub(crate) fn evaluate_shape(&mut self, scope: ScopeId, subscripts: &[ast::Subscript]) -> Vec<Option<i64>> {
        subscripts
            .iter()
            .map(|sub| match sub {
                ast::Subscript::Colon => None,
                ast::Subscript::Expression(expr) => match self.evaluate(scope, expr)?.value {
                    ObjectValue::Integer(n) => Some(n),
                    _ => None,
                },
            })
            .collect()
    }

    /// Resolves a call target to a `function` or `record` class.
    pub fn resolve_function(
        &mut self,
        scope: ScopeId,
        reference: &ast::ComponentReference,
        global: bool,
    ) -> Option<ClassId> {
        let global = global || reference.global;
        let class = self
            .lookup(scope, &reference.identifiers(), global)?
            .class()?;
        match self.class(class).restriction {
            Some(ClassRestriction::Function | ClassRestriction::Record) => Some(class),
            _ => None,
        }
    }

    pub(crate) fn lookup(
        &mut self,
        scope: ScopeId,
        identifiers: &[String],
        global: bool,
    ) -> Option<NamedElement> {
        let first = identifiers.first()?;
        match scope {
            ScopeId::Class(class) => {
                if !global {
                    if let Some(found) = self.get_named_element(class, first) {
                        return self.walk(found, &identifiers[1..]);
                    }
                    if let Some(found) = self.import_lookup(class, first) {
                        return self.walk(found, &identifiers[1..]);
                    }
                }
                let parent = self.class(class).parent;
                self.lookup(parent, identifiers, global)
            }
            ScopeId::Document(document) => {
                if !global {
                    if let Some(found) = self.document_lookup(document, first) {
                        return self.walk(NamedElement::Class(found), &identifiers[1..]);
                    }
                }
                self.lookup(ScopeId::Context, identifiers, global)
            }
            ScopeId::Library(library) => {
                if !global {
                    if let Some(found) = self.library_lookup(library, first) {
                        return self.walk(NamedElement::Class(found), &identifiers[1..]);
                    }
                }
                self.lookup(ScopeId::Context, identifiers, global)
            }
            ScopeId::Context => self.context_lookup(identifiers),
        }
    }

    fn context_lookup(&mut self, identifiers: &[String]) -> Option<NamedElement> {
        let first = identifiers.first()?;
        let rest = &identifiers[1..];

        let documents: Vec<DocumentId> = self.documents.keys().copied().collect();
        for document in documents {
            if let Some(found) = self.document_lookup(document, first) {
                return self.walk(NamedElement::Class(found), rest);
            }
        }

        let libraries: Vec<LibraryId> = self.workspace.iter().chain(&self.search_path).copied().collect();
        for library in libraries {
            if let Some(found) = self.library_lookup(library, first) {
                return self.walk(NamedElement::Class(found), rest);
            }
        }

        if let Some(annotations) = self.annotations_class() {
            if let Some(found) = self.get_named_element(annotations, first) {
                return self.walk(found, rest);
            }
        }

        let builtin = BuiltinType::from_name(first)?;
        self.walk(NamedElement::Class(self.builtin(builtin)), rest)
    }

    /// Member `identifier` of a class, or of a component's type.
    pub(crate) fn member(&mut self, element: NamedElement, identifier: &str) -> Option<NamedElement> {
        let class = match element {
            NamedElement::Class(class) => class,
            NamedElement::Component(component) => self.component_class(component)?,
        };
        self.get_named_element(class, identifier)
    }

    pub(crate) fn walk(&mut self, mut element: NamedElement, rest: &[String]) -> Option<NamedElement> {
        for identifier in rest {
            element = self.member(element, identifier)?;
        }
        Some(element)
    }

    /// Dotted name of a class for messages, e.g. `P.M`.
    pub fn qualified_name(&self, class: ClassId) -> String {
        let mut parts = vec![self.class(class).identifier.clone()];
        let mut scope = self.class(class).parent;
        while let ScopeId::Class(parent) = scope {
            let symbol = self.class(parent);
            if matches!(symbol.kind, ClassKind::Annotation { .. }) {
                break;
            }
            parts.push(symbol.identifier.clone());
            scope = symbol.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve_last() {
        let mut cx = Context::new();
        let real = cx
            .resolve(ScopeId::Context, &Reference::parse("Real"), false)
            .and_then(NamedElement::class)
            .expect("Real not found");
        assert_eq!(real, cx.builtin(BuiltinType::Real));
        assert_eq!(cx.class(real).identifier, "Real");
        assert!(cx
            .resolve(ScopeId::Context, &Reference::parse("Missing"), false)
            .is_none());
    }

    #[test]
    fn test_array_classes_are_interned() {
        let mut cx = Context::new();
        let real = cx.builtin(BuiltinType::Real);
        let a = cx.array_class(real, vec![Some(3)]);
        let b = cx.array_class(real, vec![Some(3)]);
        let c = cx.array_class(real, vec![None]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_annotations_package_resolves() {
        let mut cx = Context::new();
        let icon = cx
            .resolve(ScopeId::Context, &Reference::parse("Icon"), true)
            .and_then(NamedElement::class)
            .expect("Icon not found");
        assert_eq!(cx.class(icon).restriction, Some(ClassRestriction::Record));
        assert!(cx
            .resolve(ScopeId::Context, &Reference::parse("LinePattern.Dash"), true)
            .and_then(NamedElement::component)
            .is_some());
    }
}
