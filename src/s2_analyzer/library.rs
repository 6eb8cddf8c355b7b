//! Libraries: lazily loaded source roots.
//!
//! A top-level identifier `X` is loaded from `X.mo`, or from `X/package.mo`
//! as a structured package whose children are further files and
//! directories under `X/`. Every lookup, hit or miss, is cached per
//! identifier so storage is read at most once for each.

use std::sync::Arc;

use ordermap::OrderMap;

use crate::s1_parser::ast;

use super::context::Context;
use super::modification::ModificationEnvironment;
use super::scope::ScopeId;
use super::storage::StorageBackend;
use super::symbols::{ClassId, ClassSymbol, ElementSymbol, LibraryId, StructuredSource};

pub struct Library {
    id: LibraryId,
    storage: Box<dyn StorageBackend>,
    cache: OrderMap<String, Option<ClassId>>,
}

impl Library {
    pub fn new(id: LibraryId, storage: Box<dyn StorageBackend>) -> Self {
        Self {
            id,
            storage,
            cache: OrderMap::new(),
        }
    }

    pub fn id(&self) -> LibraryId {
        self.id
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    /// Identifiers looked up so far, with the class found if any.
    pub fn cached(&self) -> impl Iterator<Item = (&str, Option<ClassId>)> {
        self.cache.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("id", &self.id)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Context {
    /// Top-level class `identifier` of `library`.
    pub(crate) fn library_lookup(&mut self, library: LibraryId, identifier: &str) -> Option<ClassId> {
        if let Some(cached) = self.library(library).cache.get(identifier) {
            return *cached;
        }
        let found = self
            .load_class(library, &[], identifier)
            .map(|(syntax, structured)| {
                self.alloc_class(ClassSymbol::declared(syntax, ScopeId::Library(library), structured))
            });
        self.library_mut(library)
            .cache
            .insert(identifier.to_string(), found);
        found
    }

    /// Reads and parses `<dir>/<name>.mo`, else `<dir>/<name>/package.mo`.
    fn load_class(
        &mut self,
        library: LibraryId,
        dir: &[String],
        name: &str,
    ) -> Option<(Arc<ast::ClassDefinition>, Option<StructuredSource>)> {
        let mut file = dir.to_vec();
        file.push(format!("{name}.mo"));
        if let Some(syntax) = self.parse_library_file(library, &file, name) {
            return Some((syntax, None));
        }

        let mut package = dir.to_vec();
        package.push(name.to_string());
        let mut file = package.clone();
        file.push("package.mo".to_string());
        let syntax = self.parse_library_file(library, &file, name)?;
        Some((
            syntax,
            Some(StructuredSource {
                library,
                path: package,
            }),
        ))
    }

    fn parse_library_file(
        &mut self,
        library: LibraryId,
        file: &[String],
        name: &str,
    ) -> Option<Arc<ast::ClassDefinition>> {
        let text = self.library(library).storage.read(file)?;
        log::debug!("loading `{name}` from {}", file.join("/"));
        match self.parser().parse(&text, None) {
            Ok(definition) => {
                let class = definition.class(name).cloned();
                if class.is_none() {
                    log::warn!("{} does not define `{name}`", file.join("/"));
                }
                class
            }
            Err(err) => {
                log::warn!("failed to parse {}: {err}", file.join("/"));
                None
            }
        }
    }

    /// Adds the classes stored under a structured package that its
    /// `package.mo` does not declare itself.
    pub(crate) fn load_structured_children(
        &mut self,
        class: ClassId,
        source: &StructuredSource,
        environment: &ModificationEnvironment,
        elements: &mut Vec<ElementSymbol>,
    ) {
        let declared: Vec<String> = elements
            .iter()
            .filter_map(|e| match e {
                ElementSymbol::Class(id) => Some(self.class(*id).identifier.clone()),
                ElementSymbol::Component(id) => Some(self.component(*id).identifier.clone()),
                _ => None,
            })
            .collect();
        let children = self.library(source.library).storage.list(&source.path);
        for child in children {
            if declared.contains(&child) {
                continue;
            }
            let Some((syntax, structured)) = self.load_class(source.library, &source.path, &child) else {
                continue;
            };
            let mut symbol = ClassSymbol::declared(syntax, ScopeId::Class(class), structured);
            symbol.environment = environment.descend(&child);
            elements.push(ElementSymbol::Class(self.alloc_class(symbol)));
        }
    }
}
