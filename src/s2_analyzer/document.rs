//! Open documents.
//!
//! A document is source text held by the host (an editor buffer or a file
//! given on the command line). Its top-level classes are searched before
//! any library. Editing a document throws away every symbol derived from
//! it; symbols created from the old text stay in the arena but are no
//! longer reachable from the document.

use std::sync::Arc;

use crate::s1_parser::ast::StoredDefinition;
use crate::s1_parser::ParseError;

use super::context::Context;
use super::scope::ScopeId;
use super::symbols::{ClassId, ClassSymbol, DocumentId};

#[derive(Debug)]
pub struct Document {
    pub uri: String,
    pub text: String,
    digest: md5::Digest,
    pub definition: Option<Arc<StoredDefinition>>,
    pub errors: Vec<ParseError>,
    classes: Option<Vec<ClassId>>,
}

impl Document {
    fn new(cx: &Context, uri: &str, text: &str, previous: Option<&StoredDefinition>) -> Self {
        let (definition, errors) = match cx.parser().parse(text, previous) {
            Ok(definition) => (Some(Arc::new(definition)), Vec::new()),
            Err(err) => {
                log::debug!("{uri}: {err}");
                (None, vec![err])
            }
        };
        Self {
            uri: uri.to_string(),
            text: text.to_string(),
            digest: md5::compute(text),
            definition,
            errors,
            classes: None,
        }
    }

    pub fn digest(&self) -> String {
        format!("{:x}", self.digest)
    }
}

impl Context {
    /// Opens `text` under `uri`, replacing the text of an already open
    /// document with the same uri.
    pub fn open_document(&mut self, uri: &str, text: &str) -> DocumentId {
        if let Some(id) = self.find_document(uri) {
            self.update_document(id, text);
            return id;
        }
        let id = self.next_document_id();
        let document = Document::new(self, uri, text, None);
        self.documents.insert(id, document);
        id
    }

    /// Replaces the text of a document. Returns `false` when the text is
    /// unchanged, in which case nothing is rebuilt.
    pub fn update_document(&mut self, id: DocumentId, text: &str) -> bool {
        let Some(document) = self.documents.get(&id) else {
            return false;
        };
        if document.digest == md5::compute(text) {
            return false;
        }
        let uri = document.uri.clone();
        let previous = document.definition.clone();
        let document = Document::new(self, &uri, text, previous.as_deref());
        log::debug!("{uri} changed, rebuilding");
        self.documents.insert(id, document);
        true
    }

    pub fn close_document(&mut self, id: DocumentId) -> Option<Document> {
        self.documents.remove(&id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn find_document(&self, uri: &str) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|(_, document)| document.uri == uri)
            .map(|(id, _)| *id)
    }

    /// Top-level classes of a document, instantiated on first use.
    pub fn document_classes(&mut self, id: DocumentId) -> Vec<ClassId> {
        let Some(document) = self.documents.get(&id) else {
            return Vec::new();
        };
        if let Some(classes) = &document.classes {
            return classes.clone();
        }
        let definitions = document
            .definition
            .as_ref()
            .map(|d| d.classes.clone())
            .unwrap_or_default();
        let classes: Vec<ClassId> = definitions
            .into_iter()
            .map(|def| self.alloc_class(ClassSymbol::declared(def, ScopeId::Document(id), None)))
            .collect();
        if let Some(document) = self.documents.get_mut(&id) {
            document.classes = Some(classes.clone());
        }
        classes
    }

    pub(crate) fn document_lookup(&mut self, id: DocumentId, identifier: &str) -> Option<ClassId> {
        self.document_classes(id)
            .into_iter()
            .find(|c| self.class(*c).identifier == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::{NamedElement, Reference};
    use crate::s2_analyzer::symbols::ObjectValue;

    fn value(cx: &mut Context, dotted: &str) -> Option<ObjectValue> {
        let component = cx
            .resolve(ScopeId::Context, &Reference::parse(dotted), false)
            .and_then(NamedElement::component)?;
        cx.component_value(component).map(|v| v.value)
    }

    #[test]
    fn test_update_rebuilds_only_on_change() {
        let mut cx = Context::new();
        let id = cx.open_document("a.mo", "model M Integer x = 1; end M;");
        assert_eq!(value(&mut cx, "M.x"), Some(ObjectValue::Integer(1)));
        let classes = cx.document_classes(id);

        assert!(!cx.update_document(id, "model M Integer x = 1; end M;"));
        assert_eq!(cx.document_classes(id), classes);

        assert!(cx.update_document(id, "model M Integer x = 2; end M;"));
        assert_ne!(cx.document_classes(id), classes);
        assert_eq!(value(&mut cx, "M.x"), Some(ObjectValue::Integer(2)));

        assert_eq!(cx.open_document("a.mo", "model M Integer x = 3; end M;"), id);
        assert_eq!(value(&mut cx, "M.x"), Some(ObjectValue::Integer(3)));
    }

    #[test]
    fn test_documents_shadow_in_opening_order() {
        let mut cx = Context::new();
        let first = cx.open_document("a.mo", "model M Integer x = 1; end M;");
        cx.open_document("b.mo", "model M Integer x = 2; end M; model N end N;");
        assert_eq!(value(&mut cx, "M.x"), Some(ObjectValue::Integer(1)));
        cx.close_document(first);
        assert_eq!(value(&mut cx, "M.x"), Some(ObjectValue::Integer(2)));
    }

    #[test]
    fn test_parse_errors_are_kept() {
        let mut cx = Context::new();
        let id = cx.open_document("bad.mo", "model M Real x end M;");
        let document = cx.document(id).expect("document not open");
        assert_eq!(document.errors.len(), 1);
        assert!(document.definition.is_none());
        assert!(cx.document_classes(id).is_empty());
    }
}
