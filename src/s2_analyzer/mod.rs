//! Semantic analysis: the lazily instantiated symbol graph.
//!
//! Everything is driven through a [`Context`](context::Context), which owns
//! the symbols and threads itself through resolution, instantiation and
//! constant evaluation.

pub mod context;
pub mod document;
pub mod eval;
pub mod library;
pub mod modification;
pub mod parse;
pub mod predefined;
pub mod scope;
pub mod storage;
pub mod symbols;
pub mod view;

pub use context::{Context, ContextOptions, CyclePolicy};
pub use scope::{NamedElement, Reference, Scope, ScopeId};
pub use storage::{FileSystemStorage, MemoryStorage, StorageBackend};
