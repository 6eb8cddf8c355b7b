pub mod node;
pub mod repr_visitor;
