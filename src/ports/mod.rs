// Collaborator seams consumed by the engine. Infrastructure provides the
// concrete syn-based parser/printer/analyzer; tests substitute stubs.

use std::rc::Rc;

use anyhow::Result;

use crate::domain::node::Node;
use crate::domain::scope::{ClassMetadata, Scope};
use crate::domain::types::SemType;

/// Produces a per-file tree of kind-tagged nodes with stable byte-span
/// positions. The root is a `Block` covering the whole file.
pub trait SourceParser {
    fn parse(&self, path: &str, source: &str) -> Result<Node>;
}

/// Regenerates text from a partially mutated tree, splicing the original
/// source back in for untouched subtrees.
pub trait SourcePrinter {
    fn print(&self, source: &str, root: &Node) -> String;
}

/// Per-expression type facts, as supplied by the external analyzer:
/// an inferred (narrowed) type and a native (unrefined) one.
pub trait TypeAnalyzer {
    fn type_of(&self, node: &Node, scope: &Scope) -> SemType;
    fn native_type_of(&self, node: &Node, scope: &Scope) -> SemType;
}

/// Class lookup by name. A class that cannot be looked up is `None`;
/// callers treat that as "no match", never as an error.
pub trait ClassProvider {
    fn class(&self, name: &str) -> Option<Rc<ClassMetadata>>;
}
