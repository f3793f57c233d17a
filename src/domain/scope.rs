// Lexical scope, class capability facts, and the run-scoped rename table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::types::SemType;

/// Capability facts about a named class, supplied by the class provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMetadata {
    pub name: String,
    /// Transitive ancestors (parents, interfaces/implemented traits).
    pub ancestry: Vec<String>,
    /// Traits this class declares a use of (directly).
    pub trait_uses: Vec<String>,
    /// Declared parent types, kept for anonymous classes.
    pub parent_types: Vec<String>,
    pub is_trait: bool,
    pub is_enum: bool,
    pub is_builtin: bool,
    pub is_anonymous: bool,
}

impl ClassMetadata {
    pub fn new(name: &str) -> Self {
        ClassMetadata {
            name: name.to_string(),
            ..ClassMetadata::default()
        }
    }

    pub fn with_ancestry(mut self, ancestry: &[&str]) -> Self {
        self.ancestry = ancestry.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_trait_uses(mut self, traits: &[&str]) -> Self {
        self.trait_uses = traits.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Per-node lexical context. Owned by the analyzer, read-only here.
/// `locals` hold the narrowed types in effect at the node, `native_locals`
/// the declared (unrefined) ones.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub class: Option<Rc<ClassMetadata>>,
    pub locals: HashMap<String, SemType>,
    pub native_locals: HashMap<String, SemType>,
    /// Import aliases: short name -> fully-qualified name.
    pub aliases: HashMap<String, String>,
}

impl Scope {
    pub fn local(&self, name: &str) -> Option<&SemType> {
        self.locals.get(name)
    }

    pub fn native_local(&self, name: &str) -> Option<&SemType> {
        self.native_locals.get(name)
    }

    pub fn resolve_alias(&self, short: &str) -> Option<&str> {
        self.aliases.get(short).map(String::as_str)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class.as_ref().map(|c| c.name.as_str())
    }
}

/// Run-scoped record of class renames already applied by rules.
/// Rules record while the resolver reads within the same single-threaded
/// run, hence the interior mutability. Never shared across workers.
#[derive(Debug, Default)]
pub struct RenameTable {
    inner: RefCell<HashMap<String, String>>,
}

impl RenameTable {
    pub fn new() -> Self {
        RenameTable::default()
    }

    pub fn record(&self, old: &str, new: &str) {
        self.inner
            .borrow_mut()
            .insert(old.to_string(), new.to_string());
    }

    pub fn replacement_for(&self, class_name: &str) -> Option<String> {
        self.inner.borrow().get(class_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_table_records_and_reads() {
        let table = RenameTable::new();
        assert!(table.is_empty());
        table.record("legacy::Mailer", "mail::Sender");
        assert_eq!(
            table.replacement_for("legacy::Mailer").as_deref(),
            Some("mail::Sender")
        );
        assert_eq!(table.replacement_for("Other"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_scope_alias_resolution() {
        let mut scope = Scope::default();
        scope
            .aliases
            .insert("Mailer".to_string(), "app::service::Mailer".to_string());
        assert_eq!(scope.resolve_alias("Mailer"), Some("app::service::Mailer"));
        assert_eq!(scope.resolve_alias("Unknown"), None);
    }
}
