// Ancestry/trait-aware class compatibility queries.

use crate::domain::types::SemType;
use crate::ports::ClassProvider;

/// Answers "is this class compatible with that one" questions against the
/// class provider. Missing classes never match and never error.
pub struct ObjectTypeMatcher<'a> {
    provider: &'a dyn ClassProvider,
}

impl<'a> ObjectTypeMatcher<'a> {
    pub fn new(provider: &'a dyn ClassProvider) -> Self {
        ObjectTypeMatcher { provider }
    }

    /// Name equality, or `resolved` is a descendant/implementor of
    /// `required`.
    pub fn is_instance_of(&self, resolved: &str, required: &str) -> bool {
        if resolved == required {
            return true;
        }
        match self.provider.class(resolved) {
            Some(meta) => meta.ancestry.iter().any(|a| a == required),
            None => false,
        }
    }

    /// Walks the ancestor chain of `resolved` (the class itself included)
    /// and tests each ancestor's declared trait-use list.
    pub fn has_trait_use(&self, resolved: &str, required_trait: &str) -> bool {
        let Some(meta) = self.provider.class(resolved) else {
            return false;
        };
        if meta.trait_uses.iter().any(|t| t == required_trait) {
            return true;
        }
        meta.ancestry.iter().any(|ancestor| {
            self.provider
                .class(ancestor)
                .map(|a| a.trait_uses.iter().any(|t| t == required_trait))
                .unwrap_or(false)
        })
    }

    /// Classify a class with no stable declared name: the result carries
    /// the explicit parent types so later matching can still succeed.
    pub fn object_without_class(&self, parent_names: &[String]) -> SemType {
        SemType::ObjectWithoutClass(
            parent_names
                .iter()
                .map(|p| SemType::Object(p.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::ClassMetadata;
    use std::collections::HashMap;
    use std::rc::Rc;

    struct MapProvider {
        classes: HashMap<String, Rc<ClassMetadata>>,
    }

    impl MapProvider {
        fn new(classes: Vec<ClassMetadata>) -> Self {
            MapProvider {
                classes: classes
                    .into_iter()
                    .map(|c| (c.name.clone(), Rc::new(c)))
                    .collect(),
            }
        }
    }

    impl ClassProvider for MapProvider {
        fn class(&self, name: &str) -> Option<Rc<ClassMetadata>> {
            self.classes.get(name).cloned()
        }
    }

    #[test]
    fn test_is_instance_of_walks_ancestry() {
        let provider = MapProvider::new(vec![
            ClassMetadata::new("Child").with_ancestry(&["Base", "Countable"]),
            ClassMetadata::new("Base"),
        ]);
        let matcher = ObjectTypeMatcher::new(&provider);
        assert!(matcher.is_instance_of("Child", "Child"));
        assert!(matcher.is_instance_of("Child", "Base"));
        assert!(matcher.is_instance_of("Child", "Countable"));
        assert!(!matcher.is_instance_of("Base", "Child"));
        assert!(!matcher.is_instance_of("Missing", "Base"));
    }

    #[test]
    fn test_has_trait_use_checks_ancestors() {
        let mut base = ClassMetadata::new("Base");
        base.trait_uses = vec!["LoggerTrait".to_string()];
        let provider = MapProvider::new(vec![
            ClassMetadata::new("Child").with_ancestry(&["Base"]),
            base,
        ]);
        let matcher = ObjectTypeMatcher::new(&provider);
        assert!(matcher.has_trait_use("Base", "LoggerTrait"));
        assert!(matcher.has_trait_use("Child", "LoggerTrait"));
        assert!(!matcher.has_trait_use("Child", "OtherTrait"));
    }

    #[test]
    fn test_object_without_class_carries_parents() {
        let provider = MapProvider::new(vec![]);
        let matcher = ObjectTypeMatcher::new(&provider);
        let ty = matcher.object_without_class(&["P1".to_string(), "P2".to_string()]);
        assert_eq!(
            ty,
            SemType::ObjectWithoutClass(vec![
                SemType::Object("P1".into()),
                SemType::Object("P2".into()),
            ])
        );
    }
}
