// Rewrites zero-argument method calls into property fetches, driven by
// ordered (class, method) -> property mappings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::rules::{should_not_happen, Rule, RuleCtx, RuleOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodToPropertyMapping {
    pub class: String,
    pub method: String,
    pub property: String,
}

pub struct MethodCallToPropertyRule {
    mappings: Vec<MethodToPropertyMapping>,
}

impl MethodCallToPropertyRule {
    pub fn new(mappings: Vec<MethodToPropertyMapping>) -> Result<Self> {
        if mappings.is_empty() {
            bail!("method_call_to_property requires at least one mapping");
        }
        for mapping in &mappings {
            if mapping.class.is_empty() || mapping.method.is_empty() || mapping.property.is_empty()
            {
                bail!(
                    "method_call_to_property mapping has an empty field: {:?}",
                    mapping
                );
            }
        }
        Ok(MethodCallToPropertyRule { mappings })
    }
}

impl Rule for MethodCallToPropertyRule {
    fn name(&self) -> &'static str {
        "method_call_to_property"
    }

    fn kinds(&self) -> &'static [Kind] {
        &[Kind::MethodCall]
    }

    fn transform(&self, node: &mut Node, ctx: &RuleCtx) -> Result<RuleOutcome> {
        let (recv, name, args) = match &node.kind {
            NodeKind::MethodCall {
                recv, name, args, ..
            } => (recv, name, args),
            _ => bail!(should_not_happen("method_call_to_property on non-call node")),
        };
        if !args.is_empty() {
            return Ok(RuleOutcome::NoChange);
        }
        // First mapping that matches name and receiver type wins.
        for mapping in &self.mappings {
            if mapping.method != *name {
                continue;
            }
            if !ctx.resolver.is_object_type(recv, &mapping.class) {
                continue;
            }
            let mut fetch = Node::synthesized(NodeKind::PropertyFetch {
                recv: recv.clone(),
                name: mapping.property.clone(),
            });
            fetch.meta = node.meta.clone();
            return Ok(RuleOutcome::Replace(fetch));
        }
        Ok(RuleOutcome::NoChange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resolver::TypeResolver;
    use crate::domain::scope::{ClassMetadata, RenameTable, Scope};
    use crate::domain::types::SemType;
    use crate::domain::version::TargetVersion;
    use crate::ports::{ClassProvider, TypeAnalyzer};
    use std::rc::Rc;

    struct NullAnalyzer;
    impl TypeAnalyzer for NullAnalyzer {
        fn type_of(&self, _node: &Node, _scope: &Scope) -> SemType {
            SemType::Mixed
        }
        fn native_type_of(&self, _node: &Node, _scope: &Scope) -> SemType {
            SemType::Mixed
        }
    }

    struct OneClassProvider;
    impl ClassProvider for OneClassProvider {
        fn class(&self, name: &str) -> Option<Rc<ClassMetadata>> {
            if name == "App::User" {
                Some(Rc::new(ClassMetadata::new("App::User")))
            } else {
                None
            }
        }
    }

    fn call_on(var_name: &str, method: &str, var_type: SemType) -> Node {
        let mut scope = Scope::default();
        scope.locals.insert(var_name.to_string(), var_type);
        let scope = Rc::new(scope);
        let mut recv = Node::synthesized(NodeKind::Variable {
            name: var_name.to_string(),
        });
        recv.meta.scope = Some(scope.clone());
        let mut call = Node::synthesized(NodeKind::MethodCall {
            recv: Box::new(recv),
            name: method.to_string(),
            args: vec![],
            nullsafe: false,
        });
        call.meta.scope = Some(scope);
        call
    }

    fn rule() -> MethodCallToPropertyRule {
        MethodCallToPropertyRule::new(vec![MethodToPropertyMapping {
            class: "App::User".to_string(),
            method: "name".to_string(),
            property: "name".to_string(),
        }])
        .unwrap()
    }

    #[test]
    fn test_call_on_mapped_receiver_becomes_property_fetch() {
        let analyzer = NullAnalyzer;
        let provider = OneClassProvider;
        let renames = RenameTable::new();
        let resolver = TypeResolver::new(&analyzer, &provider, &renames);
        let ctx = RuleCtx {
            resolver: &resolver,
            renames: &renames,
            target_version: TargetVersion::LATEST,
        };

        let mut call = call_on("user", "name", SemType::Object("App::User".to_string()));
        match rule().transform(&mut call, &ctx).unwrap() {
            RuleOutcome::Replace(node) => match node.kind {
                NodeKind::PropertyFetch { name, .. } => assert_eq!(name, "name"),
                other => panic!("unexpected replacement {:?}", other),
            },
            other => panic!("expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_receiver_is_left_alone() {
        let analyzer = NullAnalyzer;
        let provider = OneClassProvider;
        let renames = RenameTable::new();
        let resolver = TypeResolver::new(&analyzer, &provider, &renames);
        let ctx = RuleCtx {
            resolver: &resolver,
            renames: &renames,
            target_version: TargetVersion::LATEST,
        };

        let mut call = call_on("other", "name", SemType::Object("App::Order".to_string()));
        assert!(matches!(
            rule().transform(&mut call, &ctx).unwrap(),
            RuleOutcome::NoChange
        ));
    }

    #[test]
    fn test_empty_mapping_list_is_rejected() {
        assert!(MethodCallToPropertyRule::new(vec![]).is_err());
    }

    #[test]
    fn test_empty_field_is_rejected() {
        let result = MethodCallToPropertyRule::new(vec![MethodToPropertyMapping {
            class: "App::User".to_string(),
            method: String::new(),
            property: "name".to_string(),
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mapping_deserializes_from_config_payload() {
        let json = r#"{"class": "App::User", "method": "name", "property": "name"}"#;
        let mapping: MethodToPropertyMapping = serde_json::from_str(json).unwrap();
        assert_eq!(
            mapping,
            MethodToPropertyMapping {
                class: "App::User".to_string(),
                method: "name".to_string(),
                property: "name".to_string(),
            }
        );
    }
}
