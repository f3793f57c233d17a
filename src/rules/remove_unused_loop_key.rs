// Drops the key binding from a keyed loop when the body never reads it,
// and erases the doc-comment tag that described the dropped binding.

use anyhow::Result;

use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::rules::{should_not_happen, Rule, RuleCtx, RuleOutcome};

pub struct RemoveUnusedLoopKeyRule;

impl Rule for RemoveUnusedLoopKeyRule {
    fn name(&self) -> &'static str {
        "remove_unused_loop_key"
    }

    fn kinds(&self) -> &'static [Kind] {
        &[Kind::Foreach]
    }

    fn transform(&self, node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
        let (iterable, key, value, body) = match &node.kind {
            NodeKind::Foreach {
                iterable,
                key,
                value,
                body,
            } => (iterable, key, value, body),
            _ => anyhow::bail!(should_not_happen("remove_unused_loop_key on non-loop node")),
        };
        let key_name = match key.as_deref() {
            Some(Node {
                kind: NodeKind::Variable { name },
                ..
            }) => name.clone(),
            // Destructured or computed keys are out of scope.
            Some(_) | None => return Ok(RuleOutcome::NoChange),
        };
        let used = body
            .iter()
            .any(|stmt| stmt.any_node(&mut |n| n.is_variable_named(&key_name)));
        if used {
            return Ok(RuleOutcome::NoChange);
        }

        let mut replacement = Node::synthesized(NodeKind::Foreach {
            iterable: iterable.clone(),
            key: None,
            value: value.clone(),
            body: body.clone(),
        });
        replacement.meta = node.meta.clone();
        // Keeping the doc comment in sync is this rule's job: the tag that
        // described the removed binding goes with it.
        if let Some(doc) = replacement.meta.doc.as_mut() {
            doc.remove_binding_tag(&key_name);
        }
        Ok(RuleOutcome::Replace(replacement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::DocComment;
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

    struct NoProvider;
    impl ClassProvider for NoProvider {
        fn class(&self, _name: &str) -> Option<Rc<ClassMetadata>> {
            None
        }
    }

    fn var(name: &str) -> Node {
        Node::synthesized(NodeKind::Variable {
            name: name.to_string(),
        })
    }

    fn loop_over(key: Option<&str>, body_uses: &str) -> Node {
        Node::synthesized(NodeKind::Foreach {
            iterable: Box::new(var("items")),
            key: key.map(|k| Box::new(var(k))),
            value: Box::new(var("item")),
            body: vec![Node::synthesized(NodeKind::ExprStmt {
                expr: Box::new(var(body_uses)),
            })],
        })
    }

    fn run(node: &mut Node) -> RuleOutcome {
        let analyzer = NullAnalyzer;
        let provider = NoProvider;
        let renames = RenameTable::new();
        let resolver = TypeResolver::new(&analyzer, &provider, &renames);
        let ctx = RuleCtx {
            resolver: &resolver,
            renames: &renames,
            target_version: TargetVersion::LATEST,
        };
        RemoveUnusedLoopKeyRule.transform(node, &ctx).unwrap()
    }

    #[test]
    fn test_unused_key_is_dropped() {
        let mut node = loop_over(Some("idx"), "item");
        match run(&mut node) {
            RuleOutcome::Replace(replacement) => match replacement.kind {
                NodeKind::Foreach { key, .. } => assert!(key.is_none()),
                other => panic!("unexpected replacement {:?}", other),
            },
            other => panic!("expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn test_used_key_is_kept() {
        let mut node = loop_over(Some("idx"), "idx");
        assert!(matches!(run(&mut node), RuleOutcome::NoChange));
    }

    #[test]
    fn test_keyless_loop_is_untouched() {
        let mut node = loop_over(None, "item");
        assert!(matches!(run(&mut node), RuleOutcome::NoChange));
    }

    #[test]
    fn test_doc_tag_for_dropped_key_is_erased() {
        let mut node = loop_over(Some("idx"), "item");
        node.meta.doc = Some(DocComment::new(vec![
            "Walks every pending item.".to_string(),
            "@param idx position in the queue".to_string(),
            "@param item the queued entry".to_string(),
        ]));
        match run(&mut node) {
            RuleOutcome::Replace(replacement) => {
                let doc = replacement.meta.doc.unwrap();
                assert_eq!(doc.lines().len(), 2);
                assert!(doc.lines().iter().all(|l| !l.contains("idx")));
            }
            other => panic!("expected Replace, got {:?}", other),
        }
    }
}
