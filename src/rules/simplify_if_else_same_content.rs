// Collapses an if/else whose branches print identically into the branch
// statements themselves. The condition is dropped with the conditional.

use anyhow::Result;

use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::rules::{should_not_happen, Rule, RuleCtx, RuleOutcome};
use crate::infrastructure::printer::render_plain;

pub struct SimplifyIfElseSameContentRule;

impl SimplifyIfElseSameContentRule {
    fn branch_text(stmts: &[Node]) -> String {
        stmts
            .iter()
            .map(render_plain)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn branches_identical(then: &[Node], otherwise: Option<&Vec<Node>>) -> bool {
        match otherwise {
            Some(stmts) => {
                !then.is_empty() && Self::branch_text(then) == Self::branch_text(stmts)
            }
            None => false,
        }
    }
}

impl Rule for SimplifyIfElseSameContentRule {
    fn name(&self) -> &'static str {
        "simplify_if_else_same_content"
    }

    fn kinds(&self) -> &'static [Kind] {
        &[Kind::If]
    }

    fn transform(&self, node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
        let (then, otherwise) = match &node.kind {
            NodeKind::If {
                then, otherwise, ..
            } => (then, otherwise),
            _ => anyhow::bail!(should_not_happen(
                "simplify_if_else_same_content on non-if node"
            )),
        };
        if !Self::branches_identical(then, otherwise.as_ref()) {
            return Ok(RuleOutcome::NoChange);
        }
        // The guard established the else branch exists.
        otherwise
            .as_ref()
            .ok_or_else(|| should_not_happen("if guard passed without an else branch"))?;
        Ok(RuleOutcome::Statements(then.clone()))
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

    struct NoProvider;
    impl ClassProvider for NoProvider {
        fn class(&self, _name: &str) -> Option<Rc<ClassMetadata>> {
            None
        }
    }

    fn return_int(value: i64) -> Node {
        Node::synthesized(NodeKind::Return {
            value: Some(Box::new(Node::synthesized(NodeKind::IntLit { value }))),
        })
    }

    fn if_node(then: Vec<Node>, otherwise: Option<Vec<Node>>) -> Node {
        Node::synthesized(NodeKind::If {
            cond: Box::new(Node::synthesized(NodeKind::Variable {
                name: "flag".to_string(),
            })),
            then,
            otherwise,
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
        SimplifyIfElseSameContentRule
            .transform(node, &ctx)
            .unwrap()
    }

    #[test]
    fn test_identical_branches_collapse_to_statements() {
        let mut node = if_node(vec![return_int(1)], Some(vec![return_int(1)]));
        match run(&mut node) {
            RuleOutcome::Statements(stmts) => assert_eq!(stmts.len(), 1),
            other => panic!("expected Statements, got {:?}", other),
        }
    }

    #[test]
    fn test_differing_branches_are_kept() {
        let mut node = if_node(vec![return_int(1)], Some(vec![return_int(2)]));
        assert!(matches!(run(&mut node), RuleOutcome::NoChange));
    }

    #[test]
    fn test_missing_else_is_kept() {
        let mut node = if_node(vec![return_int(1)], None);
        assert!(matches!(run(&mut node), RuleOutcome::NoChange));
    }

    #[test]
    fn test_empty_branches_are_kept() {
        let mut node = if_node(vec![], Some(vec![]));
        assert!(matches!(run(&mut node), RuleOutcome::NoChange));
    }
}
