// Rule contract, registry, and the depth-first dispatch pass.

use anyhow::{bail, Result};
use std::fmt;

use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::resolver::TypeResolver;
use crate::domain::scope::RenameTable;
use crate::domain::version::TargetVersion;

/// A structural precondition guaranteed by a node kind was violated.
/// Signals a bug in a rule or in dispatch; aborts the file, never caught
/// below the per-file boundary.
#[derive(Debug)]
pub struct ShouldNotHappen(pub String);

impl fmt::Display for ShouldNotHappen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "should not happen: {}", self.0)
    }
}

impl std::error::Error for ShouldNotHappen {}

pub fn should_not_happen(message: &str) -> anyhow::Error {
    anyhow::Error::new(ShouldNotHappen(message.to_string()))
}

/// What a rule did with a visited node. "Does not apply" is `NoChange`,
/// never an error.
#[derive(Debug)]
pub enum RuleOutcome {
    NoChange,
    Replace(Node),
    /// Delete the node from its parent's statement sequence.
    Remove,
    /// Splice a list into the parent's statement sequence in place of the
    /// single node. Only valid in statement position.
    Statements(Vec<Node>),
}

/// Context handed to every transform call.
pub struct RuleCtx<'a> {
    pub resolver: &'a TypeResolver<'a>,
    pub renames: &'a RenameTable,
    pub target_version: TargetVersion,
}

/// A unit of transformation logic bound to a closed set of node kinds.
/// Configuration is validated at construction, never inside `transform`.
pub trait Rule {
    fn name(&self) -> &'static str;
    fn kinds(&self) -> &'static [Kind];
    fn min_version(&self) -> Option<u32> {
        None
    }
    fn transform(&self, node: &mut Node, ctx: &RuleCtx) -> Result<RuleOutcome>;
}

/// Ordered rule set for one run. Registration order is dispatch order;
/// rules gated out by the target version are dropped here, not re-checked
/// per node.
pub struct RuleRegistry {
    target_version: TargetVersion,
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new(target_version: TargetVersion) -> Self {
        RuleRegistry {
            target_version,
            rules: Vec::new(),
        }
    }

    /// Returns false if the rule was dropped by the version gate.
    pub fn register(&mut self, rule: Box<dyn Rule>) -> bool {
        if !self.target_version.satisfies(rule.min_version()) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn target_version(&self) -> TargetVersion {
        self.target_version
    }
}

enum Applied {
    Kept(bool),
    Removed,
    Spliced(Vec<Node>),
}

/// One depth-first rewrite pass over a file tree.
pub struct RuleDispatcher<'a> {
    registry: &'a RuleRegistry,
    ctx: RuleCtx<'a>,
}

impl<'a> RuleDispatcher<'a> {
    pub fn new(registry: &'a RuleRegistry, ctx: RuleCtx<'a>) -> Self {
        RuleDispatcher { registry, ctx }
    }

    /// Rewrites the file root in place. Returns true if anything changed.
    pub fn rewrite(&self, root: &mut Node) -> Result<bool> {
        self.descend(root)
    }

    /// Returns (anything changed, statement list itself changed). The
    /// second flag drives container dirtying: a replaced statement keeps
    /// its slot and span, but a removal or splice invalidates the text
    /// between neighbors, so the container must re-render.
    fn rewrite_stmts(&self, stmts: &mut Vec<Node>) -> Result<(bool, bool)> {
        let mut changed = false;
        let mut structural = false;
        let mut i = 0;
        while i < stmts.len() {
            match self.apply_rules(&mut stmts[i], true)? {
                Applied::Kept(touched) => {
                    changed |= touched;
                    changed |= self.descend(&mut stmts[i])?;
                    i += 1;
                }
                Applied::Removed => {
                    stmts.remove(i);
                    changed = true;
                    structural = true;
                }
                Applied::Spliced(list) => {
                    let count = list.len();
                    stmts.splice(i..=i, list);
                    // Spliced statements are descended into, but not
                    // re-offered to rules at this level.
                    for spliced in stmts.iter_mut().skip(i).take(count) {
                        self.descend(spliced)?;
                    }
                    i += count;
                    changed = true;
                    structural = true;
                }
            }
        }
        Ok((changed, structural))
    }

    /// Offer a node to every matching rule in registration order. A
    /// replacement is re-offered to the remaining rules before descent.
    fn apply_rules(&self, node: &mut Node, stmt_position: bool) -> Result<Applied> {
        let mut changed = false;
        for rule in self.registry.rules() {
            if !rule.kinds().contains(&node.kind_tag()) {
                continue;
            }
            match rule.transform(node, &self.ctx)? {
                RuleOutcome::NoChange => {}
                RuleOutcome::Replace(mut replacement) => {
                    // The replacement inherits the slot's byte range so the
                    // printer can splice the re-render in place.
                    replacement.span = node.span;
                    replacement.dirty = true;
                    *node = replacement;
                    changed = true;
                }
                RuleOutcome::Remove => {
                    if !stmt_position {
                        bail!(should_not_happen(&format!(
                            "rule {} returned Remove outside statement position",
                            rule.name()
                        )));
                    }
                    return Ok(Applied::Removed);
                }
                RuleOutcome::Statements(list) => {
                    if !stmt_position {
                        bail!(should_not_happen(&format!(
                            "rule {} returned Statements outside statement position",
                            rule.name()
                        )));
                    }
                    return Ok(Applied::Spliced(list));
                }
            }
        }
        Ok(Applied::Kept(changed))
    }

    fn apply_expr(&self, node: &mut Node) -> Result<bool> {
        let changed = match self.apply_rules(node, false)? {
            Applied::Kept(touched) => touched,
            // Unreachable: apply_rules rejects these outside stmt position.
            Applied::Removed | Applied::Spliced(_) => true,
        };
        Ok(changed | self.descend(node)?)
    }

    fn descend(&self, node: &mut Node) -> Result<bool> {
        let mut changed = false;
        let mut structural = false;
        match &mut node.kind {
            NodeKind::Variable { .. }
            | NodeKind::StrLit { .. }
            | NodeKind::IntLit { .. }
            | NodeKind::FloatLit { .. }
            | NodeKind::BoolLit { .. }
            | NodeKind::NullLit
            | NodeKind::TypeName { .. }
            | NodeKind::ClassConstFetch { .. }
            | NodeKind::Raw { .. } => {}
            NodeKind::MethodCall { recv, args, .. } => {
                changed |= self.apply_expr(recv)?;
                for arg in args {
                    changed |= self.apply_expr(arg)?;
                }
            }
            NodeKind::StaticCall { args, .. } | NodeKind::FuncCall { args, .. } => {
                for arg in args {
                    changed |= self.apply_expr(arg)?;
                }
            }
            NodeKind::PropertyFetch { recv, .. } => {
                changed |= self.apply_expr(recv)?;
            }
            NodeKind::New { args, .. } => {
                for arg in args {
                    changed |= self.apply_expr(arg)?;
                }
            }
            NodeKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                changed |= self.apply_expr(cond)?;
                if let Some(t) = then {
                    changed |= self.apply_expr(t)?;
                }
                changed |= self.apply_expr(otherwise)?;
            }
            NodeKind::Coalesce { left, right } => {
                changed |= self.apply_expr(left)?;
                changed |= self.apply_expr(right)?;
            }
            NodeKind::ArrayIndex { recv, index } => {
                changed |= self.apply_expr(recv)?;
                changed |= self.apply_expr(index)?;
            }
            NodeKind::NullableType { inner } => {
                changed |= self.apply_expr(inner)?;
            }
            NodeKind::UnionTypeNode { members } => {
                for member in members {
                    changed |= self.apply_expr(member)?;
                }
            }
            NodeKind::Assign { target, value } => {
                changed |= self.apply_expr(target)?;
                changed |= self.apply_expr(value)?;
            }
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                changed |= self.apply_expr(cond)?;
                let (touched, edited) = self.rewrite_stmts(then)?;
                changed |= touched;
                structural |= edited;
                if let Some(stmts) = otherwise {
                    let (touched, edited) = self.rewrite_stmts(stmts)?;
                    changed |= touched;
                    structural |= edited;
                }
            }
            NodeKind::Foreach {
                iterable,
                key,
                value,
                body,
            } => {
                changed |= self.apply_expr(iterable)?;
                if let Some(k) = key {
                    changed |= self.apply_expr(k)?;
                }
                changed |= self.apply_expr(value)?;
                let (touched, edited) = self.rewrite_stmts(body)?;
                changed |= touched;
                structural |= edited;
            }
            NodeKind::Return { value } => {
                if let Some(v) = value {
                    changed |= self.apply_expr(v)?;
                }
            }
            NodeKind::ExprStmt { expr } => {
                changed |= self.apply_expr(expr)?;
            }
            NodeKind::Block { stmts }
            | NodeKind::FunctionDecl { body: stmts, .. }
            | NodeKind::ClassDecl { body: stmts, .. } => {
                let (touched, edited) = self.rewrite_stmts(stmts)?;
                changed |= touched;
                structural |= edited;
            }
        }
        if structural {
            // Statement-structure edits require the container to re-render.
            node.mark_dirty();
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Span;
    use crate::domain::scope::Scope;
    use crate::domain::types::SemType;
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
        fn class(&self, _name: &str) -> Option<Rc<crate::domain::scope::ClassMetadata>> {
            None
        }
    }

    /// Renames every variable `old` to `new`.
    struct RenameVarRule {
        old: &'static str,
        new: &'static str,
    }

    impl Rule for RenameVarRule {
        fn name(&self) -> &'static str {
            "rename_var"
        }
        fn kinds(&self) -> &'static [Kind] {
            &[Kind::Variable]
        }
        fn transform(&self, node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
            if node.is_variable_named(self.old) {
                return Ok(RuleOutcome::Replace(Node::synthesized(
                    NodeKind::Variable {
                        name: self.new.to_string(),
                    },
                )));
            }
            Ok(RuleOutcome::NoChange)
        }
    }

    /// Removes `return;` statements with no value.
    struct DropBareReturnRule;

    impl Rule for DropBareReturnRule {
        fn name(&self) -> &'static str {
            "drop_bare_return"
        }
        fn kinds(&self) -> &'static [Kind] {
            &[Kind::Return]
        }
        fn transform(&self, node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
            match &node.kind {
                NodeKind::Return { value: None } => Ok(RuleOutcome::Remove),
                _ => Ok(RuleOutcome::NoChange),
            }
        }
    }

    struct GatedRule;
    impl Rule for GatedRule {
        fn name(&self) -> &'static str {
            "gated"
        }
        fn kinds(&self) -> &'static [Kind] {
            &[Kind::Variable]
        }
        fn min_version(&self) -> Option<u32> {
            Some(90000)
        }
        fn transform(&self, _node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
            Ok(RuleOutcome::NoChange)
        }
    }

    fn var(name: &str) -> Node {
        Node::with_span(
            NodeKind::Variable {
                name: name.to_string(),
            },
            Span::new(0, name.len()),
        )
    }

    fn stmt(expr: Node) -> Node {
        Node::synthesized(NodeKind::ExprStmt {
            expr: Box::new(expr),
        })
    }

    fn file(stmts: Vec<Node>) -> Node {
        Node::with_span(NodeKind::Block { stmts }, Span::new(0, 0))
    }

    fn run_dispatch(registry: &RuleRegistry, root: &mut Node) -> bool {
        let analyzer = NullAnalyzer;
        let provider = NoProvider;
        let renames = RenameTable::new();
        let resolver = TypeResolver::new(&analyzer, &provider, &renames);
        let dispatcher = RuleDispatcher::new(
            registry,
            RuleCtx {
                resolver: &resolver,
                renames: &renames,
                target_version: TargetVersion::LATEST,
            },
        );
        dispatcher.rewrite(root).expect("dispatch failed")
    }

    #[test]
    fn test_replace_is_offered_to_remaining_rules() {
        let mut registry = RuleRegistry::new(TargetVersion::LATEST);
        registry.register(Box::new(RenameVarRule { old: "a", new: "b" }));
        registry.register(Box::new(RenameVarRule { old: "b", new: "c" }));

        let mut root = file(vec![stmt(var("a"))]);
        assert!(run_dispatch(&registry, &mut root));
        // First rule renames a -> b, the remaining rule sees b -> c.
        assert!(root.any_node(&mut |n| n.is_variable_named("c")));
        assert!(!root.any_node(&mut |n| n.is_variable_named("b")));
    }

    #[test]
    fn test_earlier_rules_are_not_re_offered() {
        let mut registry = RuleRegistry::new(TargetVersion::LATEST);
        registry.register(Box::new(RenameVarRule { old: "b", new: "c" }));
        registry.register(Box::new(RenameVarRule { old: "a", new: "b" }));

        let mut root = file(vec![stmt(var("a"))]);
        assert!(run_dispatch(&registry, &mut root));
        // The b -> c rule ran before a -> b produced the b; it must not
        // run again for the same visit.
        assert!(root.any_node(&mut |n| n.is_variable_named("b")));
    }

    #[test]
    fn test_remove_deletes_statement_and_dirties_container() {
        let mut registry = RuleRegistry::new(TargetVersion::LATEST);
        registry.register(Box::new(DropBareReturnRule));

        let mut root = file(vec![
            stmt(var("x")),
            Node::with_span(NodeKind::Return { value: None }, Span::new(0, 7)),
            stmt(var("y")),
        ]);
        assert!(run_dispatch(&registry, &mut root));
        match &root.kind {
            NodeKind::Block { stmts } => assert_eq!(stmts.len(), 2),
            other => panic!("unexpected root {:?}", other),
        }
        assert!(root.dirty);
    }

    #[test]
    fn test_remove_in_expression_position_is_invariant_violation() {
        struct RemoveVarRule;
        impl Rule for RemoveVarRule {
            fn name(&self) -> &'static str {
                "remove_var"
            }
            fn kinds(&self) -> &'static [Kind] {
                &[Kind::Variable]
            }
            fn transform(&self, _node: &mut Node, _ctx: &RuleCtx) -> Result<RuleOutcome> {
                Ok(RuleOutcome::Remove)
            }
        }

        let mut registry = RuleRegistry::new(TargetVersion::LATEST);
        registry.register(Box::new(RemoveVarRule));

        let analyzer = NullAnalyzer;
        let provider = NoProvider;
        let renames = RenameTable::new();
        let resolver = TypeResolver::new(&analyzer, &provider, &renames);
        let dispatcher = RuleDispatcher::new(
            &registry,
            RuleCtx {
                resolver: &resolver,
                renames: &renames,
                target_version: TargetVersion::LATEST,
            },
        );

        // The variable sits in expression position inside the statement.
        let mut root = file(vec![stmt(var("x"))]);
        let err = dispatcher.rewrite(&mut root).unwrap_err();
        assert!(err.downcast_ref::<ShouldNotHappen>().is_some());
    }

    #[test]
    fn test_version_gate_drops_rule_at_registration() {
        let mut registry = RuleRegistry::new(TargetVersion(80100));
        assert!(!registry.register(Box::new(GatedRule)));
        assert!(registry.register(Box::new(RenameVarRule { old: "a", new: "b" })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dispatch_is_deterministic() {
        let build = || {
            let mut registry = RuleRegistry::new(TargetVersion::LATEST);
            registry.register(Box::new(RenameVarRule { old: "a", new: "b" }));
            registry.register(Box::new(DropBareReturnRule));
            registry
        };
        let input = || {
            file(vec![
                stmt(var("a")),
                Node::with_span(NodeKind::Return { value: None }, Span::new(0, 7)),
                stmt(var("z")),
            ])
        };

        let mut first = input();
        let mut second = input();
        run_dispatch(&build(), &mut first);
        run_dispatch(&build(), &mut second);
        assert_eq!(format!("{:?}", first.kind), format!("{:?}", second.kind));
    }
}
