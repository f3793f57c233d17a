// Rewrites class references old -> new and records each applied rename in
// the run's rename table so later type matching stays rename-aware.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::rules::{should_not_happen, Rule, RuleCtx, RuleOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassRename {
    pub old: String,
    pub new: String,
}

pub struct RenameClassRule {
    renames: HashMap<String, String>,
}

impl RenameClassRule {
    pub fn new(renames: Vec<ClassRename>) -> Result<Self> {
        if renames.is_empty() {
            bail!("rename_class requires at least one rename");
        }
        let mut map = HashMap::new();
        for rename in renames {
            if rename.old.is_empty() || rename.new.is_empty() {
                bail!("rename_class entry has an empty class name");
            }
            if rename.old == rename.new {
                bail!("rename_class entry maps {} to itself", rename.old);
            }
            map.insert(rename.old, rename.new);
        }
        Ok(RenameClassRule { renames: map })
    }

    fn replacement(&self, class: &str) -> Option<&str> {
        self.renames.get(class).map(String::as_str)
    }
}

impl Rule for RenameClassRule {
    fn name(&self) -> &'static str {
        "rename_class"
    }

    fn kinds(&self) -> &'static [Kind] {
        &[
            Kind::StaticCall,
            Kind::ClassConstFetch,
            Kind::New,
            Kind::TypeName,
        ]
    }

    fn transform(&self, node: &mut Node, ctx: &RuleCtx) -> Result<RuleOutcome> {
        let referenced = match &node.kind {
            NodeKind::StaticCall { class, .. }
            | NodeKind::ClassConstFetch { class, .. }
            | NodeKind::New {
                class: Some(class), ..
            } => class,
            NodeKind::TypeName { name } => name,
            NodeKind::New { class: None, .. } => return Ok(RuleOutcome::NoChange),
            _ => bail!(should_not_happen("rename_class on unsupported node kind")),
        };
        let new = match self.replacement(referenced) {
            Some(new) => new.to_string(),
            None => return Ok(RuleOutcome::NoChange),
        };

        ctx.renames.record(referenced, &new);
        let kind = match &node.kind {
            NodeKind::StaticCall { name, args, .. } => NodeKind::StaticCall {
                class: new,
                name: name.clone(),
                args: args.clone(),
            },
            NodeKind::ClassConstFetch { constant, .. } => NodeKind::ClassConstFetch {
                class: new,
                constant: constant.clone(),
            },
            NodeKind::New { parents, args, .. } => NodeKind::New {
                class: Some(new),
                parents: parents.clone(),
                args: args.clone(),
            },
            NodeKind::TypeName { .. } => NodeKind::TypeName { name: new },
            _ => unreachable!(),
        };
        let mut replacement = Node::synthesized(kind);
        replacement.meta = node.meta.clone();
        Ok(RuleOutcome::Replace(replacement))
    }
}
