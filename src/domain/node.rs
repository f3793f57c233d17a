// Tree node model for Recast.
// Nodes are produced by a front end (see infrastructure::parser), rewritten
// in place by rules, and reprinted by the span-splicing printer.

use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::scope::Scope;

/// Byte range into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Doc comment attached to a node, kept line by line so rules can edit
/// individual tags when they remove the code a tag describes.
#[derive(Debug, Clone, PartialEq)]
pub struct DocComment {
    lines: Vec<String>,
}

impl DocComment {
    pub fn new(lines: Vec<String>) -> Self {
        DocComment { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop tag lines (lines whose first word starts with `@`) that mention
    /// the given binding. Returns true if anything was removed.
    pub fn remove_binding_tag(&mut self, binding: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| {
            let trimmed = line.trim_start();
            if !trimmed.starts_with('@') {
                return true;
            }
            !trimmed
                .split_whitespace()
                .any(|word| word.trim_matches(|c| c == '$' || c == '`') == binding)
        });
        before != self.lines.len()
    }
}

/// Metadata attached to every node: the lexical scope supplied by the
/// analyzer, an optional doc comment, and free-form analysis attributes.
#[derive(Debug, Clone, Default)]
pub struct NodeMeta {
    pub scope: Option<Rc<Scope>>,
    pub doc: Option<DocComment>,
    pub attrs: HashMap<String, String>,
}

/// Fieldless kind tag mirroring `NodeKind`. Used as the key for resolver
/// and rule registries so dispatch stays a closed, exhaustive set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Variable,
    StrLit,
    IntLit,
    FloatLit,
    BoolLit,
    NullLit,
    MethodCall,
    StaticCall,
    FuncCall,
    PropertyFetch,
    ClassConstFetch,
    New,
    Ternary,
    Coalesce,
    ArrayIndex,
    NullableType,
    TypeName,
    UnionTypeNode,
    Assign,
    If,
    Foreach,
    Return,
    ExprStmt,
    Block,
    FunctionDecl,
    ClassDecl,
    Raw,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Variable {
        name: String,
    },
    StrLit {
        value: String,
    },
    IntLit {
        value: i64,
    },
    FloatLit {
        value: f64,
    },
    BoolLit {
        value: bool,
    },
    NullLit,
    MethodCall {
        recv: Box<Node>,
        name: String,
        args: Vec<Node>,
        nullsafe: bool,
    },
    StaticCall {
        class: String,
        name: String,
        args: Vec<Node>,
    },
    FuncCall {
        name: String,
        args: Vec<Node>,
    },
    PropertyFetch {
        recv: Box<Node>,
        name: String,
    },
    ClassConstFetch {
        class: String,
        constant: String,
    },
    New {
        class: Option<String>,
        parents: Vec<String>,
        args: Vec<Node>,
    },
    Ternary {
        cond: Box<Node>,
        then: Option<Box<Node>>,
        otherwise: Box<Node>,
    },
    Coalesce {
        left: Box<Node>,
        right: Box<Node>,
    },
    ArrayIndex {
        recv: Box<Node>,
        index: Box<Node>,
    },
    NullableType {
        inner: Box<Node>,
    },
    TypeName {
        name: String,
    },
    UnionTypeNode {
        members: Vec<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    If {
        cond: Box<Node>,
        then: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        iterable: Box<Node>,
        key: Option<Box<Node>>,
        value: Box<Node>,
        body: Vec<Node>,
    },
    Return {
        value: Option<Box<Node>>,
    },
    ExprStmt {
        expr: Box<Node>,
    },
    Block {
        stmts: Vec<Node>,
    },
    FunctionDecl {
        name: String,
        body: Vec<Node>,
    },
    ClassDecl {
        name: String,
        body: Vec<Node>,
    },
    /// Source fragment the front end did not lower. Printed back verbatim.
    Raw {
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Option<Span>,
    /// Set when a rule replaced or edited this node; the printer re-renders
    /// dirty regions instead of splicing the original text.
    pub dirty: bool,
    pub meta: NodeMeta,
}

impl Node {
    /// A node synthesized by a rule: no source span, marked dirty.
    pub fn synthesized(kind: NodeKind) -> Self {
        Node {
            kind,
            span: None,
            dirty: true,
            meta: NodeMeta::default(),
        }
    }

    pub fn with_span(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span: Some(span),
            dirty: false,
            meta: NodeMeta::default(),
        }
    }

    pub fn kind_tag(&self) -> Kind {
        match &self.kind {
            NodeKind::Variable { .. } => Kind::Variable,
            NodeKind::StrLit { .. } => Kind::StrLit,
            NodeKind::IntLit { .. } => Kind::IntLit,
            NodeKind::FloatLit { .. } => Kind::FloatLit,
            NodeKind::BoolLit { .. } => Kind::BoolLit,
            NodeKind::NullLit => Kind::NullLit,
            NodeKind::MethodCall { .. } => Kind::MethodCall,
            NodeKind::StaticCall { .. } => Kind::StaticCall,
            NodeKind::FuncCall { .. } => Kind::FuncCall,
            NodeKind::PropertyFetch { .. } => Kind::PropertyFetch,
            NodeKind::ClassConstFetch { .. } => Kind::ClassConstFetch,
            NodeKind::New { .. } => Kind::New,
            NodeKind::Ternary { .. } => Kind::Ternary,
            NodeKind::Coalesce { .. } => Kind::Coalesce,
            NodeKind::ArrayIndex { .. } => Kind::ArrayIndex,
            NodeKind::NullableType { .. } => Kind::NullableType,
            NodeKind::TypeName { .. } => Kind::TypeName,
            NodeKind::UnionTypeNode { .. } => Kind::UnionTypeNode,
            NodeKind::Assign { .. } => Kind::Assign,
            NodeKind::If { .. } => Kind::If,
            NodeKind::Foreach { .. } => Kind::Foreach,
            NodeKind::Return { .. } => Kind::Return,
            NodeKind::ExprStmt { .. } => Kind::ExprStmt,
            NodeKind::Block { .. } => Kind::Block,
            NodeKind::FunctionDecl { .. } => Kind::FunctionDecl,
            NodeKind::ClassDecl { .. } => Kind::ClassDecl,
            NodeKind::Raw { .. } => Kind::Raw,
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self.kind_tag(),
            Kind::If
                | Kind::Foreach
                | Kind::Return
                | Kind::ExprStmt
                | Kind::Block
                | Kind::FunctionDecl
                | Kind::ClassDecl
                | Kind::Assign
                | Kind::Raw
        )
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self.kind_tag(),
            Kind::Variable
                | Kind::StrLit
                | Kind::IntLit
                | Kind::FloatLit
                | Kind::BoolLit
                | Kind::NullLit
                | Kind::MethodCall
                | Kind::StaticCall
                | Kind::FuncCall
                | Kind::PropertyFetch
                | Kind::ClassConstFetch
                | Kind::New
                | Kind::Ternary
                | Kind::Coalesce
                | Kind::ArrayIndex
        )
    }

    pub fn is_variable_named(&self, expected: &str) -> bool {
        matches!(&self.kind, NodeKind::Variable { name } if name == expected)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn scope(&self) -> Option<&Rc<Scope>> {
        self.meta.scope.as_ref()
    }

    /// Immutable walk over direct children, in source order.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Node)) {
        match &self.kind {
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
                f(recv);
                args.iter().for_each(&mut *f);
            }
            NodeKind::StaticCall { args, .. } | NodeKind::FuncCall { args, .. } => {
                args.iter().for_each(&mut *f);
            }
            NodeKind::PropertyFetch { recv, .. } => f(recv),
            NodeKind::New { args, .. } => args.iter().for_each(&mut *f),
            NodeKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                f(cond);
                if let Some(t) = then {
                    f(t);
                }
                f(otherwise);
            }
            NodeKind::Coalesce { left, right } => {
                f(left);
                f(right);
            }
            NodeKind::ArrayIndex { recv, index } => {
                f(recv);
                f(index);
            }
            NodeKind::NullableType { inner } => f(inner),
            NodeKind::UnionTypeNode { members } => members.iter().for_each(&mut *f),
            NodeKind::Assign { target, value } => {
                f(target);
                f(value);
            }
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                f(cond);
                then.iter().for_each(&mut *f);
                if let Some(stmts) = otherwise {
                    stmts.iter().for_each(&mut *f);
                }
            }
            NodeKind::Foreach {
                iterable,
                key,
                value,
                body,
            } => {
                f(iterable);
                if let Some(k) = key {
                    f(k);
                }
                f(value);
                body.iter().for_each(&mut *f);
            }
            NodeKind::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            NodeKind::ExprStmt { expr } => f(expr),
            NodeKind::Block { stmts }
            | NodeKind::FunctionDecl { body: stmts, .. }
            | NodeKind::ClassDecl { body: stmts, .. } => stmts.iter().for_each(&mut *f),
        }
    }

    /// Mutable walk over direct children.
    pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        match &mut self.kind {
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
                f(recv);
                args.iter_mut().for_each(&mut *f);
            }
            NodeKind::StaticCall { args, .. } | NodeKind::FuncCall { args, .. } => {
                args.iter_mut().for_each(&mut *f);
            }
            NodeKind::PropertyFetch { recv, .. } => f(recv),
            NodeKind::New { args, .. } => args.iter_mut().for_each(&mut *f),
            NodeKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                f(cond);
                if let Some(t) = then {
                    f(t);
                }
                f(otherwise);
            }
            NodeKind::Coalesce { left, right } => {
                f(left);
                f(right);
            }
            NodeKind::ArrayIndex { recv, index } => {
                f(recv);
                f(index);
            }
            NodeKind::NullableType { inner } => f(inner),
            NodeKind::UnionTypeNode { members } => members.iter_mut().for_each(&mut *f),
            NodeKind::Assign { target, value } => {
                f(target);
                f(value);
            }
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                f(cond);
                then.iter_mut().for_each(&mut *f);
                if let Some(stmts) = otherwise {
                    stmts.iter_mut().for_each(&mut *f);
                }
            }
            NodeKind::Foreach {
                iterable,
                key,
                value,
                body,
            } => {
                f(iterable);
                if let Some(k) = key {
                    f(k);
                }
                f(value);
                body.iter_mut().for_each(&mut *f);
            }
            NodeKind::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            NodeKind::ExprStmt { expr } => f(expr),
            NodeKind::Block { stmts }
            | NodeKind::FunctionDecl { body: stmts, .. }
            | NodeKind::ClassDecl { body: stmts, .. } => stmts.iter_mut().for_each(&mut *f),
        }
    }

    /// True if this node or any descendant matches the predicate.
    pub fn any_node(&self, pred: &mut dyn FnMut(&Node) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found && child.any_node(pred) {
                found = true;
            }
        });
        found
    }

    /// True if this node or any descendant was touched by a rule.
    pub fn subtree_dirty(&self) -> bool {
        self.any_node(&mut |n| n.dirty || n.span.is_none())
    }
}
