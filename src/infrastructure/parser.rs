// syn-based front end. Lowers a practical subset of Rust source into the
// engine's node model, with byte spans from proc-macro2 span locations.
// Constructs outside the subset become Raw nodes and print back verbatim.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use anyhow::Result;
use syn::spanned::Spanned;

use crate::domain::node::{DocComment, Node, NodeKind, Span};
use crate::domain::scope::{ClassMetadata, Scope};
use crate::domain::types::SemType;
use crate::ports::SourceParser;

/// Parse failure with the source line syn reported. The per-file boundary
/// downcasts to this to fill the error's line field.
#[derive(Debug)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

pub struct SynParser;

impl SourceParser for SynParser {
    fn parse(&self, path: &str, source: &str) -> Result<Node> {
        let file = syn::parse_file(source).map_err(|e| {
            anyhow::Error::new(ParseError {
                line: e.span().start().line,
                message: format!("{}: {}", path, e),
            })
        })?;

        let lowering = Lowering {
            source,
            aliases: collect_aliases(&file.items),
        };
        let stmts = file
            .items
            .iter()
            .map(|item| lowering.lower_item(item, None))
            .collect();
        Ok(Node::with_span(
            NodeKind::Block { stmts },
            Span::new(0, source.len()),
        ))
    }
}

/// Import aliases: `use a::b::Name;` maps `Name` to `a::b::Name`.
pub(crate) fn collect_aliases(items: &[syn::Item]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for item in items {
        if let syn::Item::Use(use_item) = item {
            collect_use_tree(&use_item.tree, String::new(), &mut aliases);
        }
    }
    aliases
}

fn collect_use_tree(tree: &syn::UseTree, prefix: String, out: &mut HashMap<String, String>) {
    match tree {
        syn::UseTree::Path(path) => {
            let next = if prefix.is_empty() {
                path.ident.to_string()
            } else {
                format!("{}::{}", prefix, path.ident)
            };
            collect_use_tree(&path.tree, next, out);
        }
        syn::UseTree::Name(name) => {
            let full = if prefix.is_empty() {
                name.ident.to_string()
            } else {
                format!("{}::{}", prefix, name.ident)
            };
            out.insert(name.ident.to_string(), full);
        }
        syn::UseTree::Rename(rename) => {
            let full = if prefix.is_empty() {
                rename.ident.to_string()
            } else {
                format!("{}::{}", prefix, rename.ident)
            };
            out.insert(rename.rename.to_string(), full);
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix.clone(), out);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

struct Lowering<'a> {
    source: &'a str,
    aliases: HashMap<String, String>,
}

impl<'a> Lowering<'a> {
    fn span_of<S: Spanned>(&self, spanned: &S) -> Span {
        let range = spanned.span().byte_range();
        Span::new(range.start, range.end)
    }

    fn raw<S: Spanned>(&self, spanned: &S) -> Node {
        let span = self.span_of(spanned);
        let text = self
            .source
            .get(span.start..span.end)
            .unwrap_or_default()
            .to_string();
        Node::with_span(NodeKind::Raw { text }, span)
    }

    fn lower_item(&self, item: &syn::Item, class: Option<&Rc<ClassMetadata>>) -> Node {
        match item {
            syn::Item::Fn(func) => self.lower_fn(
                &func.sig,
                &func.block,
                &func.attrs,
                self.span_of(item),
                class,
            ),
            syn::Item::Impl(imp) => self.lower_impl(imp, self.span_of(item)),
            syn::Item::Trait(tr) => self.lower_trait(tr, self.span_of(item)),
            _ => self.raw(item),
        }
    }

    fn lower_fn(
        &self,
        sig: &syn::Signature,
        block: &syn::Block,
        attrs: &[syn::Attribute],
        span: Span,
        class: Option<&Rc<ClassMetadata>>,
    ) -> Node {
        let scope = Rc::new(self.build_scope(sig, block, class));
        let mut body: Vec<Node> = block.stmts.iter().map(|s| self.lower_stmt(s)).collect();
        for stmt in &mut body {
            attach_scope(stmt, &scope);
        }
        let mut node = Node::with_span(
            NodeKind::FunctionDecl {
                name: sig.ident.to_string(),
                body,
            },
            span,
        );
        node.meta.scope = Some(scope);
        node.meta.doc = extract_doc(attrs);
        node
    }

    fn lower_impl(&self, imp: &syn::ItemImpl, span: Span) -> Node {
        let name = match &*imp.self_ty {
            syn::Type::Path(tp) => match tp.path.segments.last() {
                Some(segment) => segment.ident.to_string(),
                None => return self.raw(imp),
            },
            _ => return self.raw(imp),
        };
        let class = Rc::new(ClassMetadata::new(&name));
        let body = imp
            .items
            .iter()
            .map(|impl_item| match impl_item {
                syn::ImplItem::Fn(method) => self.lower_fn(
                    &method.sig,
                    &method.block,
                    &method.attrs,
                    self.span_of(impl_item),
                    Some(&class),
                ),
                _ => self.raw(impl_item),
            })
            .collect();
        Node::with_span(NodeKind::ClassDecl { name, body }, span)
    }

    fn lower_trait(&self, tr: &syn::ItemTrait, span: Span) -> Node {
        let name = tr.ident.to_string();
        let mut metadata = ClassMetadata::new(&name);
        metadata.is_trait = true;
        let class = Rc::new(metadata);
        let body = tr
            .items
            .iter()
            .map(|trait_item| match trait_item {
                syn::TraitItem::Fn(method) => match &method.default {
                    Some(block) => self.lower_fn(
                        &method.sig,
                        block,
                        &method.attrs,
                        self.span_of(trait_item),
                        Some(&class),
                    ),
                    None => self.raw(trait_item),
                },
                _ => self.raw(trait_item),
            })
            .collect();
        Node::with_span(NodeKind::ClassDecl { name, body }, span)
    }

    /// Declared facts only: typed parameters and explicitly annotated let
    /// bindings. Nothing is inferred here.
    fn build_scope(
        &self,
        sig: &syn::Signature,
        block: &syn::Block,
        class: Option<&Rc<ClassMetadata>>,
    ) -> Scope {
        let mut scope = Scope {
            class: class.cloned(),
            aliases: self.aliases.clone(),
            ..Scope::default()
        };
        for input in &sig.inputs {
            if let syn::FnArg::Typed(typed) = input {
                if let syn::Pat::Ident(pat) = &*typed.pat {
                    if let Some(ty) = self.map_type(&typed.ty) {
                        scope.locals.insert(pat.ident.to_string(), ty.clone());
                        scope.native_locals.insert(pat.ident.to_string(), ty);
                    }
                }
            }
        }
        for stmt in &block.stmts {
            if let syn::Stmt::Local(local) = stmt {
                if let syn::Pat::Type(pat_type) = &local.pat {
                    if let syn::Pat::Ident(pat) = &*pat_type.pat {
                        if let Some(ty) = self.map_type(&pat_type.ty) {
                            scope.locals.insert(pat.ident.to_string(), ty.clone());
                            scope.native_locals.insert(pat.ident.to_string(), ty);
                        }
                    }
                }
            }
        }
        scope
    }

    fn map_type(&self, ty: &syn::Type) -> Option<SemType> {
        lower_type(ty, &self.aliases)
    }

    fn lower_stmt(&self, stmt: &syn::Stmt) -> Node {
        match stmt {
            syn::Stmt::Local(local) => self.lower_local(local),
            syn::Stmt::Item(item) => self.lower_item(item, None),
            syn::Stmt::Expr(expr, semi) => {
                let lowered = self.lower_expr(expr);
                match &lowered.kind {
                    // Control-flow exprs are statements of their own.
                    NodeKind::If { .. } | NodeKind::Foreach { .. } | NodeKind::Return { .. } => {
                        lowered
                    }
                    _ if semi.is_some() => Node::with_span(
                        NodeKind::ExprStmt {
                            expr: Box::new(lowered),
                        },
                        self.span_of(stmt),
                    ),
                    _ => lowered,
                }
            }
            syn::Stmt::Macro(_) => self.raw(stmt),
        }
    }

    fn lower_local(&self, local: &syn::Local) -> Node {
        let name = match binding_ident(&local.pat) {
            Some(name) => name,
            None => return self.raw(local),
        };
        let init = match &local.init {
            Some(init) => init,
            None => return self.raw(local),
        };
        let target = Node::with_span(
            NodeKind::Variable { name },
            self.span_of(&local.pat),
        );
        Node::with_span(
            NodeKind::ExprStmt {
                expr: Box::new(Node::with_span(
                    NodeKind::Assign {
                        target: Box::new(target),
                        value: Box::new(self.lower_expr(&init.expr)),
                    },
                    self.span_of(local),
                )),
            },
            self.span_of(local),
        )
    }

    fn lower_expr(&self, expr: &syn::Expr) -> Node {
        let span = self.span_of(expr);
        match expr {
            syn::Expr::MethodCall(call) => {
                let recv = Box::new(self.lower_expr(&call.receiver));
                let args: Vec<Node> = call.args.iter().map(|a| self.lower_expr(a)).collect();
                // `opt.unwrap_or(fallback)` carries null-coalescing intent.
                if call.method == "unwrap_or" && args.len() == 1 {
                    let right = args.into_iter().next().unwrap_or_else(|| {
                        Node::with_span(NodeKind::NullLit, span)
                    });
                    return Node::with_span(
                        NodeKind::Coalesce {
                            left: recv,
                            right: Box::new(right),
                        },
                        span,
                    );
                }
                Node::with_span(
                    NodeKind::MethodCall {
                        recv,
                        name: call.method.to_string(),
                        args,
                        nullsafe: false,
                    },
                    span,
                )
            }
            syn::Expr::Call(call) => self.lower_call(call, span),
            syn::Expr::Field(field) => {
                let name = match &field.member {
                    syn::Member::Named(ident) => ident.to_string(),
                    syn::Member::Unnamed(index) => index.index.to_string(),
                };
                Node::with_span(
                    NodeKind::PropertyFetch {
                        recv: Box::new(self.lower_expr(&field.base)),
                        name,
                    },
                    span,
                )
            }
            syn::Expr::Index(index) => Node::with_span(
                NodeKind::ArrayIndex {
                    recv: Box::new(self.lower_expr(&index.expr)),
                    index: Box::new(self.lower_expr(&index.index)),
                },
                span,
            ),
            syn::Expr::Lit(lit) => self.lower_lit(lit, span),
            syn::Expr::Path(path) => self.lower_path(path, span),
            syn::Expr::If(if_expr) => self.lower_if(if_expr, span),
            syn::Expr::ForLoop(for_loop) => self.lower_for(for_loop, span),
            syn::Expr::Return(ret) => Node::with_span(
                NodeKind::Return {
                    value: ret.expr.as_ref().map(|e| Box::new(self.lower_expr(e))),
                },
                span,
            ),
            syn::Expr::Assign(assign) => Node::with_span(
                NodeKind::Assign {
                    target: Box::new(self.lower_expr(&assign.left)),
                    value: Box::new(self.lower_expr(&assign.right)),
                },
                span,
            ),
            syn::Expr::Paren(paren) => {
                let mut inner = self.lower_expr(&paren.expr);
                inner.span = Some(span);
                inner
            }
            _ => self.raw(expr),
        }
    }

    fn lower_call(&self, call: &syn::ExprCall, span: Span) -> Node {
        let path = match &*call.func {
            syn::Expr::Path(p) => &p.path,
            _ => return self.raw(call),
        };
        let args: Vec<Node> = call.args.iter().map(|a| self.lower_expr(a)).collect();
        let last = match path.segments.last() {
            Some(segment) => segment.ident.to_string(),
            None => return self.raw(call),
        };
        if path.segments.len() == 1 {
            return Node::with_span(NodeKind::FuncCall { name: last, args }, span);
        }
        let prefix = path_prefix_text(path);
        let class = self.resolve_class_name(&prefix);
        if last == "new" {
            // `Type::new(..)` is the construction idiom.
            return Node::with_span(
                NodeKind::New {
                    class: Some(class),
                    parents: vec![],
                    args,
                },
                span,
            );
        }
        Node::with_span(
            NodeKind::StaticCall {
                class,
                name: last,
                args,
            },
            span,
        )
    }

    fn lower_lit(&self, lit: &syn::ExprLit, span: Span) -> Node {
        match &lit.lit {
            syn::Lit::Str(s) => Node::with_span(NodeKind::StrLit { value: s.value() }, span),
            syn::Lit::Int(i) => match i.base10_parse::<i64>() {
                Ok(value) => Node::with_span(NodeKind::IntLit { value }, span),
                Err(_) => self.raw(lit),
            },
            syn::Lit::Float(f) => match f.base10_parse::<f64>() {
                Ok(value) => Node::with_span(NodeKind::FloatLit { value }, span),
                Err(_) => self.raw(lit),
            },
            syn::Lit::Bool(b) => Node::with_span(NodeKind::BoolLit { value: b.value }, span),
            _ => self.raw(lit),
        }
    }

    fn lower_path(&self, path: &syn::ExprPath, span: Span) -> Node {
        let segments = &path.path.segments;
        if segments.len() == 1 {
            let ident = segments[0].ident.to_string();
            return match ident.as_str() {
                // Receiver binding, normalized for scope-aware resolution.
                "self" => Node::with_span(
                    NodeKind::Variable {
                        name: "this".to_string(),
                    },
                    span,
                ),
                "None" => Node::with_span(NodeKind::NullLit, span),
                _ if ident.chars().next().is_some_and(char::is_uppercase) => {
                    Node::with_span(NodeKind::TypeName { name: ident }, span)
                }
                _ => Node::with_span(NodeKind::Variable { name: ident }, span),
            };
        }
        let constant = segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();
        let prefix = path_prefix_text(&path.path);
        Node::with_span(
            NodeKind::ClassConstFetch {
                class: self.resolve_class_name(&prefix),
                constant,
            },
            span,
        )
    }

    fn lower_if(&self, if_expr: &syn::ExprIf, span: Span) -> Node {
        let cond = Box::new(self.lower_expr(&if_expr.cond));
        let then: Vec<Node> = if_expr
            .then_branch
            .stmts
            .iter()
            .map(|s| self.lower_stmt(s))
            .collect();
        let otherwise = match &if_expr.else_branch {
            None => None,
            Some((_, else_expr)) => match &**else_expr {
                syn::Expr::Block(block) => Some(
                    block
                        .block
                        .stmts
                        .iter()
                        .map(|s| self.lower_stmt(s))
                        .collect(),
                ),
                // else-if chains become a single-statement else branch.
                chained => Some(vec![self.lower_expr(chained)]),
            },
        };
        Node::with_span(
            NodeKind::If {
                cond,
                then,
                otherwise,
            },
            span,
        )
    }

    fn lower_for(&self, for_loop: &syn::ExprForLoop, span: Span) -> Node {
        let (key, value) = match &*for_loop.pat {
            syn::Pat::Ident(pat) => (
                None,
                Node::with_span(
                    NodeKind::Variable {
                        name: pat.ident.to_string(),
                    },
                    self.span_of(&for_loop.pat),
                ),
            ),
            syn::Pat::Tuple(tuple) if tuple.elems.len() == 2 => {
                let mut idents = tuple.elems.iter().map(|p| match p {
                    syn::Pat::Ident(pat) => Some((pat.ident.to_string(), self.span_of(p))),
                    _ => None,
                });
                match (idents.next().flatten(), idents.next().flatten()) {
                    (Some((key_name, key_span)), Some((value_name, value_span))) => (
                        Some(Box::new(Node::with_span(
                            NodeKind::Variable { name: key_name },
                            key_span,
                        ))),
                        Node::with_span(NodeKind::Variable { name: value_name }, value_span),
                    ),
                    _ => return self.raw(for_loop),
                }
            }
            _ => return self.raw(for_loop),
        };
        let body = for_loop
            .body
            .stmts
            .iter()
            .map(|s| self.lower_stmt(s))
            .collect();
        let mut node = Node::with_span(
            NodeKind::Foreach {
                iterable: Box::new(self.lower_expr(&for_loop.expr)),
                key,
                value: Box::new(value),
                body,
            },
            span,
        );
        node.meta.doc = extract_doc(&for_loop.attrs);
        node
    }

    fn resolve_class_name(&self, path: &str) -> String {
        if !path.contains("::") {
            if let Some(full) = self.aliases.get(path) {
                return full.clone();
            }
        }
        path.to_string()
    }
}

/// Maps a declared type annotation onto the semantic model. `None` means
/// the annotation is outside the modeled subset and reads as Mixed.
pub(crate) fn lower_type(ty: &syn::Type, aliases: &HashMap<String, String>) -> Option<SemType> {
    match ty {
        syn::Type::Reference(reference) => lower_type(&reference.elem, aliases),
        syn::Type::Path(tp) => {
            let segment = tp.path.segments.last()?;
            let ident = segment.ident.to_string();
            match ident.as_str() {
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" => Some(SemType::Int),
                "f32" | "f64" => Some(SemType::Float),
                "bool" => Some(SemType::Bool(None)),
                "str" | "String" => Some(SemType::Str {
                    literal: None,
                    nonempty: false,
                }),
                "Option" => {
                    let inner = generic_arg(segment, aliases)?;
                    Some(SemType::union_of(vec![inner, SemType::Null]))
                }
                "Vec" => {
                    let inner = generic_arg(segment, aliases)?;
                    Some(SemType::array_of(SemType::Int, inner))
                }
                _ => {
                    let text = path_text(&tp.path);
                    let resolved = if tp.path.segments.len() == 1 {
                        aliases.get(&text).cloned().unwrap_or(text)
                    } else {
                        text
                    };
                    Some(SemType::Object(resolved))
                }
            }
        }
        _ => None,
    }
}

fn generic_arg(segment: &syn::PathSegment, aliases: &HashMap<String, String>) -> Option<SemType> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        for arg in &args.args {
            if let syn::GenericArgument::Type(ty) = arg {
                return lower_type(ty, aliases);
            }
        }
    }
    None
}

fn binding_ident(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::Type(pat_type) => binding_ident(&pat_type.pat),
        _ => None,
    }
}

pub(crate) fn path_text(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn path_prefix_text(path: &syn::Path) -> String {
    let count = path.segments.len().saturating_sub(1);
    path.segments
        .iter()
        .take(count)
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn extract_doc(attrs: &[syn::Attribute]) -> Option<DocComment> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let syn::Meta::NameValue(nv) = &attr.meta {
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(s),
                ..
            }) = &nv.value
            {
                lines.push(s.value().trim().to_string());
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(DocComment::new(lines))
    }
}

fn attach_scope(node: &mut Node, scope: &Rc<Scope>) {
    if node.meta.scope.is_none() {
        node.meta.scope = Some(scope.clone());
    } else {
        // A nested function already carries its own scope.
        return;
    }
    node.for_each_child_mut(&mut |child| attach_scope(child, scope));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Kind;

    fn parse(source: &str) -> Node {
        SynParser.parse("test.rs", source).expect("parse failed")
    }

    fn first_fn_body(root: &Node) -> &[Node] {
        match &root.kind {
            NodeKind::Block { stmts } => match &stmts[0].kind {
                NodeKind::FunctionDecl { body, .. } => body,
                other => panic!("expected function, got {:?}", other),
            },
            other => panic!("expected block root, got {:?}", other),
        }
    }

    #[test]
    fn test_root_block_spans_whole_file() {
        let source = "fn main() {}\n";
        let root = parse(source);
        assert_eq!(root.span, Some(Span::new(0, source.len())));
        assert!(!root.subtree_dirty());
    }

    #[test]
    fn test_method_call_is_lowered_with_receiver() {
        let root = parse("fn run() { user.check(); }");
        let body = first_fn_body(&root);
        match &body[0].kind {
            NodeKind::ExprStmt { expr } => match &expr.kind {
                NodeKind::MethodCall { recv, name, .. } => {
                    assert_eq!(name, "check");
                    assert!(recv.is_variable_named("user"));
                }
                other => panic!("expected method call, got {:?}", other),
            },
            other => panic!("expected expr stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_let_feeds_scope() {
        let root = parse("fn run() { let user: app::User = load(); user.check(); }");
        let body = first_fn_body(&root);
        let scope = body[0].scope().expect("scope attached");
        assert_eq!(
            scope.local("user"),
            Some(&SemType::Object("app::User".to_string()))
        );
    }

    #[test]
    fn test_option_annotation_becomes_nullable_union() {
        let root = parse("fn run(flag: Option<i64>) { flag; }");
        let body = first_fn_body(&root);
        let scope = body[0].scope().expect("scope attached");
        let ty = scope.local("flag").expect("local typed");
        assert!(ty.is_union());
        assert!(ty.contains_null());
    }

    #[test]
    fn test_keyed_for_loop_is_lowered() {
        let root = parse("fn run() { for (idx, item) in items { item.touch(); } }");
        let body = first_fn_body(&root);
        match &body[0].kind {
            NodeKind::Foreach { key, value, .. } => {
                assert!(key.as_deref().is_some_and(|k| k.is_variable_named("idx")));
                assert!(value.is_variable_named("item"));
            }
            other => panic!("expected for loop, got {:?}", other),
        }
    }

    #[test]
    fn test_type_new_is_construction() {
        let root = parse("fn run() { let m: i64 = 0; mail::Sender::new(m); }");
        let body = first_fn_body(&root);
        let found = body.iter().any(|stmt| {
            stmt.any_node(&mut |n| {
                matches!(
                    &n.kind,
                    NodeKind::New { class: Some(c), .. } if c == "mail::Sender"
                )
            })
        });
        assert!(found);
    }

    #[test]
    fn test_use_alias_qualifies_type_annotations() {
        let root = parse("use app::service::Mailer;\nfn run(m: Mailer) { m.send(); }");
        match &root.kind {
            NodeKind::Block { stmts } => {
                // The use item itself stays Raw.
                assert_eq!(stmts[0].kind_tag(), Kind::Raw);
                match &stmts[1].kind {
                    NodeKind::FunctionDecl { body, .. } => {
                        let scope = body[0].scope().expect("scope attached");
                        assert_eq!(
                            scope.local("m"),
                            Some(&SemType::Object("app::service::Mailer".to_string()))
                        );
                    }
                    other => panic!("expected function, got {:?}", other),
                }
            }
            other => panic!("expected block root, got {:?}", other),
        }
    }

    #[test]
    fn test_self_receiver_normalizes_to_this() {
        let root = parse("impl Mailer { fn send(&self) { self.flush(); } }");
        match &root.kind {
            NodeKind::Block { stmts } => match &stmts[0].kind {
                NodeKind::ClassDecl { name, body } => {
                    assert_eq!(name, "Mailer");
                    let method_body = match &body[0].kind {
                        NodeKind::FunctionDecl { body, .. } => body,
                        other => panic!("expected method, got {:?}", other),
                    };
                    let uses_this = method_body[0].any_node(&mut |n| n.is_variable_named("this"));
                    assert!(uses_this);
                    let scope = method_body[0].scope().expect("scope attached");
                    assert_eq!(scope.class_name(), Some("Mailer"));
                }
                other => panic!("expected impl, got {:?}", other),
            },
            other => panic!("expected block root, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_construct_becomes_raw_and_prints_back() {
        let source = "fn run() { let x = match 1 { _ => 2 };\n}";
        let root = parse(source);
        assert!(root.any_node(&mut |n| n.kind_tag() == Kind::Raw));
        assert!(!root.subtree_dirty());
    }

    #[test]
    fn test_parse_error_carries_line() {
        let err = SynParser
            .parse("broken.rs", "fn run( {\n  nonsense\n")
            .unwrap_err();
        let parse_error = err.downcast_ref::<ParseError>().expect("typed error");
        assert!(parse_error.line >= 1);
    }

    #[test]
    fn test_unwrap_or_lowers_to_coalesce() {
        let root = parse("fn run() { maybe.unwrap_or(fallback); }");
        let body = first_fn_body(&root);
        assert!(body[0].any_node(&mut |n| n.kind_tag() == Kind::Coalesce));
    }
}
