// Format-preserving printer. Untouched subtrees are spliced back from the
// original source at their recorded byte spans; dirty or synthesized
// subtrees are re-rendered structurally.

use crate::domain::node::{Node, NodeKind, Span};
use crate::ports::SourcePrinter;

pub struct SpanPrinter;

impl SourcePrinter for SpanPrinter {
    fn print(&self, source: &str, root: &Node) -> String {
        if !root.subtree_dirty() {
            return source.to_string();
        }
        Renderer {
            source: Some(source),
        }
        .render(root, 0)
    }
}

/// Renders a node from structure alone, ignoring source spans. Rules use
/// this to compare subtrees by their printed text.
pub fn render_plain(node: &Node) -> String {
    Renderer { source: None }.render(node, 0)
}

struct Renderer<'a> {
    source: Option<&'a str>,
}

impl<'a> Renderer<'a> {
    fn render(&self, node: &Node, indent: usize) -> String {
        if let (Some(src), Some(span)) = (self.source, node.span) {
            if span.end <= src.len() {
                if !node.subtree_dirty() {
                    return src[span.start..span.end].to_string();
                }
                // The node itself is intact; only descendants changed.
                // Keep the original text between children and re-render
                // just the changed ones in their recorded slots.
                if !node.dirty {
                    if let Some(out) = self.splice_children(node, span, src, indent) {
                        return out;
                    }
                }
            }
        }
        self.render_structural(node, indent)
    }

    /// Gap-preserving render: original text outside the direct children's
    /// byte ranges is copied verbatim. Returns None when any child lacks a
    /// usable span (the caller falls back to a structural render).
    fn splice_children(
        &self,
        node: &Node,
        span: Span,
        src: &str,
        indent: usize,
    ) -> Option<String> {
        let mut children: Vec<&Node> = Vec::new();
        node.for_each_child(&mut |child| children.push(child));

        let mut slots: Vec<(Span, &Node)> = Vec::with_capacity(children.len());
        for child in children {
            let cs = child.span?;
            if cs.start < span.start || cs.end > span.end {
                return None;
            }
            slots.push((cs, child));
        }
        slots.sort_by_key(|(cs, _)| cs.start);
        let mut cursor = span.start;
        let mut out = String::new();
        for (cs, child) in slots {
            if cs.start < cursor {
                return None; // overlapping spans, cannot splice
            }
            out.push_str(&src[cursor..cs.start]);
            out.push_str(&self.render(child, indent));
            cursor = cs.end;
        }
        out.push_str(&src[cursor..span.end]);
        Some(out)
    }

    fn render_structural(&self, node: &Node, indent: usize) -> String {
        let pad = "    ".repeat(indent);
        match &node.kind {
            NodeKind::Variable { name } => name.clone(),
            NodeKind::StrLit { value } => format!("{:?}", value),
            NodeKind::IntLit { value } => value.to_string(),
            NodeKind::FloatLit { value } => {
                let mut text = value.to_string();
                if !text.contains('.') && !text.contains('e') {
                    text.push_str(".0");
                }
                text
            }
            NodeKind::BoolLit { value } => value.to_string(),
            NodeKind::NullLit => "None".to_string(),
            NodeKind::MethodCall {
                recv, name, args, ..
            } => format!(
                "{}.{}({})",
                self.render(recv, indent),
                name,
                self.render_args(args, indent)
            ),
            NodeKind::StaticCall { class, name, args } => format!(
                "{}::{}({})",
                class,
                name,
                self.render_args(args, indent)
            ),
            NodeKind::FuncCall { name, args } => {
                format!("{}({})", name, self.render_args(args, indent))
            }
            NodeKind::PropertyFetch { recv, name } => {
                format!("{}.{}", self.render(recv, indent), name)
            }
            NodeKind::ClassConstFetch { class, constant } => {
                format!("{}::{}", class, constant)
            }
            NodeKind::New { class, args, .. } => format!(
                "{}::new({})",
                class.as_deref().unwrap_or("_"),
                self.render_args(args, indent)
            ),
            NodeKind::Ternary {
                cond,
                then,
                otherwise,
            } => match then {
                Some(t) => format!(
                    "if {} {{ {} }} else {{ {} }}",
                    self.render(cond, indent),
                    self.render(t, indent),
                    self.render(otherwise, indent)
                ),
                None => format!(
                    "{}.unwrap_or({})",
                    self.render(cond, indent),
                    self.render(otherwise, indent)
                ),
            },
            NodeKind::Coalesce { left, right } => format!(
                "{}.unwrap_or({})",
                self.render(left, indent),
                self.render(right, indent)
            ),
            NodeKind::ArrayIndex { recv, index } => format!(
                "{}[{}]",
                self.render(recv, indent),
                self.render(index, indent)
            ),
            NodeKind::NullableType { inner } => {
                format!("Option<{}>", self.render(inner, indent))
            }
            NodeKind::TypeName { name } => name.clone(),
            NodeKind::UnionTypeNode { members } => members
                .iter()
                .map(|m| self.render(m, indent))
                .collect::<Vec<_>>()
                .join(" | "),
            NodeKind::Assign { target, value } => format!(
                "{} = {}",
                self.render(target, indent),
                self.render(value, indent)
            ),
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                let mut out = format!(
                    "if {} {{\n{}\n{}}}",
                    self.render(cond, indent),
                    self.render_stmts(then, indent + 1),
                    pad
                );
                if let Some(stmts) = otherwise {
                    out.push_str(&format!(
                        " else {{\n{}\n{}}}",
                        self.render_stmts(stmts, indent + 1),
                        pad
                    ));
                }
                out
            }
            NodeKind::Foreach {
                iterable,
                key,
                value,
                body,
            } => {
                let binding = match key {
                    Some(k) => format!(
                        "({}, {})",
                        self.render(k, indent),
                        self.render(value, indent)
                    ),
                    None => self.render(value, indent),
                };
                format!(
                    "for {} in {} {{\n{}\n{}}}",
                    binding,
                    self.render(iterable, indent),
                    self.render_stmts(body, indent + 1),
                    pad
                )
            }
            NodeKind::Return { value } => match value {
                Some(v) => format!("return {};", self.render(v, indent)),
                None => "return;".to_string(),
            },
            NodeKind::ExprStmt { expr } => format!("{};", self.render(expr, indent)),
            NodeKind::Block { stmts } => self.render_stmts(stmts, indent),
            NodeKind::FunctionDecl { name, body } => format!(
                "fn {}() {{\n{}\n{}}}",
                name,
                self.render_stmts(body, indent + 1),
                pad
            ),
            NodeKind::ClassDecl { name, body } => format!(
                "impl {} {{\n{}\n{}}}",
                name,
                self.render_stmts(body, indent + 1),
                pad
            ),
            NodeKind::Raw { text } => text.clone(),
        }
    }

    fn render_stmts(&self, stmts: &[Node], indent: usize) -> String {
        let pad = "    ".repeat(indent);
        stmts
            .iter()
            .map(|s| {
                let text = self.render(s, indent);
                if s.span.is_some() && !s.subtree_dirty() {
                    // Preserved statements keep their own text; only the
                    // indentation of re-rendered ones is synthesized.
                    text.trim_start().to_string()
                } else {
                    text
                }
            })
            .map(|text| format!("{}{}", pad, text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_args(&self, args: &[Node], indent: usize) -> String {
        args.iter()
            .map(|a| self.render(a, indent))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{Node, NodeKind, Span};

    fn var_at(name: &str, start: usize, end: usize) -> Node {
        Node::with_span(
            NodeKind::Variable {
                name: name.to_string(),
            },
            Span::new(start, end),
        )
    }

    #[test]
    fn test_clean_tree_prints_source_verbatim() {
        let source = "let x = 1;   // spacing preserved\n";
        let root = Node::with_span(
            NodeKind::Block { stmts: vec![] },
            Span::new(0, source.len()),
        );
        let printed = SpanPrinter.print(source, &root);
        assert_eq!(printed, source);
    }

    #[test]
    fn test_replaced_child_is_spliced_in_place() {
        let source = "alpha;\n\n    beta;\n";
        let first = Node::with_span(
            NodeKind::ExprStmt {
                expr: Box::new(var_at("alpha", 0, 5)),
            },
            Span::new(0, 6),
        );
        // "beta;" replaced by a dirty re-render occupying its old slot.
        let mut replacement = Node::with_span(
            NodeKind::ExprStmt {
                expr: Box::new(Node::synthesized(NodeKind::Variable {
                    name: "gamma".to_string(),
                })),
            },
            Span::new(12, 17),
        );
        replacement.dirty = true;
        let root = Node::with_span(
            NodeKind::Block {
                stmts: vec![first, replacement],
            },
            Span::new(0, source.len()),
        );
        let printed = SpanPrinter.print(source, &root);
        // The blank line and indentation between statements survive.
        assert_eq!(printed, "alpha;\n\n    gamma;\n");
    }

    #[test]
    fn test_nested_dirty_leaf_keeps_surrounding_text() {
        let source = "first( old_name , 2 );";
        let mut renamed = var_at("fresh", 7, 15);
        renamed.dirty = true;
        let call = Node::with_span(
            NodeKind::FuncCall {
                name: "first".to_string(),
                args: vec![renamed, Node::with_span(NodeKind::IntLit { value: 2 }, Span::new(18, 19))],
            },
            Span::new(0, 21),
        );
        let root = Node::with_span(
            NodeKind::Block {
                stmts: vec![Node::with_span(
                    NodeKind::ExprStmt {
                        expr: Box::new(call),
                    },
                    Span::new(0, 22),
                )],
            },
            Span::new(0, source.len()),
        );
        let printed = SpanPrinter.print(source, &root);
        // The odd spacing around the arguments is original text, kept.
        assert_eq!(printed, "first( fresh , 2 );");
    }

    #[test]
    fn test_removed_statement_does_not_resurrect_from_gaps() {
        let source = "alpha;\nbeta;\ngamma;\n";
        let alpha = Node::with_span(
            NodeKind::ExprStmt {
                expr: Box::new(var_at("alpha", 0, 5)),
            },
            Span::new(0, 6),
        );
        let gamma = Node::with_span(
            NodeKind::ExprStmt {
                expr: Box::new(var_at("gamma", 13, 18)),
            },
            Span::new(13, 19),
        );
        let mut root = Node::with_span(
            NodeKind::Block {
                stmts: vec![alpha, gamma],
            },
            Span::new(0, source.len()),
        );
        root.dirty = true; // dispatch marks structure changes
        let printed = SpanPrinter.print(source, &root);
        assert!(!printed.contains("beta"));
        assert!(printed.contains("alpha;"));
        assert!(printed.contains("gamma;"));
    }

    #[test]
    fn test_render_plain_ignores_spans() {
        let node = Node::with_span(
            NodeKind::MethodCall {
                recv: Box::new(var_at("user", 0, 4)),
                name: "name".to_string(),
                args: vec![],
                nullsafe: false,
            },
            Span::new(0, 11),
        );
        assert_eq!(render_plain(&node), "user.name()");
    }

    #[test]
    fn test_render_plain_is_stable_for_equal_subtrees() {
        let branch = || {
            vec![Node::synthesized(NodeKind::Return {
                value: Some(Box::new(Node::synthesized(NodeKind::IntLit {
                    value: 1,
                }))),
            })]
        };
        let a = Node::synthesized(NodeKind::Block { stmts: branch() });
        let b = Node::synthesized(NodeKind::Block { stmts: branch() });
        assert_eq!(render_plain(&a), render_plain(&b));
    }
}
