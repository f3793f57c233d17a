// The type resolution engine.
// Derives a node's semantic type through node-kind special cases, an
// ordered per-kind resolver registry, correction passes, and an analyzer
// fallback, then answers object-type compatibility queries on top of it.

use std::collections::HashMap;

use crate::domain::matcher::ObjectTypeMatcher;
use crate::domain::node::{Kind, Node, NodeKind};
use crate::domain::scope::{RenameTable, Scope};
use crate::domain::types::{SemType, TypeKind};
use crate::ports::{ClassProvider, TypeAnalyzer};

/// Bound on the "method call resolved to Mixed, retry on the receiver"
/// fallback, which compensates for call chains the analyzer cannot see
/// through but has no natural termination of its own.
pub const MAX_RECEIVER_RECURSION: usize = 32;

type ResolverFn = fn(&TypeResolver, &Node) -> Option<SemType>;

struct ResolverEntry {
    kinds: &'static [Kind],
    run: ResolverFn,
}

pub struct TypeResolver<'a> {
    analyzer: &'a dyn TypeAnalyzer,
    provider: &'a dyn ClassProvider,
    renames: &'a RenameTable,
    matcher: ObjectTypeMatcher<'a>,
    resolvers: Vec<ResolverEntry>,
    /// Kind -> index into `resolvers`; first registration wins.
    by_kind: HashMap<Kind, usize>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(
        analyzer: &'a dyn TypeAnalyzer,
        provider: &'a dyn ClassProvider,
        renames: &'a RenameTable,
    ) -> Self {
        let mut resolver = TypeResolver {
            analyzer,
            provider,
            renames,
            matcher: ObjectTypeMatcher::new(provider),
            resolvers: Vec::new(),
            by_kind: HashMap::new(),
        };
        resolver.register(&[Kind::TypeName], resolve_type_name);
        resolver.register(
            &[
                Kind::StrLit,
                Kind::IntLit,
                Kind::FloatLit,
                Kind::BoolLit,
                Kind::NullLit,
            ],
            resolve_literal,
        );
        resolver.register(&[Kind::New], resolve_new);
        resolver.register(&[Kind::ClassConstFetch], resolve_class_const_fetch);
        resolver.register(&[Kind::Variable], resolve_variable);
        resolver
    }

    fn register(&mut self, kinds: &'static [Kind], run: ResolverFn) {
        let index = self.resolvers.len();
        self.resolvers.push(ResolverEntry { kinds, run });
        for kind in kinds {
            self.by_kind.entry(*kind).or_insert(index);
        }
    }

    pub fn matcher(&self) -> &ObjectTypeMatcher<'a> {
        &self.matcher
    }

    /// Resolve a node to its semantic type. Worst case `Mixed`, never
    /// "unresolved".
    pub fn resolve_type(&self, node: &Node) -> SemType {
        self.resolve_with_depth(node, 0)
    }

    fn resolve_with_depth(&self, node: &Node, depth: usize) -> SemType {
        // Node-kind special cases come before generic dispatch.
        match &node.kind {
            NodeKind::NullableType { inner } => {
                let inner_type = self.resolve_with_depth(inner, depth);
                if !inner_type.is_mixed() {
                    return SemType::union_of(vec![inner_type, SemType::Null]);
                }
            }
            NodeKind::Ternary { .. } => {
                let ternary_type = self.resolve_ternary(node, depth);
                if !ternary_type.is_mixed() {
                    return ternary_type;
                }
            }
            NodeKind::Coalesce { left, right } => {
                let first = self.resolve_with_depth(left, depth);
                let second = self.resolve_with_depth(right, depth);
                if SemType::unionable(&first, &second) {
                    return SemType::union_of(vec![first, second]);
                }
            }
            _ => {}
        }

        if let Some(resolved) = self.resolve_by_registry(node) {
            let corrected = self.apply_correctors(resolved);
            return self.narrow_object_type(corrected, node);
        }

        let Some(scope) = node.scope() else {
            return SemType::Mixed;
        };

        if let NodeKind::UnionTypeNode { members } = &node.kind {
            return SemType::union_of(
                members
                    .iter()
                    .map(|m| self.resolve_with_depth(m, depth))
                    .collect(),
            );
        }

        if !node.is_expression() {
            return SemType::Mixed;
        }

        let scope_type = self.apply_correctors(self.analyzer.type_of(node, scope));

        // Analyzer cannot see through some call chains and reports Mixed
        // for the whole chain; retry on the receiver, with an explicit cap.
        if let NodeKind::MethodCall { recv, .. } = &node.kind {
            if scope_type.is_mixed() && depth < MAX_RECEIVER_RECURSION {
                return self.resolve_with_depth(recv, depth + 1);
            }
        }
        scope_type
    }

    fn resolve_by_registry(&self, node: &Node) -> Option<SemType> {
        let entry = self.by_kind.get(&node.kind_tag())?;
        (self.resolvers[*entry].run)(self, node)
    }

    fn resolve_ternary(&self, node: &Node, depth: usize) -> SemType {
        let NodeKind::Ternary {
            cond,
            then,
            otherwise,
        } = &node.kind
        else {
            return SemType::Mixed;
        };
        if let Some(then_expr) = then {
            let first = self.resolve_with_depth(then_expr, depth);
            let second = self.resolve_with_depth(otherwise, depth);
            if SemType::unionable(&first, &second) {
                return SemType::union_of(vec![first, second]);
            }
            return SemType::Mixed;
        }
        // Short ternary: the condition doubles as the then-branch.
        let cond_type = self.resolve_with_depth(cond, depth);
        if let SemType::Union(members) = &cond_type {
            if cond_type.contains_null() {
                if let Some(first) = members.first() {
                    let second = self.resolve_with_depth(otherwise, depth);
                    if SemType::unionable(first, &second) {
                        return SemType::union_of(vec![first.clone(), second]);
                    }
                }
            }
        }
        SemType::Mixed
    }

    /// Correction passes applied to every resolved type: strip the
    /// accessory non-empty-string refinement, and promote constant strings
    /// naming a known class to generic class-strings.
    fn apply_correctors(&self, ty: SemType) -> SemType {
        let ty = strip_nonempty(ty);
        self.correct_class_string(ty)
    }

    fn correct_class_string(&self, ty: SemType) -> SemType {
        match ty {
            SemType::Str {
                literal: Some(value),
                nonempty,
            } => {
                if self.provider.class(&value).is_some() {
                    SemType::ClassString(Some(value))
                } else {
                    SemType::Str {
                        literal: Some(value),
                        nonempty,
                    }
                }
            }
            SemType::Union(members) => SemType::union_of(
                members
                    .into_iter()
                    .map(|m| self.correct_class_string(m))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Narrow an Object type to its fully-qualified form via the node's
    /// scope aliases.
    fn narrow_object_type(&self, ty: SemType, node: &Node) -> SemType {
        let SemType::Object(name) = &ty else {
            return ty;
        };
        let Some(scope) = node.scope() else {
            return ty;
        };
        match scope.resolve_alias(name) {
            Some(full) => SemType::Object(full.to_string()),
            None => ty,
        }
    }

    /// Type of an expression ignoring analyzer refinements. Mirrors the
    /// inferred path except: method calls on builtin receivers fall back to
    /// the inferred type (native types there are unreliable), and
    /// array-index access keeps the original type for Mixed containers and
    /// for optional constant keys.
    pub fn resolve_native_type(&self, expr: &Node) -> SemType {
        let Some(scope) = expr.scope() else {
            return SemType::Mixed;
        };

        if let NodeKind::New { class: None, parents, .. } = &expr.kind {
            return self.matcher.object_without_class(parents);
        }

        let native = self.native_with_builtin_fallback(expr, scope);
        let native = if expr.kind_tag() == Kind::ArrayIndex {
            self.resolve_array_index_type(expr, scope, native)
        } else {
            native
        };

        match native {
            SemType::Union(members) => SemType::union_of(
                members
                    .into_iter()
                    .map(|m| self.collapse_anonymous(m))
                    .collect(),
            ),
            other => {
                if self.is_anonymous_object_type(&other) {
                    SemType::ObjectWithoutClass(vec![])
                } else {
                    strip_nonempty(other)
                }
            }
        }
    }

    fn native_with_builtin_fallback(&self, expr: &Node, scope: &Scope) -> SemType {
        if let NodeKind::MethodCall { recv, .. } = &expr.kind {
            let caller = self.analyzer.type_of(recv, scope);
            if let Some(class_name) = caller.class_name() {
                let is_builtin = self
                    .provider
                    .class(class_name)
                    .map(|m| m.is_builtin)
                    .unwrap_or(false);
                if is_builtin {
                    return self.analyzer.type_of(expr, scope);
                }
            }
        }
        self.analyzer.native_type_of(expr, scope)
    }

    fn resolve_array_index_type(
        &self,
        expr: &Node,
        scope: &Scope,
        original: SemType,
    ) -> SemType {
        let NodeKind::ArrayIndex { recv, index } = &expr.kind else {
            return original;
        };
        let container_native = self.analyzer.native_type_of(recv, scope);
        let container_values_mixed = matches!(
            &container_native,
            SemType::Arr { value, .. } if value.is_mixed()
        );
        if container_native.is_mixed() || container_values_mixed {
            return original;
        }

        let narrowed = self.analyzer.type_of(expr, scope);
        let NodeKind::StrLit { value: index_key } = &index.kind else {
            return narrowed;
        };
        let container = self.analyzer.type_of(recv, scope);
        if let SemType::Arr { optional_keys, .. } = &container {
            if optional_keys.iter().any(|k| k == index_key) {
                return original;
            }
        }
        narrowed
    }

    fn collapse_anonymous(&self, ty: SemType) -> SemType {
        if self.is_anonymous_object_type(&ty) {
            SemType::ObjectWithoutClass(vec![])
        } else {
            ty
        }
    }

    fn is_anonymous_object_type(&self, ty: &SemType) -> bool {
        let SemType::Object(name) = ty else {
            return false;
        };
        self.provider
            .class(name)
            .map(|m| m.is_anonymous)
            .unwrap_or(false)
    }

    /// Whether the node's resolved type is compatible with the required
    /// class name.
    pub fn is_object_type(&self, node: &Node, required: &str) -> bool {
        // A class-constant fetch is never an object value.
        if node.kind_tag() == Kind::ClassConstFetch {
            return false;
        }

        let mut resolved = self.resolve_type(node);

        // `$this` inside a trait has no concrete class until mixed in;
        // repair an unknown resolution to an object of the trait itself.
        if resolved.is_mixed() && node.is_variable_named("this") {
            if let Some(class) = node.scope().and_then(|s| s.class.clone()) {
                if class.is_trait {
                    resolved = SemType::Object(class.name.clone());
                }
            }
        }

        if resolved.is_mixed() {
            return false;
        }
        if let SemType::This(static_class) = resolved {
            resolved = SemType::Object(static_class);
        }

        match resolved {
            SemType::Object(class_name) => self.resolve_object_match(&class_name, required),
            SemType::ObjectWithoutClass(parents) => {
                self.matches_object_without_class(&parents, required)
            }
            other => self.matches_composite(other, required),
        }
    }

    /// True if any of the required class names matches.
    pub fn is_object_types(&self, node: &Node, required: &[&str]) -> bool {
        required.iter().any(|r| self.is_object_type(node, r))
    }

    fn matches_object_without_class(&self, parents: &[SemType], required: &str) -> bool {
        parents.iter().any(|parent| {
            parent
                .class_name()
                .map(|name| self.matcher.is_instance_of(name, required))
                .unwrap_or(false)
        })
    }

    fn matches_composite(&self, resolved: SemType, required: &str) -> bool {
        let stripped = resolved.remove_null();
        if stripped == SemType::Never {
            return false;
        }
        // For falsy nullables.
        let stripped = stripped.remove_const_false();
        match stripped {
            SemType::Never => false,
            SemType::ObjectWithoutClass(parents) => {
                self.matches_object_without_class(&parents, required)
            }
            other => self.is_supertype_of(required, &other),
        }
    }

    fn is_supertype_of(&self, required: &str, ty: &SemType) -> bool {
        match ty {
            SemType::Object(name) | SemType::This(name) => {
                self.matcher.is_instance_of(name, required)
            }
            SemType::Union(members) => {
                !members.is_empty() && members.iter().all(|m| self.is_supertype_of(required, m))
            }
            _ => false,
        }
    }

    /// Rename-aware object match: if the resolved class was renamed in this
    /// run and the renamed name satisfies the requirement, succeed; a
    /// rename must never hide an otherwise-valid match on the original.
    fn resolve_object_match(&self, resolved: &str, required: &str) -> bool {
        if let Some(renamed) = self.renames.replacement_for(resolved) {
            if self.is_object_of(&renamed, required) {
                return true;
            }
        }
        self.is_object_of(resolved, required)
    }

    fn is_object_of(&self, resolved: &str, required: &str) -> bool {
        if resolved == required {
            return true;
        }
        if self.matcher.is_instance_of(resolved, required) {
            return true;
        }
        let Some(required_meta) = self.provider.class(required) else {
            return false;
        };
        if required_meta.is_trait {
            return self.matcher.has_trait_use(resolved, required);
        }
        false
    }

    /// e.g. `string|null`, `SomeObject|null`.
    pub fn is_nullable_type(&self, node: &Node) -> bool {
        self.resolve_type(node).contains_null()
    }

    /// Returns the non-null member of a nullable union, but only if it is
    /// of the requested sub-kind.
    pub fn match_nullable_of_kind(&self, expr: &Node, desired: TypeKind) -> Option<SemType> {
        let resolved = self.resolve_type(expr);
        if !resolved.is_union() {
            return None;
        }
        let bare = resolved.remove_null();
        if bare.is_union() || bare.kind() != desired {
            return None;
        }
        Some(bare)
    }

    /// Receiver-aware matching for method and static calls. A method call
    /// whose receiver is a class-constant fetch on an enum matches the enum
    /// itself, independent of the generic object-matching path.
    pub fn is_call_on_object_type(&self, node: &Node, required: &str) -> bool {
        match &node.kind {
            NodeKind::MethodCall { recv, .. } => {
                if self.is_enum_const_receiver(recv, required) {
                    return true;
                }
                self.is_object_type(recv, required)
            }
            NodeKind::StaticCall { class, .. } => self.resolve_object_match(class, required),
            _ => {
                let Some(class) = node.scope().and_then(|s| s.class.clone()) else {
                    return false;
                };
                if class.name == required {
                    return true;
                }
                if self.matcher.is_instance_of(&class.name, required) {
                    return true;
                }
                self.matcher.has_trait_use(&class.name, required)
            }
        }
    }

    fn is_enum_const_receiver(&self, recv: &Node, required: &str) -> bool {
        let NodeKind::ClassConstFetch { class, .. } = &recv.kind else {
            return false;
        };
        let Some(meta) = self.provider.class(class) else {
            return false;
        };
        meta.is_enum && meta.name == required
    }
}

fn strip_nonempty(ty: SemType) -> SemType {
    match ty {
        SemType::Str { literal, .. } => SemType::Str {
            literal,
            nonempty: false,
        },
        SemType::Union(members) => {
            SemType::union_of(members.into_iter().map(strip_nonempty).collect())
        }
        other => other,
    }
}

fn resolve_type_name(_resolver: &TypeResolver, node: &Node) -> Option<SemType> {
    let NodeKind::TypeName { name } = &node.kind else {
        return None;
    };
    let ty = match name.as_str() {
        "mixed" => SemType::Mixed,
        "never" => SemType::Never,
        "null" => SemType::Null,
        "bool" | "boolean" => SemType::Bool(None),
        "int" | "integer" => SemType::Int,
        "float" | "double" => SemType::Float,
        "string" | "str" => SemType::string(),
        "array" => SemType::array_of(SemType::Mixed, SemType::Mixed),
        other => SemType::Object(other.to_string()),
    };
    Some(ty)
}

fn resolve_literal(_resolver: &TypeResolver, node: &Node) -> Option<SemType> {
    match &node.kind {
        NodeKind::StrLit { value } => Some(SemType::str_literal(value)),
        NodeKind::IntLit { .. } => Some(SemType::Int),
        NodeKind::FloatLit { .. } => Some(SemType::Float),
        NodeKind::BoolLit { value } => Some(SemType::Bool(Some(*value))),
        NodeKind::NullLit => Some(SemType::Null),
        _ => None,
    }
}

fn resolve_new(resolver: &TypeResolver, node: &Node) -> Option<SemType> {
    let NodeKind::New { class, parents, .. } = &node.kind else {
        return None;
    };
    match class {
        Some(name) => Some(SemType::Object(name.clone())),
        None => Some(resolver.matcher.object_without_class(parents)),
    }
}

fn resolve_class_const_fetch(resolver: &TypeResolver, node: &Node) -> Option<SemType> {
    let NodeKind::ClassConstFetch { class, constant } = &node.kind else {
        return None;
    };
    if constant == "class" {
        return Some(SemType::ClassString(Some(class.clone())));
    }
    let meta = resolver.provider.class(class)?;
    if meta.is_enum {
        return Some(SemType::Object(meta.name.clone()));
    }
    None
}

fn resolve_variable(_resolver: &TypeResolver, node: &Node) -> Option<SemType> {
    let NodeKind::Variable { name } = &node.kind else {
        return None;
    };
    let scope = node.scope()?;
    if name == "this" {
        return scope.class_name().map(|c| SemType::This(c.to_string()));
    }
    scope.local(name).cloned()
}
