// Class index and lookup-only analyzer. The index records declared facts
// from the project's items: struct fields, method and function signatures,
// trait implementations, derives. Nothing is inferred.

use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::node::{Node, NodeKind};
use crate::domain::scope::{ClassMetadata, Scope};
use crate::domain::types::SemType;
use crate::infrastructure::parser::{collect_aliases, lower_type, path_text};
use crate::ports::{ClassProvider, TypeAnalyzer};

const BUILTIN_TYPES: &[&str] = &["Vec", "String", "Option", "HashMap", "Box", "Rc", "Arc"];

/// Symbol index over every configured source file. Built once per run
/// (each worker builds its own) and shared read-only afterwards.
pub struct ClassIndex {
    classes: HashMap<String, Rc<ClassMetadata>>,
    /// (short type name, method name) -> declared return type.
    methods: HashMap<(String, String), SemType>,
    /// (short type name, field name) -> declared field type.
    fields: HashMap<(String, String), SemType>,
    /// free function name -> declared return type.
    functions: HashMap<String, SemType>,
}

impl ClassIndex {
    pub fn build(sources: &[(String, String)]) -> Self {
        let mut builder = IndexBuilder::default();
        for (path, code) in sources {
            match syn::parse_file(code) {
                Ok(file) => {
                    let aliases = collect_aliases(&file.items);
                    builder.index_items(&file.items, &aliases);
                }
                Err(e) => {
                    // Indexing is best-effort; the file itself still gets a
                    // proper parse error when processed.
                    eprintln!("[Recast] WARN: failed to index {}: {}", path, e);
                }
            }
        }
        builder.finish()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn lookup_class(&self, name: &str) -> Option<&Rc<ClassMetadata>> {
        if let Some(found) = self.classes.get(name) {
            return Some(found);
        }
        // Annotations may be fully qualified while items are indexed by
        // their declared ident.
        let short = name.rsplit("::").next()?;
        self.classes.get(short)
    }

    fn method_return(&self, class: &str, method: &str) -> Option<&SemType> {
        let short = class.rsplit("::").next().unwrap_or(class);
        self.methods.get(&(short.to_string(), method.to_string()))
    }

    fn field_type(&self, class: &str, field: &str) -> Option<&SemType> {
        let short = class.rsplit("::").next().unwrap_or(class);
        self.fields.get(&(short.to_string(), field.to_string()))
    }
}

#[derive(Default)]
struct IndexBuilder {
    classes: HashMap<String, ClassMetadata>,
    /// trait name -> supertrait names, for ancestry expansion.
    supertraits: HashMap<String, Vec<String>>,
    methods: HashMap<(String, String), SemType>,
    fields: HashMap<(String, String), SemType>,
    functions: HashMap<String, SemType>,
}

impl IndexBuilder {
    fn class_entry(&mut self, name: &str) -> &mut ClassMetadata {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassMetadata::new(name))
    }

    fn index_items(&mut self, items: &[syn::Item], aliases: &HashMap<String, String>) {
        for item in items {
            match item {
                syn::Item::Struct(item_struct) => {
                    let name = item_struct.ident.to_string();
                    let derives = derive_idents(&item_struct.attrs);
                    self.class_entry(&name).trait_uses = derives;
                    for field in &item_struct.fields {
                        if let (Some(ident), Some(ty)) =
                            (&field.ident, lower_type(&field.ty, aliases))
                        {
                            self.fields.insert((name.clone(), ident.to_string()), ty);
                        }
                    }
                }
                syn::Item::Enum(item_enum) => {
                    let name = item_enum.ident.to_string();
                    let derives = derive_idents(&item_enum.attrs);
                    let entry = self.class_entry(&name);
                    entry.is_enum = true;
                    entry.trait_uses = derives;
                }
                syn::Item::Trait(item_trait) => {
                    let name = item_trait.ident.to_string();
                    self.class_entry(&name).is_trait = true;
                    let supers: Vec<String> = item_trait
                        .supertraits
                        .iter()
                        .filter_map(|bound| match bound {
                            syn::TypeParamBound::Trait(tb) => Some(path_text(&tb.path)),
                            _ => None,
                        })
                        .collect();
                    if !supers.is_empty() {
                        self.supertraits.insert(name, supers);
                    }
                }
                syn::Item::Impl(imp) => self.index_impl(imp, aliases),
                syn::Item::Fn(func) => {
                    if let syn::ReturnType::Type(_, ty) = &func.sig.output {
                        if let Some(ret) = lower_type(ty, aliases) {
                            self.functions.insert(func.sig.ident.to_string(), ret);
                        }
                    }
                }
                syn::Item::Mod(module) => {
                    if let Some((_, content)) = &module.content {
                        self.index_items(content, aliases);
                    }
                }
                _ => {}
            }
        }
    }

    fn index_impl(&mut self, imp: &syn::ItemImpl, aliases: &HashMap<String, String>) {
        let type_name = match &*imp.self_ty {
            syn::Type::Path(tp) => match tp.path.segments.last() {
                Some(segment) => segment.ident.to_string(),
                None => return,
            },
            _ => return,
        };
        self.class_entry(&type_name);
        if let Some((_, trait_path, _)) = &imp.trait_ {
            let trait_name = path_text(trait_path);
            let resolved = if !trait_name.contains("::") {
                aliases.get(&trait_name).cloned().unwrap_or(trait_name)
            } else {
                trait_name
            };
            self.class_entry(&type_name).ancestry.push(resolved);
        }
        for impl_item in &imp.items {
            if let syn::ImplItem::Fn(method) = impl_item {
                if let syn::ReturnType::Type(_, ty) = &method.sig.output {
                    if let Some(ret) = lower_type(ty, aliases) {
                        self.methods
                            .insert((type_name.clone(), method.sig.ident.to_string()), ret);
                    }
                }
            }
        }
    }

    fn finish(mut self) -> ClassIndex {
        for builtin in BUILTIN_TYPES {
            self.classes
                .entry(builtin.to_string())
                .or_insert_with(|| ClassMetadata::new(builtin))
                .is_builtin = true;
        }
        // Expand trait ancestry one extra level through supertraits.
        let supertraits = self.supertraits;
        for metadata in self.classes.values_mut() {
            let mut expanded = Vec::new();
            for ancestor in &metadata.ancestry {
                let short = ancestor.rsplit("::").next().unwrap_or(ancestor);
                if let Some(supers) = supertraits.get(short) {
                    expanded.extend(supers.iter().cloned());
                }
            }
            for extra in expanded {
                if !metadata.ancestry.contains(&extra) {
                    metadata.ancestry.push(extra);
                }
            }
        }
        ClassIndex {
            classes: self
                .classes
                .into_iter()
                .map(|(name, metadata)| (name, Rc::new(metadata)))
                .collect(),
            methods: self.methods,
            fields: self.fields,
            functions: self.functions,
        }
    }
}

fn derive_idents(attrs: &[syn::Attribute]) -> Vec<String> {
    let mut derives = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("derive") {
            continue;
        }
        let _ = attr.parse_nested_meta(|meta| {
            derives.push(path_text(&meta.path));
            Ok(())
        });
    }
    derives
}

/// Lookup-only analyzer backed by the class index.
pub struct IndexedAnalyzer {
    index: ClassIndex,
}

impl IndexedAnalyzer {
    pub fn new(index: ClassIndex) -> Self {
        IndexedAnalyzer { index }
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    fn lookup(&self, node: &Node, scope: &Scope, narrowed: bool) -> SemType {
        match &node.kind {
            NodeKind::Variable { name } => {
                let local = if narrowed {
                    scope.local(name)
                } else {
                    scope.native_local(name)
                };
                local.cloned().unwrap_or(SemType::Mixed)
            }
            NodeKind::MethodCall { recv, name, .. } => {
                let receiver = self.lookup(recv, scope, narrowed);
                match receiver.class_name() {
                    Some(class) => self
                        .index
                        .method_return(class, name)
                        .cloned()
                        .unwrap_or(SemType::Mixed),
                    None => SemType::Mixed,
                }
            }
            NodeKind::StaticCall { class, name, .. } => self
                .index
                .method_return(class, name)
                .cloned()
                .unwrap_or(SemType::Mixed),
            NodeKind::FuncCall { name, .. } => self
                .index
                .functions
                .get(name)
                .cloned()
                .unwrap_or(SemType::Mixed),
            NodeKind::PropertyFetch { recv, name } => {
                let receiver = self.lookup(recv, scope, narrowed);
                match receiver.class_name() {
                    Some(class) => self
                        .index
                        .field_type(class, name)
                        .cloned()
                        .unwrap_or(SemType::Mixed),
                    None => SemType::Mixed,
                }
            }
            NodeKind::ArrayIndex { recv, .. } => {
                match self.lookup(recv, scope, narrowed) {
                    SemType::Arr { value, .. } => *value,
                    _ => SemType::Mixed,
                }
            }
            NodeKind::New { class: Some(c), .. } => SemType::Object(c.clone()),
            NodeKind::StrLit { value } => SemType::Str {
                literal: Some(value.clone()),
                nonempty: !value.is_empty(),
            },
            NodeKind::IntLit { .. } => SemType::Int,
            NodeKind::FloatLit { .. } => SemType::Float,
            NodeKind::BoolLit { value } => SemType::Bool(Some(*value)),
            NodeKind::NullLit => SemType::Null,
            _ => SemType::Mixed,
        }
    }
}

impl TypeAnalyzer for IndexedAnalyzer {
    fn type_of(&self, node: &Node, scope: &Scope) -> SemType {
        self.lookup(node, scope, true)
    }

    fn native_type_of(&self, node: &Node, scope: &Scope) -> SemType {
        self.lookup(node, scope, false)
    }
}

impl ClassProvider for IndexedAnalyzer {
    fn class(&self, name: &str) -> Option<Rc<ClassMetadata>> {
        self.index.lookup_class(name).cloned()
    }
}
