// Semantic type model.
// A small tagged union mirroring what the external analyzer reports, plus
// the combinators the resolution engine needs. Union values are always kept
// flat: a Union member is never itself a Union.

/// Fieldless discriminant for `SemType`, used by `match_nullable_of_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Mixed,
    Never,
    Null,
    Bool,
    Int,
    Float,
    Str,
    ClassString,
    Arr,
    Object,
    ObjectWithoutClass,
    Union,
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemType {
    Mixed,
    Never,
    Null,
    /// `Some(_)` is a constant boolean.
    Bool(Option<bool>),
    Int,
    Float,
    Str {
        /// `Some(_)` is a constant string.
        literal: Option<String>,
        /// Accessory "non-empty" refinement; stripped by the corrector.
        nonempty: bool,
    },
    /// A string known to name a class; `Some(_)` pins the class.
    ClassString(Option<String>),
    Arr {
        key: Box<SemType>,
        value: Box<SemType>,
        /// Constant-array keys the analyzer marked optional.
        optional_keys: Vec<String>,
    },
    Object(String),
    /// An object with no stable class name, carrying its declared parents.
    ObjectWithoutClass(Vec<SemType>),
    Union(Vec<SemType>),
    /// `$this` / `self`, remembering the static class.
    This(String),
}

impl SemType {
    pub fn kind(&self) -> TypeKind {
        match self {
            SemType::Mixed => TypeKind::Mixed,
            SemType::Never => TypeKind::Never,
            SemType::Null => TypeKind::Null,
            SemType::Bool(_) => TypeKind::Bool,
            SemType::Int => TypeKind::Int,
            SemType::Float => TypeKind::Float,
            SemType::Str { .. } => TypeKind::Str,
            SemType::ClassString(_) => TypeKind::ClassString,
            SemType::Arr { .. } => TypeKind::Arr,
            SemType::Object(_) => TypeKind::Object,
            SemType::ObjectWithoutClass(_) => TypeKind::ObjectWithoutClass,
            SemType::Union(_) => TypeKind::Union,
            SemType::This(_) => TypeKind::This,
        }
    }

    pub fn string() -> SemType {
        SemType::Str {
            literal: None,
            nonempty: false,
        }
    }

    pub fn str_literal(value: &str) -> SemType {
        SemType::Str {
            literal: Some(value.to_string()),
            nonempty: !value.is_empty(),
        }
    }

    pub fn array_of(key: SemType, value: SemType) -> SemType {
        SemType::Arr {
            key: Box::new(key),
            value: Box::new(value),
            optional_keys: vec![],
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, SemType::Mixed)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SemType::Null)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, SemType::Union(_))
    }

    /// Class name carried by `Object` / `This` types.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            SemType::Object(name) | SemType::This(name) => Some(name),
            _ => None,
        }
    }

    /// Build a union, flattening nested unions and deduplicating members.
    /// Zero members collapse to `Never`, one member to itself.
    pub fn union_of(members: Vec<SemType>) -> SemType {
        let mut flat: Vec<SemType> = Vec::with_capacity(members.len());
        for member in members {
            match member {
                SemType::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => SemType::Never,
            1 => flat.pop().unwrap_or(SemType::Never),
            _ => SemType::Union(flat),
        }
    }

    /// Guard for merging two sides into a union: neither side may already
    /// be a union, and the right side must not be exactly `Null`.
    pub fn unionable(first: &SemType, second: &SemType) -> bool {
        !first.is_union() && !second.is_union() && !second.is_null()
    }

    pub fn contains_null(&self) -> bool {
        match self {
            SemType::Null => true,
            SemType::Union(members) => members.iter().any(SemType::is_null),
            _ => false,
        }
    }

    /// Remove `Null` from a union; a union left with one member collapses.
    pub fn remove_null(self) -> SemType {
        match self {
            SemType::Null => SemType::Never,
            SemType::Union(members) => {
                let kept: Vec<SemType> =
                    members.into_iter().filter(|m| !m.is_null()).collect();
                SemType::union_of(kept)
            }
            other => other,
        }
    }

    /// Remove the constant-false boolean member, for falsy nullables.
    pub fn remove_const_false(self) -> SemType {
        let is_const_false = |t: &SemType| matches!(t, SemType::Bool(Some(false)));
        match self {
            ref t if is_const_false(t) => SemType::Never,
            SemType::Union(members) => {
                let kept: Vec<SemType> =
                    members.into_iter().filter(|m| !is_const_false(m)).collect();
                SemType::union_of(kept)
            }
            other => other,
        }
    }
}
