// Strongly-typed descriptor IR for resolved array ranges. No serde_json::Value here.

use std::collections::BTreeSet;

use indexmap::IndexMap;

// ------------------------------ Descriptor -------------------------------- //

/// A composite type descriptor: the set of array values a shape permits,
/// with no reference back to the spec that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    /// The element type at the innermost position (opaque token).
    Leaf(String),
    /// `depth` levels of unconstrained-length nesting around `inner`.
    /// Always `depth >= 1`; the constructor collapses depth 0.
    FixedNesting { depth: u32, inner: Box<Ty> },
    /// One level of nesting with a length constraint. At least one bound is
    /// present; the no-bound case is emitted as `FixedNesting` instead.
    BoundedLength {
        min: Option<u32>,
        max: Option<u32>,
        inner: Box<Ty>,
    },
    /// Self-referential: a value is either `item` or a homogeneous sequence
    /// of this same type, to unbounded depth (>= 1 level of nesting).
    RecursiveAny { item: Box<Ty> },
    /// Ordered alternatives of mutually exclusive shapes (ascending rank
    /// when produced by the bounded-rank strategy). Never a singleton; the
    /// constructor collapses that case.
    OneOf(Vec<Ty>),
}

impl Ty {
    pub fn leaf(dtype: &str) -> Ty {
        Ty::Leaf(dtype.to_string())
    }

    /// `depth` unconstrained levels around `inner`. Depth 0 is the identity;
    /// adjacent fixed-nesting layers merge so purely-unconstrained shapes
    /// have one canonical spelling.
    pub fn nested(depth: u32, inner: Ty) -> Ty {
        if depth == 0 {
            return inner;
        }
        match inner {
            Ty::FixedNesting { depth: d, inner } => Ty::FixedNesting {
                depth: depth + d,
                inner,
            },
            other => Ty::FixedNesting {
                depth,
                inner: Box::new(other),
            },
        }
    }

    pub fn bounded(min: Option<u32>, max: Option<u32>, inner: Ty) -> Ty {
        match (min, max) {
            (None, None) => Ty::nested(1, inner),
            _ => Ty::BoundedLength {
                min,
                max,
                inner: Box::new(inner),
            },
        }
    }

    /// Collapse a singleton union to its only alternative.
    pub fn one_of(mut arms: Vec<Ty>) -> Ty {
        match arms.len() {
            1 => arms.remove(0),
            _ => Ty::OneOf(arms),
        }
    }
}

// ------------------------- Recursive definitions -------------------------- //

/// True for any spelling of an unconstrained element type.
pub fn is_any_dtype(dtype: &str) -> bool {
    dtype.eq_ignore_ascii_case("any") || dtype.eq_ignore_ascii_case("anytype")
}

/// Canonical name used to key recursive definitions: all "any" spellings
/// collapse to one shared definition.
pub fn canonical_dtype(dtype: &str) -> &str {
    if is_any_dtype(dtype) { "Any" } else { dtype }
}

/// Stable identifier for the recursive any-shape definition of a leaf type.
/// A pure function of the leaf type's identity, never of call order.
pub fn any_shape_id(dtype: &str) -> String {
    format!("any-shape-array-{}", canonical_dtype(dtype))
}

/// Support declaration for one recursive any-shape type: everything the
/// rendering and validator collaborators need to emit its definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecursiveDef {
    pub id: String,
    pub dtype: String,
}

impl RecursiveDef {
    pub fn new(dtype: &str) -> RecursiveDef {
        RecursiveDef {
            id: any_shape_id(dtype),
            dtype: canonical_dtype(dtype).to_string(),
        }
    }
}

// ----------------------------- Import tokens ------------------------------ //

pub const IMPORT_LIST: &str = "typing.List";
pub const IMPORT_UNION: &str = "typing.Union";
pub const IMPORT_CONLIST: &str = "pydantic.conlist";

/// Fixed import set required by any recursive any-shape declaration.
pub const ANY_SHAPE_IMPORTS: &[&str] = &[
    "typing.Generic",
    "typing.Iterable",
    "typing.TypeVar",
    "typing.Union",
    "typing.get_args",
    "pydantic.GetCoreSchemaHandler",
    "pydantic_core.core_schema",
];

// ------------------------------ Result object ----------------------------- //

/// A resolved range: the descriptor plus the support metadata it requires.
/// `defs` is keyed by stable identifier, so repeated attachment of the same
/// recursive definition is idempotent; `imports` are opaque tokens the
/// resolver never interprets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub ty: Ty,
    pub defs: IndexMap<String, RecursiveDef>,
    pub imports: BTreeSet<String>,
}

impl Resolved {
    pub fn new(ty: Ty) -> Resolved {
        Resolved {
            ty,
            defs: IndexMap::new(),
            imports: BTreeSet::new(),
        }
    }

    pub fn with_import(mut self, token: &str) -> Resolved {
        self.imports.insert(token.to_string());
        self
    }

    pub fn with_imports<'a, I: IntoIterator<Item = &'a str>>(mut self, tokens: I) -> Resolved {
        self.imports.extend(tokens.into_iter().map(str::to_string));
        self
    }

    pub fn with_def(mut self, def: RecursiveDef) -> Resolved {
        self.defs.entry(def.id.clone()).or_insert(def);
        self
    }

    /// Replace the descriptor, keeping all attached metadata.
    pub fn map_ty(mut self, f: impl FnOnce(Ty) -> Ty) -> Resolved {
        self.ty = f(self.ty);
        self
    }

    /// Fold another result's metadata into this one (defs dedup by id).
    pub fn absorb_meta(&mut self, other: &Resolved) {
        for (id, def) in &other.defs {
            self.defs.entry(id.clone()).or_insert_with(|| def.clone());
        }
        self.imports.extend(other.imports.iter().cloned());
    }
}

// ------------------------------- Tests ------------------------------------ //
