//! Shape → descriptor resolution (single pass, stateless).
//!
//! Turn an `ArrayShapeSpec` plus a leaf dtype token into one `Resolved`
//! range: a descriptor that admits exactly the array values the spec
//! permits, with the support metadata the collaborators need.
//!
//! Four strategies behind a field-presence dispatch:
//! - fixed/bounded anonymous rank (`bounded_rank`),
//! - unbounded recursive nesting (`any_shape`),
//! - per-dimension cardinality wrapping (`wrap_dimensions`),
//! - labeled + anonymous combination (`complex_dimensions`).
//!
//! Contradictions are detected eagerly; no descriptor is ever returned for
//! an offending spec.

use thiserror::Error;

use crate::ir::{
    RecursiveDef, Resolved, Ty, ANY_SHAPE_IMPORTS, IMPORT_CONLIST, IMPORT_LIST, IMPORT_UNION,
};
use crate::spec::{ArrayShapeSpec, DimensionConstraint, RankBound};

// ------------------------------ Contradictions ---------------------------- //

/// User-input contradictions. All deterministic, none recoverable.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Exact and min/max set together, at rank level (`dimension: None`) or
    /// on one labeled dimension (`dimension: Some(index)`).
    #[error("{}", exact_conflict_msg(.dimension))]
    ExactWithBoundsConflict { dimension: Option<usize> },

    /// Exact or finite-max rank below the number of labeled dimensions.
    #[error(
        "number of dimensions ({rank}) must be at least the number of parameterized dimensions ({dimensions})"
    )]
    RankSmallerThanLabeledDimensions { rank: u32, dimensions: usize },

    /// A rank floor with no stated ceiling and no explicit unbounded marker.
    #[error(
        "cannot specify minimum_number_dimensions ({min_rank}) while maximum is unset - either use \
         exact_number_dimensions for extra parameterized dimensions or set \
         maximum_number_dimensions explicitly to false for unbounded dimensions"
    )]
    AmbiguousUnboundedRank { min_rank: u32 },

    /// A min bound exceeding its max bound admits no value at all.
    #[error("{}", inverted_msg(.dimension, .min, .max))]
    InvertedBounds {
        dimension: Option<usize>,
        min: u32,
        max: u32,
    },

    /// No resolvable branch. Unreachable by construction; a defect signal,
    /// not a user-facing contradiction.
    #[error("unsupported array specification! this is almost certainly a bug")]
    UnsupportedSpecification,
}

fn exact_conflict_msg(dimension: &Option<usize>) -> String {
    match dimension {
        None => {
            "exact_number_dimensions cannot be combined with minimum/maximum_number_dimensions"
                .to_string()
        }
        Some(i) => format!(
            "dimension {i}: can only specify EITHER exact_cardinality OR minimum/maximum cardinality"
        ),
    }
}

fn inverted_msg(dimension: &Option<usize>, min: &u32, max: &u32) -> String {
    match dimension {
        None => format!("minimum_number_dimensions ({min}) exceeds maximum_number_dimensions ({max})"),
        Some(i) => format!("dimension {i}: minimum_cardinality ({min}) exceeds maximum_cardinality ({max})"),
    }
}

// ------------------------------- Entry point ------------------------------ //

/// Resolve a shape spec against a leaf dtype token.
pub fn resolve(spec: &ArrayShapeSpec, dtype: &str) -> Result<Resolved, ShapeError> {
    validate(spec)?;

    match (spec.dimensions.is_empty(), spec.has_rank_bounds()) {
        // nothing at all: arbitrary homogeneous nesting of depth >= 1
        (true, false) => Ok(any_shape(dtype, false)),
        // anonymous rank constraints only
        (true, true) => bounded_rank(
            spec.exact_number_dimensions,
            spec.minimum_number_dimensions,
            spec.maximum_number_dimensions,
            dtype,
        ),
        // labeled dimensions only: they are the whole shape
        (false, false) => Ok(wrap_dimensions(
            &spec.dimensions,
            Resolved::new(Ty::leaf(dtype)),
        )),
        // labeled dimensions plus anonymous rank constraints
        (false, true) => complex_dimensions(spec, dtype),
    }
}

/// Eager contradiction checks over the raw spec, before any strategy runs.
fn validate(spec: &ArrayShapeSpec) -> Result<(), ShapeError> {
    if spec.exact_number_dimensions.is_some()
        && (spec.minimum_number_dimensions.is_some() || spec.maximum_number_dimensions.is_some())
    {
        return Err(ShapeError::ExactWithBoundsConflict { dimension: None });
    }
    if let (Some(lo), Some(RankBound::Bounded(hi))) =
        (spec.minimum_number_dimensions, spec.maximum_number_dimensions)
    {
        if lo > hi {
            return Err(ShapeError::InvertedBounds { dimension: None, min: lo, max: hi });
        }
    }
    for (i, dim) in spec.dimensions.iter().enumerate() {
        if dim.exact_cardinality.is_some()
            && (dim.minimum_cardinality.is_some() || dim.maximum_cardinality.is_some())
        {
            return Err(ShapeError::ExactWithBoundsConflict { dimension: Some(i) });
        }
        if let (Some(lo), Some(hi)) = (dim.minimum_cardinality, dim.maximum_cardinality) {
            if lo > hi {
                return Err(ShapeError::InvertedBounds { dimension: Some(i), min: lo, max: hi });
            }
        }
    }
    Ok(())
}

// ------------------------- Anonymous-rank strategies ---------------------- //

/// `depth` unconstrained list levels around the bare dtype.
fn list_of_lists(depth: u32, dtype: &str) -> Resolved {
    let res = Resolved::new(Ty::nested(depth, Ty::leaf(dtype)));
    if depth > 0 { res.with_import(IMPORT_LIST) } else { res }
}

/// The recursive any-shape range. Union mode additionally admits the bare
/// leaf at the outermost position (recursive arm first).
fn any_shape(dtype: &str, with_inner_union: bool) -> Resolved {
    let core = Ty::RecursiveAny { item: Box::new(Ty::leaf(dtype)) };
    let ty = if with_inner_union {
        Ty::OneOf(vec![core, Ty::leaf(dtype)])
    } else {
        core
    };
    let res = Resolved::new(ty)
        .with_def(RecursiveDef::new(dtype))
        .with_imports(ANY_SHAPE_IMPORTS.iter().copied());
    if with_inner_union { res.with_import(IMPORT_UNION) } else { res }
}

/// Resolve anonymous rank constraints (no labeled dimensions in play).
fn bounded_rank(
    exact: Option<u32>,
    min: Option<u32>,
    max: Option<RankBound>,
    dtype: &str,
) -> Result<Resolved, ShapeError> {
    // an exact rank, or a min/max window that pins one
    let pinned = exact.or(match (min, max) {
        (Some(lo), Some(RankBound::Bounded(hi))) if lo == hi => Some(lo),
        _ => None,
    });
    if let Some(rank) = pinned {
        return Ok(list_of_lists(rank, dtype));
    }

    match (min, max) {
        // no ceiling: the recursive core, behind a fixed prefix when the
        // floor exceeds the single level the core already guarantees
        (lo, Some(RankBound::Unbounded)) => {
            let floor = lo.unwrap_or(1);
            let res = any_shape(dtype, false);
            if floor <= 1 {
                Ok(res)
            } else {
                Ok(res.map_ty(|t| Ty::nested(floor - 1, t)).with_import(IMPORT_LIST))
            }
        }
        // finite ceiling: one alternative per admissible rank, ascending
        (lo, Some(RankBound::Bounded(hi))) => {
            let lo = lo.unwrap_or(1);
            if lo > hi {
                return Err(ShapeError::InvertedBounds { dimension: None, min: lo, max: hi });
            }
            let arms: Vec<Ty> = (lo..=hi).map(|r| Ty::nested(r, Ty::leaf(dtype))).collect();
            let multi = arms.len() > 1;
            let res = Resolved::new(Ty::one_of(arms)).with_import(IMPORT_LIST);
            Ok(if multi { res.with_import(IMPORT_UNION) } else { res })
        }
        // a floor with no stated ceiling and no explicit unbounded marker
        (Some(lo), None) => Err(ShapeError::AmbiguousUnboundedRank { min_rank: lo }),
        // nothing set: a single unconstrained level
        (None, None) => Ok(list_of_lists(1, dtype)),
    }
}

// --------------------------- Labeled dimensions --------------------------- //

/// Fold labeled dimensions around `inner`, innermost-first, so that
/// `dimensions[0]` ends up as the outermost wrapping.
fn wrap_dimensions(dims: &[DimensionConstraint], inner: Resolved) -> Resolved {
    let mut res = inner;
    for dim in dims.iter().rev() {
        res = wrap_dimension(dim, res);
    }
    res
}

fn wrap_dimension(dim: &DimensionConstraint, res: Resolved) -> Resolved {
    if let Some(n) = dim.exact_cardinality {
        res.map_ty(|t| Ty::bounded(Some(n), Some(n), t))
            .with_import(IMPORT_CONLIST)
    } else if dim.is_constrained() {
        let (lo, hi) = (dim.minimum_cardinality, dim.maximum_cardinality);
        res.map_ty(|t| Ty::bounded(lo, hi, t)).with_import(IMPORT_CONLIST)
    } else {
        res.map_ty(|t| Ty::nested(1, t)).with_import(IMPORT_LIST)
    }
}

/// Labeled dimensions combined with anonymous rank constraints: resolve the
/// anonymous trailing portion first (it is the innermost part of the range),
/// then wrap it with the labeled dimensions.
fn complex_dimensions(spec: &ArrayShapeSpec, dtype: &str) -> Result<Resolved, ShapeError> {
    let labeled = spec.dimensions.len() as u32;

    let inner = if let Some(rank) = spec.pinned_rank() {
        if rank < labeled {
            return Err(ShapeError::RankSmallerThanLabeledDimensions {
                rank,
                dimensions: spec.dimensions.len(),
            });
        }
        // rank == labeled leaves no anonymous levels: wrap the bare leaf
        list_of_lists(rank - labeled, dtype)
    } else {
        match (spec.minimum_number_dimensions, spec.maximum_number_dimensions) {
            // unlimited anonymous depth: the innermost anonymous position
            // also admits the bare leaf
            (lo, Some(RankBound::Unbounded)) => {
                let res = any_shape(dtype, true);
                match lo {
                    Some(lo) if lo > labeled => res
                        .map_ty(|t| Ty::nested(lo - labeled, t))
                        .with_import(IMPORT_LIST),
                    _ => res,
                }
            }
            (Some(lo), None) => {
                return Err(ShapeError::AmbiguousUnboundedRank { min_rank: lo });
            }
            // finite ceiling: a rank window over the anonymous levels only
            (lo, Some(RankBound::Bounded(hi))) => {
                if hi < labeled {
                    return Err(ShapeError::RankSmallerThanLabeledDimensions {
                        rank: hi,
                        dimensions: spec.dimensions.len(),
                    });
                }
                let dmin = lo.unwrap_or(0).max(labeled) - labeled;
                let dmax = hi - labeled;
                bounded_rank(None, Some(dmin), Some(RankBound::Bounded(dmax)), dtype)?
            }
            // unreachable through the top-level dispatch
            (None, None) => return Err(ShapeError::UnsupportedSpecification),
        }
    };

    Ok(wrap_dimensions(&spec.dimensions, inner))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{any_shape_id, is_any_dtype};

    const DTYPE: &str = "float";

    fn leaf() -> Ty {
        Ty::leaf(DTYPE)
    }

    fn dim_free() -> DimensionConstraint {
        DimensionConstraint::default()
    }

    fn dim_min(n: u32) -> DimensionConstraint {
        DimensionConstraint { minimum_cardinality: Some(n), ..Default::default() }
    }

    fn dim_exact(n: u32) -> DimensionConstraint {
        DimensionConstraint { exact_cardinality: Some(n), ..Default::default() }
    }

    fn fixed(depth: u32) -> Ty {
        Ty::nested(depth, leaf())
    }

    fn bounded(min: Option<u32>, max: Option<u32>, inner: Ty) -> Ty {
        Ty::bounded(min, max, inner)
    }

    fn recursive() -> Ty {
        Ty::RecursiveAny { item: Box::new(leaf()) }
    }

    fn ok(spec: ArrayShapeSpec) -> Resolved {
        resolve(&spec, DTYPE).unwrap()
    }

    fn err(spec: ArrayShapeSpec) -> ShapeError {
        resolve(&spec, DTYPE).unwrap_err()
    }

    // ---- anonymous rank ---- //

    #[test]
    fn exact_rank_is_pure_nesting() {
        let res = ok(ArrayShapeSpec { exact_number_dimensions: Some(3), ..Default::default() });
        assert_eq!(res.ty, fixed(3));
        assert!(res.defs.is_empty());
    }

    #[test]
    fn pinned_min_max_behaves_like_exact() {
        let pinned = ok(ArrayShapeSpec {
            minimum_number_dimensions: Some(2),
            maximum_number_dimensions: Some(RankBound::Bounded(2)),
            ..Default::default()
        });
        let exact = ok(ArrayShapeSpec { exact_number_dimensions: Some(2), ..Default::default() });
        assert_eq!(pinned.ty, exact.ty);
        assert_eq!(pinned.ty, fixed(2));
    }

    #[test]
    fn exact_rank_zero_is_bare_leaf() {
        let res = ok(ArrayShapeSpec { exact_number_dimensions: Some(0), ..Default::default() });
        assert_eq!(res.ty, leaf());
        assert!(res.imports.is_empty());
    }

    #[test]
    fn rank_window_unions_ascending() {
        let res = ok(ArrayShapeSpec {
            minimum_number_dimensions: Some(2),
            maximum_number_dimensions: Some(RankBound::Bounded(3)),
            ..Default::default()
        });
        assert_eq!(res.ty, Ty::OneOf(vec![fixed(2), fixed(3)]));
    }

    #[test]
    fn rank_window_without_floor_starts_at_one() {
        let res = ok(ArrayShapeSpec {
            maximum_number_dimensions: Some(RankBound::Bounded(2)),
            ..Default::default()
        });
        assert_eq!(res.ty, Ty::OneOf(vec![fixed(1), fixed(2)]));
    }

    #[test]
    fn rank_window_singleton_collapses() {
        let res = ok(ArrayShapeSpec {
            maximum_number_dimensions: Some(RankBound::Bounded(1)),
            ..Default::default()
        });
        assert_eq!(res.ty, fixed(1));
    }

    #[test]
    fn unbounded_rank_is_recursive() {
        let res = ok(ArrayShapeSpec {
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        assert_eq!(res.ty, recursive());
        assert!(res.defs.contains_key(&any_shape_id(DTYPE)));
    }

    #[test]
    fn unbounded_rank_with_unit_floor_is_plain_recursive() {
        let res = ok(ArrayShapeSpec {
            minimum_number_dimensions: Some(1),
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        assert_eq!(res.ty, recursive());
    }

    #[test]
    fn unbounded_rank_with_floor_nests_prefix() {
        // at least 3 deep, no ceiling: two fixed levels around the core
        let res = ok(ArrayShapeSpec {
            minimum_number_dimensions: Some(3),
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        assert_eq!(res.ty, Ty::nested(2, recursive()));
    }

    #[test]
    fn empty_spec_is_recursive_any() {
        let res = ok(ArrayShapeSpec::default());
        assert_eq!(res.ty, recursive());
        assert_eq!(res.defs.len(), 1);
    }

    #[test]
    fn min_without_max_is_ambiguous() {
        let e = err(ArrayShapeSpec { minimum_number_dimensions: Some(3), ..Default::default() });
        assert_eq!(e, ShapeError::AmbiguousUnboundedRank { min_rank: 3 });
    }

    // ---- labeled dimensions ---- //

    #[test]
    fn labeled_dimensions_wrap_outermost_first() {
        // dimensions[0] (min 3) outermost, dimensions[1] (min 2) innermost
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(3), None, bounded(Some(2), None, leaf()))
        );
        assert!(res.imports.contains(IMPORT_CONLIST));
    }

    #[test]
    fn exact_cardinality_pins_both_bounds() {
        let res = ok(ArrayShapeSpec { dimensions: vec![dim_exact(4)], ..Default::default() });
        assert_eq!(res.ty, bounded(Some(4), Some(4), leaf()));
    }

    #[test]
    fn unconstrained_labeled_dimensions_merge_to_pure_nesting() {
        // two anonymous-looking labeled levels are structurally identical to
        // an exact rank of two
        let labeled = ok(ArrayShapeSpec {
            dimensions: vec![dim_free(), dim_free()],
            ..Default::default()
        });
        let exact = ok(ArrayShapeSpec { exact_number_dimensions: Some(2), ..Default::default() });
        assert_eq!(labeled.ty, exact.ty);
    }

    // ---- labeled + anonymous ---- //

    #[test]
    fn exact_beyond_labeled_pads_innermost() {
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            exact_number_dimensions: Some(4),
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(3), None, bounded(Some(2), None, fixed(2)))
        );
    }

    #[test]
    fn exact_equal_to_labeled_wraps_leaf_directly() {
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            exact_number_dimensions: Some(2),
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(3), None, bounded(Some(2), None, leaf()))
        );
    }

    #[test]
    fn exact_below_labeled_fails() {
        let e = err(ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            exact_number_dimensions: Some(1),
            ..Default::default()
        });
        assert_eq!(
            e,
            ShapeError::RankSmallerThanLabeledDimensions { rank: 1, dimensions: 2 }
        );
    }

    #[test]
    fn finite_max_below_labeled_fails() {
        let e = err(ArrayShapeSpec {
            dimensions: vec![dim_free(), dim_free()],
            maximum_number_dimensions: Some(RankBound::Bounded(1)),
            ..Default::default()
        });
        assert_eq!(
            e,
            ShapeError::RankSmallerThanLabeledDimensions { rank: 1, dimensions: 2 }
        );
    }

    #[test]
    fn unbounded_beyond_labeled_nests_union_core() {
        // min 3 with 2 labeled dimensions and no ceiling: one anonymous
        // fixed level around the recursive-or-leaf union, then the wraps
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            minimum_number_dimensions: Some(3),
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        let union_core = Ty::OneOf(vec![recursive(), leaf()]);
        assert_eq!(
            res.ty,
            bounded(Some(3), None, bounded(Some(2), None, Ty::nested(1, union_core)))
        );
        assert_eq!(res.defs.len(), 1);
    }

    #[test]
    fn unbounded_with_labeled_and_no_floor_unions_directly() {
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_exact(3)],
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(3), Some(3), Ty::OneOf(vec![recursive(), leaf()]))
        );
    }

    #[test]
    fn finite_window_beyond_labeled_includes_bare_leaf() {
        // 1 labeled dimension, up to 3 total: 0..=2 anonymous levels
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_exact(3)],
            maximum_number_dimensions: Some(RankBound::Bounded(3)),
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(3), Some(3), Ty::OneOf(vec![leaf(), fixed(1), fixed(2)]))
        );
    }

    #[test]
    fn finite_window_with_floor_beyond_labeled() {
        // 1 labeled, 2..=3 total: 1..=2 anonymous levels
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(2)],
            minimum_number_dimensions: Some(2),
            maximum_number_dimensions: Some(RankBound::Bounded(3)),
            ..Default::default()
        });
        assert_eq!(
            res.ty,
            bounded(Some(2), None, Ty::OneOf(vec![fixed(1), fixed(2)]))
        );
    }

    // ---- contradictions ---- //

    #[test]
    fn exact_with_rank_bounds_conflicts() {
        let e = err(ArrayShapeSpec {
            exact_number_dimensions: Some(2),
            minimum_number_dimensions: Some(1),
            ..Default::default()
        });
        assert_eq!(e, ShapeError::ExactWithBoundsConflict { dimension: None });
    }

    #[test]
    fn dimension_exact_with_bounds_conflicts_and_names_index() {
        let e = err(ArrayShapeSpec {
            dimensions: vec![
                dim_min(1),
                DimensionConstraint {
                    exact_cardinality: Some(2),
                    minimum_cardinality: Some(1),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        assert_eq!(e, ShapeError::ExactWithBoundsConflict { dimension: Some(1) });
    }

    #[test]
    fn inverted_rank_bounds_fail() {
        let e = err(ArrayShapeSpec {
            minimum_number_dimensions: Some(3),
            maximum_number_dimensions: Some(RankBound::Bounded(2)),
            ..Default::default()
        });
        assert_eq!(e, ShapeError::InvertedBounds { dimension: None, min: 3, max: 2 });
    }

    #[test]
    fn inverted_cardinality_fails() {
        let e = err(ArrayShapeSpec {
            dimensions: vec![DimensionConstraint {
                minimum_cardinality: Some(5),
                maximum_cardinality: Some(2),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(e, ShapeError::InvertedBounds { dimension: Some(0), min: 5, max: 2 });
    }

    // ---- metadata ---- //

    #[test]
    fn resolution_is_idempotent() {
        let spec = ArrayShapeSpec {
            dimensions: vec![dim_min(3), dim_min(2)],
            minimum_number_dimensions: Some(3),
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        };
        let a = resolve(&spec, DTYPE).unwrap();
        let b = resolve(&spec, DTYPE).unwrap();
        assert_eq!(a, b);
        let ids_a: Vec<&String> = a.defs.keys().collect();
        let ids_b: Vec<&String> = b.defs.keys().collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn any_spellings_share_one_definition() {
        let spec = ArrayShapeSpec {
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        };
        let a = resolve(&spec, "Any").unwrap();
        let b = resolve(&spec, "AnyType").unwrap();
        let c = resolve(&spec, "any").unwrap();
        assert!(is_any_dtype("AnyType"));
        assert_eq!(a.defs.keys().collect::<Vec<_>>(), b.defs.keys().collect::<Vec<_>>());
        assert_eq!(b.defs.keys().collect::<Vec<_>>(), c.defs.keys().collect::<Vec<_>>());
    }

    #[test]
    fn imports_cover_every_construct() {
        let res = ok(ArrayShapeSpec {
            dimensions: vec![dim_min(2)],
            minimum_number_dimensions: Some(2),
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        });
        assert!(res.imports.contains(IMPORT_CONLIST));
        assert!(res.imports.contains(IMPORT_LIST));
        for token in ANY_SHAPE_IMPORTS {
            assert!(res.imports.contains(*token), "missing {token}");
        }
    }
}
