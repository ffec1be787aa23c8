//! Input data model for array shape specifications.
//!
//! Field names follow the source wire format: a shape document is an
//! `ArrayExpression`-style object with `dimensions` (outermost first) plus
//! optional rank bounds. `maximum_number_dimensions` distinguishes "unset"
//! (absent) from "unbounded" (JSON `false`); `true` is rejected.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

// ------------------------------ Rank bounds ------------------------------- //

/// Upper bound on the number of dimensions.
///
/// `Bounded(n)` caps the rank at `n`; `Unbounded` is the explicit "no ceiling"
/// marker, distinct from leaving the field out entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankBound {
    Bounded(u32),
    Unbounded,
}

impl RankBound {
    pub fn as_finite(self) -> Option<u32> {
        match self {
            RankBound::Bounded(n) => Some(n),
            RankBound::Unbounded => None,
        }
    }
}

impl<'de> Deserialize<'de> for RankBound {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RankBoundVisitor;

        impl<'de> Visitor<'de> for RankBoundVisitor {
            type Value = RankBound;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer, or `false` for unbounded")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RankBound, E> {
                let n = u32::try_from(v)
                    .map_err(|_| E::custom(format!("rank bound {v} out of range")))?;
                Ok(RankBound::Bounded(n))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RankBound, E> {
                if v < 0 {
                    return Err(E::custom(format!("rank bound {v} is negative")));
                }
                self.visit_u64(v as u64)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<RankBound, E> {
                if v {
                    // `true` carries no information: either give a bound or `false`.
                    Err(E::custom(
                        "maximum_number_dimensions must be an integer or `false` (unbounded)",
                    ))
                } else {
                    Ok(RankBound::Unbounded)
                }
            }
        }

        deserializer.deserialize_any(RankBoundVisitor)
    }
}

// ------------------------------- Dimensions ------------------------------- //

/// Cardinality constraints for one labeled dimension.
///
/// `exact_cardinality` is mutually exclusive with the min/max pair; all three
/// unset means "any length" at this nesting level. `alias` is accepted so
/// source documents parse, but it is not carried into the descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DimensionConstraint {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub exact_cardinality: Option<u32>,
    #[serde(default)]
    pub minimum_cardinality: Option<u32>,
    #[serde(default)]
    pub maximum_cardinality: Option<u32>,
}

impl DimensionConstraint {
    /// Whether any cardinality field is present.
    pub fn is_constrained(&self) -> bool {
        self.exact_cardinality.is_some()
            || self.minimum_cardinality.is_some()
            || self.maximum_cardinality.is_some()
    }
}

// ------------------------------- Shape spec ------------------------------- //

/// A full array shape specification: labeled dimensions (outermost first)
/// plus anonymous rank bounds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ArrayShapeSpec {
    #[serde(default)]
    pub dimensions: Vec<DimensionConstraint>,
    #[serde(default)]
    pub exact_number_dimensions: Option<u32>,
    #[serde(default)]
    pub minimum_number_dimensions: Option<u32>,
    #[serde(default)]
    pub maximum_number_dimensions: Option<RankBound>,
}

impl ArrayShapeSpec {
    /// Whether the spec carries any rank-level field besides `dimensions`.
    pub fn has_rank_bounds(&self) -> bool {
        self.exact_number_dimensions.is_some()
            || self.minimum_number_dimensions.is_some()
            || self.maximum_number_dimensions.is_some()
    }

    /// The rank this spec pins exactly, if it pins one: either
    /// `exact_number_dimensions`, or a min/max pair set to the same finite
    /// value.
    pub fn pinned_rank(&self) -> Option<u32> {
        if let Some(n) = self.exact_number_dimensions {
            return Some(n);
        }
        match (self.minimum_number_dimensions, self.maximum_number_dimensions) {
            (Some(lo), Some(RankBound::Bounded(hi))) if lo == hi => Some(lo),
            _ => None,
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
