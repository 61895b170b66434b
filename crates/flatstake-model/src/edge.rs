//! Canonical ownership records.

use serde::{Deserialize, Serialize};

/// Entity identifiers and type labels are plain strings; the upstream
/// systems key everything by firm-provided codes.
pub type Name = String;

// ============================================================================
// Input records
// ============================================================================

/// One raw ownership row after column mapping, before validation.
///
/// Produced by [`crate::loader::RecordMapping::apply`] or built directly
/// by callers that already have shaped data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOwnershipRecord {
    pub owner_id: Name,
    pub owned_id: Name,
    pub percentage: f64,
    pub owner_type: Name,
    pub owned_type: Name,
}

/// A direct, single-hop ownership relationship.
///
/// Percentages are fractions in `[0.0, 1.0]`. The loader guarantees that
/// a given `(owner_id, owned_id)` pair appears at most once in a loaded
/// edge set and that no edge is a self-loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub owner_id: Name,
    pub owned_id: Name,
    pub percentage: f64,
    pub owner_type: Name,
    pub owned_type: Name,
}

// ============================================================================
// Output records
// ============================================================================

/// A transitive ownership relationship produced by the resolver.
///
/// `effective_percentage` is the product of percentages along a chain of
/// direct edges, summed across all distinct chains between the same pair.
/// `depth` counts the edges composed; for a pair reached through chains
/// of different lengths it is the shortest one, so depth 1 rows are
/// exactly the direct edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOwnership {
    pub ultimate_owner_id: Name,
    pub owned_id: Name,
    pub effective_percentage: f64,
    pub depth: usize,
    pub owner_type: Name,
    pub owned_type: Name,
}
