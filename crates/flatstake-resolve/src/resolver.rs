//! Fixed-point transitive closure over the ownership graph.

use std::collections::{BTreeMap, HashSet};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flatstake_model::{Name, OwnershipEdge, ResolvedOwnership};

use crate::interner::{EntityId, EntityInterner};

/// Default absolute tolerance for "no percentage change".
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Configuration
// ============================================================================

/// Resolver knobs. All comparisons use absolute tolerance, never exact
/// float equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of edge compositions before giving up. `None`
    /// defaults to the number of distinct entities in the edge set,
    /// which bounds any acyclic path.
    pub max_depth: Option<usize>,
    /// Contributions below this are treated as no change.
    pub tolerance: f64,
    /// When set, only relationships whose ultimate owner carries one of
    /// these type labels are returned. The closure always runs in full;
    /// this is a view, never part of termination.
    pub owner_type_filter: Option<HashSet<Name>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            tolerance: DEFAULT_TOLERANCE,
            owner_type_filter: None,
        }
    }
}

// ============================================================================
// Outcome types
// ============================================================================

/// A circular ownership path that was truncated instead of iterated.
///
/// Raised when a composition returns to its own origin with compounded
/// percentage above tolerance: implausible in real books, so it is
/// surfaced to the caller rather than silently resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleWarning {
    /// Entity the path left from and came back to.
    pub entity: Name,
    /// Compounded percentage carried around the loop.
    pub round_trip: f64,
    /// Path length at which the loop closed.
    pub depth: usize,
}

/// Resolver output: the flattened relationships plus any cycle findings.
/// Warnings are non-fatal; the caller decides whether to proceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub relationships: Vec<ResolvedOwnership>,
    pub warnings: Vec<CycleWarning>,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The frontier still carried mass above tolerance after `max_depth`
    /// compositions. `cycle` holds a representative circular path when
    /// one exists (it is empty when the cap was simply set below the
    /// longest chain).
    #[error(
        "ownership closure did not reach a fixed point within {max_depth} compositions \
         (representative cycle: {cycle:?})"
    )]
    DepthCapExceeded { max_depth: usize, cycle: Vec<Name> },
}

// ============================================================================
// Resolution
// ============================================================================

/// Compute the transitive ownership closure of `edges`.
///
/// Starts from the direct edges at depth 1 and repeatedly composes the
/// newly derived relationships with the direct edges: a chain `A -> B`
/// at percentage `p1` and an edge `B -> C` at `p2` yield `A -> C` at
/// `p1 * p2`, and parallel chains between the same pair accumulate
/// additively. The frontier at depth `d` holds the total percentage
/// mass of all chains of exactly `d` edges, so every distinct chain
/// contributes exactly once.
///
/// A composition that returns to its own origin (`A == C`) is a cycle:
/// it is dropped from the closure and reported once per origin entity
/// as a [`CycleWarning`]. The iteration reaches a fixed point when the
/// frontier is empty; if mass above tolerance survives `max_depth`
/// compositions, resolution fails with
/// [`ResolutionError::DepthCapExceeded`].
///
/// Output percentages are never re-normalized: inconsistent source data
/// stays visible. Relationships are sorted by `(owned, owner)` and the
/// whole computation is deterministic for a given input.
pub fn resolve(
    edges: &[OwnershipEdge],
    config: &ResolverConfig,
) -> Result<Resolution, ResolutionError> {
    let mut interner = EntityInterner::new();
    let mut types: AHashMap<EntityId, Name> = AHashMap::new();
    let mut interned: Vec<(EntityId, EntityId, f64)> = Vec::with_capacity(edges.len());

    for edge in edges {
        let owner = interner.intern(&edge.owner_id);
        let owned = interner.intern(&edge.owned_id);
        record_type(&mut types, &interner, owner, &edge.owner_type);
        record_type(&mut types, &interner, owned, &edge.owned_type);
        interned.push((owner, owned, edge.percentage));
    }

    let entity_count = interner.len();
    let max_depth = config.max_depth.unwrap_or(entity_count);

    let mut adjacency: Vec<Vec<(EntityId, f64)>> = vec![Vec::new(); entity_count];
    // BTreeMap rather than a hash map: iteration order drives float
    // accumulation order, and reruns must produce identical output.
    let mut resolved: BTreeMap<(EntityId, EntityId), (f64, usize)> = BTreeMap::new();
    let mut frontier: BTreeMap<(EntityId, EntityId), f64> = BTreeMap::new();
    for &(owner, owned, percentage) in &interned {
        adjacency[owner.index()].push((owned, percentage));
        let slot = resolved.entry((owner, owned)).or_insert((0.0, 1));
        slot.0 += percentage;
        *frontier.entry((owner, owned)).or_insert(0.0) += percentage;
    }

    let mut warned: AHashMap<EntityId, CycleWarning> = AHashMap::new();
    let mut depth = 1usize;

    while !frontier.is_empty() {
        let next_depth = depth + 1;

        let mut next: BTreeMap<(EntityId, EntityId), f64> = BTreeMap::new();
        for (&(origin, via), &mass) in &frontier {
            for &(target, pct) in &adjacency[via.index()] {
                let contribution = mass * pct;
                if origin == target {
                    // The chain came back to where it started. An entity
                    // does not own itself transitively; drop the path and
                    // surface the loop.
                    if contribution > config.tolerance {
                        warned.entry(origin).or_insert_with(|| {
                            let entity = interner.name(origin).to_string();
                            tracing::warn!(
                                entity = %entity,
                                round_trip = contribution,
                                depth = next_depth,
                                "circular ownership truncated"
                            );
                            CycleWarning {
                                entity,
                                round_trip: contribution,
                                depth: next_depth,
                            }
                        });
                    }
                    continue;
                }
                *next.entry((origin, target)).or_insert(0.0) += contribution;
            }
        }

        next.retain(|_, mass| *mass > config.tolerance);
        if next.is_empty() {
            // Fixed point: this round derived nothing above tolerance.
            break;
        }
        if next_depth > max_depth {
            let cycle = find_cycle(&adjacency, &interner);
            return Err(ResolutionError::DepthCapExceeded { max_depth, cycle });
        }
        for (&pair, &mass) in &next {
            let slot = resolved.entry(pair).or_insert((0.0, next_depth));
            slot.0 += mass;
        }

        frontier = next;
        depth = next_depth;
    }

    let mut relationships = Vec::with_capacity(resolved.len());
    for (&(owner, owned), &(percentage, depth)) in &resolved {
        if owner == owned {
            // Raw self-loops are a loader rejection; never echo one.
            continue;
        }
        let owner_type = types.get(&owner).cloned().unwrap_or_default();
        if let Some(filter) = &config.owner_type_filter {
            if !filter.contains(&owner_type) {
                continue;
            }
        }
        relationships.push(ResolvedOwnership {
            ultimate_owner_id: interner.name(owner).to_string(),
            owned_id: interner.name(owned).to_string(),
            effective_percentage: percentage,
            depth,
            owner_type,
            owned_type: types.get(&owned).cloned().unwrap_or_default(),
        });
    }
    relationships.sort_by(|a, b| {
        (&a.owned_id, &a.ultimate_owner_id).cmp(&(&b.owned_id, &b.ultimate_owner_id))
    });

    let mut warnings: Vec<CycleWarning> = warned.into_values().collect();
    warnings.sort_by(|a, b| a.entity.cmp(&b.entity));

    Ok(Resolution {
        relationships,
        warnings,
    })
}

fn record_type(
    types: &mut AHashMap<EntityId, Name>,
    interner: &EntityInterner,
    entity: EntityId,
    label: &Name,
) {
    match types.get(&entity) {
        None => {
            types.insert(entity, label.clone());
        }
        Some(existing) if existing != label => {
            tracing::warn!(
                entity = %interner.name(entity),
                kept = %existing,
                ignored = %label,
                "conflicting entity type labels; keeping first-seen"
            );
        }
        Some(_) => {}
    }
}

// ============================================================================
// Cycle extraction (diagnostics)
// ============================================================================

/// Find one directed cycle for the depth-cap error message. Returns the
/// cycle nodes with the entry node repeated at the end, or an empty
/// vector when the graph is acyclic (cap set below the longest chain).
fn find_cycle(adjacency: &[Vec<(EntityId, f64)>], interner: &EntityInterner) -> Vec<Name> {
    const UNVISITED: u8 = 0;
    const ON_STACK: u8 = 1;
    const DONE: u8 = 2;

    fn visit(
        node: usize,
        adjacency: &[Vec<(EntityId, f64)>],
        color: &mut [u8],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        color[node] = ON_STACK;
        stack.push(node);
        for &(next, _) in &adjacency[node] {
            let next = next.index();
            if color[next] == ON_STACK {
                let entry = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = stack[entry..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            if color[next] == UNVISITED {
                if let Some(cycle) = visit(next, adjacency, color, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        color[node] = DONE;
        None
    }

    let mut color = vec![UNVISITED; adjacency.len()];
    let mut stack = Vec::new();
    for start in 0..adjacency.len() {
        if color[start] == UNVISITED {
            if let Some(cycle) = visit(start, adjacency, &mut color, &mut stack) {
                return cycle
                    .into_iter()
                    .map(|n| interner.name(EntityId::new(n as u32)).to_string())
                    .collect();
            }
        }
    }
    Vec::new()
}
