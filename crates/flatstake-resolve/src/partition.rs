//! Weakly-connected-component partitioning.
//!
//! No ownership relationship crosses a weakly-connected component, so
//! components can be resolved independently. This is a throughput
//! optimization for large books; [`resolve_partitioned`] produces output
//! identical to whole-graph [`resolve`].

use ahash::AHashMap;
use rayon::prelude::*;

use flatstake_model::OwnershipEdge;

use crate::interner::EntityInterner;
use crate::resolver::{resolve, Resolution, ResolutionError, ResolverConfig};

// ============================================================================
// Union-find
// ============================================================================

/// Disjoint sets with path compression and union by size.
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = node;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

// ============================================================================
// Partitioning
// ============================================================================

/// Split the edge set into weakly-connected components (owner/owned
/// adjacency, direction ignored). Components are ordered by first
/// appearance in the input, and edges keep their input order within
/// each component.
pub fn weakly_connected_components(edges: &[OwnershipEdge]) -> Vec<Vec<OwnershipEdge>> {
    let mut interner = EntityInterner::new();
    let mut endpoints = Vec::with_capacity(edges.len());
    for edge in edges {
        let owner = interner.intern(&edge.owner_id).index();
        let owned = interner.intern(&edge.owned_id).index();
        endpoints.push((owner, owned));
    }

    let mut sets = DisjointSets::new(interner.len());
    for &(owner, owned) in &endpoints {
        sets.union(owner, owned);
    }

    let mut component_of_root: AHashMap<usize, usize> = AHashMap::new();
    let mut components: Vec<Vec<OwnershipEdge>> = Vec::new();
    for (edge, &(owner, _)) in edges.iter().zip(&endpoints) {
        let root = sets.find(owner);
        let slot = *component_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(edge.clone());
    }
    components
}

/// Resolve each weakly-connected component independently and in
/// parallel, then merge. The default depth cap inside each component is
/// that component's entity count, which bounds its acyclic paths just
/// as the global count bounds the whole graph.
pub fn resolve_partitioned(
    edges: &[OwnershipEdge],
    config: &ResolverConfig,
) -> Result<Resolution, ResolutionError> {
    let components = weakly_connected_components(edges);
    let resolutions: Vec<Resolution> = components
        .par_iter()
        .map(|component| resolve(component, config))
        .collect::<Result<_, _>>()?;

    let mut relationships = Vec::new();
    let mut warnings = Vec::new();
    for resolution in resolutions {
        relationships.extend(resolution.relationships);
        warnings.extend(resolution.warnings);
    }
    relationships.sort_by(|a, b| {
        (&a.owned_id, &a.ultimate_owner_id).cmp(&(&b.owned_id, &b.ultimate_owner_id))
    });
    warnings.sort_by(|a, b| a.entity.cmp(&b.entity));

    Ok(Resolution {
        relationships,
        warnings,
    })
}
