//! Component partitioning tests.

use flatstake_model::OwnershipEdge;
use flatstake_resolve::{
    resolve, resolve_partitioned, weakly_connected_components, ResolutionError, ResolverConfig,
};

fn edge(owner: &str, owned: &str, percentage: f64) -> OwnershipEdge {
    OwnershipEdge {
        owner_id: owner.to_string(),
        owned_id: owned.to_string(),
        percentage,
        owner_type: "Client".to_string(),
        owned_type: "Fund".to_string(),
    }
}

#[test]
fn disjoint_books_split_into_components() {
    let edges = vec![
        edge("A", "B", 0.5),
        edge("X", "Y", 1.0),
        edge("B", "C", 0.5),
        edge("Y", "Z", 0.4),
    ];

    let components = weakly_connected_components(&edges);
    assert_eq!(components.len(), 2);
    // Ordered by first appearance, input order kept inside.
    assert_eq!(components[0], vec![edge("A", "B", 0.5), edge("B", "C", 0.5)]);
    assert_eq!(components[1], vec![edge("X", "Y", 1.0), edge("Y", "Z", 0.4)]);
}

#[test]
fn a_shared_owned_entity_joins_components() {
    // Direction is ignored: two owners of one fund are weakly connected.
    let edges = vec![edge("H1", "F1", 0.5), edge("H2", "F1", 0.5)];

    let components = weakly_connected_components(&edges);
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].len(), 2);
}

#[test]
fn partitioned_resolution_matches_whole_graph() {
    let edges = vec![
        edge("A", "B", 0.5),
        edge("B", "C", 0.7),
        edge("X", "Y", 0.9),
        edge("Y", "Z", 0.2),
        edge("X", "Z", 0.1),
    ];
    let config = ResolverConfig::default();

    let whole = resolve(&edges, &config).expect("acyclic");
    let split = resolve_partitioned(&edges, &config).expect("acyclic");
    assert_eq!(whole, split);
}

#[test]
fn component_failures_propagate() {
    // One healthy component, one with a fully compounding cycle.
    let edges = vec![
        edge("A", "B", 0.5),
        edge("X", "P", 0.5),
        edge("P", "Q", 1.0),
        edge("Q", "P", 1.0),
    ];

    let err = resolve_partitioned(&edges, &ResolverConfig::default()).unwrap_err();
    match err {
        ResolutionError::DepthCapExceeded { cycle, .. } => {
            assert!(cycle.contains(&"P".to_string()));
            assert!(cycle.contains(&"Q".to_string()));
        }
    }
}

#[test]
fn cycle_warnings_survive_the_merge() {
    let edges = vec![
        edge("A", "B", 0.5),
        edge("B", "A", 0.5),
        edge("X", "Y", 1.0),
    ];

    let resolution =
        resolve_partitioned(&edges, &ResolverConfig::default()).expect("terminates");
    let warned: Vec<&str> = resolution
        .warnings
        .iter()
        .map(|w| w.entity.as_str())
        .collect();
    assert_eq!(warned, vec!["A", "B"]);
}
