//! Transitive ownership resolver
//!
//! Takes the validated edge set produced by `flatstake-model` and
//! computes, for every pair of entities connected by one or more
//! ownership chains, the aggregate effective ownership percentage:
//! percentages multiply along a chain and add across parallel chains.
//!
//! The closure is an explicit fixed-point iteration with a depth cap
//! and first-class cycle handling, replacing the implicit termination
//! behavior of the dataframe self-join it descends from. Each run is
//! single-threaded and builds its state from scratch; the optional
//! [`partition`] module resolves weakly-connected components in
//! parallel when the caller wants it.

pub mod interner;
pub mod partition;
pub mod resolver;

pub use interner::{EntityId, EntityInterner};
pub use partition::{resolve_partitioned, weakly_connected_components};
pub use resolver::{resolve, CycleWarning, Resolution, ResolutionError, ResolverConfig};
