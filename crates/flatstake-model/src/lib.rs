//! Ownership data model and edge loader
//!
//! This crate defines the canonical ownership records exchanged with the
//! rest of the toolkit and normalizes raw tabular rows into a validated,
//! deduplicated edge set. It is the leaf of the pipeline: the resolver
//! crate consumes its output, and all file/CSV/Excel plumbing lives in
//! the callers.

pub mod edge;
pub mod loader;

pub use edge::{Name, OwnershipEdge, RawOwnershipRecord, ResolvedOwnership};
pub use loader::{
    load_edges, ColumnSpec, DataIntegrityError, RecordMapping, OWNERSHIP_SUM_TOLERANCE,
    UNDER_OWNED_FLOOR,
};
