//! Layer stores
//!
//! One typed store per memory layer (§3), each a thin wrapper over
//! [`crate::storage::StorageBackend`] that owns its entity's
//! (de)serialization and layer-specific invariants.

pub mod episodic;
pub mod graph;
pub mod meta;
pub mod procedural;
pub mod prospective;
pub mod semantic;
pub mod working_memory;

pub use episodic::{EpisodicStore, IngestOutcome, NewEpisodicEvent};
pub use graph::{GraphDirection, GraphStore};
pub use meta::{Contradiction, GapReport, MetaStore};
pub use procedural::{ProcedureExecutionResult, ProceduralStore};
pub use prospective::{ConflictKind, ProspectiveStore, TaskConflict, TaskHierarchyNode};
pub use semantic::{SemanticStore, UpsertOutcome};
pub use working_memory::{AdmitOutcome, PromotedTo, RoutingTarget, WorkingMemoryController};
