//! Mark-and-sweep garbage collection for the Cairn object store.
//!
//! Roots are the reference targets plus any pinned addresses, captured once
//! per cycle. Before sweeping, the references are read again and anything
//! reachable from a root that appeared in the meantime is withdrawn from the
//! deletion candidates.

pub mod collector;
pub mod error;

pub use collector::{
    DiagnosticKind, GarbageCollector, GcDiagnostic, GcOptions, GcPhase, GcReport,
};
pub use error::{GcError, GcResult};
