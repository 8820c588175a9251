//! The triage pipeline.
//!
//! Per-email stages are pure and run concurrently; batch-level stages
//! (conflict resolution, queue assembly) are barriers. Drafting is the
//! only stage that suspends on I/O.

pub mod batch;
pub mod clarify;
pub mod drafter;
pub mod edge;

pub use batch::TriagePipeline;
pub use clarify::ClarificationDetector;
pub use drafter::{DraftSource, Drafter};
pub use edge::{BatchMode, EdgeResolver, EscalationEvent};
