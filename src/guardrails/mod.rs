//! Post-draft policy checks.
//!
//! Guardrails read generated content and recipient lists and may force
//! approval or block sending entirely. They never send anything.

pub mod domains;
pub mod pii;
pub mod reply_all;
pub mod tone;

pub use domains::DomainChecker;
pub use pii::{PiiDetector, PiiKind};
pub use reply_all::{ReplyAllAnalysis, ReplyAllChecker};
pub use tone::ToneEnforcer;
