//! Per-email classification stages.
//!
//! Pure functions over [`EmailMetadata`](crate::model::EmailMetadata) —
//! no I/O, no clocks except the injected `now`. Stage order within one
//! email is strict: sender → intent → spam/category → priority.

pub mod category;
pub mod intent;
pub mod priority;
pub mod sender;

pub use category::{Categorizer, SpamFilter};
pub use intent::IntentScanner;
pub use priority::PriorityScorer;
pub use sender::SenderClassifier;
