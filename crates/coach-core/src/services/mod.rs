//! Background enrichment services.
//!
//! Each service owns one job kind's body: gather inputs, call the worker under
//! its retry policy, validate, persist. Marker handling and spawning live in
//! the orchestrator so every kind goes through the same state machine.

mod evaluation;
mod followup;
mod metadata;
mod nudges;
mod summary;

pub use evaluation::EvaluationService;
pub use followup::FollowupService;
pub use metadata::MetadataService;
pub use nudges::NudgeService;
pub use summary::SummaryService;
