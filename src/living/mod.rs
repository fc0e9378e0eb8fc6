//! Living Story: keeps downstream phases consistent with upstream edits.
//!
//! change detection → dependency lookup → regeneration → approval → commit

mod diff;
mod engine;
mod hash;
mod request;

pub use diff::{affected_phases, classify_impact, diff_values};
pub use engine::{EditOutcome, EngineOptions, LivingStoryEngine};
pub use hash::{content_hash, has_changed};
pub use request::RegenerationRequest;
