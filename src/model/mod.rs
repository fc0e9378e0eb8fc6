//! Data models for MUSE.
//!
//! This module contains all domain models:
//! - Phase
//! - StoryProject / PhaseContent
//! - ChangeRecord (Living Story log)
//! - BibleDocument / BibleRule
//! - Transcript
//! - Tier / Feature / Subscription

pub mod bible;
pub mod change;
pub mod phase;
pub mod project;
pub mod subscription;
pub mod transcript;

pub use bible::{BibleDocument, BibleRule, RuleCategory, RuleKind};
pub use change::{ChangeKind, ChangeRecord, ChangeStatus, FieldChange, Impact};
pub use phase::Phase;
pub use project::{PhaseContent, StoryProject};
pub use subscription::{Feature, Subscription, Tier};
pub use transcript::Transcript;
