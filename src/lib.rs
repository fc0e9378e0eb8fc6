//! MUSE - AI-assisted story development
//!
//! This crate provides the core functionality for the `muse` CLI tool: a
//! four-phase story workflow (summary, scenes, beats, export) where every
//! edit is propagated downstream as reviewable change proposals.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (StoryProject, PhaseContent, ChangeRecord, BibleRule)
//! - [`storage`] - SQLite database layer
//! - [`living`] - Living Story engine: diffing, impact and regeneration
//! - [`llm`] - LLM providers (Anthropic, Ollama)
//! - [`workflow`] - Phase generation and gating
//! - [`bible`] - Production bible rule extraction and validation
//! - [`paywall`] - Subscription tiers and usage quotas
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bible;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod living;
pub mod llm;
pub mod model;
pub mod paywall;
pub mod storage;
pub mod transcript;
pub mod validate;
pub mod workflow;

pub use error::{Error, Result};

/// Global silent mode flag for `--silent` output.
///
/// When set, create/mutate commands print only the ID instead of full
/// output.
pub static SILENT: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if silent mode is active.
#[inline]
pub fn is_silent() -> bool {
    SILENT.load(std::sync::atomic::Ordering::Relaxed)
}
