//! Subscription tiers and gated features.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validate::normalize_tier;

/// Subscription tier, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Studio,
}

impl Tier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Studio => "studio",
        }
    }

    /// Parse user input, accepting synonyms such as `premium`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown tiers.
    pub fn parse(input: &str) -> Result<Self> {
        let canonical = normalize_tier(input).map_err(|(input, suggestion)| {
            let mut msg = format!("unknown tier '{input}'");
            if let Some(s) = suggestion {
                msg.push_str(&format!(" (did you mean {s}?)"));
            }
            Error::InvalidArgument(msg)
        })?;
        Ok(Self::from_db(&canonical))
    }

    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "pro" => Self::Pro,
            "studio" => Self::Studio,
            _ => Self::Free,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::Free
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature the paywall can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SummaryGeneration,
    SceneGeneration,
    BeatGeneration,
    FinalExport,
    TranscriptAnalysis,
    ProductionBible,
    LivingStory,
    AutoApply,
}

impl Feature {
    pub const ALL: [Self; 8] = [
        Self::SummaryGeneration,
        Self::SceneGeneration,
        Self::BeatGeneration,
        Self::FinalExport,
        Self::TranscriptAnalysis,
        Self::ProductionBible,
        Self::LivingStory,
        Self::AutoApply,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SummaryGeneration => "summary_generation",
            Self::SceneGeneration => "scene_generation",
            Self::BeatGeneration => "beat_generation",
            Self::FinalExport => "final_export",
            Self::TranscriptAnalysis => "transcript_analysis",
            Self::ProductionBible => "production_bible",
            Self::LivingStory => "living_story",
            Self::AutoApply => "auto_apply",
        }
    }
}

/// The stored subscription for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    pub tier: Tier,
    pub updated_at: i64,
}
