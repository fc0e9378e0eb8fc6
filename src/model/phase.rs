//! Workflow phases.
//!
//! A story moves through four sequential phases. Each later phase is
//! derived from the ones before it, which is what the Living Story engine
//! uses to decide what needs regenerating after an edit.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validate::normalize_phase;

/// One of the four workflow phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// One-line summary (logline, premise, protagonist).
    Summary,
    /// Scene structure.
    Scenes,
    /// Beat breakdown per scene.
    Beats,
    /// Final export.
    Export,
}

impl Phase {
    /// All phases in workflow order.
    pub const ALL: [Self; 4] = [Self::Summary, Self::Scenes, Self::Beats, Self::Export];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Scenes => "scenes",
            Self::Beats => "beats",
            Self::Export => "export",
        }
    }

    /// 1-based position in the workflow.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Summary => 1,
            Self::Scenes => 2,
            Self::Beats => 3,
            Self::Export => 4,
        }
    }

    /// Parse user input (name, number, or synonym).
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` with the closest suggestion when nothing matches.
    pub fn parse(input: &str) -> Result<Self> {
        let canonical = normalize_phase(input)
            .map_err(|(input, suggestion)| Error::InvalidPhase { input, suggestion })?;
        Ok(Self::from_db(&canonical))
    }

    /// Parse a value read back from the database.
    ///
    /// Stored values are always canonical; anything else falls back to summary.
    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "scenes" => Self::Scenes,
            "beats" => Self::Beats,
            "export" => Self::Export,
            _ => Self::Summary,
        }
    }

    /// The phase after this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Summary => Some(Self::Scenes),
            Self::Scenes => Some(Self::Beats),
            Self::Beats => Some(Self::Export),
            Self::Export => None,
        }
    }

    /// The phase before this one, if any.
    #[must_use]
    pub const fn previous(&self) -> Option<Self> {
        match self {
            Self::Summary => None,
            Self::Scenes => Some(Self::Summary),
            Self::Beats => Some(Self::Scenes),
            Self::Export => Some(Self::Beats),
        }
    }

    /// Phases whose content is derived from this one.
    ///
    /// This is the static dependency table, in workflow order.
    #[must_use]
    pub const fn dependents(&self) -> &'static [Self] {
        match self {
            Self::Summary => &[Self::Scenes, Self::Beats, Self::Export],
            Self::Scenes => &[Self::Beats, Self::Export],
            Self::Beats => &[Self::Export],
            Self::Export => &[],
        }
    }

    /// Phases this one is derived from, direct predecessor first.
    #[must_use]
    pub fn upstream(&self) -> Vec<Self> {
        let mut phases: Vec<Self> = Self::ALL
            .into_iter()
            .filter(|p| p.dependents().contains(self))
            .collect();
        phases.reverse();
        phases
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_numbers_and_synonyms() {
        assert_eq!(Phase::parse("summary").unwrap(), Phase::Summary);
        assert_eq!(Phase::parse("3").unwrap(), Phase::Beats);
        assert_eq!(Phase::parse("structure").unwrap(), Phase::Scenes);
        assert_eq!(Phase::parse("Final").unwrap(), Phase::Export);
    }

    #[test]
    fn test_parse_unknown_is_invalid_phase() {
        let err = Phase::parse("scnes").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPhase { ref suggestion, .. } if suggestion.as_deref() == Some("scenes")
        ));
    }

    #[test]
    fn test_ordering_and_navigation() {
        assert!(Phase::Summary < Phase::Scenes);
        assert!(Phase::Beats < Phase::Export);
        assert_eq!(Phase::Summary.next(), Some(Phase::Scenes));
        assert_eq!(Phase::Export.next(), None);
        assert_eq!(Phase::Summary.previous(), None);
        assert_eq!(Phase::Export.previous(), Some(Phase::Beats));
    }

    #[test]
    fn test_dependency_table() {
        assert_eq!(
            Phase::Summary.dependents(),
            &[Phase::Scenes, Phase::Beats, Phase::Export]
        );
        assert_eq!(Phase::Beats.dependents(), &[Phase::Export]);
        assert!(Phase::Export.dependents().is_empty());
    }

    #[test]
    fn test_upstream_is_reverse_of_dependents() {
        assert!(Phase::Summary.upstream().is_empty());
        assert_eq!(Phase::Scenes.upstream(), vec![Phase::Summary]);
        assert_eq!(
            Phase::Export.upstream(),
            vec![Phase::Beats, Phase::Scenes, Phase::Summary]
        );
    }
}
