//! Feature gating and usage limits.
//!
//! Access is a static table keyed by tier. Generation calls are metered per
//! calendar month (`YYYY-MM`, UTC).

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Feature, Tier};
use crate::storage::SqliteStorage;

/// Features that count against the monthly generation limit.
pub const METERED_FEATURES: &[Feature] = &[
    Feature::SummaryGeneration,
    Feature::SceneGeneration,
    Feature::BeatGeneration,
    Feature::LivingStory,
];

/// Lowest tier that includes a feature.
#[must_use]
pub const fn minimum_tier(feature: Feature) -> Tier {
    match feature {
        Feature::SummaryGeneration | Feature::SceneGeneration => Tier::Free,
        Feature::BeatGeneration
        | Feature::FinalExport
        | Feature::TranscriptAnalysis
        | Feature::ProductionBible
        | Feature::LivingStory => Tier::Pro,
        Feature::AutoApply => Tier::Studio,
    }
}

#[must_use]
pub fn has_feature(tier: Tier, feature: Feature) -> bool {
    tier >= minimum_tier(feature)
}

/// Every feature included in a tier.
#[must_use]
pub fn features_for(tier: Tier) -> Vec<Feature> {
    Feature::ALL
        .into_iter()
        .filter(|f| has_feature(tier, *f))
        .collect()
}

/// Monthly generation limit; `None` is unlimited.
#[must_use]
pub const fn generation_limit(tier: Tier) -> Option<i64> {
    match tier {
        Tier::Free => Some(10),
        Tier::Pro => Some(200),
        Tier::Studio => None,
    }
}

/// Maximum number of projects; `None` is unlimited.
#[must_use]
pub const fn project_limit(tier: Tier) -> Option<i64> {
    match tier {
        Tier::Free => Some(3),
        Tier::Pro | Tier::Studio => None,
    }
}

/// Fail with `FEATURE_LOCKED` unless `tier` includes `feature`.
///
/// # Errors
///
/// Returns `FeatureLocked` naming the minimum tier.
pub fn check_feature(tier: Tier, feature: Feature) -> Result<()> {
    if has_feature(tier, feature) {
        return Ok(());
    }
    Err(Error::FeatureLocked {
        feature: feature.as_str().to_string(),
        tier: tier.to_string(),
        required: minimum_tier(feature).to_string(),
    })
}

/// Fail with `USAGE_LIMIT_EXCEEDED` once `used` reaches the tier's limit.
///
/// # Errors
///
/// Returns `UsageLimitExceeded`.
pub fn check_generation_quota(tier: Tier, used: i64) -> Result<()> {
    match generation_limit(tier) {
        Some(limit) if used >= limit => Err(Error::UsageLimitExceeded {
            what: "generations".to_string(),
            used,
            limit,
            tier: tier.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Fail with `USAGE_LIMIT_EXCEEDED` once `count` reaches the project limit.
///
/// # Errors
///
/// Returns `UsageLimitExceeded`.
pub fn check_project_quota(tier: Tier, count: i64) -> Result<()> {
    match project_limit(tier) {
        Some(limit) if count >= limit => Err(Error::UsageLimitExceeded {
            what: "projects".to_string(),
            used: count,
            limit,
            tier: tier.to_string(),
        }),
        _ => Ok(()),
    }
}

/// The current billing period.
#[must_use]
pub fn current_period() -> String {
    chrono::Utc::now().format("%Y-%m").to_string()
}

/// A user's tier and usage for the current period.
#[derive(Debug, Clone, Serialize)]
pub struct Entitlements {
    pub user_id: String,
    pub tier: Tier,
    pub period: String,
    pub generations_used: i64,
    pub generation_limit: Option<i64>,
    pub features: Vec<Feature>,
}

impl Entitlements {
    /// Load a user's entitlements.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription or usage query fails.
    pub fn load(storage: &SqliteStorage, user_id: &str) -> Result<Self> {
        let tier = storage.get_subscription(user_id)?.tier;
        let period = current_period();
        let generations_used = storage.count_usage(user_id, &period, METERED_FEATURES)?;
        debug!(user_id, %tier, generations_used, "Loaded entitlements");

        Ok(Self {
            user_id: user_id.to_string(),
            tier,
            period,
            generations_used,
            generation_limit: generation_limit(tier),
            features: features_for(tier),
        })
    }

    #[must_use]
    pub fn allows(&self, feature: Feature) -> bool {
        has_feature(self.tier, feature)
    }

    /// # Errors
    ///
    /// Returns `FeatureLocked`.
    pub fn require(&self, feature: Feature) -> Result<()> {
        check_feature(self.tier, feature)
    }

    /// Feature check plus quota check, for anything that calls the LLM.
    ///
    /// # Errors
    ///
    /// Returns `FeatureLocked` or `UsageLimitExceeded`.
    pub fn require_generation(&self, feature: Feature) -> Result<()> {
        check_feature(self.tier, feature)?;
        check_generation_quota(self.tier, self.generations_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_table() {
        assert_eq!(
            features_for(Tier::Free),
            vec![Feature::SummaryGeneration, Feature::SceneGeneration]
        );
        assert!(has_feature(Tier::Pro, Feature::LivingStory));
        assert!(!has_feature(Tier::Pro, Feature::AutoApply));
        assert_eq!(features_for(Tier::Studio).len(), Feature::ALL.len());
    }

    #[test]
    fn test_check_feature_names_required_tier() {
        let err = check_feature(Tier::Free, Feature::FinalExport).unwrap_err();
        match err {
            Error::FeatureLocked { required, tier, .. } => {
                assert_eq!(required, "pro");
                assert_eq!(tier, "free");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_feature(Tier::Studio, Feature::AutoApply).is_ok());
    }

    #[test]
    fn test_generation_quota() {
        assert!(check_generation_quota(Tier::Free, 9).is_ok());
        assert!(matches!(
            check_generation_quota(Tier::Free, 10),
            Err(Error::UsageLimitExceeded { limit: 10, .. })
        ));
        assert!(check_generation_quota(Tier::Pro, 199).is_ok());
        assert!(check_generation_quota(Tier::Studio, 1_000_000).is_ok());
    }

    #[test]
    fn test_project_quota() {
        assert!(check_project_quota(Tier::Free, 2).is_ok());
        assert!(check_project_quota(Tier::Free, 3).is_err());
        assert!(check_project_quota(Tier::Pro, 500).is_ok());
    }

    #[test]
    fn test_current_period_format() {
        let period = current_period();
        assert_eq!(period.len(), 7);
        assert_eq!(&period[4..5], "-");
    }

    #[test]
    fn test_entitlements_count_metered_usage() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let period = current_period();
        for feature in [Feature::SummaryGeneration, Feature::LivingStory, Feature::FinalExport] {
            storage.record_usage("alice", feature, None, &period, "alice").unwrap();
        }

        let ent = Entitlements::load(&storage, "alice").unwrap();
        assert_eq!(ent.tier, Tier::Free);
        assert_eq!(ent.generations_used, 2);
        assert_eq!(ent.generation_limit, Some(10));
        assert!(ent.require_generation(Feature::SceneGeneration).is_ok());
        assert!(ent.require(Feature::ProductionBible).is_err());
    }
}
