//! Subscription tier commands.

use super::{open_storage, print_json, resolve_actor};
use crate::cli::PlanCommands;
use crate::error::Result;
use crate::model::Tier;
use crate::paywall::{Entitlements, current_period, generation_limit};
use colored::Colorize;
use std::path::PathBuf;

/// Execute a plan command.
pub fn execute(
    command: &PlanCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);

    match command {
        PlanCommands::Show => {
            let entitlements = Entitlements::load(&storage, &actor)?;
            if json {
                return print_json(&entitlements);
            }
            println!("{} ({})", entitlements.tier.as_str().bold(), entitlements.user_id);
            println!("  Generations: {}", quota(entitlements.generations_used, entitlements.generation_limit));
            println!("  Features:");
            for feature in &entitlements.features {
                println!("    {} {}", "✓".green(), feature.as_str());
            }
            Ok(())
        }
        PlanCommands::Set { tier } => {
            let tier = Tier::parse(tier)?;
            storage.set_tier(&actor, tier, &actor)?;
            if json {
                print_json(&serde_json::json!({ "user_id": actor, "tier": tier }))?;
            } else if !crate::is_silent() {
                println!("Tier set to {} for {actor}", tier.as_str().bold());
            }
            Ok(())
        }
        PlanCommands::Usage => {
            let tier = storage.get_subscription(&actor)?.tier;
            let period = current_period();
            let usage = storage.usage_by_feature(&actor, &period)?;
            let limit = generation_limit(tier);

            if json {
                return print_json(&serde_json::json!({
                    "user_id": actor,
                    "tier": tier,
                    "period": period,
                    "generation_limit": limit,
                    "usage": usage,
                }));
            }
            println!("Usage for {period} ({})", tier.as_str());
            if usage.is_empty() {
                println!("  No usage recorded.");
            }
            for row in &usage {
                println!("  {:<22} {:>5}", row.feature, row.count);
            }
            if let Some(limit) = limit {
                println!("  Generation limit: {limit}");
            }
            Ok(())
        }
    }
}

fn quota(used: i64, limit: Option<i64>) -> String {
    limit.map_or_else(|| format!("{used} (unlimited)"), |limit| format!("{used}/{limit}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_display() {
        assert_eq!(quota(3, Some(10)), "3/10");
        assert_eq!(quota(42, None), "42 (unlimited)");
    }
}
