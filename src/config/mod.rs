//! Configuration management.
//!
//! MUSE keeps a single database at `~/.muse/data/muse.db` and user settings
//! in `~/.muse/config.json`.

mod settings;

pub use settings::{
    config_path, load_config, resolve_auto_apply, resolve_llm_settings, resolve_ollama_endpoint,
    LivingStorySettings, LlmSettings, MuseConfig,
};

use std::path::{Path, PathBuf};

/// Get the global MUSE directory (`~/.muse`).
#[must_use]
pub fn global_muse_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".muse"))
}

/// Check if test mode is enabled.
///
/// Set `MUSE_TEST_DB=1` (or any non-empty value other than `0`/`false`) to
/// redirect all database operations to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("MUSE_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

/// Get the test database path (`~/.muse/test/muse.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_muse_dir().map(|dir| dir.join("test").join("muse.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag, which also reads `MUSE_DB`)
/// 2. `MUSE_TEST_DB` → test database
/// 3. `~/.muse/data/muse.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    global_muse_dir().map(|dir| dir.join("data").join("muse.db"))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `MUSE_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("MUSE_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

/// Interpret an environment flag value.
pub(crate) fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        assert!(!default_actor().is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/muse.db");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_muse_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("test"));
        assert!(test.ends_with("muse.db"));
        assert_ne!(global.join("data").join("muse.db"), test);
    }

    #[test]
    fn test_truthy_values() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
    }
}
