//! Content hashing for change detection.

use sha2::{Digest, Sha256};

/// SHA-256 of the canonical JSON form of a phase document.
///
/// `serde_json` keeps object keys sorted, so equal documents serialize to
/// the same text regardless of the key order they were written in.
#[must_use]
pub fn content_hash(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `current_hash` differs from the stored hash (or nothing is stored).
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_deterministic() {
        let a = content_hash(&json!({"logline": "x", "genre": "noir"}));
        let b = content_hash(&serde_json::from_str(r#"{"genre":"noir","logline":"x"}"#).unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash(&json!({"a": 1})), content_hash(&json!({"a": 2})));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc", None));
        assert!(has_changed("abc", Some("xyz")));
        assert!(!has_changed("abc", Some("abc")));
    }
}
