//! Deep JSON comparison and impact classification.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::model::{ChangeKind, FieldChange, Impact, Phase};

/// Keys whose modification changes the story itself, not just its wording.
const SIGNIFICANT_KEYS: &[&str] = &[
    "title",
    "logline",
    "premise",
    "protagonist",
    "antagonist",
    "genre",
    "ending",
    "theme",
];

const ROOT: &str = "$";

/// Compare two phase documents.
///
/// Object keys are visited in sorted order and arrays by index, so the
/// result is deterministic.
#[must_use]
pub fn diff_values(old: &Value, new: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    match (old, new) {
        (Value::Null, Value::Null) => {}
        (Value::Null, _) => changes.push(added(ROOT.to_string(), new)),
        (_, Value::Null) => changes.push(removed(ROOT.to_string(), old)),
        _ => walk(ROOT, old, new, &mut changes),
    }
    changes
}

fn walk(path: &str, old: &Value, new: &Value, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = key_path(path, key);
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => walk(&child, x, y, out),
                    (Some(x), None) => out.push(removed(child, x)),
                    (None, Some(y)) => out.push(added(child, y)),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for i in 0..a.len().max(b.len()) {
                let child = format!("{path}[{i}]");
                match (a.get(i), b.get(i)) {
                    (Some(x), Some(y)) => walk(&child, x, y, out),
                    (Some(x), None) => out.push(removed(child, x)),
                    (None, Some(y)) => out.push(added(child, y)),
                    (None, None) => {}
                }
            }
        }
        _ if old == new => {}
        _ => out.push(FieldChange {
            path: path.to_string(),
            kind: ChangeKind::Modified,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
    }
}

fn key_path(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn added(path: String, value: &Value) -> FieldChange {
    FieldChange {
        path,
        kind: ChangeKind::Added,
        old: None,
        new: Some(value.clone()),
    }
}

fn removed(path: String, value: &Value) -> FieldChange {
    FieldChange {
        path,
        kind: ChangeKind::Removed,
        old: Some(value.clone()),
        new: None,
    }
}

/// Object keys named along a path, e.g. `scenes[2].title` → `scenes`, `title`.
fn path_keys(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
        .map(|segment| segment.split('[').next().unwrap_or(segment))
        .filter(|key| !key.is_empty() && *key != ROOT)
}

/// Decide how disruptive a set of changes is.
///
/// Major when the whole document changed, when anything was added or
/// removed, or when a significant key was modified.
#[must_use]
pub fn classify_impact(changes: &[FieldChange]) -> Impact {
    let major = changes.iter().any(|change| {
        change.path == ROOT
            || change.kind != ChangeKind::Modified
            || path_keys(&change.path).any(|key| SIGNIFICANT_KEYS.contains(&key))
    });
    if major { Impact::Major } else { Impact::Minor }
}

/// Phases that must be reconsidered after `source` changes.
#[must_use]
pub fn affected_phases(source: Phase) -> &'static [Phase] {
    source.dependents()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_values_have_no_changes() {
        let doc = json!({"logline": "x", "scenes": [1, 2]});
        assert!(diff_values(&doc, &doc.clone()).is_empty());
    }

    #[test]
    fn test_null_to_value_is_root_add() {
        let changes = diff_values(&Value::Null, &json!({"logline": "x"}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "$");
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_nested_paths_and_sorted_keys() {
        let old = json!({
            "scenes": [{"title": "Dock", "mood": "calm"}, {"title": "Storm"}],
            "b": 1,
            "a": 1
        });
        let new = json!({
            "scenes": [{"title": "Dock", "mood": "tense"}],
            "b": 2,
            "c": true
        });
        let changes = diff_values(&old, &new);
        let summary: Vec<(&str, ChangeKind)> =
            changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();

        assert_eq!(
            summary,
            vec![
                ("a", ChangeKind::Removed),
                ("b", ChangeKind::Modified),
                ("c", ChangeKind::Added),
                ("scenes[0].mood", ChangeKind::Modified),
                ("scenes[1]", ChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn test_type_mismatch_is_single_modification() {
        let changes = diff_values(&json!({"beats": "todo"}), &json!({"beats": ["open"]}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "beats");
    }

    #[test]
    fn test_classify_impact() {
        let minor = diff_values(&json!({"notes": "a"}), &json!({"notes": "b"}));
        assert_eq!(classify_impact(&minor), Impact::Minor);

        let logline = diff_values(&json!({"logline": "a"}), &json!({"logline": "b"}));
        assert_eq!(classify_impact(&logline), Impact::Major);

        let nested = diff_values(
            &json!({"protagonist": {"name": "Ann"}}),
            &json!({"protagonist": {"name": "Bea"}}),
        );
        assert_eq!(classify_impact(&nested), Impact::Major);

        let added = diff_values(&json!({"scenes": []}), &json!({"scenes": [{"x": 1}]}));
        assert_eq!(classify_impact(&added), Impact::Major);

        assert_eq!(classify_impact(&[]), Impact::Minor);
    }

    #[test]
    fn test_affected_phases() {
        assert_eq!(affected_phases(Phase::Scenes), &[Phase::Beats, Phase::Export]);
        assert!(affected_phases(Phase::Export).is_empty());
    }
}
