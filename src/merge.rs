//! Recursive fragment merge engine.
//!
//! Fragments are folded strictly left-to-right; each later fragment has
//! higher priority. Object values may embed a `_merge_strategy` directive
//! choosing how they combine with the same-keyed object from a lower
//! priority layer. The directive key never survives into the output, at any
//! depth.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::RouteError;

/// Reserved directive key inside object-valued entries.
pub const MERGE_STRATEGY_KEY: &str = "_merge_strategy";

pub const VALID_MERGE_STRATEGIES: &[&str] = &["deep_merge", "replace", "remove"];

/// How an object value combines with the same-keyed object below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Recursively merge keys (the default when no directive is present).
    #[default]
    DeepMerge,
    /// Discard the lower-priority object and use this one verbatim.
    Replace,
    /// Delete the key from the merged result entirely.
    Remove,
}

impl MergeStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeepMerge => "deep_merge",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deep_merge" => Ok(Self::DeepMerge),
            "replace" => Ok(Self::Replace),
            "remove" => Ok(Self::Remove),
            other => Err(RouteError::InvalidMergeStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold an ordered list of fragments into one mapping.
///
/// Order encodes priority: route, then method, then scenario, then the
/// call-site fragment. An empty slice yields an empty mapping; a single
/// fragment comes back with its directives stripped.
///
/// # Errors
///
/// Returns [`RouteError::InvalidMergeStrategy`] when a directive holds a
/// value outside `deep_merge`/`replace`/`remove`. There is no silent
/// fallback.
pub fn merge(fragments: &[Map<String, Value>]) -> Result<Map<String, Value>, RouteError> {
    let mut merged = Map::new();
    for fragment in fragments {
        merge_into(&mut merged, fragment)?;
    }
    Ok(merged)
}

fn merge_into(
    merged: &mut Map<String, Value>,
    fragment: &Map<String, Value>,
) -> Result<(), RouteError> {
    for (key, value) in fragment {
        if key == MERGE_STRATEGY_KEY {
            continue;
        }
        let both_objects =
            value.is_object() && merged.get(key).is_some_and(serde_json::Value::is_object);
        if both_objects {
            let mut incoming = value
                .as_object()
                .cloned()
                .unwrap_or_default();
            let strategy = take_strategy(&mut incoming)?;
            match strategy {
                MergeStrategy::DeepMerge => {
                    let Some(accumulated) = merged.get_mut(key).and_then(Value::as_object_mut)
                    else {
                        continue;
                    };
                    merge_into(accumulated, &incoming)?;
                }
                MergeStrategy::Replace => {
                    let mut replacement = Value::Object(incoming);
                    strip_directives(&mut replacement);
                    merged.insert(key.clone(), replacement);
                }
                MergeStrategy::Remove => {
                    merged.remove(key);
                }
            }
        } else {
            // Scalar replace: the higher-priority value wins outright,
            // except an explicit null never clobbers an existing value.
            if value.is_null() && merged.contains_key(key) {
                continue;
            }
            let mut value = value.clone();
            strip_directives(&mut value);
            merged.insert(key.clone(), value);
        }
    }
    Ok(())
}

fn take_strategy(object: &mut Map<String, Value>) -> Result<MergeStrategy, RouteError> {
    match object.remove(MERGE_STRATEGY_KEY) {
        None => Ok(MergeStrategy::DeepMerge),
        Some(Value::String(name)) => name.parse(),
        Some(other) => Err(RouteError::InvalidMergeStrategy {
            strategy: other.to_string(),
        }),
    }
}

/// Remove `_merge_strategy` keys at every depth.
fn strip_directives(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(MERGE_STRATEGY_KEY);
            for nested in map.values_mut() {
                strip_directives(nested);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_directives(item);
            }
        }
        _ => {}
    }
}
