//! Fragment builder: an ordered, nested request-configuration mapping.
//!
//! A [`Fragment`] is the authoring surface for one configuration layer
//! (route, method, scenario or call-site). Dotted paths auto-vivify
//! intermediate objects, so deeply nested values can be set without
//! declaring the levels above them first. Entry order is preserved, which
//! keeps rendered fragments stable.

use serde_json::{Map, Value};

use crate::RouteError;
use crate::merge::{MERGE_STRATEGY_KEY, MergeStrategy};

/// Key names that collide with enumeration primitives and are rejected at
/// write time rather than at conversion time.
pub const RESERVED_KEYS: &[&str] = &["items", "keys"];

/// One layer of request configuration, built up as a nested JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    entries: Map<String, Value>,
}

impl Fragment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object as a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] if any object at any depth holds
    /// a reserved key name, and [`RouteError::TransportArgs`] is never
    /// produced here; a non-object root is rejected as a reserved-key error
    /// on the empty path.
    pub fn from_value(value: Value) -> Result<Self, RouteError> {
        let Value::Object(entries) = value else {
            return Err(RouteError::ReservedKey(
                "<fragment root must be a JSON object>".to_string(),
            ));
        };
        check_reserved(&entries)?;
        Ok(Self { entries })
    }

    /// Set a value at a dotted path, creating intermediate objects.
    ///
    /// A scalar found at an intermediate level is replaced by an object so
    /// the write can proceed. Writing a plain JSON object stores it as a
    /// nested container.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] if any path segment, or any key
    /// inside an object value, is a reserved name.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<&mut Self, RouteError> {
        let value = value.into();
        if let Value::Object(obj) = &value {
            check_reserved(obj)?;
        }
        *self.entry(path)? = value;
        Ok(self)
    }

    /// Get-or-create accessor: reading an unset path materializes an empty
    /// object node at every missing level.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] for reserved path segments.
    pub fn entry(&mut self, path: &str) -> Result<&mut Value, RouteError> {
        let mut segments = split_path(path)?;
        let last = segments.pop().unwrap_or_default();
        let mut current = &mut self.entries;
        for segment in segments {
            let slot = current
                .entry(segment)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = slot
                .as_object_mut()
                .unwrap_or_else(|| unreachable!("slot was just made an object"));
        }
        Ok(current
            .entry(last)
            .or_insert_with(|| Value::Object(Map::new())))
    }

    /// Non-vivifying read of a dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current: &Value = &Value::Null;
        for (idx, segment) in path.split('.').enumerate() {
            let map = if idx == 0 {
                &self.entries
            } else {
                current.as_object()?
            };
            current = map.get(segment)?;
        }
        Some(current)
    }

    /// Remove the value at a dotted path, returning it if present.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        match path.rsplit_once('.') {
            None => self.entries.remove(path),
            Some((parent, last)) => self.get_mut_object(parent)?.remove(last),
        }
    }

    fn get_mut_object(&mut self, path: &str) -> Option<&mut Map<String, Value>> {
        let mut current = &mut self.entries;
        for segment in path.split('.') {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        Some(current)
    }

    /// Attach a merge directive to the object at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] for reserved path segments.
    pub fn strategy(
        &mut self,
        path: &str,
        strategy: MergeStrategy,
    ) -> Result<&mut Self, RouteError> {
        let slot = self.entry(path)?;
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Some(obj) = slot.as_object_mut() {
            obj.insert(
                MERGE_STRATEGY_KEY.to_string(),
                Value::String(strategy.as_str().to_string()),
            );
        }
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy another mapping's top-level entries into this fragment. Keys
    /// are assumed to have been through reserved-key validation already.
    pub(crate) fn extend_from(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Unwrap into the plain ordered mapping consumed by the merge engine.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.entries).map_err(|_| std::fmt::Error)?;
        f.write_str(&rendered)
    }
}

fn split_path(path: &str) -> Result<Vec<String>, RouteError> {
    path.split('.')
        .map(|segment| {
            if RESERVED_KEYS.contains(&segment) {
                Err(RouteError::ReservedKey(segment.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

fn check_reserved(entries: &Map<String, Value>) -> Result<(), RouteError> {
    for (key, value) in entries {
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(RouteError::ReservedKey(key.clone()));
        }
        if let Value::Object(nested) = value {
            check_reserved(nested)?;
        }
    }
    Ok(())
}
