//! Descriptor finalization: URL templating and allow-list validation.
//!
//! The merged mapping leaves the merge engine as raw configuration; this
//! module turns it into a dispatchable descriptor. All failures here happen
//! before any network call.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::RouteError;

/// Key extracted before validation and used to fill `{name}` tokens in the
/// URL template.
pub const URL_PLACEHOLDERS_KEY: &str = "url_placeholders";

/// Transport parameters every verb accepts.
pub const ALLOWED_COMMON_PARAMS: &[&str] = &[
    "url",
    "headers",
    "cookies",
    "auth",
    "timeout",
    "allow_redirects",
    "follow_redirects",
    "proxies",
    "verify",
    "stream",
    "cert",
    "extensions",
];

/// HTTP verbs a route can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Parameters this verb accepts on top of [`ALLOWED_COMMON_PARAMS`].
    #[must_use]
    pub fn allowed_params(self) -> &'static [&'static str] {
        match self {
            Self::Get | Self::Head | Self::Options => &["params"],
            Self::Post | Self::Put | Self::Patch => &["data", "json", "files", "content"],
            Self::Delete => &[],
        }
    }

    /// Whether this verb carries a request body.
    #[must_use]
    pub(crate) fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl FromStr for Method {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(RouteError::InvalidMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final, validated request configuration handed to the transport.
///
/// Before-send hooks receive it mutably and may adjust entries in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Descriptor(Map<String, Value>);

impl Deref for Descriptor {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Descriptor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Descriptor {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.0).map_err(|_| std::fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// Turn the merged mapping into a dispatch URL and validated descriptor.
///
/// Placeholders are extracted first; an explicit `url` entry wins verbatim
/// and skips templating, otherwise the URL is the base URL plus the route
/// endpoint with `{name}` tokens substituted.
///
/// # Errors
///
/// - [`RouteError::MissingEndpoint`] with no `url` key and an empty endpoint.
/// - [`RouteError::UnresolvedPlaceholder`] for an unbound `{name}` token.
/// - [`RouteError::InvalidRequestArguments`] for keys outside the verb's
///   allow-list.
pub(crate) fn finalize(
    mut merged: Map<String, Value>,
    method: Method,
    base_url: &str,
    endpoint: &str,
) -> Result<(String, Descriptor), RouteError> {
    let placeholders = match merged.remove(URL_PLACEHOLDERS_KEY) {
        Some(Value::Object(map)) => map,
        Some(_) | None => Map::new(),
    };

    let url = match merged.remove("url") {
        Some(Value::String(explicit)) => explicit,
        Some(other) => other.to_string(),
        None => {
            if endpoint.is_empty() {
                return Err(RouteError::MissingEndpoint);
            }
            interpolate(&format!("{base_url}{endpoint}"), &placeholders)?
        }
    };

    validate_keys(&merged, method)?;
    debug!("request args are valid, method: {method}, url: {url}");
    Ok((url, Descriptor(merged)))
}

fn validate_keys(merged: &Map<String, Value>, method: Method) -> Result<(), RouteError> {
    let invalid: Vec<String> = merged
        .keys()
        .filter(|key| {
            !ALLOWED_COMMON_PARAMS.contains(&key.as_str())
                && !method.allowed_params().contains(&key.as_str())
        })
        .cloned()
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(RouteError::InvalidRequestArguments {
            method,
            keys: invalid,
        })
    }
}

/// Substitute `{name}` tokens from the placeholder mapping. String values
/// are inserted bare; other JSON values use their compact rendering.
fn interpolate(template: &str, placeholders: &Map<String, Value>) -> Result<String, RouteError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((literal, after_brace)) = rest.split_once('{') {
        out.push_str(literal);
        let Some((name, tail)) = after_brace.split_once('}') else {
            // Unterminated brace: emit the remainder verbatim.
            out.push('{');
            out.push_str(after_brace);
            return Ok(out);
        };
        let value = placeholders
            .get(name)
            .ok_or_else(|| RouteError::UnresolvedPlaceholder(name.to_string()))?;
        match value {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    #[rstest]
    #[case::get(Method::Get, &["params"])]
    #[case::delete(Method::Delete, &[])]
    #[case::post(Method::Post, &["data", "json", "files", "content"])]
    fn verb_allow_lists(#[case] method: Method, #[case] want: &[&str]) {
        assert_eq!(method.allowed_params(), want);
    }

    #[test]
    fn explicit_url_wins_and_skips_templating() {
        let merged = object(json!({"url": "https://other.test/x", "params": {"a": 1}}));
        let (url, descriptor) =
            finalize(merged, Method::Get, "https://api.test", "/users/{id}").expect("finalize");
        assert_eq!(url, "https://other.test/x");
        assert!(!descriptor.contains_key("url"));
    }

    #[test]
    fn placeholders_fill_the_endpoint_template() {
        let merged = object(json!({"url_placeholders": {"id": 42, "tab": "posts"}}));
        let (url, descriptor) =
            finalize(merged, Method::Get, "https://api.test", "/users/{id}/{tab}")
                .expect("finalize");
        assert_eq!(url, "https://api.test/users/42/posts");
        assert!(!descriptor.contains_key(URL_PLACEHOLDERS_KEY));
    }

    #[test]
    fn unterminated_brace_passes_through_verbatim() {
        let (url, _descriptor) = finalize(Map::new(), Method::Get, "https://api.test", "/odd{path")
            .expect("finalize");
        assert_eq!(url, "https://api.test/odd{path");
    }

    #[test]
    fn unbound_placeholder_fails() {
        let merged = Map::new();
        let err = finalize(merged, Method::Get, "https://api.test", "/users/{id}")
            .expect_err("unresolved");
        assert!(matches!(err, RouteError::UnresolvedPlaceholder(name) if name == "id"));
    }

    #[test]
    fn missing_endpoint_without_explicit_url_fails() {
        let err = finalize(Map::new(), Method::Get, "https://api.test", "")
            .expect_err("missing endpoint");
        assert!(matches!(err, RouteError::MissingEndpoint));
    }

    #[test]
    fn disallowed_keys_fail_naming_key_and_verb() {
        let merged = object(json!({"params": {"a": 1}, "json": {"b": 2}}));
        let err = finalize(merged, Method::Get, "https://api.test", "/ping")
            .expect_err("json not allowed on GET");
        match err {
            RouteError::InvalidRequestArguments { method, keys } => {
                assert_eq!(method, Method::Get);
                assert_eq!(keys, ["json"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<Method>().expect("parse"), Method::Get);
        assert_eq!("PATCH".parse::<Method>().expect("parse"), Method::Patch);
        assert!(matches!(
            "TRACE".parse::<Method>(),
            Err(RouteError::InvalidMethod(name)) if name == "TRACE"
        ));
    }
}
