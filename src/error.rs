//! Error taxonomy for route composition and dispatch.
//!
//! Authoring, configuration and validation errors are all returned before
//! any network call is attempted; transport errors surface afterwards, with
//! descriptor-translation failures kept distinct from wire failures.

use thiserror::Error;

use crate::compose::Method;
use crate::merge::VALID_MERGE_STRATEGIES;

#[derive(Error, Debug)]
pub enum RouteError {
    /// A fragment write used a key name reserved by the container.
    #[error("reserved key '{0}' cannot be used in a fragment")]
    ReservedKey(String),
    /// A `_merge_strategy` directive carried an unknown value.
    #[error(
        "invalid merge strategy: '{strategy}'. valid merge strategies: {VALID_MERGE_STRATEGIES:?}"
    )]
    InvalidMergeStrategy { strategy: String },
    /// A hook event name was neither `before-send` nor `after-receive`.
    #[error("invalid hook event: '{0}'. valid events: [\"before-send\", \"after-receive\"]")]
    InvalidEvent(String),
    /// A hook scope name was outside route/method/scenario.
    #[error("invalid hook scope: '{0}'. valid scopes: [\"route\", \"method\", \"scenario\"]")]
    InvalidScope(String),
    /// An HTTP method name could not be parsed.
    #[error("invalid HTTP method: '{0}'")]
    InvalidMethod(String),
    /// A scenario group was requested on a route that declares none.
    #[error("no scenario groups configured on this route")]
    NoScenarioGroups,
    /// The named scenario group is not registered on the route.
    #[error("scenario group '{0}' not registered on this route")]
    UnknownScenarioGroup(String),
    /// The scenario name did not resolve to a registered override.
    #[error("cannot find scenario '{scenario}' in '{group}'")]
    ScenarioNotFound { scenario: String, group: String },
    /// The merged descriptor held keys outside the verb's allow-list.
    #[error("request args contain invalid keys {keys:?} for method '{method}'")]
    InvalidRequestArguments { method: Method, keys: Vec<String> },
    /// No explicit `url` was supplied and the route has no endpoint.
    #[error("request args contain no 'url' and the route has no endpoint")]
    MissingEndpoint,
    /// The endpoint template held a `{name}` with no matching placeholder.
    #[error("no value for URL placeholder '{{{0}}}'")]
    UnresolvedPlaceholder(String),
    /// The named validator is not registered on the route.
    #[error("validator '{0}' not registered on this route")]
    ValidatorNotFound(String),
    /// A validator or introspection call ran before any request completed.
    #[error("no response recorded on this route yet")]
    NoResponse,
    /// A registered validator rejected the response.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The descriptor could not be translated into a transport request.
    #[error("failed to prepare transport arguments: {0}")]
    TransportArgs(String),
    /// The HTTP call itself failed.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response body could not be decoded as requested.
    #[error("malformed response body: {0}")]
    BadResponse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
