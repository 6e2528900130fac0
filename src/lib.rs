//! Declarative, layered HTTP request routes.
//!
//! A route is declared as overridable configuration fragments — route-level
//! defaults, per-verb defaults, named scenario overrides and call-time
//! arguments — which are merged into one validated request descriptor and
//! dispatched through a pluggable transport.
//!
//! ```no_run
//! use routekit::{Config, Fragment, Method, Route};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), routekit::RouteError> {
//! let mut route = Route::builder(Config::new("https://api.example.com"), "/users/{id}")
//!     .route(|fragment, _hooks| {
//!         fragment.set("params.verbose", true)?;
//!         Ok(())
//!     })
//!     .method_defaults(Method::Get, json!({"params": {"page": 1}}))?
//!     .build();
//!
//! let mut args = Fragment::new();
//! args.set("url_placeholders.id", 42)?;
//! let response = route.get_with(args).await?;
//! assert_eq!(response.status_code(), 200);
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod fragment;
pub mod hooks;
pub mod merge;
pub mod route;
pub mod scenario;
pub mod transport;
pub mod validate;

pub use compose::{ALLOWED_COMMON_PARAMS, Descriptor, Method, URL_PLACEHOLDERS_KEY};
pub use config::Config;
pub use error::RouteError;
pub use fragment::{Fragment, RESERVED_KEYS};
pub use hooks::{AfterReceiveHook, BeforeSendHook, Event, HookRegistry, Hooks, Scope};
pub use merge::{MERGE_STRATEGY_KEY, MergeStrategy, merge};
pub use route::{Route, RouteBuilder};
pub use scenario::{ActiveScenario, MappedGroup, OverrideFn, ScenarioGroup};
pub use transport::{HttpTransport, Response, Transport};
pub use validate::{ValidatorFn, expect_headers, expect_status};
