//! Route definition and request orchestration.
//!
//! A [`Route`] bundles an endpoint, its configuration, its override layers
//! and its scenario/validator registries. Dispatching a verb gathers the
//! route, method, scenario and call-time fragments, merges them in priority
//! order, validates the result and hands it to the transport, firing hooks
//! around the call.
//!
//! Dispatch takes `&mut self`: one in-flight request per route instance,
//! with the last descriptor and response retained until the next call
//! overwrites them.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value};

use crate::RouteError;
use crate::compose::{Descriptor, Method, finalize};
use crate::config::Config;
use crate::fragment::Fragment;
use crate::hooks::{HookRegistry, Hooks, Scope};
use crate::merge::merge;
use crate::scenario::{ActiveScenario, GroupFactory, OverrideFn, ScenarioGroup, ScenarioRegistry};
use crate::transport::{HttpTransport, Response, Transport};
use crate::validate::ValidatorFn;

/// A declared API route.
pub struct Route {
    endpoint: String,
    config: Config,
    transport: Arc<dyn Transport>,
    route_override: Option<OverrideFn>,
    method_overrides: HashMap<Method, OverrideFn>,
    scenarios: ScenarioRegistry,
    validators: HashMap<String, ValidatorFn>,
    active: Option<ActiveScenario>,
    last_descriptor: Option<Descriptor>,
    last_response: Option<Response>,
}

impl Route {
    /// Start defining a route for the given configuration and endpoint.
    #[must_use]
    pub fn builder(config: Config, endpoint: impl Into<String>) -> RouteBuilder {
        RouteBuilder {
            endpoint: endpoint.into(),
            config,
            transport: None,
            route_override: None,
            method_overrides: HashMap::new(),
            scenarios: ScenarioRegistry::default(),
            validators: HashMap::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind a scenario registered directly on this route. Rebinding
    /// replaces any prior binding.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ScenarioNotFound`] for an unregistered name.
    pub fn for_scenario(&mut self, scenario: &str) -> Result<&mut Self, RouteError> {
        let active = self.scenarios.resolve(self, scenario, None)?;
        self.active = Some(active);
        Ok(self)
    }

    /// Bind a scenario resolved through a named scenario group. The group
    /// factory receives this route, so scenario code can read the route it
    /// is overriding.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::NoScenarioGroups`],
    /// [`RouteError::UnknownScenarioGroup`] or
    /// [`RouteError::ScenarioNotFound`] as described on the resolver.
    pub fn for_scenario_in(&mut self, group: &str, scenario: &str) -> Result<&mut Self, RouteError> {
        let active = self.scenarios.resolve(self, scenario, Some(group))?;
        self.active = Some(active);
        Ok(self)
    }

    /// The currently bound scenario, if any.
    #[must_use]
    pub fn active_scenario(&self) -> Option<&ActiveScenario> {
        self.active.as_ref()
    }

    pub fn clear_scenario(&mut self) {
        self.active = None;
    }

    /// The descriptor dispatched by the most recent request, after
    /// before-send hooks ran.
    #[must_use]
    pub fn request_args(&self) -> Option<&Descriptor> {
        self.last_descriptor.as_ref()
    }

    /// The response received by the most recent request.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Run a named validator against the last response.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ValidatorNotFound`] for an unregistered name,
    /// [`RouteError::NoResponse`] before any request has completed, or the
    /// validator's own [`RouteError::Validation`] failure.
    pub fn validate(&self, name: &str) -> Result<(), RouteError> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| RouteError::ValidatorNotFound(name.to_string()))?;
        let response = self.last_response.as_ref().ok_or(RouteError::NoResponse)?;
        validator(response)
    }

    /// Compose and dispatch a request.
    ///
    /// Layers are gathered in the order route, method, scenario, call-site
    /// and merged with that priority. Every composition error is returned
    /// before the transport is invoked.
    ///
    /// # Errors
    ///
    /// Propagates authoring, validation and transport errors; see
    /// [`RouteError`].
    pub async fn send(&mut self, method: Method, call_args: Fragment) -> Result<Response, RouteError> {
        debug!("composing {method} request for endpoint '{}'", self.endpoint);
        let mut registry = HookRegistry::new();

        let route_layer = self.run_override(self.route_override.clone(), Scope::Route, &mut registry)?;
        let method_layer = self.run_override(
            self.method_overrides.get(&method).cloned(),
            Scope::Method,
            &mut registry,
        )?;
        let scenario_layer = self.run_override(
            self.active.as_ref().map(ActiveScenario::func),
            Scope::Scenario,
            &mut registry,
        )?;

        let merged = merge(&[route_layer, method_layer, scenario_layer, call_args.into_map()])?;
        let (url, mut descriptor) = finalize(merged, method, &self.config.base_url, &self.endpoint)?;

        registry.fire_before(method, &url, &mut descriptor).await;
        self.last_descriptor = Some(descriptor.clone());

        let response = self.transport.send(method, &url, &descriptor).await?;
        registry.fire_after(&response).await;
        self.last_response = Some(response.clone());
        Ok(response)
    }

    fn run_override(
        &self,
        func: Option<OverrideFn>,
        scope: Scope,
        registry: &mut HookRegistry,
    ) -> Result<Map<String, Value>, RouteError> {
        let mut fragment = Fragment::new();
        let mut hooks = Hooks::new();
        if let Some(func) = func {
            func(&mut fragment, &mut hooks)?;
        }
        registry.absorb(scope, hooks);
        Ok(fragment.into_map())
    }

    /// Dispatch on a current-thread runtime for callers outside async
    /// contexts. Suspension still happens only at the transport boundary.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send); runtime construction failures surface as
    /// [`RouteError::Io`].
    pub fn send_blocking(&mut self, method: Method, call_args: Fragment) -> Result<Response, RouteError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.send(method, call_args))
    }

    pub async fn get(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Get, Fragment::new()).await
    }

    pub async fn get_with(&mut self, call_args: Fragment) -> Result<Response, RouteError> {
        self.send(Method::Get, call_args).await
    }

    pub async fn post(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Post, Fragment::new()).await
    }

    pub async fn post_with(&mut self, call_args: Fragment) -> Result<Response, RouteError> {
        self.send(Method::Post, call_args).await
    }

    pub async fn put(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Put, Fragment::new()).await
    }

    pub async fn put_with(&mut self, call_args: Fragment) -> Result<Response, RouteError> {
        self.send(Method::Put, call_args).await
    }

    pub async fn patch(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Patch, Fragment::new()).await
    }

    pub async fn patch_with(&mut self, call_args: Fragment) -> Result<Response, RouteError> {
        self.send(Method::Patch, call_args).await
    }

    pub async fn delete(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Delete, Fragment::new()).await
    }

    pub async fn delete_with(&mut self, call_args: Fragment) -> Result<Response, RouteError> {
        self.send(Method::Delete, call_args).await
    }

    pub async fn head(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Head, Fragment::new()).await
    }

    pub async fn options(&mut self) -> Result<Response, RouteError> {
        self.send(Method::Options, Fragment::new()).await
    }

    pub fn get_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Get, Fragment::new())
    }

    pub fn post_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Post, Fragment::new())
    }

    pub fn put_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Put, Fragment::new())
    }

    pub fn patch_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Patch, Fragment::new())
    }

    pub fn delete_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Delete, Fragment::new())
    }

    pub fn head_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Head, Fragment::new())
    }

    pub fn options_blocking(&mut self) -> Result<Response, RouteError> {
        self.send_blocking(Method::Options, Fragment::new())
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("endpoint", &self.endpoint)
            .field("base_url", &self.config.base_url)
            .field("scenario", &self.active)
            .finish_non_exhaustive()
    }
}

/// Declarative constructor for [`Route`].
pub struct RouteBuilder {
    endpoint: String,
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    route_override: Option<OverrideFn>,
    method_overrides: HashMap<Method, OverrideFn>,
    scenarios: ScenarioRegistry,
    validators: HashMap<String, ValidatorFn>,
}

impl RouteBuilder {
    /// Override applied to every request on this route.
    #[must_use]
    pub fn route(
        mut self,
        func: impl Fn(&mut Fragment, &mut Hooks) -> Result<(), RouteError> + Send + Sync + 'static,
    ) -> Self {
        self.route_override = Some(Arc::new(func));
        self
    }

    /// Static-fragment convenience for the route layer: the value is
    /// validated once here, at authoring time, and replayed per request.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] for reserved keys or a
    /// non-object value.
    pub fn route_defaults(self, value: Value) -> Result<Self, RouteError> {
        let defaults = Fragment::from_value(value)?;
        Ok(self.route(move |fragment, _hooks| {
            fragment.extend_from(defaults.as_map());
            Ok(())
        }))
    }

    /// Override applied only to the given verb.
    #[must_use]
    pub fn method(
        mut self,
        method: Method,
        func: impl Fn(&mut Fragment, &mut Hooks) -> Result<(), RouteError> + Send + Sync + 'static,
    ) -> Self {
        self.method_overrides.insert(method, Arc::new(func));
        self
    }

    /// Static-fragment convenience for one verb's layer.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::ReservedKey`] for reserved keys or a
    /// non-object value.
    pub fn method_defaults(self, method: Method, value: Value) -> Result<Self, RouteError> {
        let defaults = Fragment::from_value(value)?;
        Ok(self.method(method, move |fragment, _hooks| {
            fragment.extend_from(defaults.as_map());
            Ok(())
        }))
    }

    /// Register a named scenario directly on the route.
    #[must_use]
    pub fn scenario(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&mut Fragment, &mut Hooks) -> Result<(), RouteError> + Send + Sync + 'static,
    ) -> Self {
        self.scenarios.scenarios.insert(name.into(), Arc::new(func));
        self
    }

    /// Register a scenario-group factory. The factory runs per binding and
    /// receives the owning route.
    #[must_use]
    pub fn scenario_group(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(&Route) -> Box<dyn ScenarioGroup> + Send + Sync + 'static,
    ) -> Self {
        let factory: GroupFactory = Arc::new(factory);
        self.scenarios.groups.insert(name.into(), factory);
        self
    }

    /// Register a named response validator.
    #[must_use]
    pub fn validator(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&Response) -> Result<(), RouteError> + Send + Sync + 'static,
    ) -> Self {
        self.validators.insert(name.into(), Arc::new(func));
        self
    }

    /// Swap the transport; defaults to [`HttpTransport`]. Mainly used to
    /// point routes at a test double.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    #[must_use]
    pub fn build(self) -> Route {
        Route {
            endpoint: self.endpoint,
            config: self.config,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
            route_override: self.route_override,
            method_overrides: self.method_overrides,
            scenarios: self.scenarios,
            validators: self.validators,
            active: None,
            last_descriptor: None,
            last_response: None,
        }
    }
}
