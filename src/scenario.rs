//! Scenario resolution.
//!
//! Scenarios are named override layers registered on a route at definition
//! time, either directly or through a scenario group. Groups are built on
//! demand by a factory that receives a borrow of the owning route, so
//! scenario code can read the route it is overriding for the duration of
//! the resolution.

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};

use crate::RouteError;
use crate::fragment::Fragment;
use crate::hooks::Hooks;
use crate::route::Route;

/// Override function contributed by a route, method or scenario layer.
pub type OverrideFn = Arc<dyn Fn(&mut Fragment, &mut Hooks) -> Result<(), RouteError> + Send + Sync>;

/// A reusable bundle of named scenarios, instantiated per resolution with a
/// back-reference to the invoking route.
pub trait ScenarioGroup: Send + Sync {
    /// Name reported in `ScenarioNotFound` errors.
    fn name(&self) -> &str;

    /// Look up a scenario override by name.
    fn resolve(&self, name: &str) -> Option<OverrideFn>;
}

/// Builds a scenario group for one resolution, borrowing the owning route.
pub type GroupFactory = Arc<dyn Fn(&Route) -> Box<dyn ScenarioGroup> + Send + Sync>;

/// The scenario binding currently active on a route.
#[derive(Clone)]
pub struct ActiveScenario {
    name: String,
    group: Option<String>,
    func: OverrideFn,
}

impl ActiveScenario {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    #[must_use]
    pub(crate) fn func(&self) -> OverrideFn {
        Arc::clone(&self.func)
    }
}

impl std::fmt::Debug for ActiveScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveScenario")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Scenario and group registries for one route, built at definition time.
#[derive(Default, Clone)]
pub(crate) struct ScenarioRegistry {
    pub(crate) scenarios: HashMap<String, OverrideFn>,
    pub(crate) groups: HashMap<String, GroupFactory>,
}

impl ScenarioRegistry {
    /// Bind a scenario name, optionally through a named group.
    ///
    /// # Errors
    ///
    /// - [`RouteError::NoScenarioGroups`] when a group is requested but the
    ///   route declares none.
    /// - [`RouteError::UnknownScenarioGroup`] for an unregistered group.
    /// - [`RouteError::ScenarioNotFound`] when the name does not resolve.
    pub(crate) fn resolve(
        &self,
        route: &Route,
        scenario: &str,
        group: Option<&str>,
    ) -> Result<ActiveScenario, RouteError> {
        let (func, group_label) = match group {
            Some(group_name) => {
                if self.groups.is_empty() {
                    error!("no scenario groups configured on route '{}'", route.endpoint());
                    return Err(RouteError::NoScenarioGroups);
                }
                let factory = self.groups.get(group_name).ok_or_else(|| {
                    error!("scenario group '{group_name}' not registered");
                    RouteError::UnknownScenarioGroup(group_name.to_string())
                })?;
                let instance = factory(route);
                let label = instance.name().to_string();
                (instance.resolve(scenario), label)
            }
            None => (self.scenarios.get(scenario).cloned(), "route".to_string()),
        };

        let Some(func) = func else {
            error!("cannot find scenario '{scenario}' in '{group_label}'");
            return Err(RouteError::ScenarioNotFound {
                scenario: scenario.to_string(),
                group: group_label,
            });
        };
        info!("binding scenario '{scenario}' from '{group_label}' to route");
        Ok(ActiveScenario {
            name: scenario.to_string(),
            group: group.map(str::to_string),
            func,
        })
    }
}

/// A [`ScenarioGroup`] backed by a plain name → override map, for groups
/// that do not need custom state beyond what they capture.
pub struct MappedGroup {
    name: String,
    scenarios: HashMap<String, OverrideFn>,
}

impl MappedGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: HashMap::new(),
        }
    }

    #[must_use]
    pub fn scenario(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&mut Fragment, &mut Hooks) -> Result<(), RouteError> + Send + Sync + 'static,
    ) -> Self {
        self.scenarios.insert(name.into(), Arc::new(func));
        self
    }
}

impl ScenarioGroup for MappedGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, name: &str) -> Option<OverrideFn> {
        self.scenarios.get(name).cloned()
    }
}
