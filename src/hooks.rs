//! Request/response hook registry.
//!
//! Hooks are registered by the override that contributed them, so each entry
//! carries its origin scope. Firing walks scopes in the fixed order route,
//! method, scenario, and preserves registration order within a scope. Hooks
//! may be asynchronous; they are awaited one at a time, never fanned out,
//! because later hooks may depend on side effects of earlier ones.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::RouteError;
use crate::compose::{Descriptor, Method};
use crate::transport::Response;

/// Lifecycle events a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BeforeSend,
    AfterReceive,
}

impl Event {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeSend => "before-send",
            Self::AfterReceive => "after-receive",
        }
    }
}

impl FromStr for Event {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before-send" => Ok(Self::BeforeSend),
            "after-receive" => Ok(Self::AfterReceive),
            other => Err(RouteError::InvalidEvent(other.to_string())),
        }
    }
}

/// Origin of a hook, which also fixes its firing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    Route,
    Method,
    Scenario,
}

impl Scope {
    pub(crate) const ORDERED: [Self; 3] = [Self::Route, Self::Method, Self::Scenario];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Method => "method",
            Self::Scenario => "scenario",
        }
    }
}

impl FromStr for Scope {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "route" => Ok(Self::Route),
            "method" => Ok(Self::Method),
            "scenario" => Ok(Self::Scenario),
            other => Err(RouteError::InvalidScope(other.to_string())),
        }
    }
}

/// A hook fired before dispatch. May mutate the descriptor in place, for
/// example to inject a computed header.
#[async_trait]
pub trait BeforeSendHook: Send + Sync {
    async fn call(&self, method: Method, url: &str, descriptor: &mut Descriptor);
}

/// A hook fired with the response after the transport returns. Observation
/// only; it cannot replace the response handed back to the caller.
#[async_trait]
pub trait AfterReceiveHook: Send + Sync {
    async fn call(&self, response: &Response);
}

#[async_trait]
impl<F> BeforeSendHook for F
where
    F: Fn(Method, &str, &mut Descriptor) + Send + Sync,
{
    async fn call(&self, method: Method, url: &str, descriptor: &mut Descriptor) {
        self(method, url, descriptor);
    }
}

#[async_trait]
impl<F> AfterReceiveHook for F
where
    F: Fn(&Response) + Send + Sync,
{
    async fn call(&self, response: &Response) {
        self(response);
    }
}

/// The hook set handed to one override. Everything added here is tagged
/// with that override's scope when the composer absorbs it.
#[derive(Default)]
pub struct Hooks {
    pub(crate) before: Vec<Arc<dyn BeforeSendHook>>,
    pub(crate) after: Vec<Arc<dyn AfterReceiveHook>>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_send(&mut self, hook: impl BeforeSendHook + 'static) -> &mut Self {
        self.before.push(Arc::new(hook));
        self
    }

    pub fn after_receive(&mut self, hook: impl AfterReceiveHook + 'static) -> &mut Self {
        self.after.push(Arc::new(hook));
        self
    }
}

/// Per-request registry. Built fresh at the start of every composition, so
/// hooks never leak from one request into the next.
#[derive(Default)]
pub struct HookRegistry {
    before: Vec<(Scope, Arc<dyn BeforeSendHook>)>,
    after: Vec<(Scope, Arc<dyn AfterReceiveHook>)>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of one override's hook set, tagging each entry with
    /// the override's scope.
    pub fn absorb(&mut self, scope: Scope, hooks: Hooks) {
        for hook in hooks.before {
            self.before.push((scope, hook));
        }
        for hook in hooks.after {
            self.after.push((scope, hook));
        }
    }

    pub async fn fire_before(&self, method: Method, url: &str, descriptor: &mut Descriptor) {
        for scope in Scope::ORDERED {
            for (hook_scope, hook) in &self.before {
                if *hook_scope == scope {
                    debug!("firing before-send hook, scope: {}", scope.as_str());
                    hook.call(method, url, descriptor).await;
                }
            }
        }
    }

    pub async fn fire_after(&self, response: &Response) {
        for scope in Scope::ORDERED {
            for (hook_scope, hook) in &self.after {
                if *hook_scope == scope {
                    debug!("firing after-receive hook, scope: {}", scope.as_str());
                    hook.call(response).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_parsing_rejects_unknown_names() {
        assert_eq!("before-send".parse::<Event>().expect("parse"), Event::BeforeSend);
        assert_eq!(
            "after-receive".parse::<Event>().expect("parse"),
            Event::AfterReceive
        );
        let err = "on-response".parse::<Event>().expect_err("invalid event");
        assert!(matches!(err, RouteError::InvalidEvent(name) if name == "on-response"));
    }

    #[test]
    fn scope_parsing_rejects_unknown_names() {
        assert_eq!("scenario".parse::<Scope>().expect("parse"), Scope::Scenario);
        let err = "global".parse::<Scope>().expect_err("invalid scope");
        assert!(matches!(err, RouteError::InvalidScope(name) if name == "global"));
    }
}
