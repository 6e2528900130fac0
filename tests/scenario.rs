//! Scenario binding, scenario groups and their failure modes.

#[path = "support/mock.rs"]
mod mock;

use std::sync::{Arc, Mutex};

use mock::MockTransport;
use routekit::{Config, MappedGroup, Method, Route, RouteError};
use serde_json::json;

fn base_route(transport: MockTransport) -> Route {
    Route::builder(Config::new("https://api.test"), "/orders")
        .route(|fragment, _hooks| {
            fragment.set("params.tenant", "acme")?;
            Ok(())
        })
        .scenario("bulk", |fragment, _hooks| {
            fragment.set("params.page_size", 500)?;
            Ok(())
        })
        .scenario("minimal", |fragment, _hooks| {
            fragment.set("params.fields", "id")?;
            Ok(())
        })
        .transport(transport)
        .build()
}

#[tokio::test]
async fn bound_scenario_contributes_its_layer() {
    let transport = MockTransport::new();
    let mut route = base_route(transport.clone());
    route.for_scenario("bulk").expect("bind");
    route.get().await.expect("dispatch");
    assert_eq!(
        transport.last_sent().descriptor.get("params"),
        Some(&json!({"tenant": "acme", "page_size": 500}))
    );
}

#[tokio::test]
async fn rebinding_replaces_the_previous_scenario() {
    let transport = MockTransport::new();
    let mut route = base_route(transport.clone());
    route.for_scenario("bulk").expect("bind");
    route.for_scenario("minimal").expect("rebind");

    let active = route.active_scenario().expect("active");
    assert_eq!(active.name(), "minimal");
    assert_eq!(active.group(), None);

    route.get().await.expect("dispatch");
    assert_eq!(
        transport.last_sent().descriptor.get("params"),
        Some(&json!({"tenant": "acme", "fields": "id"}))
    );
}

#[tokio::test]
async fn cleared_scenario_no_longer_participates() {
    let transport = MockTransport::new();
    let mut route = base_route(transport.clone());
    route.for_scenario("bulk").expect("bind");
    route.clear_scenario();
    route.get().await.expect("dispatch");
    assert_eq!(
        transport.last_sent().descriptor.get("params"),
        Some(&json!({"tenant": "acme"}))
    );
}

#[test]
fn unknown_scenario_fails_before_anything_fires() {
    let transport = MockTransport::new();
    let mut route = base_route(transport.clone());
    let err = route.for_scenario("nightly").expect_err("unknown scenario");
    assert!(matches!(
        err,
        RouteError::ScenarioNotFound { scenario, .. } if scenario == "nightly"
    ));
    assert!(route.active_scenario().is_none());
    assert!(transport.sent().is_empty());
}

#[test]
fn group_binding_without_groups_configured_fails() {
    let mut route = base_route(MockTransport::new());
    let err = route
        .for_scenario_in("admin", "bulk")
        .expect_err("no groups configured");
    assert!(matches!(err, RouteError::NoScenarioGroups));
}

fn grouped_route(transport: MockTransport, seen_endpoints: Arc<Mutex<Vec<String>>>) -> Route {
    Route::builder(Config::new("https://api.test"), "/orders")
        .scenario_group("admin", move |route| {
            seen_endpoints
                .lock()
                .expect("lock endpoints")
                .push(route.endpoint().to_string());
            Box::new(
                MappedGroup::new("admin").scenario("impersonate", |fragment, _hooks| {
                    fragment.set("headers.x-impersonate", "true")?;
                    Ok(())
                }),
            )
        })
        .transport(transport)
        .build()
}

#[tokio::test]
async fn group_factory_receives_the_owning_route() {
    let transport = MockTransport::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut route = grouped_route(transport.clone(), Arc::clone(&seen));

    route
        .for_scenario_in("admin", "impersonate")
        .expect("bind through group");
    assert_eq!(*seen.lock().expect("lock endpoints"), ["/orders"]);

    let active = route.active_scenario().expect("active");
    assert_eq!(active.name(), "impersonate");
    assert_eq!(active.group(), Some("admin"));

    route.get().await.expect("dispatch");
    assert_eq!(
        transport.last_sent().descriptor.get("headers"),
        Some(&json!({"x-impersonate": "true"}))
    );
}

#[test]
fn unknown_group_and_unknown_group_scenario_fail() {
    let transport = MockTransport::new();
    let mut route = grouped_route(transport, Arc::default());

    let err = route
        .for_scenario_in("auditors", "impersonate")
        .expect_err("unknown group");
    assert!(matches!(
        err,
        RouteError::UnknownScenarioGroup(name) if name == "auditors"
    ));

    let err = route
        .for_scenario_in("admin", "escalate")
        .expect_err("unknown scenario in group");
    assert!(matches!(
        err,
        RouteError::ScenarioNotFound { scenario, group }
            if scenario == "escalate" && group == "admin"
    ));
}

#[tokio::test]
async fn binding_survives_across_requests_until_replaced() {
    let transport = MockTransport::new();
    let mut route = base_route(transport.clone());
    route.for_scenario("bulk").expect("bind");
    route.get().await.expect("first");
    route.send(Method::Get, routekit::Fragment::new())
        .await
        .expect("second");
    for sent in transport.sent() {
        assert_eq!(
            sent.descriptor.get("params"),
            Some(&json!({"tenant": "acme", "page_size": 500}))
        );
    }
}
