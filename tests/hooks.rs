//! Hook lifecycle behaviour: ordering, descriptor mutation, per-request
//! isolation and async hooks.

#[path = "support/mock.rs"]
mod mock;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mock::MockTransport;
use routekit::{AfterReceiveHook, Config, Descriptor, Method, Response, Route, RouteError};
use serde_json::json;

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().expect("lock log").push(entry.into());
}

fn logged_route(transport: MockTransport, log: Log) -> Route {
    let route_log = Arc::clone(&log);
    let method_log = Arc::clone(&log);
    let scenario_log = Arc::clone(&log);
    Route::builder(Config::new("https://api.test"), "/ping")
        .route(move |_fragment, hooks| {
            let before = Arc::clone(&route_log);
            let after = Arc::clone(&route_log);
            hooks.before_send(move |_m: Method, _u: &str, _d: &mut Descriptor| {
                record(&before, "route:before");
            });
            hooks.after_receive(move |_r: &Response| record(&after, "route:after"));
            Ok(())
        })
        .method(Method::Get, move |_fragment, hooks| {
            let before = Arc::clone(&method_log);
            hooks.before_send(move |_m: Method, _u: &str, _d: &mut Descriptor| {
                record(&before, "method:before");
            });
            Ok(())
        })
        .scenario("traced", move |_fragment, hooks| {
            let before = Arc::clone(&scenario_log);
            let after = Arc::clone(&scenario_log);
            hooks.before_send(move |_m: Method, _u: &str, _d: &mut Descriptor| {
                record(&before, "scenario:before");
            });
            hooks.after_receive(move |_r: &Response| record(&after, "scenario:after"));
            Ok(())
        })
        .transport(transport)
        .build()
}

#[tokio::test]
async fn hooks_fire_in_route_method_scenario_order() {
    let log: Log = Arc::default();
    let mut route = logged_route(MockTransport::new(), Arc::clone(&log));
    route.for_scenario("traced").expect("bind");
    route.get().await.expect("dispatch");

    assert_eq!(
        *log.lock().expect("lock log"),
        [
            "route:before",
            "method:before",
            "scenario:before",
            "route:after",
            "scenario:after"
        ]
    );
}

#[tokio::test]
async fn hooks_do_not_leak_between_requests() {
    let log: Log = Arc::default();
    let mut route = logged_route(MockTransport::new(), Arc::clone(&log));
    route.get().await.expect("first");
    route.get().await.expect("second");

    let entries = log.lock().expect("lock log").clone();
    let route_befores = entries.iter().filter(|e| *e == "route:before").count();
    assert_eq!(route_befores, 2, "one firing per request, no accumulation");
}

#[tokio::test]
async fn before_send_mutations_reach_the_transport() {
    let transport = MockTransport::new();
    let mut route = Route::builder(Config::new("https://api.test"), "/ping")
        .route(|_fragment, hooks| {
            hooks.before_send(|method: Method, _url: &str, descriptor: &mut Descriptor| {
                let signature = format!("sig-{method}");
                descriptor.insert("headers".to_string(), json!({"x-signature": signature}));
            });
            Ok(())
        })
        .transport(transport.clone())
        .build();

    route.get().await.expect("dispatch");
    assert_eq!(
        transport.last_sent().descriptor.get("headers"),
        Some(&json!({"x-signature": "sig-GET"}))
    );
    // The snapshot reflects the post-hook descriptor.
    assert_eq!(
        route.request_args().expect("args").get("headers"),
        Some(&json!({"x-signature": "sig-GET"}))
    );
}

#[derive(Clone)]
struct YieldingAfterHook {
    log: Log,
    tag: &'static str,
}

#[async_trait]
impl AfterReceiveHook for YieldingAfterHook {
    async fn call(&self, response: &Response) {
        tokio::task::yield_now().await;
        record(&self.log, format!("{}:{}", self.tag, response.status_code()));
    }
}

#[tokio::test]
async fn async_hooks_are_awaited_in_registration_order() {
    let log: Log = Arc::default();
    let first = YieldingAfterHook {
        log: Arc::clone(&log),
        tag: "first",
    };
    let second = YieldingAfterHook {
        log: Arc::clone(&log),
        tag: "second",
    };
    let mut route = Route::builder(Config::new("https://api.test"), "/ping")
        .route(move |_fragment, hooks| {
            hooks.after_receive(first.clone());
            hooks.after_receive(second.clone());
            Ok(())
        })
        .transport(MockTransport::new())
        .build();

    route.get().await.expect("dispatch");
    assert_eq!(*log.lock().expect("lock log"), ["first:200", "second:200"]);
}

#[tokio::test]
async fn after_receive_observes_but_cannot_replace_the_response() {
    let transport = MockTransport::new();
    transport.push_response(mock::json_response(418, "{}"));
    let seen: Arc<Mutex<Option<u16>>> = Arc::default();
    let seen_in_hook = Arc::clone(&seen);
    let mut route = Route::builder(Config::new("https://api.test"), "/ping")
        .route(move |_fragment, hooks| {
            let seen = Arc::clone(&seen_in_hook);
            hooks.after_receive(move |response: &Response| {
                *seen.lock().expect("lock seen") = Some(response.status_code());
            });
            Ok(())
        })
        .transport(transport)
        .build();

    let response = route.get().await.expect("dispatch");
    assert_eq!(response.status_code(), 418);
    assert_eq!(*seen.lock().expect("lock seen"), Some(418));
}

#[test]
fn event_names_round_trip_and_reject_unknowns() {
    use routekit::Event;
    assert_eq!(
        "before-send".parse::<Event>().expect("parse").as_str(),
        "before-send"
    );
    assert!(matches!(
        "mid-flight".parse::<Event>(),
        Err(RouteError::InvalidEvent(name)) if name == "mid-flight"
    ));
}
