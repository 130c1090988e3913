//! Middleware behaviour against a recording transport and manual timers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use ws_middleware::protocol::{WEBSOCKET_CLOSED, WEBSOCKET_MESSAGE, WEBSOCKET_OPEN};
use ws_middleware::{
    Action, CloseEvent, ConnectConfig, ConnectionState, Error, ManualScheduler, MessageData,
    Middleware, ReconnectPolicy, TransportEvent,
};

use common::{Call, FakeFactory, Harness};

const URL: &str = "ws://localhost:9001/feed";
const OTHER_URL: &str = "ws://localhost:9002/feed";

// ============================================================================
// CONNECT
// ============================================================================

#[test]
fn test_connect_creates_one_handle_and_forwards_unchanged() {
    let h = Harness::new();
    let action = Action::connect(ConnectConfig::new(URL));

    let (result, forwarded) = h.handle(action.clone());

    assert!(result.is_ok());
    assert_eq!(forwarded, vec![action]);
    assert_eq!(h.factory.count(), 1);
    assert_eq!(h.middleware.connection_count(), 1);
    assert_eq!(h.middleware.state(URL), Some(ConnectionState::Connecting));
}

#[test]
fn test_connect_existing_url_closes_old_before_creating_new() {
    let h = Harness::new();
    let first = h.connect(URL);
    let second = h.connect(URL);

    assert!(first.transport.is_closed());
    assert!(!second.transport.is_closed());
    assert_eq!(h.middleware.connection_count(), 1);
    assert_eq!(
        h.factory.calls(),
        vec![
            Call::Create(URL.into()),
            Call::Close(URL.into()),
            Call::Create(URL.into()),
        ]
    );
    assert_eq!(
        h.middleware.connection_id(URL),
        Some(second.sink.connection())
    );
}

#[test]
fn test_connect_distinct_urls_coexist() {
    let h = Harness::new();
    h.connect(URL);
    h.connect(OTHER_URL);

    assert_eq!(h.middleware.connection_count(), 2);
    let mut urls = h.middleware.urls();
    urls.sort();
    assert_eq!(urls, vec![URL.to_string(), OTHER_URL.to_string()]);
}

#[test]
fn test_connect_invalid_url_propagates_and_does_not_forward() {
    let h = Harness::new();

    let (result, forwarded) = h.handle(Action::connect(ConnectConfig::new("http://nope")));

    assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    assert!(forwarded.is_empty());
    assert_eq!(h.middleware.connection_count(), 0);
    assert_eq!(h.factory.count(), 0);
}

// ============================================================================
// Transport events
// ============================================================================

#[test]
fn test_transport_events_become_actions() {
    let h = Harness::new();
    let created = h.connect(URL);
    let id = created.sink.connection();

    created.emit(TransportEvent::Connecting);
    created.emit(TransportEvent::Open);
    created.emit(TransportEvent::Message(MessageData::Text("hi".into())));

    assert_eq!(
        h.dispatched(),
        vec![
            Action::Connecting {
                url: URL.into(),
                connection: id,
            },
            Action::Open {
                url: URL.into(),
                connection: id,
            },
            Action::Message {
                url: URL.into(),
                connection: id,
                event: ws_middleware::MessageEvent {
                    data: MessageData::Text("hi".into()),
                },
            },
        ]
    );
    assert_eq!(h.middleware.state(URL), Some(ConnectionState::Open));
}

#[test]
fn test_normal_close_removes_handle_without_retry() {
    let h = Harness::new();
    let created = h.connect(URL);
    created.emit(TransportEvent::Open);
    created.emit(TransportEvent::Closed(CloseEvent::normal()));

    assert_eq!(h.middleware.connection_count(), 0);
    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(h.dispatched_types(), vec![WEBSOCKET_OPEN, WEBSOCKET_CLOSED]);
}

#[test]
fn test_stale_transport_events_are_dispatched_but_never_retry() {
    let h = Harness::new();
    let first = h.connect(URL);
    let second = h.connect(URL);

    first.emit(TransportEvent::Closed(CloseEvent::abnormal()));

    assert_eq!(h.dispatched_types(), vec![WEBSOCKET_CLOSED]);
    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(
        h.middleware.connection_id(URL),
        Some(second.sink.connection())
    );
    assert_eq!(h.middleware.state(URL), Some(ConnectionState::Connecting));
}

// ============================================================================
// SEND
// ============================================================================

#[test]
fn test_send_text_unregistered_url_never_sends_or_forwards() {
    let h = Harness::new();
    h.connect(OTHER_URL);

    let (result, forwarded) = h.handle(Action::send_text(URL, json!({ "a": 1 })));

    assert!(result.is_ok());
    assert!(forwarded.is_empty());
    assert!(h.factory.sent().is_empty());
}

#[test]
fn test_send_text_is_json_encoded() {
    let h = Harness::new();
    h.connect(URL);
    let action = Action::send_text(URL, json!({ "a": 1 }));

    let (result, forwarded) = h.handle(action.clone());

    assert!(result.is_ok());
    assert_eq!(forwarded, vec![action]);
    assert_eq!(h.factory.sent(), vec![Call::Text(r#"{"a":1}"#.into())]);
}

#[test]
fn test_send_text_string_payload_is_quoted() {
    let h = Harness::new();
    h.connect(URL);

    h.handle(Action::send_text(URL, json!("ping"))).0.expect("send");

    assert_eq!(h.factory.sent(), vec![Call::Text(r#""ping""#.into())]);
}

#[test]
fn test_send_binary_is_raw() {
    let h = Harness::new();
    h.connect(URL);

    let (result, forwarded) = h.handle(Action::send_binary(URL, vec![0u8, 159, 146, 150]));

    assert!(result.is_ok());
    assert_eq!(forwarded.len(), 1);
    assert_eq!(h.factory.sent(), vec![Call::Binary(vec![0, 159, 146, 150])]);
}

#[test]
fn test_send_binary_unregistered_url_is_dropped() {
    let h = Harness::new();

    let (result, forwarded) = h.handle(Action::send_binary(URL, vec![1u8]));

    assert!(result.is_ok());
    assert!(forwarded.is_empty());
}

#[test]
fn test_single_connection_form_targets_only_connection() {
    let h = Harness::new();
    h.connect(URL);

    let action = Action::SendText {
        url: None,
        payload: json!([1, 2]),
    };
    let (_, forwarded) = h.handle(action);
    assert_eq!(forwarded.len(), 1);
    assert_eq!(h.factory.sent(), vec![Call::Text("[1,2]".into())]);

    h.connect(OTHER_URL);
    let (_, forwarded) = h.handle(Action::SendBinary {
        url: None,
        payload: vec![1],
    });
    assert!(forwarded.is_empty());
}

#[test]
fn test_send_while_reconnecting_is_no_connection() {
    let h = Harness::new();
    let created = h.connect(URL);
    created.emit(TransportEvent::Closed(CloseEvent::abnormal()));

    let (result, forwarded) = h.handle(Action::send_text(URL, json!(1)));

    assert!(result.is_ok());
    assert!(forwarded.is_empty());
    assert!(h.factory.sent().is_empty());
}

// ============================================================================
// DISCONNECT
// ============================================================================

#[test]
fn test_disconnect_then_send_is_no_connection() {
    let h = Harness::new();
    let created = h.connect(URL);

    let disconnect = Action::disconnect(URL);
    let (result, forwarded) = h.handle(disconnect.clone());
    assert!(result.is_ok());
    assert_eq!(forwarded, vec![disconnect]);
    assert!(created.transport.is_closed());
    assert_eq!(h.middleware.connection_count(), 0);

    let (_, forwarded) = h.handle(Action::send_text(URL, json!({ "a": 1 })));
    assert!(forwarded.is_empty());
    assert!(h.factory.sent().is_empty());
}

#[test]
fn test_disconnect_unknown_url_still_forwards() {
    let h = Harness::new();
    let (result, forwarded) = h.handle(Action::disconnect(URL));
    assert!(result.is_ok());
    assert_eq!(forwarded.len(), 1);
}

// ============================================================================
// Reconnect
// ============================================================================

#[test]
fn test_abnormal_close_backoff_grows_linearly() {
    let h = Harness::new();
    h.connect(URL);

    let mut delays = Vec::new();
    for expected_attempts in 1..=4u32 {
        h.factory
            .last()
            .emit(TransportEvent::Closed(CloseEvent::abnormal()));
        assert_eq!(h.scheduler.pending_count(), 1);
        assert_eq!(h.middleware.attempts(URL), Some(expected_attempts));
        assert_eq!(h.middleware.state(URL), Some(ConnectionState::Reconnecting));

        delays.push(h.scheduler.run_next().expect("retry scheduled"));
        assert_eq!(h.middleware.state(URL), Some(ConnectionState::Connecting));
    }

    assert_eq!(
        delays,
        vec![
            Duration::from_millis(5000),
            Duration::from_millis(5250),
            Duration::from_millis(5500),
            Duration::from_millis(5750),
        ]
    );
    assert_eq!(h.factory.count(), 5);
}

#[test]
fn test_retry_reuses_config() {
    let h = Harness::new();
    let config = ConnectConfig::new(URL).with_protocol("v2");
    h.handle(Action::connect(config.clone())).0.expect("connect");

    h.factory
        .last()
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));
    h.scheduler.run_next();

    assert_eq!(h.factory.last().config, config);
}

#[test]
fn test_open_resets_attempt_counter() {
    let h = Harness::new();
    h.connect(URL);

    h.factory
        .last()
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));
    h.scheduler.run_next();
    assert_eq!(h.middleware.attempts(URL), Some(1));

    h.factory.last().emit(TransportEvent::Open);
    assert_eq!(h.middleware.attempts(URL), Some(0));

    h.factory
        .last()
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));
    assert_eq!(h.scheduler.delays(), vec![Duration::from_millis(5000)]);
}

#[test]
fn test_gives_up_after_max_attempts() {
    let h = Harness::new();
    h.connect(URL);

    for _ in 0..500 {
        h.factory
            .last()
            .emit(TransportEvent::Closed(CloseEvent::abnormal()));
        assert!(h.scheduler.run_next().is_some());
    }
    assert_eq!(h.middleware.attempts(URL), Some(500));

    h.factory
        .last()
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));

    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(h.middleware.connection_count(), 0);
    assert_eq!(h.factory.count(), 501);
    assert_eq!(
        h.dispatched_types().last().map(String::as_str),
        Some(WEBSOCKET_CLOSED)
    );
}

#[test]
fn test_fixed_policy_keeps_constant_delay() {
    let h = Harness::with_policy(ReconnectPolicy::fixed(5000));
    h.connect(URL);

    for _ in 0..3 {
        h.factory
            .last()
            .emit(TransportEvent::Closed(CloseEvent::abnormal()));
        assert_eq!(h.scheduler.run_next(), Some(Duration::from_millis(5000)));
    }
}

#[test]
fn test_disabled_policy_never_retries() {
    let h = Harness::with_policy(ReconnectPolicy::disabled());
    h.connect(URL)
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));

    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(h.middleware.connection_count(), 0);
}

#[test]
fn test_disconnect_cancels_pending_retry() {
    let h = Harness::new();
    h.connect(URL)
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));
    assert_eq!(h.scheduler.pending_count(), 1);

    h.handle(Action::disconnect(URL)).0.expect("disconnect");
    h.scheduler.run_next();

    assert_eq!(h.factory.count(), 1);
    assert_eq!(h.middleware.connection_count(), 0);
}

#[test]
fn test_connect_supersedes_pending_retry() {
    let h = Harness::new();
    h.connect(URL)
        .emit(TransportEvent::Closed(CloseEvent::abnormal()));

    let fresh = h.connect(URL);
    h.scheduler.run_next();

    assert_eq!(h.factory.count(), 2);
    assert_eq!(
        h.middleware.connection_id(URL),
        Some(fresh.sink.connection())
    );
    assert_eq!(h.middleware.attempts(URL), Some(0));
}

#[test]
fn test_shutdown_closes_everything() {
    let h = Harness::new();
    let a = h.connect(URL);
    let b = h.connect(OTHER_URL);

    h.middleware.shutdown();

    assert!(a.transport.is_closed());
    assert!(b.transport.is_closed());
    assert_eq!(h.middleware.connection_count(), 0);
}

// ============================================================================
// Pass-through and re-entrancy
// ============================================================================

#[test]
fn test_other_actions_pass_through() {
    let h = Harness::new();
    let action = Action::other("TODOS:ADD", json!({ "text": "milk" }));

    let (result, forwarded) = h.handle(action.clone());

    assert!(result.is_ok());
    assert_eq!(forwarded, vec![action]);
    assert!(h.dispatched().is_empty());
}

#[test]
fn test_json_pass_through_is_forwarded_unchanged() {
    let h = Harness::new();
    let input = json!({ "type": "TODOS:ADD", "text": "milk", "id": 7 });
    let action: Action = serde_json::from_value(input.clone()).expect("deserialize");

    let (result, forwarded) = h.handle(action);

    assert!(result.is_ok());
    assert_eq!(forwarded.len(), 1);
    assert_eq!(serde_json::to_value(&forwarded[0]).expect("serialize"), input);
    assert_eq!(h.factory.count(), 0);
}

#[test]
fn test_dispatcher_may_reenter_middleware() {
    let factory = Arc::new(FakeFactory::default());
    let slot: Arc<Mutex<Option<Middleware>>> = Arc::new(Mutex::new(None));
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let slot_clone = Arc::clone(&slot);
    let seen_clone = Arc::clone(&seen);
    let middleware = Middleware::builder()
        .dispatcher(move |action| {
            seen_clone.lock().push(action.action_type().to_string());
            if let Action::Open { url, .. } = &action {
                let middleware = slot_clone.lock().clone();
                if let Some(middleware) = middleware {
                    middleware
                        .handle(Action::send_text(url.clone(), json!("hello")), |_| {})
                        .expect("send from dispatcher");
                }
            }
        })
        .factory(factory.clone())
        .scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .expect("middleware");
    *slot.lock() = Some(middleware.clone());

    middleware
        .handle(Action::connect(ConnectConfig::new(URL)), |_| {})
        .expect("connect");
    factory.last().emit(TransportEvent::Open);
    factory
        .last()
        .emit(TransportEvent::Message(MessageData::Text("x".into())));

    assert_eq!(factory.sent(), vec![Call::Text(r#""hello""#.into())]);
    assert_eq!(*seen.lock(), vec![WEBSOCKET_OPEN, WEBSOCKET_MESSAGE]);

    // Break the middleware <-> dispatcher cycle.
    slot.lock().take();
}
