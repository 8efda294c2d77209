//! Agent bridge protocol against a scripted message-passing host.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tabshim_config::BridgeConfig;
use tabshim_core::TabsError;
use tabshim_core::bridge::wire::{EXECUTE_SCRIPT, READY_STATE_CHANGE};
use tabshim_core::bridge::{BridgeController, BridgeMessage, ResponsePayload, SerializedError};
use tabshim_core::host::MessagingHost;
use tabshim_test_utils::scripted::{ScriptedMessagingHost, page};

fn controller(host: &Arc<ScriptedMessagingHost>, config: &BridgeConfig) -> BridgeController {
    let (controller, dispatcher) =
        BridgeController::new(Arc::clone(host) as Arc<dyn MessagingHost>, config);
    tokio::spawn(dispatcher.run());
    controller
}

fn host_with_active_page() -> Arc<ScriptedMessagingHost> {
    Arc::new(ScriptedMessagingHost::with_pages(vec![
        page(1, 0, false, "https://one.test/"),
        page(2, 1, true, "https://two.test/"),
    ]))
}

fn reply(value: serde_json::Value) -> ResponsePayload {
    ResponsePayload::ReturnValue(value)
}

// ── Correlation ids ───────────────────────────────────────────────

#[tokio::test]
async fn test_thousand_requests_get_distinct_ids() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());

    let _pending: Vec<_> = (0..1000)
        .map(|_| bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]))
        .collect();

    let ids: HashSet<String> = (0..1000).map(|n| host.return_id(n)).collect();
    assert_eq!(ids.len(), 1000);
    assert_eq!(bridge.pending_count(), 1000);
}

#[tokio::test]
async fn test_request_wire_shape_and_default_target() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let _pending = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![json!({"code": "1"})]);

    let (target, message) = host.sent().remove(0);
    assert_eq!(target, 2, "defaults to the active tab");
    assert_eq!(message.name, EXECUTE_SCRIPT);
    assert_eq!(message.message["args"], json!([{"code": "1"}]));
    assert!(message.message["returnId"].as_str().unwrap().starts_with("return-"));
}

// ── Resolution ────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_duplicate_response_does_not_alter_result() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let deferred = bridge.run_agent_request(Some(1), EXECUTE_SCRIPT, vec![]);
    let id = host.return_id(0);

    host.deliver(1, BridgeMessage::response(&id, &reply(json!("first"))));
    host.deliver(1, BridgeMessage::response(&id, &reply(json!("second"))));
    host.deliver(
        1,
        BridgeMessage::response(&id, &ResponsePayload::Error(SerializedError::new("Error", "late"))),
    );

    assert_eq!(deferred.await.unwrap(), json!("first"));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn test_out_of_order_completion() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let a = bridge.run_agent_request(Some(1), EXECUTE_SCRIPT, vec![]);
    let b = bridge.run_agent_request(Some(2), EXECUTE_SCRIPT, vec![]);
    let (id_a, id_b) = (host.return_id(0), host.return_id(1));

    host.deliver(2, BridgeMessage::response(&id_b, &reply(json!("b"))));
    host.deliver(1, BridgeMessage::response(&id_a, &reply(json!("a"))));

    assert_eq!(b.await.unwrap(), json!("b"));
    assert_eq!(a.await.unwrap(), json!("a"));
}

#[tokio::test]
async fn test_remote_error_keeps_name_message_and_stack() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let deferred = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]);

    let remote = SerializedError::new("Error", "x").with_stack("Error: x\n    at <eval>:1:7");
    host.deliver(
        2,
        BridgeMessage::response(&host.return_id(0), &ResponsePayload::Error(remote.clone())),
    );

    let err = deferred.await.unwrap_err();
    assert_eq!(err.to_string(), "Error: x");
    match err {
        TabsError::Remote(carried) => assert_eq!(carried, remote),
        other => panic!("expected a remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_response_rejects() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let deferred = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]);

    host.deliver(2, BridgeMessage::new(host.return_id(0), json!({ "neither": 1 })));
    assert!(matches!(
        deferred.await.unwrap_err(),
        TabsError::Serialization(_)
    ));
}

#[tokio::test]
async fn test_burst_of_responses_is_never_dropped() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());

    let requests: Vec<_> = (0..2000)
        .map(|_| bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]))
        .collect();
    let ids: Vec<String> = host
        .sent()
        .iter()
        .map(|(_, request)| request.message["returnId"].as_str().unwrap().to_string())
        .collect();
    // Every response lands before the dispatcher gets to run once.
    for (n, id) in ids.iter().enumerate() {
        host.deliver(2, BridgeMessage::response(id, &reply(json!(n))));
    }

    for (n, request) in requests.into_iter().enumerate() {
        let value = tokio::time::timeout(Duration::from_secs(5), request)
            .await
            .expect("response was dropped")
            .unwrap();
        assert_eq!(value, json!(n));
    }
    assert_eq!(bridge.pending_count(), 0);
}

// ── Silent no-ops ─────────────────────────────────────────────────

#[tokio::test]
async fn test_stale_and_unrelated_messages_are_dropped() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let deferred = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]);

    host.deliver(2, BridgeMessage::response("return-999999999", &reply(json!(0))));
    host.deliver(2, BridgeMessage::new("somethingElse", json!({})));
    host.deliver(2, BridgeMessage::new(READY_STATE_CHANGE, json!("loading")));
    host.deliver(2, BridgeMessage::response(&host.return_id(0), &reply(json!(7))));

    assert_eq!(deferred.await.unwrap(), json!(7));
}

// ── Hang and timeout ──────────────────────────────────────────────

#[tokio::test]
async fn test_unanswered_request_pends_without_timeout() {
    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());
    let deferred = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]);

    tokio::time::pause();
    let outcome = tokio::time::timeout(Duration::from_secs(3600), deferred).await;
    assert!(outcome.is_err(), "request must still be pending");
    assert_eq!(bridge.pending_count(), 1);
}

#[tokio::test]
async fn test_configured_timeout_reports_no_response() {
    let host = host_with_active_page();
    let config = BridgeConfig {
        request_timeout_secs: 5,
        ..BridgeConfig::default()
    };
    let bridge = controller(&host, &config);
    let deferred = bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]);
    let id = host.return_id(0);

    tokio::time::pause();
    match deferred.await.unwrap_err() {
        TabsError::NoResponse { return_id, elapsed } => {
            assert_eq!(return_id, id);
            assert_eq!(elapsed, Duration::from_secs(5));
        }
        other => panic!("expected NoResponse, got {other:?}"),
    }

    // A response after the timeout is stale.
    host.deliver(2, BridgeMessage::response(&id, &reply(json!(1))));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn test_no_active_tab() {
    let host = Arc::new(ScriptedMessagingHost::new());
    let bridge = controller(&host, &BridgeConfig::default());
    assert!(matches!(
        bridge.run_agent_request(None, EXECUTE_SCRIPT, vec![]).await,
        Err(TabsError::NoActiveTab)
    ));
    assert!(host.sent().is_empty());
}

// ── Lifecycle fan-out ─────────────────────────────────────────────

#[tokio::test]
async fn test_ready_complete_reaches_listeners_once_per_source() {
    use tabshim_core::{ChangeInfo, TabStatus, UpdateEvent, UpdateListener};
    use tokio::sync::mpsc;

    let host = host_with_active_page();
    let bridge = controller(&host, &BridgeConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listeners().add_listener(UpdateListener::new(move |id, change, tab| {
        let _ = tx.send((id, change.clone(), tab.clone()));
    }));

    host.deliver(1, BridgeMessage::ready_complete());
    host.deliver(2, BridgeMessage::ready_complete());

    let mut sources = Vec::new();
    for _ in 0..2 {
        let (id, change, tab) = rx.recv().await.unwrap();
        assert_eq!(change, ChangeInfo::status(TabStatus::Complete));
        assert_eq!(tab.id, Some(id));
        sources.push(id);
    }
    sources.sort();
    assert_eq!(sources, vec![1, 2]);
    assert!(rx.try_recv().is_err());
}
