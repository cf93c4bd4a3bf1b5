mod common;

use std::time::Duration;

use golden_rule_mcp::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};
use golden_rule_mcp::{ConnectionRegistry, Dispatcher};
use serde_json::{json, Value};

use common::{capture_logs, fixture, CompletionBehavior, ScriptedCompletion, REFINED};

async fn dispatcher(completion: ScriptedCompletion) -> (Dispatcher, common::Fixture) {
    let fx = fixture(completion, Some(Duration::from_secs(5))).await;
    (
        Dispatcher::new(ConnectionRegistry::default(), fx.refiner.clone()),
        fx,
    )
}

#[tokio::test]
async fn malformed_json_is_a_parse_error_and_touches_nothing() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let reply = dispatcher.handle(b"{not json", Some("a")).await;
    assert_eq!(reply.error_code(), Some(PARSE_ERROR));
    assert_eq!(reply.id, Value::Null);
    assert_eq!(dispatcher.registry().len(), 1);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn wrong_protocol_version_is_an_invalid_request() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let body = json!({"jsonrpc": "1.0", "id": 3, "method": "ping"}).to_string();
    let reply = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(INVALID_REQUEST));
    assert_eq!(reply.id, json!(3));

    let untagged = json!({"id": 4, "method": "ping"}).to_string();
    let reply = dispatcher.handle(untagged.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(INVALID_REQUEST));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn unknown_method_names_the_method_and_is_still_mirrored() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "completion/complete"}).to_string();
    let reply = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(METHOD_NOT_FOUND));
    let message = &reply.error.as_ref().expect("error").message;
    assert!(message.contains("completion/complete"), "{message}");

    let pushed = events.try_recv().expect("mirrored event");
    assert_eq!(pushed, serde_json::to_value(&reply).expect("to value"));
}

#[tokio::test]
async fn resolution_failures_carry_distinct_reasons() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let body = json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}).to_string();

    let none = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(none.error_code(), Some(SERVER_ERROR));
    assert_eq!(
        none.error.as_ref().and_then(|e| e.data.clone()),
        Some(json!({"reason": "connection_not_found"}))
    );

    let (_a, _rx_a) = dispatcher.registry().register("a").expect("a");
    let (_b, _rx_b) = dispatcher.registry().register("b").expect("b");
    let ambiguous = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(ambiguous.error_code(), Some(SERVER_ERROR));
    assert_eq!(
        ambiguous.error.as_ref().and_then(|e| e.data.clone()),
        Some(json!({"reason": "ambiguous_connection"}))
    );
    assert_ne!(
        none.error.as_ref().map(|e| e.message.clone()),
        ambiguous.error.as_ref().map(|e| e.message.clone())
    );

    let explicit = dispatcher.handle(body.as_bytes(), Some("b")).await;
    assert_eq!(explicit.result, Some(json!({})));
}

#[tokio::test]
async fn blank_input_returns_null_without_collaborator_calls() {
    let (dispatcher, fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let body = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "sampling/createMessage",
        "params": {"text": "  \n\t "}
    })
    .to_string();
    let reply = dispatcher.handle(body.as_bytes(), Some("a")).await;

    let wire = serde_json::to_value(&reply).expect("to value");
    assert_eq!(wire, json!({"jsonrpc": "2.0", "id": 2, "result": null}));
    assert_eq!(fx.embed_calls(), 0);
    assert_eq!(fx.completion_calls(), 0);
    assert_eq!(events.try_recv().expect("mirrored"), wire);
}

#[tokio::test]
async fn create_message_runs_the_pipeline_and_mirrors_the_reply() {
    let (dispatcher, fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let body = json!({
        "jsonrpc": "2.0",
        "id": "req-1",
        "method": "sampling/createMessage",
        "params": {"text": "冗長で明確でない文です。"}
    })
    .to_string();
    let reply = dispatcher.handle(body.as_bytes(), Some("a")).await;

    assert_eq!(
        reply.result,
        Some(json!({"items": [{"label": REFINED, "kind": 1, "detail": "Refined text"}]}))
    );
    assert_eq!(fx.embed_calls(), 1);
    assert_eq!(fx.completion_calls(), 1);

    let prompt = fx.completion.prompts.lock().first().cloned().expect("prompt");
    assert!(prompt.contains("冗長で明確でない文です。"));
    assert!(prompt.contains("## 黄金律:"));
    assert!(prompt.contains("### 編集方針: 冗長表現の削除"));
    assert!(prompt.contains("### 編集方針: 明確化"));
    assert_eq!(prompt.matches("### 編集方針:").count(), 3);

    assert_eq!(
        events.try_recv().expect("mirrored"),
        serde_json::to_value(&reply).expect("to value")
    );
}

#[tokio::test]
async fn identical_inputs_compose_identical_prompts() {
    let (dispatcher, fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, _events) = dispatcher.registry().register("a").expect("register");
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "sampling/createMessage",
        "params": {"text": "口調が揃っていない文"}
    })
    .to_string();

    dispatcher.handle(body.as_bytes(), None).await;
    dispatcher.handle(body.as_bytes(), None).await;

    let prompts = fx.completion.prompts.lock().clone();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts.first(), prompts.last());
}

#[tokio::test]
async fn tools_call_uses_the_tool_result_shape() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, _events) = dispatcher.registry().register("a").expect("register");

    let call = json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": {"name": "refine_text", "arguments": {"text": "簡潔にしたい文"}}
    })
    .to_string();
    let reply = dispatcher.handle(call.as_bytes(), None).await;
    assert_eq!(
        reply.result,
        Some(json!({"content": [{"type": "text", "text": REFINED}]}))
    );

    let unknown = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "memory_store", "arguments": {}}
    })
    .to_string();
    let reply = dispatcher.handle(unknown.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(INVALID_PARAMS));

    let list = json!({"jsonrpc": "2.0", "id": 6, "method": "tools/list"}).to_string();
    let reply = dispatcher.handle(list.as_bytes(), None).await;
    let tools = reply.result.expect("tools");
    assert_eq!(tools["tools"][0]["name"], "refine_text");
}

#[tokio::test]
async fn initialize_announces_capabilities() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, _events) = dispatcher.registry().register("a").expect("register");
    let body = json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}}).to_string();
    let reply = dispatcher.handle(body.as_bytes(), None).await;
    let result = reply.result.expect("result");
    assert_eq!(result["capabilities"]["streaming"], true);
    assert_eq!(result["serverInfo"]["name"], "golden-rule-mcp");
}

#[tokio::test]
async fn provider_failures_are_reported_without_secrets() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::new(CompletionBehavior::Fail(
        "invalid credentials for https://api.example.test/v1?key=sk-live-123".to_string(),
    )))
    .await;
    let (_registration, _events) = dispatcher.registry().register("a").expect("register");

    let body = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "sampling/createMessage",
        "params": {"text": "明確にしたい"}
    })
    .to_string();
    let reply = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(SERVER_ERROR));
    let message = reply.error.expect("error").message;
    assert!(message.starts_with("refinement failed:"), "{message}");
    assert!(!message.contains("sk-live-123"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn slow_rewrites_time_out() {
    let fx = fixture(
        ScriptedCompletion::new(CompletionBehavior::Stall(Duration::from_secs(600))),
        Some(Duration::from_millis(50)),
    )
    .await;
    let dispatcher = Dispatcher::new(ConnectionRegistry::default(), fx.refiner.clone());
    let (_registration, _events) = dispatcher.registry().register("a").expect("register");
    let (logs, _guard) = capture_logs();

    let body = json!({
        "jsonrpc": "2.0",
        "id": 8,
        "method": "sampling/createMessage",
        "params": {"text": "順序を変えたい"}
    })
    .to_string();
    let reply = dispatcher.handle(body.as_bytes(), None).await;
    assert_eq!(reply.error_code(), Some(SERVER_ERROR));
    assert!(reply.error.expect("error").message.contains("timed out"));

    let logged = logs.contents();
    let failure = logged
        .lines()
        .find(|line| line.contains("refinement failed"))
        .unwrap_or_else(|| panic!("no failure event in:\n{logged}"));
    assert!(failure.contains("WARN"), "{failure}");
    assert!(failure.contains("timed out"), "{failure}");
}

#[tokio::test]
async fn notifications_are_not_pushed_on_the_stream() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    let reply = dispatcher.handle(notification.as_bytes(), Some("a")).await;
    assert_eq!(reply.result, Some(json!({})));
    assert!(events.try_recv().is_err());

    let request = json!({"jsonrpc": "2.0", "id": 11, "method": "ping"}).to_string();
    let reply = dispatcher.handle(request.as_bytes(), Some("a")).await;
    assert_eq!(
        events.try_recv().expect("request reply pushed"),
        serde_json::to_value(&reply).expect("to value")
    );
}

#[tokio::test]
async fn concurrent_replies_each_reach_the_stream_once() {
    let (dispatcher, _fx) = dispatcher(ScriptedCompletion::replying(REFINED)).await;
    let (_registration, mut events) = dispatcher.registry().register("a").expect("register");

    let refine = json!({
        "jsonrpc": "2.0",
        "id": "refine",
        "method": "sampling/createMessage",
        "params": {"text": "簡潔にしたい文"}
    })
    .to_string();
    let ping = json!({"jsonrpc": "2.0", "id": "ping", "method": "ping"}).to_string();
    let (first, second) = tokio::join!(
        dispatcher.handle(refine.as_bytes(), Some("a")),
        dispatcher.handle(ping.as_bytes(), Some("a")),
    );

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 2);
    let expected = [
        serde_json::to_value(&first).expect("to value"),
        serde_json::to_value(&second).expect("to value"),
    ];
    for reply in &expected {
        assert_eq!(received.iter().filter(|e| *e == reply).count(), 1, "{reply}");
    }
}
