use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use toolchain_adapters::scripted::ScriptedAdapter;
use toolchain_adapters::traits::{AdapterError, ChatResponse};
use toolchain_client::{ClientError, ToolClient};
use toolchain_primitives::{ChatMessage, MessageRole, ToolCall};
use toolchain_tools::{ToolBuilder, ToolRegistry};

fn weather_registry(counter: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    ToolBuilder::new("get_weather")
        .description("Get the current weather in a given location.")
        .param("location", "String")
        .param_with_default("unit", "String", json!("celsius"))
        .register_sync(&registry, move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let location: String = args.get("location")?;
            Ok(json!({ "location": location, "temperature": 22 }))
        });
    ToolBuilder::new("explode")
        .register_sync(&registry, |_| Err("sensor offline".into()));
    Arc::new(registry)
}

fn weather_call(id: &str) -> ToolCall {
    ToolCall::new(id, "get_weather", r#"{"location": "Toronto"}"#)
}

#[tokio::test]
async fn budget_of_one_makes_exactly_one_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let adapter = Arc::new(ScriptedAdapter::new().repeat(ChatResponse::new(
        ChatMessage::assistant_tool_calls(Some("Checking.".to_owned()), vec![weather_call("c1")]),
    )));
    let client = ToolClient::new(adapter.clone(), weather_registry(calls.clone()));

    let err = client
        .chat_with_tools(vec![ChatMessage::user("Weather?")], 1, None)
        .await
        .expect_err("budget should run out");

    match err {
        ClientError::RoundBudgetExceeded {
            max_rounds,
            last_response,
        } => {
            assert_eq!(max_rounds, 1);
            assert_eq!(last_response.as_deref(), Some("Checking."));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(adapter.request_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_budget_sends_nothing() {
    let adapter = Arc::new(ScriptedAdapter::new().respond_text("unused"));
    let client = ToolClient::new(adapter.clone(), weather_registry(Arc::default()));

    let err = client
        .chat_with_tools(vec![ChatMessage::user("hi")], 0, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::RoundBudgetExceeded {
            max_rounds: 0,
            last_response: None
        }
    ));
    assert_eq!(adapter.request_count(), 0);
}

#[tokio::test]
async fn partial_failure_round_reports_both_results() {
    let adapter = Arc::new(
        ScriptedAdapter::new()
            .respond_tool_calls(vec![
                weather_call("c1"),
                ToolCall::new("c2", "explode", "{}"),
            ])
            .respond_text("Toronto is 22 degrees; the other sensor is down."),
    );
    let client = ToolClient::new(adapter.clone(), weather_registry(Arc::default()));

    let outcome = client
        .run_conversation(vec![ChatMessage::user("Weather?")], 5, None)
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(!outcome.tool_calls[0].is_error);
    assert!(outcome.tool_calls[1].is_error);
    assert_eq!(
        outcome.tool_calls[1].content,
        "Error: error calling tool 'explode': sensor offline"
    );

    let second = &adapter.requests()[1];
    let tool_messages: Vec<_> = second
        .messages()
        .iter()
        .filter(|message| message.role() == MessageRole::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].tool_call_id(), Some("c1"));
    assert_eq!(tool_messages[1].tool_call_id(), Some("c2"));

    let weather: Value = serde_json::from_str(tool_messages[0].content().unwrap()).unwrap();
    assert_eq!(weather, json!({"location": "Toronto", "temperature": 22}));
}

#[tokio::test]
async fn malformed_arguments_and_unknown_tools_are_contained() {
    let adapter = Arc::new(
        ScriptedAdapter::new()
            .respond_tool_calls(vec![
                ToolCall::new("c1", "get_weather", "{location: Toronto"),
                ToolCall::new("c2", "get_stock_price", "{}"),
            ])
            .respond_text("Sorry, I could not look that up."),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let client = ToolClient::new(adapter.clone(), weather_registry(calls.clone()));

    let response = client
        .chat_with_tools(vec![ChatMessage::user("Weather?")], 3, None)
        .await
        .unwrap();

    assert_eq!(response, "Sorry, I could not look that up.");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let second = &adapter.requests()[1];
    let contents: Vec<_> = second
        .messages()
        .iter()
        .filter(|message| message.role() == MessageRole::Tool)
        .filter_map(ChatMessage::content)
        .collect();
    assert!(contents[0].starts_with("Error: failed to parse arguments for tool 'get_weather'"));
    assert_eq!(contents[1], "Error: tool 'get_stock_price' not found");
}

#[tokio::test]
async fn tool_calls_take_precedence_over_text() {
    let adapter = Arc::new(
        ScriptedAdapter::new()
            .respond(ChatResponse::new(ChatMessage::assistant_tool_calls(
                Some("Here is a guess: sunny.".to_owned()),
                vec![weather_call("c1")],
            )))
            .respond_text("It is 22 degrees."),
    );
    let client = ToolClient::new(adapter.clone(), weather_registry(Arc::default()));

    let response = client
        .chat_with_tools(vec![ChatMessage::user("Weather?")], 5, None)
        .await
        .unwrap();

    assert_eq!(response, "It is 22 degrees.");
    assert_eq!(adapter.request_count(), 2);
}

#[tokio::test]
async fn transport_errors_propagate() {
    let adapter = Arc::new(ScriptedAdapter::new().fail(AdapterError::RateLimited {
        retry_after: None,
    }));
    let client = ToolClient::new(adapter, weather_registry(Arc::default()));

    let err = client
        .chat_with_tools(vec![ChatMessage::user("hi")], 5, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Adapter(AdapterError::RateLimited { .. })
    ));
}

#[tokio::test]
async fn transcript_keeps_assistant_tool_call_message() {
    let adapter = Arc::new(
        ScriptedAdapter::new()
            .respond_tool_calls(vec![weather_call("c1")])
            .respond_text("Done."),
    );
    let client = ToolClient::new(adapter, weather_registry(Arc::default()));

    let outcome = client
        .run_conversation(
            vec![ChatMessage::system("Be brief."), ChatMessage::user("Weather?")],
            5,
            None,
        )
        .await
        .unwrap();

    let roles: Vec<_> = outcome.messages.iter().map(ChatMessage::role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );
    assert!(outcome.messages[2].has_tool_calls());
}
