//! End-to-end tests of the HTTP API against a temporary database

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

use common::{chat_body, text_reply, tool_reply, TestApp};
use quire::storage::{DocumentKind, Store};
use quire::stream::{DataEvent, StreamPart};

fn text_of(parts: &[StreamPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            StreamPart::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

fn events_of(parts: &[StreamPart]) -> Vec<DataEvent> {
    parts.iter().flat_map(|p| p.data_events()).collect()
}

#[tokio::test]
async fn test_chat_without_session_is_unauthorized() {
    let app = TestApp::new(vec![]);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/chat",
            None,
            Some(chat_body("c1", "hello", false)),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorized");
    assert!(app.store.get_chat("c1").unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let app = TestApp::new(vec![]);
    let mut body = chat_body("c1", "hello", false);
    body["modelId"] = json!("no-such-model");

    let (status, _) = app.chat(body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.provider.stream_requests().is_empty());
}

#[tokio::test]
async fn test_missing_user_message_is_bad_request() {
    let app = TestApp::new(vec![]);
    let body = json!({
        "id": "c1",
        "modelId": "gpt-4o-mini",
        "messages": [{"id": "a1", "role": "assistant", "content": "hi"}]
    });

    let (status, _) = app.chat(body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_new_chat_streams_reply_and_persists() {
    let app = TestApp::new(vec![text_reply(&["Hello", ", ", "world"])]);

    let (status, parts) = app.chat(chat_body("c1", "Say hello", false)).await;
    assert_eq!(status, StatusCode::OK);

    // First part announces the stored user message; last part closes the message
    let events = events_of(&parts);
    let Some(DataEvent::UserMessageId(user_message_id)) = events.first() else {
        panic!("expected user-message-id first, got {:?}", events);
    };
    assert!(matches!(parts.last(), Some(StreamPart::FinishMessage(_))));
    assert_eq!(text_of(&parts), "Hello, world");

    let chat = app.store.get_chat("c1").unwrap().unwrap();
    assert_eq!(chat.user_id, app.user_id);
    assert_eq!(chat.title, "Canned title");
    assert!(!chat.ephemeral);

    let messages = app.store.get_messages_by_chat("c1").unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(&messages[0].id, user_message_id);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, json!("Say hello"));
    assert_eq!(messages[1].role, "assistant");

    // The assistant row id is announced to the client
    let announced = parts.iter().any(|p| match p {
        StreamPart::Annotations(values) => values
            .iter()
            .any(|v| v["messageIdFromServer"] == json!(messages[1].id)),
        _ => false,
    });
    assert!(announced);
}

#[tokio::test]
async fn test_follow_up_keeps_title_and_appends() {
    let app = TestApp::new(vec![text_reply(&["one"]), text_reply(&["two"])]);

    app.chat(chat_body("c1", "first", false)).await;
    let body = json!({
        "id": "c1",
        "modelId": "gpt-4o-mini",
        "messages": [
            {"id": "m1", "role": "user", "content": "first"},
            {"id": "m2", "role": "assistant", "content": "one"},
            {"id": "m3", "role": "user", "content": "second"}
        ]
    });
    let (status, parts) = app.chat(body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text_of(&parts), "two");
    assert_eq!(app.store.get_messages_by_chat("c1").unwrap().len(), 4);

    let requests = app.provider.stream_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn test_submitting_to_foreign_chat_is_unauthorized() {
    let app = TestApp::new(vec![text_reply(&["mine"])]);
    app.chat(chat_body("c1", "hello", false)).await;

    let other = app.other_token();
    let (status, _) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(&other),
            Some(chat_body("c1", "let me in", false)),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.get_messages_by_chat("c1").unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_chat_flow() {
    let app = TestApp::new(vec![text_reply(&["bye"])]);
    app.chat(chat_body("c1", "hello", false)).await;

    let (status, _) = app
        .send(Method::DELETE, "/api/chat", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::DELETE, "/api/chat?id=c1", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other = app.other_token();
    let (status, _) = app
        .send(Method::DELETE, "/api/chat?id=c1", Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::DELETE, "/api/chat?id=c1", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Chat deleted");
    assert!(app.store.get_chat("c1").unwrap().is_none());
    assert!(app.store.get_messages_by_chat("c1").unwrap().is_empty());

    let (status, _) = app
        .send(Method::DELETE, "/api/chat?id=c1", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inline_chat_is_leased_and_hidden_from_history() {
    let app = TestApp::new(vec![text_reply(&["durable"]), text_reply(&["inline"])]);
    app.chat(chat_body("durable", "keep me", false)).await;
    app.chat(chat_body("inline", "throw me away", true)).await;

    let inline = app.store.get_chat("inline").unwrap().unwrap();
    assert!(inline.ephemeral);
    assert!(inline.lease_expires_at.unwrap() > Utc::now());

    let (status, body) = app
        .send(Method::GET, "/api/history", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let chats: serde_json::Value = serde_json::from_str(&body).unwrap();
    let ids: Vec<&str> = chats
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["durable"]);
}

#[tokio::test]
async fn test_history_requires_session() {
    let app = TestApp::new(vec![]);
    let (status, _) = app.send(Method::GET, "/api/history", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_code_document_streams_events_and_is_saved() {
    let app = TestApp::new(vec![
        tool_reply(
            "call_1",
            "createDocument",
            json!({"title": "Fibonacci", "kind": "code"}),
        ),
        text_reply(&["{\"code\":\"def fib(n):", "\\n    return n\"}"]),
        text_reply(&["Done."]),
    ]);

    let (status, parts) = app.chat(chat_body("c1", "Write fib in python", false)).await;
    assert_eq!(status, StatusCode::OK);

    let events = events_of(&parts);
    let Some(DataEvent::Id(document_id)) = events.get(1) else {
        panic!("expected document id after user-message-id, got {:?}", events);
    };
    assert_eq!(events[2], DataEvent::Title("Fibonacci".into()));
    assert_eq!(events[3], DataEvent::Kind(DocumentKind::Code));
    assert_eq!(events[4], DataEvent::Clear(String::new()));
    assert_eq!(events.last(), Some(&DataEvent::Finish(String::new())));

    let code_deltas: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            DataEvent::CodeDelta(code) => Some(code),
            _ => None,
        })
        .collect();
    assert_eq!(
        code_deltas.last().map(|s| s.as_str()),
        Some("def fib(n):\n    return n")
    );

    let document = app.store.get_document(document_id).unwrap().unwrap();
    assert_eq!(document.kind, DocumentKind::Code);
    assert_eq!(document.content, "def fib(n):\n    return n");
    assert_eq!(text_of(&parts), "Done.");

    let roles: Vec<String> = app
        .store
        .get_messages_by_chat("c1")
        .unwrap()
        .into_iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/document?id={}", document_id),
            Some(&app.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let fetched: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(fetched["title"], "Fibonacci");
}

#[tokio::test]
async fn test_document_endpoints_check_params_and_owner() {
    let app = TestApp::new(vec![]);

    let (status, _) = app
        .send(Method::GET, "/api/document", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/document?id=d1",
            Some(&app.token),
            Some(json!({"title": "Notes", "kind": "text", "content": "draft"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let other = app.other_token();
    let (status, _) = app
        .send(Method::GET, "/api/document?id=d1", Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::GET,
            "/api/suggestions?documentId=d1",
            Some(&app.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn test_votes() {
    let app = TestApp::new(vec![text_reply(&["rate me"])]);
    app.chat(chat_body("c1", "hello", false)).await;
    let message_id = app.store.get_messages_by_chat("c1").unwrap()[1].id.clone();

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/vote",
            Some(&app.token),
            Some(json!({"chatId": "c1", "messageId": message_id, "type": "sideways"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/vote",
            Some(&app.token),
            Some(json!({"chatId": "c1", "messageId": message_id, "type": "up"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Message voted");

    let (status, body) = app
        .send(Method::GET, "/api/vote?chatId=c1", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let votes: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(votes[0]["isUpvoted"], true);
}

#[tokio::test]
async fn test_models_and_health() {
    let app = TestApp::new(vec![]);

    let (status, body) = app.send(Method::GET, "/api/models", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let models: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(models["defaultModel"], "gpt-4o-mini");

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"ok\""));
}
