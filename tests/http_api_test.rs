//! HTTP conversation API tests against a wiremock server

use chat_client::{
    ClientError, ConversationApi, CreateConversation, HttpApiConfig, HttpConversationApi,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn api_for(server: &MockServer) -> HttpConversationApi {
    HttpConversationApi::new(HttpApiConfig {
        base_url: format!("{}/api", server.uri()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_conversations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "2", "title": "Later", "modelName": "llama3.2", "createdAt": "2025-03-02T09:00:00"},
            {"id": "1", "title": "Earlier", "modelName": "mistral", "createdAt": "2025-03-01T09:00:00Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    let conversations = api.list_conversations().await.unwrap();

    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].title, "Later");
    assert_eq!(conversations[1].model_name, "mistral");
    assert!(conversations.iter().all(|c| c.created_at.is_some()));
}

#[tokio::test]
async fn test_create_conversation_posts_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"title": "New Chat", "modelName": "llama3.2"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "abc",
            "title": "New Chat",
            "modelName": "llama3.2",
            "createdAt": "2025-03-01T10:00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    let created = assert_ok!(api.create_conversation(&CreateConversation::default()).await);

    assert_eq!(created.id, "abc");
    assert_eq!(created.title, "New Chat");
}

#[tokio::test]
async fn test_get_conversation_with_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "title": "Chat",
            "modelName": "llama3.2",
            "messages": [
                {"id": 1, "role": "user", "content": "hi"},
                {"id": 2, "role": "assistant", "content": "hello"}
            ]
        })))
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    let detail = api.get_conversation("abc").await.unwrap();

    assert_eq!(detail.id(), "abc");
    assert_eq!(detail.messages.as_array().map(|m| m.len()), Some(2));
}

#[tokio::test]
async fn test_get_missing_conversation_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Conversation not found"})),
        )
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    match api.get_conversation("gone").await {
        Err(ClientError::NotFound(message)) => assert_eq!(message, "Conversation not found"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/conversations/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    assert_ok!(api.delete_conversation("abc").await);
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    match api.list_conversations().await {
        Err(ClientError::Server { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected Server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let api = api_for(&server).await;
    assert!(matches!(
        api.list_conversations().await,
        Err(ClientError::Http(_))
    ));
}

#[tokio::test]
async fn test_unreachable_server() {
    let api = HttpConversationApi::new(HttpApiConfig {
        base_url: "http://127.0.0.1:1/api".into(),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(
        api.list_conversations().await,
        Err(ClientError::Http(_))
    ));
}
