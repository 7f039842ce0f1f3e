//! End-to-end chat flow: in-memory conversation service plus a live socket

use std::time::Duration;

use chat_client::{
    Category, Chat, ClientError, Conversation, MessageId, MockConversationApi, RecordId,
    SessionConfig, SessionEvent, SessionState,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (String, mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });

    (url, rx)
}

fn seeded_api() -> MockConversationApi {
    MockConversationApi::new().with_conversation(
        Conversation {
            id: "c1".to_string(),
            title: "Greetings".to_string(),
            model_name: "llama3.2".to_string(),
            created_at: None,
        },
        json!([
            {"id": 1, "role": "user", "content": "hi", "createdAt": "2025-03-01T10:00:00"},
            {"id": 2, "role": "assistant", "content": "hello", "createdAt": "2025-03-01T10:00:01"}
        ]),
    )
}

fn chat_for(url: &str) -> Chat<MockConversationApi> {
    Chat::new(
        seeded_api(),
        SessionConfig {
            url: url.to_string(),
            reconnect_delay: Duration::from_millis(50),
            max_reconnect_attempts: 3,
        },
    )
}

async fn pump_until<F>(
    chat: &mut Chat<MockConversationApi>,
    events: &mut broadcast::Receiver<SessionEvent>,
    mut pred: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = timeout(WAIT, chat.next_event(events))
            .await
            .expect("no session event within timeout")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_open_send_and_receive_reply() {
    let (url, mut conns) = start_server().await;
    let mut chat = chat_for(&url);
    let mut events = chat.subscribe();

    chat.open("c1").await.unwrap();
    assert_eq!(chat.store().current_id(), Some("c1"));
    assert_eq!(chat.log().len(), 2);
    assert!(!chat.log().is_loading());

    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    pump_until(&mut chat, &mut events, |e| *e == SessionEvent::Opened).await;

    let sent = chat.send("How are you?").unwrap();
    assert_eq!(sent.category, Category::User);
    assert_eq!(chat.log().len(), 3);
    assert!(chat.log().is_loading());

    let frame = timeout(WAIT, conn.next()).await.unwrap().unwrap().unwrap();
    let outbound: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(outbound["conversationId"], "c1");
    assert_eq!(outbound["userMessage"], "How are you?");

    let reply = json!({
        "userMessage": {"id": 3, "content": "How are you?"},
        "assistantMessage": {"id": 4, "content": "Doing well."}
    });
    conn.send(Message::Text(reply.to_string())).await.unwrap();
    pump_until(&mut chat, &mut events, |e| {
        matches!(e, SessionEvent::Message(_))
    })
    .await;

    let log = chat.log().messages();
    assert_eq!(log.len(), 4);
    assert_eq!(log[2].id, sent.id);
    assert_eq!(log[3].id, MessageId::Remote(RecordId::Number(4)));
    assert_eq!(log[3].category, Category::Bot);
    assert!(!chat.log().is_loading());

    chat.close().await;
    assert_eq!(chat.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_send_while_disconnected_leaves_log_untouched() {
    let (url, _conns) = start_server().await;
    let mut chat = chat_for(&url);

    chat.store_mut().select("c1").await.unwrap();
    assert!(matches!(chat.send("hello"), Err(ClientError::NotConnected)));
    assert!(chat.log().is_empty());
    assert!(!chat.log().is_loading());
}

#[tokio::test]
async fn test_open_unknown_conversation_keeps_state() {
    let (url, _conns) = start_server().await;
    let mut chat = chat_for(&url);

    chat.open("c1").await.unwrap();
    let before = chat.log().messages().to_vec();

    assert!(matches!(
        chat.open("missing").await,
        Err(ClientError::NotFound(_))
    ));
    assert_eq!(chat.store().current_id(), Some("c1"));
    assert_eq!(chat.log().messages(), before.as_slice());
    assert!(!chat.log().is_loading());

    chat.close().await;
}

#[tokio::test]
async fn test_remove_current_conversation_clears_log() {
    let (url, _conns) = start_server().await;
    let mut chat = chat_for(&url);

    chat.store_mut().list().await.unwrap();
    chat.open("c1").await.unwrap();
    assert_eq!(chat.log().len(), 2);

    chat.remove("c1").await.unwrap();
    assert!(chat.store().current().is_none());
    assert!(chat.store().conversations().is_empty());
    assert!(chat.log().is_empty());

    chat.close().await;
}

#[tokio::test]
async fn test_start_new_begins_with_empty_log() {
    let (url, _conns) = start_server().await;
    let mut chat = chat_for(&url);

    chat.open("c1").await.unwrap();
    let created = chat.start_new(Default::default()).await.unwrap();

    assert_eq!(chat.store().current_id(), Some(created.id.as_str()));
    assert_eq!(created.title, "New Chat");
    assert!(chat.log().is_empty());

    chat.close().await;
}
