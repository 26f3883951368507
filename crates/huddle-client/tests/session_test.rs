//! Session behavior against the simulated backend.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use huddle_client::{ApiError, ClientError, SessionUpdate, TransportAction, TransportState};
use huddle_harness::{ApiCall, Endpoint, TraceEntry, World};
use huddle_proto::{ClientEvent, ConversationId, TypingPayload, UserId};

fn typing(conversation: &str, typing: bool) -> ClientEvent {
    ClientEvent::Typing(TypingPayload {
        conversation_id: conversation.into(),
        user_id: "me".into(),
        typing,
    })
}

async fn world_with(conversations: &[(&str, &str)]) -> World {
    let mut world = World::new("me");
    for (id, peer) in conversations {
        world.api.add_conversation(id, peer);
    }
    world.session.refresh_conversations().await.unwrap();
    world.trace.drain();
    world
}

#[tokio::test]
async fn connect_without_credential_degrades_to_rest_only() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.api.post_from(&c1, "alice", "hello");

    world.session.connect(&None::<String>);
    world.session.open_conversation(&c1).await.unwrap();
    world.session.input_changed(&c1);

    assert_eq!(world.session.transport_state(), TransportState::Disconnected);
    assert!(world.trace.sent_events().is_empty());
    assert_eq!(world.session.store().messages(&c1).len(), 1);
    world.assert_invariants("after REST-only open");
}

#[tokio::test]
async fn open_joins_before_fetching_history() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.api.post_from(&c1, "alice", "one");
    world.api.post_from(&c1, "alice", "two");
    world.connect();

    world.session.open_conversation(&c1).await.unwrap();

    assert_eq!(world.trace.entries(), vec![
        TraceEntry::Wire(TransportAction::Send(ClientEvent::JoinConversation(c1.clone()))),
        TraceEntry::Api(ApiCall::Messages { conversation_id: c1.clone(), limit: 50 }),
        TraceEntry::Api(ApiCall::MarkRead { conversation_id: c1.clone() }),
    ]);

    let messages = world.session.store().messages(&c1);
    assert_eq!(messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["one", "two"]);
    assert!(messages.iter().all(|m| m.read_at.is_some()));
    assert_eq!(world.session.store().conversation(&c1).unwrap().unread_count, 0);
    assert_eq!(world.api.unread(&c1), Some(0));
    world.assert_invariants("after open");
}

#[tokio::test]
async fn history_failure_leaves_messages_untouched() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.api.post_from(&c1, "alice", "kept");
    world.session.open_conversation(&c1).await.unwrap();

    world.api.post_from(&c1, "alice", "not fetched");
    world.api.fail_next(Endpoint::Messages, ApiError::Network("timeout".into()));
    let result = world.session.open_conversation(&c1).await;

    assert!(matches!(result, Err(ClientError::RequestFailed(ApiError::Network(_)))));
    let messages = world.session.store().messages(&c1);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "kept");
}

#[tokio::test]
async fn history_failure_restores_previous_focus() {
    let mut world = world_with(&[("c1", "alice"), ("c2", "bob")]).await;
    let (c1, c2) = (ConversationId::from("c1"), ConversationId::from("c2"));
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();

    world.api.fail_next(Endpoint::Messages, ApiError::Network("timeout".into()));
    let result = world.session.open_conversation(&c2).await;

    assert!(matches!(result, Err(ClientError::RequestFailed(ApiError::Network(_)))));
    assert_eq!(world.session.focused(), Some(&c1));
    assert!(!world.session.store().has_messages(&c2));
    world.assert_invariants("after failed switch");

    // Only the restored room survives into the next connection
    world.session.transport_closed("connection reset");
    world.trace.drain();
    world.session.connect(&Some("test-token".to_owned()));
    world.session.transport_opened();
    assert_eq!(world.trace.sent_events(), vec![ClientEvent::JoinConversation(c1)]);
}

#[tokio::test]
async fn mark_read_failure_does_not_fail_open() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.api.post_from(&c1, "alice", "hello");

    world.api.fail_next(Endpoint::MarkRead, ApiError::Network("timeout".into()));
    world.session.open_conversation(&c1).await.unwrap();

    assert_eq!(world.session.focused(), Some(&c1));
    assert_eq!(world.session.store().messages(&c1).len(), 1);
    assert_eq!(world.session.store().conversation(&c1).unwrap().unread_count, 0);
    assert_eq!(world.api.unread(&c1), Some(1));
}

#[tokio::test]
async fn send_echo_is_not_duplicated() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.trace.drain();

    let sent = world.session.send_message(&c1, "hi alice").await.unwrap();
    world.push_message(sent.clone()).await;

    let held: Vec<_> = world.session.store().messages(&c1).iter().map(|m| &m.id).collect();
    assert_eq!(held, vec![&sent.id]);
    assert_eq!(world.session.store().conversation(&c1).unwrap().unread_count, 0);
    assert_eq!(
        world.session.store().conversation(&c1).unwrap().last_message_preview.as_deref(),
        Some("hi alice")
    );

    // Authoritative POST first, live hint second
    let entries = world.trace.entries();
    assert!(matches!(entries[0], TraceEntry::Api(ApiCall::SendMessage { .. })));
    assert!(matches!(
        entries[1],
        TraceEntry::Wire(TransportAction::Send(ClientEvent::SendMessage(_)))
    ));
    world.assert_invariants("after send and echo");
}

#[tokio::test]
async fn failed_send_changes_nothing() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world
        .api
        .fail_next(Endpoint::SendMessage, ApiError::Status { endpoint: "POST /messages".into(), status: 500 });

    let result = world.session.send_message(&c1, "lost").await;

    assert!(matches!(result, Err(ClientError::RequestFailed(ref e)) if e.is_transient()));
    assert!(world.session.store().messages(&c1).is_empty());
    assert!(world.trace.sent_events().is_empty());
}

#[tokio::test]
async fn blank_message_is_rejected_locally() {
    let mut world = world_with(&[("c1", "alice")]).await;

    let result = world.session.send_message(&"c1".into(), "   ").await;

    assert_eq!(result, Err(ClientError::EmptyMessage));
    assert!(world.trace.api_calls().is_empty());
}

#[tokio::test]
async fn push_into_background_conversation_counts_unread_and_promotes() {
    let mut world = world_with(&[("c1", "alice"), ("c2", "bob")]).await;
    let c1 = ConversationId::from("c1");
    let c2 = ConversationId::from("c2");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.env.advance(Duration::from_secs(1));

    let from_bob = world.api.post_from(&c2, "bob", "ping");
    world.push_message(from_bob).await;

    let store = world.session.store();
    assert_eq!(store.conversations()[0].id, c2);
    assert_eq!(store.conversation(&c2).unwrap().unread_count, 1);
    assert_eq!(store.total_unread(), 1);
    assert!(!world.trace.api_calls().contains(&ApiCall::MarkRead { conversation_id: c2 }));
    world.assert_invariants("after background push");
}

#[tokio::test]
async fn push_into_focused_conversation_is_read_immediately() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.trace.drain();

    let from_alice = world.api.post_from(&c1, "alice", "you there?");
    world.push_message(from_alice).await;

    assert_eq!(world.session.store().conversation(&c1).unwrap().unread_count, 0);
    assert!(world.session.store().messages(&c1)[0].read_at.is_some());
    assert_eq!(world.trace.api_calls(), vec![ApiCall::MarkRead { conversation_id: c1.clone() }]);
    assert_eq!(world.api.unread(&c1), Some(0));
}

#[tokio::test]
async fn unread_resumes_after_close() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.session.close_conversation(&c1);

    let late = world.api.post_from(&c1, "alice", "after you left");
    world.push_message(late).await;

    assert_eq!(world.session.focused(), None);
    assert_eq!(world.session.store().conversation(&c1).unwrap().unread_count, 1);
}

#[tokio::test]
async fn typing_burst_sends_one_start_and_one_stop() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();

    world.session.input_changed(&c1);
    world.advance(Duration::from_millis(500));
    world.session.input_changed(&c1);
    world.advance(Duration::from_millis(500));
    world.session.input_changed(&c1);
    world.advance(Duration::from_millis(1999));
    assert_eq!(world.trace.sent_events(), vec![typing("c1", true)]);

    world.advance(Duration::from_millis(1));
    world.advance(Duration::from_secs(10));
    assert_eq!(world.trace.sent_events(), vec![typing("c1", true), typing("c1", false)]);
}

#[tokio::test]
async fn closing_mid_burst_stops_once() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.trace.drain();

    world.session.input_changed(&c1);
    world.session.close_conversation(&c1);
    world.advance(Duration::from_secs(5));

    assert_eq!(world.trace.sent_events(), vec![
        typing("c1", true),
        typing("c1", false),
        ClientEvent::LeaveConversation(c1),
    ]);
}

#[tokio::test]
async fn remote_typing_expires_without_stop() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();

    world.push_typing(&c1, "alice", true).await;
    world.push_typing(&c1, "me", true).await;
    assert!(world.session.is_peer_typing(&c1));
    assert_eq!(world.session.typing_peers(&c1), vec![&UserId::from("alice")]);

    world.advance(Duration::from_millis(4999));
    assert!(world.session.is_peer_typing(&c1));

    world.advance(Duration::from_millis(1));
    assert!(!world.session.is_peer_typing(&c1));
    assert!(world.session.take_updates().contains(&SessionUpdate::TypingChanged(c1)));
}

#[tokio::test]
async fn remote_stop_clears_immediately() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");

    world.push_typing(&c1, "alice", true).await;
    world.push_typing(&c1, "alice", false).await;

    assert!(!world.session.is_peer_typing(&c1));
}

#[tokio::test]
async fn rooms_rejoined_after_socket_drop() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.open_conversation(&c1).await.unwrap();
    world.trace.drain();

    world.session.transport_closed("connection reset");
    world.session.input_changed(&c1);
    world.session.connect(&Some("test-token".to_owned()));
    world.session.transport_opened();

    assert_eq!(world.trace.entries(), vec![
        TraceEntry::Wire(TransportAction::Open { token: "test-token".into() }),
        TraceEntry::Wire(TransportAction::Send(ClientEvent::JoinConversation(c1))),
    ]);
    let updates = world.session.take_updates();
    assert!(updates.contains(&SessionUpdate::ConnectionChanged(TransportState::Disconnected)));
    assert!(updates.contains(&SessionUpdate::ConnectionChanged(TransportState::Connected)));
}

#[tokio::test]
async fn open_during_handshake_joins_once_connected() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");

    world.session.connect(&Some("test-token".to_owned()));
    world.session.open_conversation(&c1).await.unwrap();
    world.trace.drain();
    world.session.transport_opened();

    assert_eq!(world.trace.sent_events(), vec![ClientEvent::JoinConversation(c1)]);
}

#[tokio::test]
async fn open_during_outage_joins_after_reconnect() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.connect();
    world.session.transport_closed("connection reset");

    world.session.open_conversation(&c1).await.unwrap();
    assert!(world.trace.sent_events().is_empty());

    world.session.connect(&Some("test-token".to_owned()));
    world.session.transport_opened();

    assert_eq!(world.trace.sent_events(), vec![ClientEvent::JoinConversation(c1)]);
}

#[tokio::test]
async fn closed_conversation_is_not_rejoined() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    world.session.connect(&Some("test-token".to_owned()));
    world.session.open_conversation(&c1).await.unwrap();
    world.session.close_conversation(&c1);
    world.trace.drain();

    world.session.transport_opened();

    assert!(world.trace.sent_events().is_empty());
}

#[tokio::test]
async fn failing_handler_does_not_block_others_or_state() {
    let mut world = world_with(&[("c1", "alice")]).await;
    let c1 = ConversationId::from("c1");
    let seen = Arc::new(Mutex::new(Vec::new()));

    world.session.on_message(|_| Err("surface crashed".into()));
    let recorder = {
        let seen = Arc::clone(&seen);
        world.session.on_message(move |message| {
            seen.lock().unwrap().push(message.id.clone());
            Ok(())
        })
    };

    let message = world.api.post_from(&c1, "alice", "hi");
    world.push_message(message.clone()).await;
    assert!(world.session.unregister(recorder));
    let again = world.api.post_from(&c1, "alice", "again");
    world.push_message(again).await;

    assert_eq!(*seen.lock().unwrap(), vec![message.id]);
    assert_eq!(world.session.store().messages(&c1).len(), 2);
}

#[tokio::test]
async fn message_error_surfaces_as_update() {
    let mut world = World::new("me");

    world.session.handle_frame(r#"{"event":"message_error","data":{"reason":"too long"}}"#).await;
    world.session.handle_frame(r#"{"event":"presence","data":{}}"#).await;

    assert_eq!(world.session.take_updates(), vec![SessionUpdate::ServerError("too long".into())]);
}

#[tokio::test]
async fn start_conversation_reloads_only_when_new() {
    let mut world = world_with(&[("c1", "alice")]).await;

    let existing = world.session.start_conversation(&"alice".into()).await.unwrap();
    let created = world.session.start_conversation(&"bob".into()).await.unwrap();

    assert_eq!(existing, ConversationId::from("c1"));
    assert!(world.session.store().conversation(&created).is_some());
    assert_eq!(world.trace.api_calls(), vec![
        ApiCall::CreateConversation { counterparty_id: "alice".into() },
        ApiCall::CreateConversation { counterparty_id: "bob".into() },
        ApiCall::Conversations,
    ]);
}

#[tokio::test]
async fn refresh_failure_keeps_previous_list() {
    let mut world = world_with(&[("c1", "alice"), ("c2", "bob")]).await;
    world.api.fail_next(Endpoint::Conversations, ApiError::Network("offline".into()));

    assert!(world.session.refresh_conversations().await.is_err());
    assert_eq!(world.session.store().conversations().len(), 2);
}

#[tokio::test]
async fn unread_total_comes_from_server() {
    let world = world_with(&[("c1", "alice"), ("c2", "bob")]).await;
    world.api.post_from(&"c1".into(), "alice", "a");
    world.api.post_from(&"c2".into(), "bob", "b");
    world.api.post_from(&"c2".into(), "bob", "c");

    assert_eq!(world.session.fetch_unread_total().await.unwrap(), 3);
}

#[tokio::test]
async fn push_for_unlisted_conversation_reloads_list() {
    let mut world = world_with(&[]).await;
    let fresh = world.api.add_conversation("c9", "carol");

    let hello = world.api.post_from(&fresh, "carol", "hey");
    world.push_message(hello).await;

    let store = world.session.store();
    assert_eq!(store.conversation(&fresh).unwrap().last_message_preview.as_deref(), Some("hey"));
    assert_eq!(store.messages(&fresh).len(), 1);
    world.assert_invariants("after unlisted push");
}
