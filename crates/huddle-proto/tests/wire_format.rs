//! Wire format snapshots.
//!
//! The live channel is shared with a server we do not control, so the exact
//! text of each outbound frame is pinned here.

use chrono::{TimeZone, Utc};
use huddle_proto::{
    ClientEvent, Message, SendMessagePayload, ServerEvent, TypingPayload,
    rest::{ConversationsResponse, SendMessageResponse, UnreadCountResponse},
};

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

#[test]
fn join_and_leave_frames() {
    let join = ClientEvent::JoinConversation("c1".into()).encode().unwrap();
    let leave = ClientEvent::LeaveConversation("c1".into()).encode().unwrap();

    insta::assert_snapshot!(join, @r#"{"event":"join_conversation","data":"c1"}"#);
    insta::assert_snapshot!(leave, @r#"{"event":"leave_conversation","data":"c1"}"#);
}

#[test]
fn typing_frame() {
    let frame = ClientEvent::Typing(TypingPayload {
        conversation_id: "c1".into(),
        user_id: "u1".into(),
        typing: true,
    })
    .encode()
    .unwrap();

    insta::assert_snapshot!(frame, @r#"{"event":"typing","data":{"conversation_id":"c1","user_id":"u1","typing":true}}"#);
}

#[test]
fn send_message_frame() {
    let frame = ClientEvent::SendMessage(SendMessagePayload {
        conversation_id: "c1".into(),
        sender_id: "u1".into(),
        content: "hello".into(),
    })
    .encode()
    .unwrap();

    insta::assert_snapshot!(frame, @r#"{"event":"send_message","data":{"conversation_id":"c1","sender_id":"u1","content":"hello"}}"#);
}

#[test]
fn receive_message_frame() {
    let frame = ServerEvent::ReceiveMessage(Message::new("m1", "c1", "u2", "hey", at(0)))
        .encode()
        .unwrap();

    insta::assert_snapshot!(frame, @r#"{"event":"receive_message","data":{"id":"m1","conversation_id":"c1","sender_id":"u2","content":"hey","sent_at":"1970-01-01T00:00:00Z","read_at":null}}"#);
}

#[test]
fn pushed_message_from_camel_case_server() {
    let text = r#"{"event":"receive_message","data":{"id":11,"conversationId":4,"senderId":9,"content":"on my way","sentAt":"2024-05-01T10:00:20Z"}}"#;

    let ServerEvent::ReceiveMessage(message) = ServerEvent::decode(text).unwrap() else {
        unreachable!("decoded a different event");
    };
    assert_eq!(message.id.as_str(), "11");
    assert_eq!(message.conversation_id.as_str(), "4");
    assert_eq!(message.sent_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 20).unwrap());
}

#[test]
fn typing_and_error_events_decode() {
    let typing = ServerEvent::decode(
        r#"{"event":"user_typing","data":{"conversation_id":"c1","user_id":"u2","typing":false}}"#,
    )
    .unwrap();
    let error =
        ServerEvent::decode(r#"{"event":"message_error","data":{"reason":"not a member"}}"#).unwrap();

    assert_eq!(typing.name(), "user_typing");
    assert!(matches!(error, ServerEvent::MessageError(p) if p.reason == "not a member"));
}

#[test]
fn rest_envelopes_decode() {
    let list: ConversationsResponse = serde_json::from_str(
        r#"{"conversations":[{"id":"c1","counterpartyId":"u2","counterpartyName":"Ada","unreadCount":3}]}"#,
    )
    .unwrap();
    let sent: SendMessageResponse = serde_json::from_str(
        r#"{"data":{"id":"m9","conversation_id":"c1","sender_id":"u1","content":"x","sent_at":"2024-05-01T10:00:00Z"}}"#,
    )
    .unwrap();
    let unread: UnreadCountResponse = serde_json::from_str(r#"{"total_unread":5}"#).unwrap();

    assert_eq!(list.conversations[0].unread_count, 3);
    assert_eq!(list.conversations[0].counterparty_name, "Ada");
    assert_eq!(sent.data.id.as_str(), "m9");
    assert_eq!(unread.total_unread, 5);
}
