//! Plain-text rendering of session state.

use chrono::Local;
use huddle_client::{SessionUpdate, TransportState, runtime::RuntimeEvent};
use huddle_proto::{Conversation, Message, UserId};

/// One line per conversation: id, name, unread badge, preview.
pub fn conversation_line(conversation: &Conversation) -> String {
    let badge = match conversation.unread_count {
        0 => String::new(),
        n => format!(" ({n})"),
    };
    let name = if conversation.counterparty_name.is_empty() {
        conversation.counterparty_id.as_str()
    } else {
        conversation.counterparty_name.as_str()
    };
    let preview = conversation.last_message_preview.as_deref().unwrap_or("no messages yet");
    format!("{:<12} {name}{badge}: {preview}", conversation.id.as_str())
}

/// One line per message, in the viewer's local time.
pub fn message_line(message: &Message, local_user: &UserId) -> String {
    let who = if message.is_from(local_user) { "you" } else { message.sender_id.as_str() };
    let time = message.sent_at.with_timezone(&Local).format("%H:%M");
    format!("[{time}] {who}: {}", message.content)
}

/// Human-readable runtime event, or `None` for events not worth printing.
pub fn event_line(event: &RuntimeEvent, local_user: &UserId) -> Option<String> {
    match event {
        RuntimeEvent::Sent(message) => Some(message_line(message, local_user)),
        // Our own sends come back as echoes and are already printed
        RuntimeEvent::Received(message) if message.is_from(local_user) => None,
        RuntimeEvent::Received(message) => Some(message_line(message, local_user)),
        RuntimeEvent::Typing(typing) if typing.typing && &typing.user_id != local_user => {
            Some(format!("* {} is typing", typing.user_id))
        },
        RuntimeEvent::Typing(_) => None,
        RuntimeEvent::Update(SessionUpdate::ConnectionChanged(state)) => Some(match state {
            TransportState::Connected => "* live".to_owned(),
            TransportState::Connecting => "* connecting".to_owned(),
            TransportState::Disconnected => "* offline".to_owned(),
        }),
        RuntimeEvent::Update(SessionUpdate::ServerError(reason)) => {
            Some(format!("! server rejected message: {reason}"))
        },
        RuntimeEvent::Update(_) => None,
        RuntimeEvent::Started(id) => Some(format!("* conversation {id}")),
        RuntimeEvent::UnreadTotal(total) => Some(format!("* {total} unread")),
        RuntimeEvent::Degraded(error) => Some(format!("! {error}")),
        RuntimeEvent::Failed { command, error } => Some(format!("! {command} failed: {error}")),
    }
}
