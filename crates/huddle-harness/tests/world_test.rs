//! Session behaviour under simulated time and a scripted backend.
//!
//! Random step sequences drive a full session (pushes, sends, focus changes,
//! typing and socket drops) and the standard invariants are checked after
//! every step.

use std::time::Duration;

use huddle_client::{StaticToken, TransportState};
use huddle_harness::World;
use huddle_proto::ConversationId;
use proptest::prelude::*;

const CONVERSATIONS: usize = 3;

#[derive(Debug, Clone)]
enum Step {
    Open(usize),
    Close(usize),
    PeerPost(usize),
    Send(usize),
    Input(usize),
    PeerTyping(usize, bool),
    Advance(u64),
    Drop,
    Reconnect,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => (0..CONVERSATIONS).prop_map(Step::Open),
        1 => (0..CONVERSATIONS).prop_map(Step::Close),
        4 => (0..CONVERSATIONS).prop_map(Step::PeerPost),
        2 => (0..CONVERSATIONS).prop_map(Step::Send),
        2 => (0..CONVERSATIONS).prop_map(Step::Input),
        1 => (0..CONVERSATIONS, any::<bool>()).prop_map(|(i, typing)| Step::PeerTyping(i, typing)),
        2 => (100u64..3_000).prop_map(Step::Advance),
        1 => Just(Step::Drop),
        1 => Just(Step::Reconnect),
    ]
}

async fn seeded_world() -> (World, Vec<ConversationId>) {
    let mut world = World::new("me");
    let ids = (0..CONVERSATIONS)
        .map(|i| world.api.add_conversation(&format!("c{i}"), &format!("peer{i}")))
        .collect();
    world.connect();
    world.session.refresh_conversations().await.unwrap();
    (world, ids)
}

async fn apply(world: &mut World, ids: &[ConversationId], step: &Step) {
    match step {
        Step::Open(i) => world.session.open_conversation(&ids[*i]).await.unwrap(),
        Step::Close(i) => world.session.close_conversation(&ids[*i]),
        Step::PeerPost(i) => {
            let message = world.api.post_from(&ids[*i], &format!("peer{i}"), "ping");
            world.push_message(message).await;
        },
        Step::Send(i) => {
            world.session.send_message(&ids[*i], "pong").await.unwrap();
        },
        Step::Input(i) => world.session.input_changed(&ids[*i]),
        Step::PeerTyping(i, typing) => {
            world.push_typing(&ids[*i], &format!("peer{i}"), *typing).await;
        },
        Step::Advance(millis) => world.advance(Duration::from_millis(*millis)),
        Step::Drop => world.session.transport_closed("network lost"),
        Step::Reconnect => {
            world.session.connect(&StaticToken::new("test-token"));
            world.session.transport_opened();
        },
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Store invariants hold after every step of a live session.
    #[test]
    fn prop_session_invariants_hold(steps in prop::collection::vec(step_strategy(), 0..40)) {
        block_on(async {
            let (mut world, ids) = seeded_world().await;
            for (index, step) in steps.iter().enumerate() {
                apply(&mut world, &ids, step).await;
                world.assert_invariants(&format!("after step {index}: {step:?}"));
            }
        });
    }

    /// Every peer message posted to the server is in the store once its
    /// conversation is opened, whatever happened to the socket meanwhile.
    #[test]
    fn prop_open_reconciles_with_server(steps in prop::collection::vec(step_strategy(), 0..30)) {
        block_on(async {
            let (mut world, ids) = seeded_world().await;
            for step in &steps {
                apply(&mut world, &ids, step).await;
            }

            for id in &ids {
                world.session.open_conversation(id).await.unwrap();
                let mut held: Vec<_> =
                    world.session.store().messages(id).iter().map(|m| m.id.clone()).collect();
                let mut stored: Vec<_> =
                    world.api.stored_messages(id).into_iter().map(|m| m.id).collect();
                held.sort();
                stored.sort();
                assert_eq!(held, stored, "conversation {id}");
            }
        });
    }
}

#[tokio::test]
async fn opened_conversation_snapshot() {
    let mut world = World::new("me");
    let c1 = world.api.add_conversation("c1", "alice");
    world.api.post_from(&c1, "alice", "hi");
    world.connect();
    world.session.refresh_conversations().await.unwrap();

    world.env.advance(Duration::from_secs(1));
    world.session.open_conversation(&c1).await.unwrap();

    assert_eq!(world.session.transport_state(), TransportState::Connected);
    assert_eq!(world.api.unread(&c1), Some(0));
    insta::assert_json_snapshot!(world.snapshot(), @r#"
    {
      "focused": "c1",
      "conversations": [
        {
          "id": "c1",
          "counterparty_id": "alice",
          "counterparty_name": "alice",
          "last_message_preview": "hi",
          "last_message_time": "2024-01-01T00:00:00Z",
          "unread_count": 0
        }
      ],
      "threads": {
        "c1": [
          {
            "id": "msg-1",
            "conversation_id": "c1",
            "sender_id": "alice",
            "content": "hi",
            "sent_at": "2024-01-01T00:00:00Z",
            "read_at": "2024-01-01T00:00:01Z"
          }
        ]
      }
    }
    "#);
}
