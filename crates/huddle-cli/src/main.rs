//! Huddle command-line client.
//!
//! # Usage
//!
//! ```bash
//! export HUDDLE_TOKEN=...
//!
//! # List conversations with unread badges
//! huddle --api-url https://chat.example.com/api --user u1 conversations
//!
//! # Print and mark read the latest messages of a conversation
//! huddle --api-url https://chat.example.com/api --user u1 history c42
//!
//! # Follow a conversation live; each stdin line is sent as a message
//! huddle --api-url https://chat.example.com/api \
//!        --socket-url wss://chat.example.com/socket --user u1 watch c42
//! ```

#![allow(clippy::print_stdout)]

mod render;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use huddle_client::{
    DEFAULT_HISTORY_LIMIT, EndpointConfig, Session, SessionConfig, StaticToken, SystemEnv,
    TokenProvider, TransportAction,
    http::HttpApi,
    runtime::{Command, Runtime},
};
use huddle_proto::{ConversationId, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Huddle conversation client
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Read and send Huddle messages from the terminal")]
#[command(version)]
struct Args {
    /// REST API base URL
    #[arg(long, env = "HUDDLE_API_URL")]
    api_url: String,

    /// WebSocket URL for live updates
    #[arg(long, env = "HUDDLE_SOCKET_URL", default_value = "ws://localhost:3000/socket")]
    socket_url: String,

    /// Session token
    #[arg(long, env = "HUDDLE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Signed-in user id
    #[arg(long, env = "HUDDLE_USER")]
    user: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List conversations, most recent first
    Conversations,
    /// Print the server-side unread total
    Unread,
    /// Print recent messages of a conversation and mark it read
    History {
        /// Conversation id
        conversation: String,
        /// Number of messages to fetch
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Send one message
    Send {
        /// Conversation id
        conversation: String,
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Find or create the conversation with a user
    Start {
        /// Other user's id
        user: String,
    },
    /// Follow live updates, optionally for one open conversation
    Watch {
        /// Conversation to open; stdin lines are sent to it
        conversation: Option<String>,
    },
}

/// Session for request/response commands. The live channel is never opened.
type OneShot = Session<HttpApi, SystemEnv, Vec<TransportAction>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let endpoints = EndpointConfig::parse(&args.api_url, &args.socket_url)?;
    let credentials: Arc<dyn TokenProvider> = match args.token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => {
            tracing::warn!("no token given, requests will be rejected");
            Arc::new(None::<String>)
        },
    };
    let mut config = SessionConfig::new(args.user);

    match args.command {
        Cmd::Watch { conversation } => {
            watch(endpoints, config, credentials, conversation.map(ConversationId::from)).await?;
        },
        Cmd::History { conversation, limit } => {
            config.history_limit = limit;
            let mut session = one_shot(endpoints, config, credentials)?;
            let conversation_id = ConversationId::from(conversation);
            session.open_conversation(&conversation_id).await?;
            for message in session.store().messages(&conversation_id) {
                println!("{}", render::message_line(message, session.local_user()));
            }
        },
        Cmd::Conversations => {
            let mut session = one_shot(endpoints, config, credentials)?;
            session.refresh_conversations().await?;
            for conversation in session.store().conversations() {
                println!("{}", render::conversation_line(conversation));
            }
        },
        Cmd::Unread => {
            let session = one_shot(endpoints, config, credentials)?;
            println!("{}", session.fetch_unread_total().await?);
        },
        Cmd::Send { conversation, text } => {
            let mut session = one_shot(endpoints, config, credentials)?;
            let message =
                session.send_message(&ConversationId::from(conversation), &text.join(" ")).await?;
            println!("{}", message.id);
        },
        Cmd::Start { user } => {
            let mut session = one_shot(endpoints, config, credentials)?;
            println!("{}", session.start_conversation(&UserId::from(user)).await?);
        },
    }

    Ok(())
}

fn one_shot(
    endpoints: EndpointConfig,
    config: SessionConfig,
    credentials: Arc<dyn TokenProvider>,
) -> Result<OneShot, Box<dyn std::error::Error>> {
    let api = HttpApi::new(endpoints.api_url, credentials)?;
    Ok(Session::new(SystemEnv::new(), api, Vec::new(), config))
}

async fn watch(
    endpoints: EndpointConfig,
    config: SessionConfig,
    credentials: Arc<dyn TokenProvider>,
    conversation: Option<ConversationId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let local_user = config.local_user.clone();
    let (runtime, mut handle) = Runtime::new(endpoints, config, credentials)?;
    let task = tokio::spawn(runtime.run());

    if let Some(conversation_id) = &conversation {
        handle.commands.send(Command::Open(conversation_id.clone())).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = render::event_line(&event, &local_user) {
                    println!("{line}");
                }
            }

            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim() == "/quit" => break,
                    Some(line) => {
                        let Some(conversation_id) = &conversation else {
                            println!("! open a conversation to send messages");
                            continue;
                        };
                        handle.commands.send(Command::InputChanged(conversation_id.clone())).await?;
                        handle
                            .commands
                            .send(Command::Send { conversation_id: conversation_id.clone(), content: line })
                            .await?;
                    },
                    None => stdin_open = false,
                }
            }
        }
    }

    handle.commands.send(Command::Shutdown).await?;
    task.await?;
    tracing::info!(user = %local_user, "watch ended");
    Ok(())
}
