//! chatsync - line-oriented terminal client
//!
//! Reads commands from stdin and drives the auth and conversation sessions.
//! Logs go to stderr so they don't interleave with the transcript.

use chatsync::api::{Api, HttpTransport, LoggingTransport};
use chatsync::domain::{Conversation, ConversationId, Role};
use chatsync::notify::{NotificationEvent, Severity};
use chatsync::{
    AuthSession, ClientConfig, ConversationError, ConversationSession, FileStore,
    NotificationChannel, SyncState,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TITLE: &str = "New Chat";

const HELP: &str = "\
Commands:
  register <email> <password>   create an account
  login <email> <password>      log in
  logout                        log out
  list                          refresh conversations
  new [title]                   create and select a conversation
  select <id>                   select a conversation
  send <text>                   send to the selected conversation (or just type)
  show                          print the selected transcript
  ack                           clear a failed send
  quit                          exit";

type Client = LoggingTransport<HttpTransport>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        credentials = %config.credentials_path.display(),
        timeout_secs = config.request_timeout.as_secs(),
        "Starting chatsync"
    );

    let transport = HttpTransport::new(&config.api_url, config.request_timeout)?;
    let api = Api::new(LoggingTransport::new(transport));
    let notifications = NotificationChannel::new();
    let auth = Arc::new(AuthSession::restore(
        api,
        FileStore::new(&config.credentials_path),
        notifications.clone(),
    ));
    let session = ConversationSession::new(auth.clone(), notifications.clone());

    tokio::spawn(print_notifications(notifications.clone()));

    println!("chatsync - type `help` for commands");
    if auth.is_authenticated() {
        refresh(&auth, &session).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        if !run_command(&auth, &session, command, rest, line).await {
            break;
        }
    }

    Ok(())
}

/// Execute one command line; returns false to exit
async fn run_command(
    auth: &AuthSession<Client>,
    session: &ConversationSession<Client>,
    command: &str,
    rest: &str,
    line: &str,
) -> bool {
    match command {
        "quit" | "exit" => return false,
        "help" => println!("{HELP}"),
        "register" => {
            let Some((email, password)) = credentials(rest) else {
                println!("usage: register <email> <password>");
                return true;
            };
            if let Ok(account) = auth.register(email, password).await {
                println!("Created account {} ({})", account.id, account.email);
            }
        }
        "login" => {
            let Some((email, password)) = credentials(rest) else {
                println!("usage: login <email> <password>");
                return true;
            };
            if auth.login(email, password).await.is_ok() {
                println!("Logged in as {email}");
                refresh(auth, session).await;
            }
        }
        "logout" => {
            auth.logout();
            session.clear();
            println!("Logged out");
        }
        _ if !auth.is_authenticated() => println!("Please log in first"),
        "list" => refresh(auth, session).await,
        "new" => {
            let title = if rest.is_empty() { DEFAULT_TITLE } else { rest };
            match session.create_conversation(title).await {
                Ok(conversation) => {
                    println!("Created #{} {}", conversation.id, conversation.title);
                }
                Err(e) => handle_error(auth, session, &e),
            }
        }
        "select" => match rest.parse::<i64>() {
            Ok(id) if session.select_conversation(ConversationId(id)) => {
                if let Some(conversation) = session.selected() {
                    print_transcript(&conversation, session.sync_state(conversation.id));
                }
            }
            _ => println!("No conversation {rest}"),
        },
        "show" => match session.selected() {
            Some(conversation) => {
                print_transcript(&conversation, session.sync_state(conversation.id));
            }
            None => println!("No conversation selected"),
        },
        "ack" => {
            if let Some(id) = session.selected_id() {
                if let Err(e) = session.acknowledge_failure(id) {
                    println!("{e}");
                }
            }
        }
        "send" => send(auth, session, rest).await,
        _ => send(auth, session, line).await,
    }
    true
}

fn credentials(args: &str) -> Option<(&str, &str)> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(email), Some(password), None) => Some((email, password)),
        _ => None,
    }
}

async fn refresh(auth: &AuthSession<Client>, session: &ConversationSession<Client>) {
    match session.list_conversations().await {
        Ok(conversations) if conversations.is_empty() => {
            println!("No conversations yet, use `new` to start one");
        }
        Ok(conversations) => {
            let selected = session.selected_id();
            for conversation in conversations {
                let marker = if Some(conversation.id) == selected { '*' } else { ' ' };
                println!(
                    "{marker} #{} {} ({} messages)",
                    conversation.id,
                    conversation.title,
                    conversation.messages.len()
                );
            }
        }
        Err(e) => handle_error(auth, session, &e),
    }
}

async fn send(auth: &AuthSession<Client>, session: &ConversationSession<Client>, text: &str) {
    let Some(id) = session.selected_id() else {
        println!("No conversation selected, use `new` or `select <id>`");
        return;
    };

    match session.send_message(id, text).await {
        Ok(()) => {
            if let Some(conversation) = session.conversation(id) {
                if let Some(reply) = conversation
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                {
                    println!("assistant: {}", reply.content);
                }
            }
        }
        Err(ConversationError::EmptyMessage) => {}
        Err(e) => handle_error(auth, session, &e),
    }
}

/// An unauthorized answer means the credential is no longer good
fn handle_error(
    auth: &AuthSession<Client>,
    session: &ConversationSession<Client>,
    err: &ConversationError,
) {
    if err.is_unauthorized() {
        auth.logout();
        session.clear();
        println!("Session expired, please log in again");
    }
}

fn print_transcript(conversation: &Conversation, sync: Option<SyncState>) {
    println!("#{} {}", conversation.id, conversation.title);
    for message in &conversation.messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let pending = if message.is_provisional() { " (unsent)" } else { "" };
        println!("  {who}{pending}: {}", message.content);
    }
    if let Some(SyncState::Failed { message, .. }) = sync {
        println!("  [last send failed: {message}; `ack` to clear]");
    }
}

async fn print_notifications(notifications: NotificationChannel) {
    let mut events = notifications.subscribe();
    loop {
        match events.recv().await {
            Ok(NotificationEvent::Shown(entry)) => {
                let tag = match entry.severity {
                    Severity::Error => "error",
                    Severity::Success => "ok",
                };
                println!("[{tag}] {}", entry.message);
            }
            Ok(NotificationEvent::Removed { .. }) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification printer fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
