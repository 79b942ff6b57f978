//! Wire request and response types

use crate::domain::{Account, Conversation, ConversationId, Message, MessageId, Role};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Response of the issue-token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Only bearer tokens are usable; a missing type is taken as bearer
    pub fn is_bearer(&self) -> bool {
        self.token_type
            .as_deref()
            .map_or(true, |t| t.eq_ignore_ascii_case("bearer"))
    }
}

/// Request to create an account
#[derive(Debug, Serialize)]
pub struct CreateAccountRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Account as returned by the server
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: i64,
    pub email: String,
}

impl From<AccountResponse> for Account {
    fn from(resp: AccountResponse) -> Self {
        Account {
            id: resp.id,
            email: resp.email,
        }
    }
}

/// Request to create a conversation
#[derive(Debug, Serialize)]
pub struct CreateConversationRequest<'a> {
    pub title: &'a str,
}

/// Request to post a message
#[derive(Debug, Serialize)]
pub struct CreateMessageRequest<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Message as returned by the server
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub role: Role,
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<MessageResponse> for Message {
    fn from(resp: MessageResponse) -> Self {
        Message {
            id: MessageId::Server(resp.id),
            role: resp.role,
            content: resp.content,
            timestamp: resp.timestamp,
        }
    }
}

/// Conversation ("chat") as returned by the server
#[derive(Debug, Deserialize)]
pub struct ConversationResponse {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<MessageResponse>,
}

impl From<ConversationResponse> for Conversation {
    fn from(resp: ConversationResponse) -> Self {
        Conversation {
            id: ConversationId(resp.id),
            title: resp.title,
            created_at: resp.created_at,
            messages: resp.messages.into_iter().map(Message::from).collect(),
        }
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (taken as UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}
