//! Client for the chat server API
//!
//! `Api` wraps a `Transport` with one typed method per logical endpoint.

mod error;
mod http;
mod transport;
pub(crate) mod types;

#[cfg(test)]
pub mod testing;

pub use error::{ApiError, ApiErrorKind, FALLBACK_ERROR_MESSAGE};
pub use http::HttpTransport;
pub use transport::{ApiRequest, LoggingTransport, Method, RequestBody, Transport};

use crate::domain::{Account, Conversation, ConversationId, Credential, Message, Role};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use types::{
    AccountResponse, ConversationResponse, CreateAccountRequest, CreateConversationRequest,
    CreateMessageRequest, MessageResponse, TokenResponse,
};

/// Typed endpoints over a shared transport
pub struct Api<T> {
    transport: Arc<T>,
}

impl<T> Clone for Api<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Api<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_arc(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Exchange identifier + secret for a bearer credential (form-encoded)
    pub async fn issue_token(&self, identifier: &str, secret: &str) -> Result<Credential, ApiError> {
        let body = RequestBody::Form(vec![
            ("username".to_string(), identifier.to_string()),
            ("password".to_string(), secret.to_string()),
        ]);
        let token: TokenResponse = self.call(ApiRequest::post("/token", body)).await?;
        if token.access_token.is_empty() {
            return Err(ApiError::decode("Server returned an empty access token"));
        }
        if !token.is_bearer() {
            return Err(ApiError::decode(format!(
                "Unsupported token type: {}",
                token.token_type.as_deref().unwrap_or_default()
            )));
        }
        Ok(Credential::new(token.access_token))
    }

    pub async fn create_account(&self, identifier: &str, secret: &str) -> Result<Account, ApiError> {
        let body = json_body(&CreateAccountRequest {
            email: identifier,
            password: secret,
        })?;
        let account: AccountResponse = self.call(ApiRequest::post("/users/", body)).await?;
        Ok(account.into())
    }

    pub async fn list_conversations(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Conversation>, ApiError> {
        let chats: Vec<ConversationResponse> = self
            .call(ApiRequest::get("/chats/").with_bearer(credential))
            .await?;
        Ok(chats.into_iter().map(Conversation::from).collect())
    }

    pub async fn create_conversation(
        &self,
        credential: &Credential,
        title: &str,
    ) -> Result<Conversation, ApiError> {
        let body = json_body(&CreateConversationRequest { title })?;
        let chat: ConversationResponse = self
            .call(ApiRequest::post("/chats/", body).with_bearer(credential))
            .await?;
        Ok(chat.into())
    }

    /// Post a message; the server answers with the assistant's reply
    pub async fn post_message(
        &self,
        credential: &Credential,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
    ) -> Result<Message, ApiError> {
        let body = json_body(&CreateMessageRequest { role, content })?;
        let reply: MessageResponse = self
            .call(ApiRequest::post(messages_path(conversation_id), body).with_bearer(credential))
            .await?;
        Ok(reply.into())
    }

    pub async fn list_messages(
        &self,
        credential: &Credential,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError> {
        let messages: Vec<MessageResponse> = self
            .call(ApiRequest::get(messages_path(conversation_id)).with_bearer(credential))
            .await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn call<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let path = request.path.clone();
        let value = self.transport.send(request).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::decode(format!("Unexpected response from {path}: {e}")))
    }
}

fn messages_path(conversation_id: ConversationId) -> String {
    format!("/chats/{conversation_id}/messages/")
}

fn json_body<B: serde::Serialize>(body: &B) -> Result<RequestBody, ApiError> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::decode(format!("Failed to encode request: {e}")))
}
