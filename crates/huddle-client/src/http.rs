//! REST client over reqwest.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_proto::{
    Conversation, ConversationId, Message, UserId,
    rest::{
        ConversationsResponse, CreateConversationRequest, CreateConversationResponse,
        HistoryResponse, MarkReadResponse, SendMessageRequest, SendMessageResponse,
        UnreadCountResponse,
    },
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{Api, ApiError, TokenProvider, socket::TransportError};

/// [`Api`] implementation speaking JSON over HTTPS.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    credentials: Arc<dyn TokenProvider>,
}

impl HttpApi {
    /// Create a client rooted at `base`.
    pub fn new(base: Url, credentials: Arc<dyn TokenProvider>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client, base, credentials })
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let token = self.credentials.token().filter(|t| !t.is_empty()).ok_or(ApiError::Unauthenticated)?;

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Network(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);

        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(%endpoint, "request");
        let response = request.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint: endpoint.to_owned(), status: status.as_u16() });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode(format!("{endpoint}: {e}")))
    }
}

#[async_trait]
impl Api for HttpApi {
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let request = self.request(Method::GET, &["conversations"])?;
        let body: ConversationsResponse = self.execute("GET /conversations", request).await?;
        Ok(body.conversations)
    }

    async fn messages(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        let request = self
            .request(Method::GET, &["messages", conversation_id.as_str()])?
            .query(&[("limit", limit)]);
        let body: HistoryResponse = self.execute("GET /messages/{id}", request).await?;
        Ok(body.messages)
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ApiError> {
        let request = self.request(Method::POST, &["messages"])?.json(&SendMessageRequest {
            conversation_id: conversation_id.clone(),
            content: content.to_owned(),
        });
        let body: SendMessageResponse = self.execute("POST /messages", request).await?;
        Ok(body.data)
    }

    async fn create_conversation(
        &self,
        counterparty_id: &UserId,
    ) -> Result<ConversationId, ApiError> {
        let request = self
            .request(Method::POST, &["conversations"])?
            .json(&CreateConversationRequest { counterparty_id: counterparty_id.clone() });
        let body: CreateConversationResponse = self.execute("POST /conversations", request).await?;
        Ok(body.conversation_id)
    }

    async fn mark_read(&self, conversation_id: &ConversationId) -> Result<ConversationId, ApiError> {
        let request =
            self.request(Method::POST, &["conversations", conversation_id.as_str(), "read"])?;
        let body: MarkReadResponse =
            self.execute("POST /conversations/{id}/read", request).await?;
        Ok(body.conversation_id)
    }

    async fn unread_total(&self) -> Result<u64, ApiError> {
        let request = self.request(Method::GET, &["messages", "unread-count"])?;
        let body: UnreadCountResponse = self.execute("GET /messages/unread-count", request).await?;
        Ok(body.total_unread)
    }
}
