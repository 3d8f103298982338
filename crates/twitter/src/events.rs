use std::sync::Arc;

use async_trait::async_trait;
use shipbot_core::errors::ApplicationError;
use shipbot_core::response::ResponseBuilder;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEnvelope {
    pub event_id: String,
    pub event: StreamEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Mention(MentionEvent),
    /// Blank line the stream sends to hold an idle connection open.
    KeepAlive,
    Unsupported { event_type: String },
}

impl StreamEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Mention(_) => "mention",
            Self::KeepAlive => "keep_alive",
            Self::Unsupported { event_type } => event_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionEvent {
    pub tweet_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied(String),
    Ignored,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("reply request failed: {0}")]
    Request(String),
    #[error("reply rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Pipeline(#[from] ApplicationError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl EventHandlerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(error) => error.kind().as_str(),
            Self::Publish(_) => "publish",
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        envelope: &StreamEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Produces the reply body for a mention's text.
#[async_trait]
pub trait MentionResponder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String, ApplicationError>;
}

#[async_trait]
impl MentionResponder for ResponseBuilder {
    async fn respond(&self, text: &str) -> Result<String, ApplicationError> {
        self.build_response(text).await
    }
}

#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    async fn publish_reply(&self, in_reply_to: &str, text: &str) -> Result<(), PublishError>;
}

pub struct MentionHandler {
    account_id: String,
    responder: Arc<dyn MentionResponder>,
    publisher: Arc<dyn ReplyPublisher>,
}

impl MentionHandler {
    pub fn new(
        account_id: impl Into<String>,
        responder: Arc<dyn MentionResponder>,
        publisher: Arc<dyn ReplyPublisher>,
    ) -> Self {
        Self { account_id: account_id.into(), responder, publisher }
    }
}

#[async_trait]
impl EventHandler for MentionHandler {
    async fn handle(
        &self,
        envelope: &StreamEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let StreamEvent::Mention(mention) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if mention.author_id == self.account_id {
            debug!(
                event_name = "ingress.twitter.self_mention_skipped",
                correlation_id = %ctx.correlation_id,
                tweet_id = %mention.tweet_id,
                "ignoring our own post"
            );
            return Ok(HandlerResult::Ignored);
        }

        info!(
            event_name = "ingress.twitter.mention_received",
            correlation_id = %ctx.correlation_id,
            tweet_id = %mention.tweet_id,
            author = %mention.author_username,
            text = %mention.text,
            "received mention"
        );

        let body = self.responder.respond(&mention.text).await?;
        let reply = reply_text(&mention.author_username, &body);

        info!(
            event_name = "egress.twitter.reply_sending",
            correlation_id = %ctx.correlation_id,
            tweet_id = %mention.tweet_id,
            reply = %reply,
            "sending reply"
        );
        self.publisher.publish_reply(&mention.tweet_id, &reply).await?;

        Ok(HandlerResult::Replied(reply))
    }
}

pub fn reply_text(username: &str, body: &str) -> String {
    format!("@{username} {body}")
}
