use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use shipbot_core::config::TwitterConfig;
use tokio::sync::Mutex;
use tracing::debug;

use crate::events::{PublishError, ReplyPublisher, StreamEnvelope, StreamEvent};
use crate::stream::{StreamTransport, TransportError};
use crate::wire::parse_envelope;

const STREAM_PATH: &str = "/2/tweets/search/stream";
const TWEETS_PATH: &str = "/2/tweets";
const STREAM_QUERY: [(&str, &str); 3] = [
    ("expansions", "author_id"),
    ("tweet.fields", "author_id,note_tweet"),
    ("user.fields", "username"),
];

/// Builds a client for the long-lived stream. Only the connect phase is
/// bounded; a total request timeout would cut the stream off.
pub fn build_stream_client(connect_timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .user_agent(concat!("shipbot/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[derive(Default)]
struct StreamState {
    response: Option<Response>,
    buffer: Vec<u8>,
}

pub struct HttpStreamTransport {
    client: Client,
    base_url: String,
    bearer_token: SecretString,
    state: Mutex<StreamState>,
}

impl HttpStreamTransport {
    pub fn new(client: Client, base_url: impl Into<String>, bearer_token: SecretString) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bearer_token,
            state: Mutex::new(StreamState::default()),
        }
    }

    pub fn from_config(client: Client, config: &TwitterConfig) -> Self {
        Self::new(client, config.api_base_url.clone(), config.bearer_token.clone())
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, STREAM_PATH))
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&STREAM_QUERY)
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Connect(format!("stream returned {status}: {body}")));
        }

        let mut state = self.state.lock().await;
        state.response = Some(response);
        state.buffer.clear();
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<StreamEnvelope>, TransportError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        loop {
            if let Some(line) = take_line(&mut state.buffer) {
                if line.trim().is_empty() {
                    debug!(event_name = "ingress.twitter.keep_alive", "stream keep-alive");
                    return Ok(Some(StreamEnvelope {
                        event_id: "keep-alive".to_owned(),
                        event: StreamEvent::KeepAlive,
                    }));
                }
                return Ok(Some(parse_envelope(&line)));
            }

            let Some(response) = state.response.as_mut() else {
                return Ok(None);
            };

            match response.chunk().await {
                Ok(Some(bytes)) => state.buffer.extend_from_slice(&bytes),
                Ok(None) => {
                    state.response = None;
                    let rest = String::from_utf8_lossy(&state.buffer).into_owned();
                    state.buffer.clear();
                    if rest.trim().is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(parse_envelope(rest.trim())));
                }
                Err(error) => {
                    state.response = None;
                    state.buffer.clear();
                    return Err(TransportError::Receive(error.to_string()));
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.response = None;
        state.buffer.clear();
        Ok(())
    }
}

fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let newline = buffer.iter().position(|byte| *byte == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=newline).collect();
    let text = String::from_utf8_lossy(&line);
    Some(text.trim_end_matches(['\r', '\n']).to_owned())
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

/// Posts replies in-thread using the bot account's user token.
pub struct HttpReplyPublisher {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl HttpReplyPublisher {
    pub fn new(client: Client, base_url: impl Into<String>, access_token: SecretString) -> Self {
        Self { client, base_url: base_url.into(), access_token }
    }

    pub fn from_config(client: Client, config: &TwitterConfig) -> Self {
        Self::new(client, config.api_base_url.clone(), config.access_token.clone())
    }
}

#[async_trait]
impl ReplyPublisher for HttpReplyPublisher {
    async fn publish_reply(&self, in_reply_to: &str, text: &str) -> Result<(), PublishError> {
        let request =
            ReplyRequest { text, reply: ReplyTarget { in_reply_to_tweet_id: in_reply_to } };
        let response = self
            .client
            .post(endpoint(&self.base_url, TWEETS_PATH))
            .bearer_auth(self.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| PublishError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}
