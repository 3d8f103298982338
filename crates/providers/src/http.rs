use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shipbot_core::errors::IntegrationError;

const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("shipbot/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn transport_error(error: reqwest::Error) -> IntegrationError {
    IntegrationError::Transport(error.to_string())
}

/// Rejects non-2xx responses with a trimmed copy of the body, then decodes JSON.
pub(crate) async fn decode_json<T>(response: Response) -> Result<T, IntegrationError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IntegrationError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    response.json::<T>().await.map_err(|error| IntegrationError::Decode(error.to_string()))
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}
