use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct RedirectState {
    page: Arc<str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checked_at: String,
}

pub fn router(redirect_url: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(redirect)
        .with_state(RedirectState { page: Arc::from(redirect_page(redirect_url)) })
}

pub async fn spawn(bind_address: &str, port: u16, redirect_url: &str) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.redirect.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        redirect_url,
        "redirect server started"
    );

    let app = router(redirect_url);
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            error!(
                event_name = "system.redirect.error",
                correlation_id = "bootstrap",
                error = %error,
                "redirect server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: "shipbot-server",
        checked_at: Utc::now().to_rfc3339(),
    })
}

async fn redirect(State(state): State<RedirectState>) -> impl IntoResponse {
    debug!(event_name = "system.redirect.served", "served redirect page");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        state.page.to_string(),
    )
}

fn redirect_page(url: &str) -> String {
    let script_url = script_string(url);
    let url = escape_html(url);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta http-equiv=\"refresh\" content=\"0; url={url}\">\n\
         <script>window.location.replace({script_url});</script>\n\
         </head>\n<body>\n<a href=\"{url}\">{url}</a>\n</body>\n</html>\n"
    )
}

/// Quotes `raw` as a JS string literal. Script text is not entity-decoded,
/// and `</` must not close the surrounding `<script>` element.
fn script_string(raw: &str) -> String {
    serde_json::Value::from(raw).to_string().replace("</", "<\\/")
}

fn escape_html(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut escaped, ch| {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
        escaped
    })
}
