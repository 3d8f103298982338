//! Line-delimited JSON payloads from the filtered mention stream.

use serde::Deserialize;

use crate::events::{MentionEvent, StreamEnvelope, StreamEvent};

const UNPARSED_EVENT_ID: &str = "unparsed";

#[derive(Debug, Deserialize)]
struct StreamMessage {
    data: Option<TweetData>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    author_id: Option<String>,
    note_tweet: Option<NoteTweet>,
}

#[derive(Debug, Deserialize)]
struct NoteTweet {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

/// Decodes one stream line. Anything that is not a tweet with a known author
/// becomes an unsupported event rather than an error.
pub fn parse_envelope(line: &str) -> StreamEnvelope {
    let message = match serde_json::from_str::<StreamMessage>(line) {
        Ok(message) => message,
        Err(_) => return unsupported("unparseable"),
    };

    let Some(tweet) = message.data else {
        let event_type = if message.errors.is_empty() { "system" } else { "stream_error" };
        return unsupported(event_type);
    };

    let Some(author_id) = tweet.author_id else {
        return unsupported("mention_without_author");
    };
    let Some(author) = message.includes.users.into_iter().find(|user| user.id == author_id)
    else {
        return unsupported("mention_without_author");
    };

    // Long posts carry their full body in note_tweet; `text` is truncated.
    let text = tweet.note_tweet.map(|note| note.text).unwrap_or(tweet.text);

    StreamEnvelope {
        event_id: tweet.id.clone(),
        event: StreamEvent::Mention(MentionEvent {
            tweet_id: tweet.id,
            author_id,
            author_username: author.username,
            text,
        }),
    }
}

fn unsupported(event_type: &str) -> StreamEnvelope {
    StreamEnvelope {
        event_id: UNPARSED_EVENT_ID.to_owned(),
        event: StreamEvent::Unsupported { event_type: event_type.to_owned() },
    }
}
