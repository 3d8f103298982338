//! Twitter integration - mention stream listener and reply publisher
//!
//! This crate connects the shipping-quote pipeline to Twitter:
//! - **Stream** (`stream`) - long-lived mention stream with reconnection logic
//! - **Events** (`events`) - mention handling, self-message filter, replies
//! - **Wire** (`wire`) - line-delimited JSON stream payloads
//! - **HTTP** (`http`) - reqwest-backed stream transport and reply publisher
//!
//! # Architecture
//!
//! ```text
//! Mention stream → StreamRunner → MentionHandler → ResponseBuilder → Yelp / ShipEngine
//!                                      ↓
//!                               ReplyPublisher ← "@user It'll cost between ..."
//! ```
//!
//! Handler failures never stop the stream: the runner logs them and posts
//! nothing for that mention.

pub mod events;
pub mod http;
pub mod stream;
pub mod wire;
