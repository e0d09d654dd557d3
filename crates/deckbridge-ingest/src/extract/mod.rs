//! Post markup to [`Message`].
//!
//! Extraction is a pure function of the post's markup. The host contract it
//! relies on:
//!
//! ```text
//! article.stream-item[data-tweet-id]
//! ├── .fullname / .username                author
//! ├── .tweet-timestamp[data-time|datetime] posted-at
//! ├── .js-tweet-text                       body (text + facets)
//! ├── .js-media                            images / video
//! ├── [data-testid=card].hw-card-container link card
//! └── .quoted-tweet[data-tweet-id]         quoted post
//! ```

pub(crate) mod dom;
mod media;
mod text;

use std::sync::LazyLock;

use deckbridge_core::{Author, Message, PostId};
use scraper::{ElementRef, Html, Selector};

pub use media::{MediaInfo, classify, large_image};
pub use text::{RichText, assemble};

use dom::{root_element, selector, text_content};

static BODY: LazyLock<Selector> = LazyLock::new(|| selector(".js-tweet-text"));
static QUOTED: LazyLock<Selector> = LazyLock::new(|| selector(".quoted-tweet"));
static FULLNAME: LazyLock<Selector> = LazyLock::new(|| selector(".fullname"));
static USERNAME: LazyLock<Selector> = LazyLock::new(|| selector(".username"));
static TIMESTAMP: LazyLock<Selector> = LazyLock::new(|| selector(".tweet-timestamp"));

/// Extraction could not produce a complete message.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The post has no body element. Everything except text and facets was
    /// still extracted.
    #[error("post {} has no body element", .partial.post_id)]
    MissingBody { partial: Box<Message> },
}

impl ExtractionError {
    /// The best-effort message: empty text, no facets.
    pub fn into_partial(self) -> Message {
        match self {
            ExtractionError::MissingBody { partial } => *partial,
        }
    }
}

/// Build a message from a post's markup.
pub fn extract(html: &str, post_id: &PostId) -> Result<Message, ExtractionError> {
    let fragment = Html::parse_fragment(html);
    let mut message = Message::empty(post_id.clone());

    let Some(article) = root_element(&fragment) else {
        return Err(ExtractionError::MissingBody {
            partial: Box::new(message),
        });
    };

    message.quoted_post_id = article
        .select(&QUOTED)
        .next()
        .and_then(|q| q.value().attr("data-tweet-id"))
        .map(str::to_string);
    message.author = author(article);
    message.source_url = source_url(&message.author, post_id);

    let MediaInfo {
        content_type,
        media_urls,
        video_thumbnail,
        card_short_url,
    } = classify(article);
    message.content_type = content_type;
    message.media_urls = media_urls;
    message.video_thumbnail = video_thumbnail;
    message.card_short_url = card_short_url;

    let Some(body) = article.select(&BODY).next() else {
        return Err(ExtractionError::MissingBody {
            partial: Box::new(message),
        });
    };

    let RichText { text, facets } = assemble(body, message.quoted_post_id.as_deref());
    message.text = text;
    message.facets = facets;

    tracing::debug!(
        post_id = %post_id,
        content_type = message.content_type.as_str(),
        facets = message.facets.len(),
        "Extracted post"
    );
    Ok(message)
}

/// When the post was made: `data-time` millis, else the ISO `datetime`,
/// else `now_millis`.
pub fn post_timestamp(html: &str, now_millis: i64) -> i64 {
    let fragment = Html::parse_fragment(html);
    let Some(el) = fragment.select(&TIMESTAMP).next() else {
        return now_millis;
    };
    let el = el.value();

    if let Some(ms) = el
        .attr("data-time")
        .and_then(|t| t.trim().parse::<i64>().ok())
    {
        return ms;
    }

    el.attr("datetime")
        .and_then(|dt| chrono::DateTime::parse_from_rfc3339(dt.trim()).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(now_millis)
}

fn author(article: ElementRef<'_>) -> Author {
    let first_text = |sel: &Selector| {
        article
            .select(sel)
            .next()
            .map(|el| text_content(el).trim().to_string())
            .unwrap_or_default()
    };
    Author {
        fullname: first_text(&FULLNAME),
        username: first_text(&USERNAME),
    }
}

/// `https://x.com/{user}/status/{id}`, or empty without a username.
fn source_url(author: &Author, post_id: &PostId) -> String {
    let username = author.username.replacen('@', "", 1);
    if username.is_empty() {
        tracing::warn!(post_id = %post_id, "Could not build post URL: no username");
        return String::new();
    }
    format!("https://x.com/{}/status/{}", username, post_id)
}
