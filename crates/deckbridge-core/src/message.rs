//! Destination-ready message model.
//!
//! A [`Message`] is built once per post by the extractor, handed to the
//! delivery client, and dropped. Its serialized field names are the ones the
//! publishing endpoint expects (`tweetUrl`, `mediaUrls`, ...).
//!
//! # Facets
//!
//! Rich-text spans are expressed as [`Facet`]s whose [`ByteSlice`] indexes the
//! UTF-8 encoding of [`Message::text`]. Offsets are byte positions, never
//! character counts.

use serde::{Deserialize, Serialize};

use crate::ids::PostId;

/// Feature type for link facets (mentions and external links).
pub const LINK_FEATURE_TYPE: &str = "app.bsky.richtext.facet#link";

/// Feature type for hashtag facets.
pub const TAG_FEATURE_TYPE: &str = "app.bsky.richtext.facet#tag";

/// Content classification of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    Video,
    Card,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Card => "card",
        }
    }
}

/// Half-open byte range over the UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// Typed annotation carried by a facet on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

/// What produced a facet. Mentions travel as link features, so the kind is
/// kept alongside for callers that need to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetKind {
    Mention,
    Hashtag,
    #[default]
    Link,
}

/// A rich-text span annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
    #[serde(skip)]
    pub kind: FacetKind,
}

impl Facet {
    /// Mention of a user, linking to their profile.
    pub fn mention(byte_start: usize, byte_end: usize, profile_uri: String) -> Self {
        Self {
            index: ByteSlice {
                byte_start,
                byte_end,
            },
            features: vec![FacetFeature::Link { uri: profile_uri }],
            kind: FacetKind::Mention,
        }
    }

    /// Hashtag; `tag` excludes the leading `#`.
    pub fn hashtag(byte_start: usize, byte_end: usize, tag: String) -> Self {
        Self {
            index: ByteSlice {
                byte_start,
                byte_end,
            },
            features: vec![FacetFeature::Tag { tag }],
            kind: FacetKind::Hashtag,
        }
    }

    /// Generic external link.
    pub fn link(byte_start: usize, byte_end: usize, uri: String) -> Self {
        Self {
            index: ByteSlice {
                byte_start,
                byte_end,
            },
            features: vec![FacetFeature::Link { uri }],
            kind: FacetKind::Link,
        }
    }

    /// Move the span left by `bytes`, saturating at zero.
    pub fn shift_left(&mut self, bytes: usize) {
        self.index.byte_start = self.index.byte_start.saturating_sub(bytes);
        self.index.byte_end = self.index.byte_end.saturating_sub(bytes);
    }
}

/// Display name and handle of the post's author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub fullname: String,
    pub username: String,
}

/// Extracted representation of one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub post_id: PostId,
    pub text: String,
    #[serde(rename = "tweetUrl")]
    pub source_url: String,
    pub author: Author,
    pub media_urls: Vec<String>,
    pub video_thumbnail: Option<String>,
    pub card_short_url: Option<String>,
    pub content_type: ContentType,
    pub facets: Vec<Facet>,
    #[serde(rename = "quotedTweetId")]
    pub quoted_post_id: Option<String>,
}

impl Message {
    /// A message with no content for the given post.
    pub fn empty(post_id: PostId) -> Self {
        Self {
            post_id,
            text: String::new(),
            source_url: String::new(),
            author: Author::default(),
            media_urls: Vec::new(),
            video_thumbnail: None,
            card_short_url: None,
            content_type: ContentType::Text,
            facets: Vec::new(),
            quoted_post_id: None,
        }
    }

    /// The slice of text covered by a facet, if its range is valid.
    pub fn facet_text(&self, facet: &Facet) -> Option<&str> {
        self.text
            .get(facet.index.byte_start..facet.index.byte_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_wire_format() {
        let facet = Facet::hashtag(4, 9, "rust".to_string());
        let json = serde_json::to_value(&facet).unwrap();
        assert_eq!(json["index"]["byteStart"], 4);
        assert_eq!(json["index"]["byteEnd"], 9);
        assert_eq!(json["features"][0]["$type"], TAG_FEATURE_TYPE);
        assert_eq!(json["features"][0]["tag"], "rust");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_link_feature_type() {
        let facet = Facet::mention(0, 6, "https://twitter.com/alice/".to_string());
        let json = serde_json::to_value(&facet).unwrap();
        assert_eq!(json["features"][0]["$type"], LINK_FEATURE_TYPE);
        assert_eq!(json["features"][0]["uri"], "https://twitter.com/alice/");
    }

    #[test]
    fn test_message_field_names() {
        let mut message = Message::empty(PostId::parse("42").unwrap());
        message.text = "hello".to_string();
        message.source_url = "https://x.com/alice/status/42".to_string();
        message.quoted_post_id = Some("41".to_string());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["tweetUrl"], "https://x.com/alice/status/42");
        assert_eq!(json["contentType"], "text");
        assert_eq!(json["quotedTweetId"], "41");
        assert!(json["videoThumbnail"].is_null());
        assert!(json["cardShortUrl"].is_null());
        assert!(json["mediaUrls"].as_array().unwrap().is_empty());
        assert!(json.get("postId").is_none());
    }

    #[test]
    fn test_shift_left_saturates() {
        let mut facet = Facet::link(2, 10, "https://example.com".to_string());
        facet.shift_left(3);
        assert_eq!(facet.index.byte_start, 0);
        assert_eq!(facet.index.byte_end, 7);
    }

    #[test]
    fn test_facet_text() {
        let mut message = Message::empty(PostId::parse("1").unwrap());
        message.text = "héllo @bob".to_string();
        let facet = Facet::mention(7, 11, "https://twitter.com/bob/".to_string());
        assert_eq!(message.facet_text(&facet), Some("@bob"));
    }
}
