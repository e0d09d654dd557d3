//! Media detection and content-type classification.

use std::sync::LazyLock;

use deckbridge_core::{ContentType, LARGE_IMAGE_QUERY};
use scraper::{ElementRef, Selector};

use super::dom::{background_url, closest, find, selector};

static CARD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-testid="card"].hw-card-container"#));
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href^="https://t.co/"]"#));
static MEDIA: LazyLock<Selector> = LazyLock::new(|| selector(".js-media"));
static IMAGE_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".js-media-image-link"));
static VIDEO_OVERLAY: LazyLock<Selector> = LazyLock::new(|| selector(".video-overlay"));
static IS_VIDEO: LazyLock<Selector> = LazyLock::new(|| selector(".is-video"));
static GIF_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector(".js-media-gif-container"));
static HAS_VIDEO: LazyLock<Selector> = LazyLock::new(|| selector(r#"[data-has-video="true"]"#));
static PREVIEW_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| selector(".js-media-preview-container"));

/// Media attached to a post.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub content_type: ContentType,
    pub media_urls: Vec<String>,
    pub video_thumbnail: Option<String>,
    pub card_short_url: Option<String>,
}

/// Classify a post: card, then video, then image, else text.
pub fn classify(article: ElementRef<'_>) -> MediaInfo {
    if let Some(card) = article.select(&CARD).next() {
        return MediaInfo {
            content_type: ContentType::Card,
            card_short_url: card
                .select(&CARD_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
            ..Default::default()
        };
    }

    let Some(media) = article.select(&MEDIA).next() else {
        return MediaInfo::default();
    };

    if has_video(media) {
        return MediaInfo {
            content_type: ContentType::Video,
            video_thumbnail: video_thumbnail(media),
            ..Default::default()
        };
    }

    MediaInfo {
        content_type: ContentType::Image,
        media_urls: article
            .select(&IMAGE_LINK)
            .filter_map(background_url)
            .map(|url| large_image(&url))
            .collect(),
        ..Default::default()
    }
}

/// Any of the four video signals, checked in this order.
fn has_video(media: ElementRef<'_>) -> bool {
    media.value().attr("data-has-video") == Some("true")
        || media.select(&VIDEO_OVERLAY).next().is_some()
        || media.select(&IS_VIDEO).next().is_some()
        || media.select(&GIF_CONTAINER).next().is_some()
}

/// First thumbnail found by probing each video signal's location in turn.
fn video_thumbnail(media: ElementRef<'_>) -> Option<String> {
    let from_gif = || {
        media
            .select(&GIF_CONTAINER)
            .next()
            .and_then(background_url)
    };
    let from_has_video = || {
        media
            .select(&HAS_VIDEO)
            .next()
            .and_then(|el| find(el, &IMAGE_LINK))
            .and_then(background_url)
    };
    let from_overlay = || {
        media
            .select(&VIDEO_OVERLAY)
            .next()
            .and_then(|overlay| closest(overlay, &PREVIEW_CONTAINER))
            .and_then(|container| container.select(&IMAGE_LINK).next())
            .and_then(background_url)
    };
    let from_is_video = || {
        media.select(&IS_VIDEO).next()?;
        media.select(&IMAGE_LINK).next().and_then(background_url)
    };

    from_gif()
        .or_else(from_has_video)
        .or_else(from_overlay)
        .or_else(from_is_video)
        .map(|url| large_image(&url))
}

/// Drop any query string and request the large rendition.
pub fn large_image(url: &str) -> String {
    let base = url.split('?').next().unwrap_or(url);
    format!("{}{}", base, LARGE_IMAGE_QUERY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::dom::root_element;
    use scraper::Html;

    fn classify_html(html: &str) -> MediaInfo {
        let fragment = Html::parse_fragment(html);
        classify(root_element(&fragment).unwrap())
    }

    const IMG: &str = "https://pbs.twimg.com/media/ABC.jpg";

    #[test]
    fn test_text_only() {
        let info = classify_html(r#"<article><p class="js-tweet-text">hi</p></article>"#);
        assert_eq!(info, MediaInfo::default());
        assert_eq!(info.content_type, ContentType::Text);
    }

    #[test]
    fn test_images_are_normalized() {
        let info = classify_html(&format!(
            r#"<article><div class="js-media">
                <a class="js-media-image-link" style="background-image:url({IMG}?format=jpg&amp;name=small)"></a>
                <a class="js-media-image-link" style="background-image:url('{IMG}')"></a>
            </div></article>"#
        ));
        assert_eq!(info.content_type, ContentType::Image);
        assert_eq!(
            info.media_urls,
            vec![
                format!("{IMG}?format=jpg&name=large"),
                format!("{IMG}?format=jpg&name=large"),
            ]
        );
    }

    #[test]
    fn test_card_wins_over_media() {
        let info = classify_html(&format!(
            r#"<article>
                <div class="js-media"><a class="js-media-image-link" style="background-image:url({IMG})"></a></div>
                <div data-testid="card" class="hw-card-container"><a href="https://t.co/card1">card</a></div>
            </article>"#
        ));
        assert_eq!(info.content_type, ContentType::Card);
        assert_eq!(info.card_short_url.as_deref(), Some("https://t.co/card1"));
        assert!(info.media_urls.is_empty());
    }

    #[test]
    fn test_video_attribute_signal() {
        let info = classify_html(&format!(
            r#"<article><div class="js-media" data-has-video="true">
                <a class="js-media-image-link" style="background-image:url({IMG}?x=1)"></a>
            </div></article>"#
        ));
        // The attribute marks a video, but no thumbnail probe looks at the
        // media element itself.
        assert_eq!(info.content_type, ContentType::Video);
        assert_eq!(info.video_thumbnail, None);
    }

    #[test]
    fn test_video_nested_has_video_thumbnail() {
        let info = classify_html(&format!(
            r#"<article><div class="js-media">
                <div class="is-video" data-has-video="true">
                    <a class="js-media-image-link" style="background-image:url({IMG}?x=1)"></a>
                </div>
            </div></article>"#
        ));
        assert_eq!(info.content_type, ContentType::Video);
        assert_eq!(
            info.video_thumbnail.as_deref(),
            Some("https://pbs.twimg.com/media/ABC.jpg?format=jpg&name=large")
        );
    }

    #[test]
    fn test_video_overlay_thumbnail() {
        let info = classify_html(&format!(
            r#"<article><div class="js-media">
                <div class="js-media-preview-container">
                    <a class="js-media-image-link" style="background-image:url({IMG})"></a>
                    <div class="video-overlay"></div>
                </div>
            </div></article>"#
        ));
        assert_eq!(info.content_type, ContentType::Video);
        assert!(info.video_thumbnail.is_some());
        assert!(info.media_urls.is_empty());
    }

    #[test]
    fn test_gif_container_probed_first() {
        let info = classify_html(
            r#"<article><div class="js-media">
                <div class="js-media-gif-container" style="background-image:url(https://x/gif.jpg)"></div>
                <div class="is-video"></div>
                <a class="js-media-image-link" style="background-image:url(https://x/other.jpg)"></a>
            </div></article>"#,
        );
        assert_eq!(
            info.video_thumbnail.as_deref(),
            Some("https://x/gif.jpg?format=jpg&name=large")
        );
    }

    #[test]
    fn test_large_image() {
        assert_eq!(large_image("https://a/b.png?x=1&y=2"), "https://a/b.png?format=jpg&name=large");
        assert_eq!(large_image("https://a/b.png"), "https://a/b.png?format=jpg&name=large");
    }
}
