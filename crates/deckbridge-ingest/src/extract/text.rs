//! Post body to plain text plus facets.
//!
//! Facet ranges are byte offsets into the UTF-8 text, measured against the
//! text accumulated so far at the moment each rich element is appended.

use std::sync::LazyLock;

use deckbridge_core::Facet;
use scraper::{ElementRef, Node};

use super::dom::{has_class, selector, text_content};

static HASHTAG_TARGET: LazyLock<scraper::Selector> =
    LazyLock::new(|| selector(".link-complex-target"));

/// Text and facets assembled from a post body.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RichText {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// Walk the body's children in document order.
///
/// `quoted_post_id` suppresses external links that point at the quoted post.
pub fn assemble(body: ElementRef<'_>, quoted_post_id: Option<&str>) -> RichText {
    let mut out = RichText::default();

    for child in body.children() {
        match child.value() {
            Node::Text(text) => out.text.push_str(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    append_element(&mut out, element, quoted_post_id);
                }
            }
            _ => {}
        }
    }

    finish(out)
}

fn append_element(out: &mut RichText, element: ElementRef<'_>, quoted_post_id: Option<&str>) {
    let value = element.value();

    match value.name() {
        "a" => {
            if value
                .attr("onclick")
                .is_some_and(|onclick| onclick.contains("expandTweet"))
            {
                return;
            }

            if has_class(element, "link-complex") {
                append_link_complex(out, element);
            } else if has_class(element, "url-ext") {
                let url = value
                    .attr("data-full-url")
                    .filter(|u| !u.is_empty())
                    .or_else(|| value.attr("href"))
                    .unwrap_or_default();
                if url.is_empty() {
                    return;
                }
                if let Some(quoted) = quoted_post_id
                    && url.contains(quoted)
                {
                    tracing::debug!("Dropping link to quoted post: {}", url);
                    return;
                }
                let start = out.text.len();
                out.text.push_str(url);
                out.facets
                    .push(Facet::link(start, out.text.len(), url.to_string()));
            } else {
                out.text.push_str(&text_content(element));
            }
        }
        "img" if has_class(element, "emoji") => {
            out.text.push_str(value.attr("alt").unwrap_or_default());
        }
        _ => out.text.push_str(&text_content(element)),
    }
}

fn append_link_complex(out: &mut RichText, element: ElementRef<'_>) {
    let value = element.value();
    let start = out.text.len();

    match value.attr("rel") {
        Some("user") => {
            // A mention without a username contributes nothing.
            if let Some(username) = value.attr("data-user-name").filter(|u| !u.is_empty()) {
                out.text.push('@');
                out.text.push_str(username);
                out.facets.push(Facet::mention(
                    start,
                    out.text.len(),
                    format!("https://twitter.com/{}/", username),
                ));
            }
        }
        Some("hashtag") => {
            if let Some(target) = element.select(&HASHTAG_TARGET).next() {
                let tag = text_content(target);
                out.text.push('#');
                out.text.push_str(&tag);
                out.facets.push(Facet::hashtag(start, out.text.len(), tag));
            }
        }
        _ => out.text.push_str(&text_content(element)),
    }
}

/// Trim the text and move facets so they still cover the same bytes.
fn finish(mut out: RichText) -> RichText {
    let leading = out.text.len() - out.text.trim_start().len();
    let text = out.text.trim().to_string();
    let len = text.len();

    for facet in &mut out.facets {
        facet.shift_left(leading);
        facet.index.byte_end = facet.index.byte_end.min(len);
    }
    out.facets.retain(|f| f.index.byte_start < f.index.byte_end);
    out.text = text;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckbridge_core::{FacetFeature, FacetKind};
    use scraper::Html;

    fn body(inner: &str) -> Html {
        Html::parse_fragment(&format!(r#"<p class="js-tweet-text">{}</p>"#, inner))
    }

    fn run(inner: &str, quoted: Option<&str>) -> RichText {
        let html = body(inner);
        let p = html.select(&selector("p")).next().unwrap();
        assemble(p, quoted)
    }

    #[test]
    fn test_plain_text_is_trimmed() {
        let out = run("  hello world \n", None);
        assert_eq!(out.text, "hello world");
        assert!(out.facets.is_empty());
    }

    #[test]
    fn test_mention_byte_offset_after_multibyte_text() {
        let out = run(
            r#"日本語 <a class="link-complex" rel="user" data-user-name="alice">@alice</a>"#,
            None,
        );
        assert_eq!(out.text, "日本語 @alice");
        let facet = &out.facets[0];
        // "日本語 " is 4 chars but 10 bytes.
        assert_eq!(facet.index.byte_start, 10);
        assert_eq!(facet.index.byte_end, 16);
        assert_eq!(facet.kind, FacetKind::Mention);
        assert_eq!(
            facet.features[0],
            FacetFeature::Link {
                uri: "https://twitter.com/alice/".to_string()
            }
        );
        assert_eq!(&out.text[facet.index.byte_start..facet.index.byte_end], "@alice");
    }

    #[test]
    fn test_hashtag_uses_rendered_label() {
        let out = run(
            r##"go <a class="link-complex" rel="hashtag" href="#"><span class="link-complex-target">Rust言語</span></a>!"##,
            None,
        );
        assert_eq!(out.text, "go #Rust言語!");
        let facet = &out.facets[0];
        assert_eq!(facet.kind, FacetKind::Hashtag);
        assert_eq!(
            facet.features[0],
            FacetFeature::Tag {
                tag: "Rust言語".to_string()
            }
        );
        assert_eq!(&out.text[facet.index.byte_start..facet.index.byte_end], "#Rust言語");
    }

    #[test]
    fn test_external_link_uses_full_url() {
        let out = run(
            r#"see <a class="url-ext" href="https://t.co/x" data-full-url="https://example.com/long/path">example.com/long…</a>"#,
            None,
        );
        assert_eq!(out.text, "see https://example.com/long/path");
        assert_eq!(out.facets[0].kind, FacetKind::Link);
        assert_eq!(out.facets[0].index.byte_start, 4);
    }

    #[test]
    fn test_external_link_falls_back_to_href() {
        let out = run(r#"<a class="url-ext" href="https://t.co/abc">t.co</a>"#, None);
        assert_eq!(out.text, "https://t.co/abc");
    }

    #[test]
    fn test_quoted_post_link_dropped() {
        let out = run(
            r#"look <a class="url-ext" data-full-url="https://twitter.com/bob/status/42">link</a>"#,
            Some("42"),
        );
        assert_eq!(out.text, "look");
        assert!(out.facets.is_empty());
    }

    #[test]
    fn test_expand_control_and_emoji() {
        let out = run(
            r#"hi <img class="emoji" alt="😀" src="x.png"> there <a onclick="expandTweet(event)">Show more</a>"#,
            None,
        );
        assert_eq!(out.text, "hi 😀 there");
    }

    #[test]
    fn test_leading_whitespace_shifts_facets() {
        let out = run(
            r#"   <a class="link-complex" rel="user" data-user-name="bob">@bob</a> hi"#,
            None,
        );
        assert_eq!(out.text, "@bob hi");
        assert_eq!(out.facets[0].index.byte_start, 0);
        assert_eq!(out.facets[0].index.byte_end, 4);
    }

    #[test]
    fn test_other_link_complex_uses_text() {
        let out = run(
            r#"<a class="link-complex" rel="list">My List</a> <b>bold</b>"#,
            None,
        );
        assert_eq!(out.text, "My List bold");
        assert!(out.facets.is_empty());
    }

    #[test]
    fn test_mention_without_username_contributes_nothing() {
        let out = run(r#"a<a class="link-complex" rel="user">@ghost</a>b"#, None);
        assert_eq!(out.text, "ab");
        assert!(out.facets.is_empty());
    }
}
