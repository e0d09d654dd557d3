//! Small helpers over `scraper` used by extraction and the in-memory host.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// `url(...)` inside a CSS background declaration.
static BACKGROUND_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(["']?([^"']+)["']?\)"#).expect("background URL regex should compile")
});

/// Build a selector known at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// Parse a selector supplied at runtime.
pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!("Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

/// The first element of a parsed fragment (the fragment's own root, not the
/// synthetic `<html>` wrapper).
pub(crate) fn root_element(fragment: &Html) -> Option<ElementRef<'_>> {
    fragment.root_element().children().find_map(ElementRef::wrap)
}

/// First descendant of `scope` (or `scope` itself) matching `sel`.
pub(crate) fn find<'a>(scope: ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    if sel.matches(&scope) {
        return Some(scope);
    }
    scope.select(sel).next()
}

/// Nearest ancestor-or-self matching `sel`.
pub(crate) fn closest<'a>(element: ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    if sel.matches(&element) {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| sel.matches(e))
}

pub(crate) fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

pub(crate) fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// URL from the element's inline `background-image` (or `background`)
/// declaration.
pub(crate) fn background_url(element: ElementRef<'_>) -> Option<String> {
    let style = element.value().attr("style")?;
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(prop, _)| {
            let prop = prop.trim();
            prop.eq_ignore_ascii_case("background-image") || prop.eq_ignore_ascii_case("background")
        })
        .find_map(|(_, value)| {
            BACKGROUND_URL_REGEX
                .captures(value)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Minimal escaping for text placed into generated markup.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
