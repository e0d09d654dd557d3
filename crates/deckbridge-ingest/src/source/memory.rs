//! In-process host page.
//!
//! Holds markup strings instead of a live DOM. Insertions are pushed
//! explicitly with [`MemoryElement::insert`], which notifies every observer
//! registered for that container. Used by tests and by the `replay` command.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use deckbridge_core::LaneKey;
use parking_lot::{Mutex, RwLock};
use scraper::Html;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::host::{APP_COLUMNS, CHIRP_CONTAINER, ElementHandle, HostPage, InsertedNode};
use crate::extract::dom::{escape, parse_selector, root_element};

/// An element backed by a markup string.
#[derive(Default)]
pub struct MemoryElement {
    html: RwLock<String>,
    observers: Mutex<HashMap<String, Vec<UnboundedSender<InsertedNode>>>>,
    /// selector → markup installed when that selector is clicked
    on_click: Mutex<HashMap<String, String>>,
    clicks: Mutex<Vec<String>>,
}

impl MemoryElement {
    pub fn new(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: RwLock::new(html.into()),
            ..Default::default()
        })
    }

    /// A lane with the usual header and an empty post list.
    pub fn column(heading: &str, attribution: &str) -> Arc<Self> {
        Self::new(format!(
            r#"<section class="js-column column"><div class="js-column-header column-header"><h1 class="column-heading">{}</h1><span class="attribution">{}</span></div><div class="js-chirp-container chirp-container"></div></section>"#,
            escape(heading),
            escape(attribution)
        ))
    }

    pub fn set_html(&self, html: impl Into<String>) {
        *self.html.write() = html.into();
    }

    /// Replace this element's markup with `html` when `selector` is clicked.
    pub fn on_click(&self, selector: &str, html: impl Into<String>) {
        self.on_click.lock().insert(selector.to_string(), html.into());
    }

    /// Selectors clicked so far, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().clone()
    }

    /// Whether any element in this subtree matches `selector`.
    pub fn contains(&self, selector: &str) -> bool {
        let Some(sel) = parse_selector(selector) else {
            return false;
        };
        let html = self.html.read();
        Html::parse_fragment(&html).select(&sel).next().is_some()
    }

    /// Whether this element itself matches `selector`.
    pub fn matches(&self, selector: &str) -> bool {
        let Some(sel) = parse_selector(selector) else {
            return false;
        };
        let html = self.html.read();
        let fragment = Html::parse_fragment(&html);
        root_element(&fragment).is_some_and(|root| sel.matches(&root))
    }

    /// Insert `child` into the container matching `selector`, `depth` levels
    /// below it. Returns the number of observers notified.
    pub fn insert(&self, selector: &str, depth: usize, child: Arc<MemoryElement>) -> usize {
        let (tag, classes) = child.describe();
        let node = InsertedNode {
            depth,
            tag,
            classes,
            element: child,
        };

        let mut observers = self.observers.lock();
        let Some(senders) = observers.get_mut(selector) else {
            return 0;
        };
        senders.retain(|tx| tx.send(node.clone()).is_ok());
        senders.len()
    }

    /// Append a post to this lane's post list.
    pub fn append_post(&self, html: impl Into<String>) -> Arc<MemoryElement> {
        let post = MemoryElement::new(html);
        self.insert(CHIRP_CONTAINER, 0, Arc::clone(&post));
        post
    }

    fn describe(&self) -> (String, Vec<String>) {
        let html = self.html.read();
        let fragment = Html::parse_fragment(&html);
        match root_element(&fragment) {
            Some(root) => (
                root.value().name().to_string(),
                root.value().classes().map(str::to_string).collect(),
            ),
            None => (String::new(), Vec::new()),
        }
    }
}

impl ElementHandle for MemoryElement {
    fn outer_html(&self) -> String {
        self.html.read().clone()
    }

    fn attr(&self, name: &str) -> Option<String> {
        let html = self.html.read();
        let fragment = Html::parse_fragment(&html);
        root_element(&fragment)?.value().attr(name).map(str::to_string)
    }

    fn click(&self, selector: &str) -> bool {
        if !self.contains(selector) {
            return false;
        }
        self.clicks.lock().push(selector.to_string());
        if let Some(html) = self.on_click.lock().remove(selector) {
            self.set_html(html);
        }
        true
    }

    fn observe_children(&self, selector: &str) -> Option<UnboundedReceiver<InsertedNode>> {
        if !self.contains(selector) {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers
            .lock()
            .entry(selector.to_string())
            .or_default()
            .push(tx);
        Some(rx)
    }
}

/// A page of lanes.
pub struct MemoryPage {
    root: Arc<MemoryElement>,
    rendered: AtomicBool,
    columns: RwLock<Vec<(LaneKey, Arc<MemoryElement>)>>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    /// A rendered page with no lanes.
    pub fn new() -> Self {
        let page = Self::unrendered();
        page.render();
        page
    }

    /// A page whose lanes container has not appeared yet.
    pub fn unrendered() -> Self {
        Self {
            root: MemoryElement::new(r#"<div class="js-app-columns app-columns"></div>"#),
            rendered: AtomicBool::new(false),
            columns: RwLock::new(Vec::new()),
        }
    }

    pub fn render(&self) {
        self.rendered.store(true, Ordering::SeqCst);
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Add a lane and notify observers of the lanes container.
    pub fn add_column(&self, heading: &str, attribution: &str) -> Arc<MemoryElement> {
        let column = MemoryElement::column(heading, attribution);
        self.columns
            .write()
            .push((LaneKey::from_parts(heading, attribution), Arc::clone(&column)));
        self.root.insert(APP_COLUMNS, 0, Arc::clone(&column));
        column
    }

    /// The first lane rendered with this key.
    pub fn column(&self, lane: &LaneKey) -> Option<Arc<MemoryElement>> {
        self.columns
            .read()
            .iter()
            .find(|(key, _)| key == lane)
            .map(|(_, column)| Arc::clone(column))
    }
}

impl HostPage for MemoryPage {
    fn query(&self, selector: &str) -> Option<Arc<dyn ElementHandle>> {
        if !self.is_rendered() {
            return None;
        }
        if self.root.matches(selector) {
            return Some(self.root.clone() as Arc<dyn ElementHandle>);
        }
        self.columns
            .read()
            .iter()
            .find(|(_, c)| c.contains(selector))
            .map(|(_, c)| c.clone() as Arc<dyn ElementHandle>)
    }

    fn query_all(&self, selector: &str) -> Vec<Arc<dyn ElementHandle>> {
        if !self.is_rendered() {
            return Vec::new();
        }
        self.columns
            .read()
            .iter()
            .filter(|(_, c)| c.matches(selector))
            .map(|(_, c)| c.clone() as Arc<dyn ElementHandle>)
            .collect()
    }

    fn observe(&self, selector: &str) -> Option<UnboundedReceiver<InsertedNode>> {
        if !self.is_rendered() || !self.root.matches(selector) {
            return None;
        }
        self.root.observe_children(selector)
    }
}
