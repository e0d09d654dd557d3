//! Interface to the rendered host page.
//!
//! The pipeline never touches a DOM directly. A browser bridge (or the
//! in-memory host in [`super::memory`]) implements these traits and the rest
//! of the crate works against them.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

/// Lanes container.
pub const APP_COLUMNS: &str = ".js-app-columns";
/// One lane.
pub const COLUMN: &str = ".js-column";
/// Post list inside a lane.
pub const CHIRP_CONTAINER: &str = ".js-chirp-container";
/// The lane header itself.
pub const COLUMN_HEADER: &str = ".js-column-header";
/// "Show more" control on truncated posts.
pub const EXPAND_CONTROL: &str = r#"a[onclick*="expandTweet"]"#;

/// A live element in the host page.
pub trait ElementHandle: Send + Sync {
    /// Current markup of the element, including itself.
    fn outer_html(&self) -> String;

    /// Value of an attribute on the element itself.
    fn attr(&self, name: &str) -> Option<String>;

    /// Activate the first descendant matching `selector`.
    ///
    /// Returns `false` if nothing matched.
    fn click(&self, selector: &str) -> bool;

    /// Stream of insertions into the descendant container matching
    /// `selector`. `None` when that container is not rendered.
    fn observe_children(&self, selector: &str) -> Option<UnboundedReceiver<InsertedNode>>;
}

/// The page as a whole.
pub trait HostPage: Send + Sync {
    fn query(&self, selector: &str) -> Option<Arc<dyn ElementHandle>>;

    fn query_all(&self, selector: &str) -> Vec<Arc<dyn ElementHandle>>;

    /// Stream of insertions into the element matching `selector`.
    fn observe(&self, selector: &str) -> Option<UnboundedReceiver<InsertedNode>>;
}

/// An element added somewhere below an observed container.
#[derive(Clone)]
pub struct InsertedNode {
    /// 0 for a direct child of the observed container.
    pub depth: usize,
    /// Lowercase tag name.
    pub tag: String,
    pub classes: Vec<String>,
    pub element: Arc<dyn ElementHandle>,
}

impl InsertedNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Direct child, and an `<article class="stream-item">`.
    pub fn is_appended_post(&self) -> bool {
        self.depth == 0 && self.tag == "article" && self.has_class("stream-item")
    }

    /// Direct child, and a lane.
    pub fn is_appended_column(&self) -> bool {
        self.depth == 0 && self.has_class("js-column")
    }
}

impl std::fmt::Debug for InsertedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertedNode")
            .field("depth", &self.depth)
            .field("tag", &self.tag)
            .field("classes", &self.classes)
            .finish_non_exhaustive()
    }
}
