use crate::errors::ActionError;
use crate::selector::ElementKind;
use crate::UIElement;
use serde::{Deserialize, Serialize};

pub mod memory;

/// Direction of a document-level scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

/// The live UI tree the engine acts upon.
///
/// Implementations adapt a concrete rendering surface (a browser DOM, a
/// webview, the in-memory tree used for tests). Every query reads the tree as
/// it is right now; nothing is cached between calls.
#[async_trait::async_trait]
pub trait UiTree: Send + Sync {
    /// Get the root UI element
    fn root(&self) -> UIElement;

    /// Find the element carrying exactly this stable identifier.
    fn find_by_stable_id(&self, stable_id: &str) -> Option<UIElement>;

    /// Every rendered element that carries a stable identifier, in document order.
    fn tagged_elements(&self) -> Vec<UIElement>;

    /// Rendered elements playing the role named by `kind`, tagged or not,
    /// in document order.
    fn elements_of_kind(&self, kind: ElementKind) -> Vec<UIElement> {
        let mut found = Vec::new();
        collect_of_kind(&self.root(), kind, &mut found);
        found
    }

    /// Perform a full page transition. Surfaces without a navigation
    /// mechanism (server rendering, detached trees) keep the default.
    fn navigate(&self, route: &str) -> Result<(), ActionError> {
        Err(ActionError::EnvironmentUnavailable(format!(
            "no navigation mechanism available to open {route}"
        )))
    }

    /// Whether a scrollable document root exists.
    fn has_scroll_root(&self) -> bool {
        false
    }

    /// Scroll the document root by `amount` pixels (ignored for top/bottom).
    fn scroll_document(&self, direction: ScrollDirection, amount: u32)
        -> Result<(), ActionError>;

    /// Called once the stabilization interval has elapsed, so reactive
    /// surfaces can flush pending renders before the tree is re-sampled.
    async fn settle(&self) {}
}

fn collect_of_kind(element: &UIElement, kind: ElementKind, found: &mut Vec<UIElement>) {
    if element.matches_kind(kind) {
        found.push(element.clone());
    }
    if let Ok(children) = element.children() {
        for child in &children {
            collect_of_kind(child, kind, found);
        }
    }
}
