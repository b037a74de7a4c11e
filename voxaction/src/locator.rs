use tracing::{debug, instrument};

use crate::config::{AliasConfig, PrefixConfig};
use crate::element::UIElement;
use crate::errors::ActionError;
use crate::platforms::UiTree;
use crate::selector::{selectors_for, ElementKind, Selector};
use std::sync::Arc;

/// An element found for a target, with the strategy that found it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: UIElement,
    pub selector: Selector,
}

/// Maps free-form targets onto elements of the live UI tree.
///
/// The alias tables and prefix conventions are injected at construction;
/// the tree is re-read on every call, so a resolution never outlives the
/// render it was made against.
#[derive(Clone)]
pub struct Locator {
    tree: Arc<dyn UiTree>,
    aliases: Arc<AliasConfig>,
    prefixes: Arc<PrefixConfig>,
}

impl Locator {
    pub fn new(tree: Arc<dyn UiTree>, aliases: AliasConfig, prefixes: PrefixConfig) -> Self {
        let mut aliases = aliases;
        aliases.normalize();
        Self {
            tree,
            aliases: Arc::new(aliases),
            prefixes: Arc::new(prefixes),
        }
    }

    pub fn tree(&self) -> &Arc<dyn UiTree> {
        &self.tree
    }

    /// The selector ladder `target` would be tried against, in order.
    pub fn ladder(&self, target: &str, kind: ElementKind) -> Vec<Selector> {
        selectors_for(
            target,
            self.aliases.table_for(kind),
            self.prefixes.prefix_for(kind),
        )
    }

    /// Walk the ladder and return the first hit, or `None` when every
    /// strategy misses.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, target: &str, kind: ElementKind) -> Option<Resolved> {
        for selector in self.ladder(target, kind) {
            if let Some(element) = self.find(&selector, kind) {
                debug!(
                    "resolved {} \"{}\" via {} to {:?}",
                    kind,
                    target,
                    selector.strategy(),
                    element.stable_id()
                );
                return Some(Resolved { element, selector });
            }
        }
        debug!("no {} matches \"{}\"", kind, target);
        None
    }

    /// Like [`Locator::resolve`], but a miss becomes a recoverable
    /// [`ActionError::ElementNotFound`] carrying a suggestion.
    pub fn locate(&self, target: &str, kind: ElementKind) -> Result<UIElement, ActionError> {
        self.resolve(target, kind)
            .map(|resolved| resolved.element)
            .ok_or_else(|| ActionError::not_found(target, kind))
    }

    /// Evaluate a single rung of the ladder.
    pub fn find(&self, selector: &Selector, kind: ElementKind) -> Option<UIElement> {
        match selector {
            Selector::Alias { canonical, .. } => self.tree.find_by_stable_id(canonical),
            Selector::Id(id) => self.tree.find_by_stable_id(id),
            Selector::PrefixedId { prefix, id } => {
                self.tree.find_by_stable_id(&format!("{prefix}{id}"))
            }
            Selector::IdContains(fragment) => {
                self.first_tagged(kind, |id| id.contains(fragment.as_str()))
            }
            Selector::Text(phrase) => self
                .tree
                .elements_of_kind(kind)
                .into_iter()
                .find(|element| text_matches(element, phrase)),
            Selector::Words(words) => {
                self.first_tagged(kind, |id| words.iter().all(|word| id.contains(word.as_str())))
            }
        }
    }

    /// First tagged element whose lowercased stable id satisfies `accept`.
    /// Every tagged element is a candidate; those of `kind` are tried first.
    fn first_tagged(&self, kind: ElementKind, accept: impl Fn(&str) -> bool) -> Option<UIElement> {
        let (preferred, rest): (Vec<UIElement>, Vec<UIElement>) = self
            .tree
            .tagged_elements()
            .into_iter()
            .filter(|element| {
                element
                    .stable_id()
                    .is_some_and(|id| accept(&id.to_lowercase()))
            })
            .partition(|element| element.matches_kind(kind));
        preferred.into_iter().chain(rest).next()
    }
}

/// Visible text, accessible label or placeholder contains `phrase` (already lowercased).
fn text_matches(element: &UIElement, phrase: &str) -> bool {
    let attrs = element.attributes();
    [attrs.text, attrs.label, attrs.placeholder]
        .into_iter()
        .flatten()
        .any(|candidate| candidate.to_lowercase().contains(phrase))
}
