/// Supplies the UI surface an authentication sheet is attached to.
///
/// Resolved fresh for every request; implementations must not cache the result.
pub trait AnchorResolver {
    type Anchor;

    fn resolve_anchor(&self) -> Option<Self::Anchor>;
}

/// A screen in the host's UI hierarchy.
pub trait UiNode: Sized {
    type Anchor;

    /// The screen currently presented on top of this one, if any.
    fn presented(&self) -> Option<Self>;

    /// For navigation containers, the child that is currently visible.
    fn visible_child(&self) -> Option<Self> {
        None
    }

    /// The window this screen can anchor a sheet to.
    fn anchor(&self) -> Option<Self::Anchor>;
}

/// Walks the deepest presented screen of a root and unwraps one level of
/// navigation container before asking for the anchor.
pub fn deepest_presented<N: UiNode>(root: N) -> N {
    let mut node = root;
    while let Some(presented) = node.presented() {
        node = presented;
    }
    match node.visible_child() {
        Some(child) => child,
        None => node,
    }
}

type RootSource<N> = Box<dyn Fn() -> Option<N> + Send + Sync>;

/// Resolves the anchor from the first root source that yields a screen.
///
/// Only that root is walked: if its deepest screen has no anchor the
/// resolution fails rather than trying the next root.
pub struct HierarchyAnchorResolver<N> {
    roots: Vec<RootSource<N>>,
}

impl<N: UiNode> HierarchyAnchorResolver<N> {
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    pub fn with_root(mut self, root: impl Fn() -> Option<N> + Send + Sync + 'static) -> Self {
        self.roots.push(Box::new(root));
        self
    }
}

impl<N: UiNode> Default for HierarchyAnchorResolver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: UiNode> AnchorResolver for HierarchyAnchorResolver<N> {
    type Anchor = N::Anchor;

    fn resolve_anchor(&self) -> Option<Self::Anchor> {
        let Some(root) = self.roots.iter().find_map(|root| root()) else {
            tracing::debug!("No root screen found in the UI hierarchy");
            return None;
        };
        let anchor = deepest_presented(root).anchor();
        if anchor.is_none() {
            tracing::debug!("Deepest presented screen cannot supply an anchor");
        }
        anchor
    }
}

/// Always resolves to the same caller-provided anchor.
#[derive(Debug, Clone, Default)]
pub struct FixedAnchor<A>(pub Option<A>);

impl<A: Clone> AnchorResolver for FixedAnchor<A> {
    type Anchor = A;

    fn resolve_anchor(&self) -> Option<A> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone)]
    enum Screen {
        Plain {
            name: &'static str,
            window: Option<&'static str>,
            presented: Option<Arc<Screen>>,
        },
        Navigation {
            visible: Option<Arc<Screen>>,
            presented: Option<Arc<Screen>>,
        },
    }

    #[derive(Debug, Clone)]
    struct Node(Arc<Screen>);

    impl UiNode for Node {
        type Anchor = &'static str;

        fn presented(&self) -> Option<Self> {
            match &*self.0 {
                Screen::Plain { presented, .. } | Screen::Navigation { presented, .. } => {
                    presented.clone().map(Node)
                }
            }
        }

        fn visible_child(&self) -> Option<Self> {
            match &*self.0 {
                Screen::Navigation { visible, .. } => visible.clone().map(Node),
                Screen::Plain { .. } => None,
            }
        }

        fn anchor(&self) -> Option<&'static str> {
            match &*self.0 {
                Screen::Plain { window, .. } => *window,
                Screen::Navigation { .. } => None,
            }
        }
    }

    fn plain(
        name: &'static str,
        window: Option<&'static str>,
        presented: Option<Arc<Screen>>,
    ) -> Arc<Screen> {
        Arc::new(Screen::Plain {
            name,
            window,
            presented,
        })
    }

    fn name_of(node: &Node) -> &'static str {
        match &*node.0 {
            Screen::Plain { name, .. } => *name,
            Screen::Navigation { .. } => "navigation",
        }
    }

    #[test]
    fn walks_to_deepest_presented_screen() {
        let modal = plain("modal", Some("modal-window"), None);
        let root = plain("root", Some("root-window"), Some(modal));
        let resolver = HierarchyAnchorResolver::new().with_root(move || Some(Node(root.clone())));
        assert_eq!(resolver.resolve_anchor(), Some("modal-window"));
    }

    #[test]
    fn unwraps_one_navigation_level() {
        let visible = plain("visible", Some("nav-window"), None);
        let nav = Arc::new(Screen::Navigation {
            visible: Some(visible),
            presented: None,
        });
        let root = plain("root", Some("root-window"), Some(nav));
        let deepest = deepest_presented(Node(root));
        assert_eq!(name_of(&deepest), "visible");
        assert_eq!(deepest.anchor(), Some("nav-window"));
    }

    #[test]
    fn navigation_without_visible_child_stays_put() {
        let nav = Arc::new(Screen::Navigation {
            visible: None,
            presented: None,
        });
        let resolver = HierarchyAnchorResolver::new().with_root(move || Some(Node(nav.clone())));
        assert_eq!(resolver.resolve_anchor(), None);
    }

    #[test]
    fn first_available_root_wins() {
        let key = plain("key", Some("key-window"), None);
        let resolver = HierarchyAnchorResolver::new()
            .with_root(|| None)
            .with_root(move || Some(Node(key.clone())))
            .with_root(|| panic!("later roots are not consulted"));
        assert_eq!(resolver.resolve_anchor(), Some("key-window"));
    }

    #[test]
    fn first_root_without_anchor_fails() {
        let headless = plain("headless", None, None);
        let other = plain("other", Some("other-window"), None);
        let resolver = HierarchyAnchorResolver::new()
            .with_root(move || Some(Node(headless.clone())))
            .with_root(move || Some(Node(other.clone())));
        assert_eq!(resolver.resolve_anchor(), None);
    }

    #[test]
    fn empty_hierarchy_resolves_nothing() {
        let resolver = HierarchyAnchorResolver::<Node>::new();
        assert_eq!(resolver.resolve_anchor(), None);
    }

    #[test]
    fn fixed_anchor_clones() {
        assert_eq!(FixedAnchor(Some(3)).resolve_anchor(), Some(3));
        assert_eq!(FixedAnchor::<u8>(None).resolve_anchor(), None);
    }
}
