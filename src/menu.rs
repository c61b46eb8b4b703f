use log::{debug, warn};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::controller::Controller;
use crate::dom::{Dom, Event, EventKind, EventOutcome, ListenerId, ListenerOptions, NodeId};

const OPEN_CLASS: &str = "open";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Toggle,
    Escape,
    OutsideClick,
    Navigation,
}

struct Bound {
    toggle: NodeId,
    panel: NodeId,
    toggle_click: ListenerId,
    document_click: ListenerId,
    keydown: ListenerId,
}

/// Dropdown navigation menu. `is_open` is the only source of truth; the
/// toggle's and panel's attributes are rewritten from it after every
/// transition and never read back.
pub struct MenuController {
    is_open: bool,
    bound: Option<Bound>,
}

impl MenuController {
    pub fn attach(dom: &mut dyn Dom, toggle_selector: &str, panel_selector: &str) -> Self {
        let (toggle, panel) = match (dom.query(toggle_selector), dom.query(panel_selector)) {
            (Some(t), Some(p)) => (t, p),
            _ => {
                warn!(
                    "Menu toggle {} or panel {} not found; menu disabled",
                    toggle_selector, panel_selector
                );
                return MenuController {
                    is_open: false,
                    bound: None,
                };
            }
        };

        if let Some(id) = dom.attribute(panel, "id") {
            dom.set_attribute(toggle, "aria-controls", &id);
        }
        let document = dom.document();
        let toggle_click = dom.add_listener(toggle, EventKind::Click, ListenerOptions::default());
        let document_click = dom.add_listener(document, EventKind::Click, ListenerOptions::default());
        let keydown = dom.add_listener(document, EventKind::KeyDown, ListenerOptions::default());

        let menu = MenuController {
            is_open: false,
            bound: Some(Bound {
                toggle,
                panel,
                toggle_click,
                document_click,
                keydown,
            }),
        };
        menu.project(dom);
        menu
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn toggle(&mut self, dom: &mut dyn Dom) {
        if self.is_open {
            self.close(dom, CloseReason::Toggle);
        } else {
            self.open(dom);
        }
    }

    pub fn open(&mut self, dom: &mut dyn Dom) {
        if self.is_open || self.bound.is_none() {
            return;
        }
        self.is_open = true;
        self.project(dom);
        debug!("Menu opened");
    }

    /// No-op when already closed: no attribute writes, no focus change.
    pub fn close(&mut self, dom: &mut dyn Dom, reason: CloseReason) {
        let Some(bound) = &self.bound else {
            return;
        };
        if !self.is_open {
            return;
        }
        let (toggle, panel) = (bound.toggle, bound.panel);

        // Decide before the panel is hidden, while focus can still be inside it.
        let restore_focus = match reason {
            CloseReason::OutsideClick => dom
                .active_element()
                .map(|active| dom.contains(panel, active))
                .unwrap_or(true),
            _ => true,
        };

        self.is_open = false;
        self.project(dom);
        if restore_focus {
            dom.focus(toggle);
        }
        debug!("Menu closed ({:?})", reason);
    }

    /// Mirror `is_open` into the DOM in one step so visibility and ARIA state
    /// never disagree.
    fn project(&self, dom: &mut dyn Dom) {
        let Some(bound) = &self.bound else {
            return;
        };
        if self.is_open {
            dom.set_attribute(bound.toggle, "aria-expanded", "true");
            dom.add_class(bound.panel, OPEN_CLASS);
            dom.set_attribute(bound.panel, "aria-hidden", "false");
            dom.remove_attribute(bound.panel, "inert");
            dom.remove_attribute(bound.panel, "hidden");
        } else {
            dom.set_attribute(bound.toggle, "aria-expanded", "false");
            dom.remove_class(bound.panel, OPEN_CLASS);
            dom.set_attribute(bound.panel, "aria-hidden", "true");
            dom.set_attribute(bound.panel, "inert", "");
            dom.set_attribute(bound.panel, "hidden", "");
        }
    }

    /// Click anywhere on the page while open.
    fn document_click(&mut self, dom: &mut dyn Dom, target: NodeId) -> EventOutcome {
        let Some(bound) = &self.bound else {
            return EventOutcome::IGNORED;
        };
        if !self.is_open || dom.contains(bound.toggle, target) {
            return EventOutcome::IGNORED;
        }
        let panel = bound.panel;

        if !dom.contains(panel, target) {
            self.close(dom, CloseReason::OutsideClick);
            return EventOutcome::HANDLED;
        }

        let Some(anchor) = dom.closest(target, "a").filter(|a| dom.contains(panel, *a)) else {
            return EventOutcome::IGNORED;
        };
        let destination = dom
            .attribute(anchor, "href")
            .and_then(|href| in_page_fragment(&dom.location(), &href))
            .and_then(|fragment| dom.element_by_id(&fragment));

        match destination {
            Some(section) => {
                dom.scroll_into_view(section, true);
                self.close(dom, CloseReason::Navigation);
                EventOutcome::PREVENT_DEFAULT
            }
            None => {
                self.close(dom, CloseReason::Navigation);
                EventOutcome::HANDLED
            }
        }
    }
}

/// Decoded fragment of `href` when it points into the current page.
fn in_page_fragment(location: &str, href: &str) -> Option<String> {
    let base = Url::parse(location).ok()?;
    let target = base.join(href).ok()?;
    let fragment = target.fragment().filter(|f| !f.is_empty())?;
    let fragment = percent_decode_str(fragment).decode_utf8_lossy().into_owned();
    let same_page = target.scheme() == base.scheme()
        && target.host_str() == base.host_str()
        && target.port_or_known_default() == base.port_or_known_default()
        && target.path() == base.path()
        && target.query() == base.query();
    same_page.then_some(fragment)
}

impl Controller for MenuController {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn is_active(&self) -> bool {
        self.bound.is_some()
    }

    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let Some(bound) = &self.bound else {
            return EventOutcome::IGNORED;
        };
        let (toggle_click, document_click, keydown) = (bound.toggle_click, bound.document_click, bound.keydown);
        match event {
            Event::Dom { listener, .. } if *listener == toggle_click => {
                self.toggle(dom);
                EventOutcome::HANDLED
            }
            Event::Dom { listener, target, .. } if *listener == document_click => self.document_click(dom, *target),
            Event::Dom { listener, key, .. } if *listener == keydown => {
                let escape = matches!(key.as_deref(), Some("Escape") | Some("Esc"));
                if escape && self.is_open {
                    self.close(dom, CloseReason::Escape);
                    EventOutcome::HANDLED
                } else {
                    EventOutcome::IGNORED
                }
            }
            _ => EventOutcome::IGNORED,
        }
    }

    fn teardown(&mut self, dom: &mut dyn Dom) {
        if let Some(bound) = self.bound.take() {
            dom.remove_listener(bound.toggle_click);
            dom.remove_listener(bound.document_click);
            dom.remove_listener(bound.keydown);
        }
        self.is_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::in_page_fragment;

    #[test]
    fn fragments_on_the_same_page() {
        let here = "https://example.com/index.html";
        assert_eq!(in_page_fragment(here, "#about").as_deref(), Some("about"));
        assert_eq!(in_page_fragment(here, "index.html#work").as_deref(), Some("work"));
        assert_eq!(in_page_fragment(here, "/blog.html#top"), None);
        assert_eq!(in_page_fragment(here, "https://other.dev/#about"), None);
        assert_eq!(in_page_fragment(here, "#"), None);
        assert_eq!(in_page_fragment(here, "#sobre-mí").as_deref(), Some("sobre-mí"));
        assert_eq!(in_page_fragment(here, "#sobre%20m%C3%AD").as_deref(), Some("sobre mí"));
        assert_eq!(in_page_fragment(here, "#2024").as_deref(), Some("2024"));
    }
}
