use std::time::Duration;

pub mod memory;
#[cfg(feature = "web")]
pub mod web;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

/// DOM event types a controller can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Submit,
    Blur,
    Input,
    KeyDown,
    Scroll,
}

impl EventKind {
    /// Name used with `addEventListener`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Submit => "submit",
            EventKind::Blur => "blur",
            EventKind::Input => "input",
            EventKind::KeyDown => "keydown",
            EventKind::Scroll => "scroll",
        }
    }

    /// Blur does not bubble; scroll is delivered to the document directly.
    pub fn bubbles(&self) -> bool {
        !matches!(self, EventKind::Blur | EventKind::Scroll)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub passive: bool,
}

/// Completed HTTP response for a [`Dom::fetch`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything the host delivers to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Dom {
        listener: ListenerId,
        kind: EventKind,
        target: NodeId,
        /// `KeyboardEvent.key` for key events.
        key: Option<String>,
    },
    Timer(TimerId),
    AnimationFrame(FrameId),
    /// `Err` carries a network-level failure description.
    Fetched {
        request: RequestId,
        result: Result<FetchResponse, String>,
    },
    Intersection {
        observer: ObserverId,
        intersecting: bool,
    },
}

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub handled: bool,
    pub prevent_default: bool,
}

impl EventOutcome {
    pub const IGNORED: EventOutcome = EventOutcome {
        handled: false,
        prevent_default: false,
    };

    pub const HANDLED: EventOutcome = EventOutcome {
        handled: true,
        prevent_default: false,
    };

    pub const PREVENT_DEFAULT: EventOutcome = EventOutcome {
        handled: true,
        prevent_default: true,
    };

    pub fn merge(self, other: EventOutcome) -> EventOutcome {
        EventOutcome {
            handled: self.handled || other.handled,
            prevent_default: self.prevent_default || other.prevent_default,
        }
    }
}

/// Host surface every controller works through.
/// Implementations: `MemoryDom` (in-process document) and `WebDom` (web-sys, feature `web`).
pub trait Dom {
    // ── Tree queries ────────────────────────────────────────────────
    /// The document node; target for page-wide listeners.
    fn document(&self) -> NodeId;
    fn query(&self, selector: &str) -> Option<NodeId>;
    fn query_within(&self, scope: NodeId, selector: &str) -> Option<NodeId>;
    /// Attached element whose `id` is exactly `id`; no selector escaping involved.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    /// Matches in document order.
    fn query_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId>;
    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId>;
    /// Inclusive: a node contains itself.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn active_element(&self) -> Option<NodeId>;

    // ── Attributes, classes, content ────────────────────────────────
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);
    /// Form control value; empty for non-controls.
    fn value(&self, node: NodeId) -> String;
    fn set_value(&mut self, node: NodeId, value: &str);
    fn text(&self, node: NodeId) -> String;
    fn set_text(&mut self, node: NodeId, text: &str);
    fn set_inner_html(&mut self, node: NodeId, html: &str);

    // ── Structure ───────────────────────────────────────────────────
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Insert `child` before `reference`, or append when `reference` is `None`.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);
    fn remove(&mut self, node: NodeId);

    // ── Focus, scrolling, navigation ────────────────────────────────
    fn focus(&mut self, node: NodeId);
    fn scroll_into_view(&mut self, node: NodeId, smooth: bool);
    fn scroll_y(&self) -> f64;
    /// Current page URL.
    fn location(&self) -> String;
    fn navigate(&mut self, url: &str);
    /// Open `url` in a new tab. `false` when the browser blocked it.
    fn open_tab(&mut self, url: &str) -> bool;
    fn alert(&mut self, message: &str);

    // ── Listeners and scheduling ────────────────────────────────────
    fn add_listener(&mut self, node: NodeId, kind: EventKind, options: ListenerOptions) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);
    fn set_timeout(&mut self, delay: Duration) -> TimerId;
    fn clear_timeout(&mut self, id: TimerId);
    fn request_animation_frame(&mut self) -> FrameId;
    fn cancel_animation_frame(&mut self, id: FrameId);
    /// Start an HTTP GET; completion arrives as [`Event::Fetched`].
    fn fetch(&mut self, url: &str) -> RequestId;
    fn observe_intersection(&mut self, node: NodeId, root_margin: &str) -> ObserverId;
    fn disconnect_observer(&mut self, id: ObserverId);
}
