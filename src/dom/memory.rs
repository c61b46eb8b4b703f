use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::{
    Dom, Event, EventKind, FetchResponse, FrameId, ListenerId, ListenerOptions, NodeId,
    ObserverId, RequestId, TimerId,
};

const DOCUMENT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: String,
    inner_html: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Node {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            inner_html: None,
            parent: None,
            children: Vec::new(),
        }
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .get("class")
            .map(|c| c.split_whitespace())
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Listener {
    pub node: NodeId,
    pub kind: EventKind,
    pub options: ListenerOptions,
}

/// In-process document. Records every side effect so callers can inspect
/// what the controllers did; the host role (firing events, timers, frames,
/// responses) is played by the caller through `fire`, `fire_timer`, etc.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Node>,
    listeners: BTreeMap<ListenerId, Listener>,
    timers: BTreeMap<TimerId, Duration>,
    frames: BTreeSet<FrameId>,
    requests: BTreeMap<RequestId, String>,
    observers: BTreeMap<ObserverId, (NodeId, String)>,
    next_handle: u64,
    focused: Option<NodeId>,
    scroll_y: f64,
    location: String,

    /// When set, `open_tab` reports the tab as blocked.
    pub block_popups: bool,
    pub navigations: Vec<String>,
    pub opened_tabs: Vec<String>,
    pub alerts: Vec<String>,
    pub focus_log: Vec<NodeId>,
    pub scrolled_into_view: Vec<(NodeId, bool)>,
    /// Count of attribute and class writes made through the `Dom` trait.
    pub attribute_writes: usize,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new("https://example.com/")
    }
}

impl MemoryDom {
    pub fn new(location: &str) -> Self {
        MemoryDom {
            nodes: vec![Node::new("#document")],
            listeners: BTreeMap::new(),
            timers: BTreeMap::new(),
            frames: BTreeSet::new(),
            requests: BTreeMap::new(),
            observers: BTreeMap::new(),
            next_handle: 1,
            focused: None,
            scroll_y: 0.0,
            location: location.to_string(),
            block_popups: false,
            navigations: Vec::new(),
            opened_tabs: Vec::new(),
            alerts: Vec::new(),
            focus_log: Vec::new(),
            scrolled_into_view: Vec::new(),
            attribute_writes: 0,
        }
    }

    // ── Building documents ──────────────────────────────────────────

    /// Append a new `tag` element with `attrs` under `parent`. Does not count
    /// as an attribute write.
    pub fn element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.alloc(tag);
        for (name, value) in attrs {
            self.nodes[id.0].attrs.insert(name.to_string(), value.to_string());
        }
        self.attach(parent, id, None);
        id
    }

    /// Simulate the user typing into a control. No events are fired.
    pub fn type_value(&mut self, node: NodeId, value: &str) {
        self.nodes[node.0].value = value.to_string();
    }

    pub fn set_scroll_y(&mut self, y: f64) {
        self.scroll_y = y;
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.nodes[node.0].inner_html.clone().unwrap_or_default()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    /// `true` while the node is reachable from the document.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(DOCUMENT, node)
    }

    // ── Playing the host ────────────────────────────────────────────

    /// Events the browser would deliver for `kind` on `target`, innermost
    /// listener first.
    pub fn fire(&self, kind: EventKind, target: NodeId, key: Option<&str>) -> Vec<Event> {
        let path: Vec<NodeId> = if kind.bubbles() {
            let mut path = vec![target];
            let mut cur = self.nodes[target.0].parent;
            while let Some(p) = cur {
                path.push(p);
                cur = self.nodes[p.0].parent;
            }
            path
        } else {
            vec![target]
        };

        let mut events = Vec::new();
        for node in path {
            for (id, listener) in &self.listeners {
                if listener.node == node && listener.kind == kind {
                    events.push(Event::Dom {
                        listener: *id,
                        kind,
                        target,
                        key: key.map(str::to_string),
                    });
                }
            }
        }
        events
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners.values().copied().collect()
    }

    pub fn pending_timers(&self) -> Vec<(TimerId, Duration)> {
        self.timers.iter().map(|(id, d)| (*id, *d)).collect()
    }

    /// Expire a pending timer. `None` if it was cleared or already fired.
    pub fn fire_timer(&mut self, id: TimerId) -> Option<Event> {
        self.timers.remove(&id).map(|_| Event::Timer(id))
    }

    pub fn pending_frames(&self) -> Vec<FrameId> {
        self.frames.iter().copied().collect()
    }

    /// Run every requested animation frame.
    pub fn run_frames(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.frames)
            .into_iter()
            .map(Event::AnimationFrame)
            .collect()
    }

    pub fn pending_requests(&self) -> Vec<(RequestId, String)> {
        self.requests.iter().map(|(id, url)| (*id, url.clone())).collect()
    }

    pub fn respond(&mut self, id: RequestId, status: u16, body: &str) -> Option<Event> {
        self.requests.remove(&id).map(|_| Event::Fetched {
            request: id,
            result: Ok(FetchResponse {
                status,
                body: body.to_string(),
            }),
        })
    }

    pub fn fail_request(&mut self, id: RequestId, reason: &str) -> Option<Event> {
        self.requests.remove(&id).map(|_| Event::Fetched {
            request: id,
            result: Err(reason.to_string()),
        })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Report an intersection change for every observer watching `node`.
    pub fn intersect(&self, node: NodeId, intersecting: bool) -> Vec<Event> {
        self.observers
            .iter()
            .filter(|(_, (n, _))| *n == node)
            .map(|(id, _)| Event::Intersection {
                observer: *id,
                intersecting,
            })
            .collect()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn alloc(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Node::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    fn handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].inner_html = None;
    }

    fn clear_children(&mut self, node: NodeId) {
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        if let Some(f) = self.focused {
            if !self.is_attached(f) {
                self.focused = None;
            }
        }
    }

    /// Pre-order descendants of `scope`, excluding `scope`.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let n = &self.nodes[node.0];
        parse_selector(selector).iter().any(|c| c.matches(n))
    }
}

// ── Simple selectors: tag, #id, .class, [attr] / [attr="v"], comma lists ──

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if node.tag.starts_with('#') {
            return false;
        }
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.classes().any(|nc| nc == c)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match (node.attrs.get(name), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }
}

fn parse_selector(selector: &str) -> Vec<Compound> {
    selector
        .split(',')
        .filter_map(|part| parse_compound(part.trim()))
        .collect()
}

/// `None` for empty input or anything outside the supported grammar
/// (combinators, pseudo-classes).
fn parse_compound(s: &str) -> Option<Compound> {
    if s.is_empty() {
        return None;
    }
    let chars: Vec<char> = s.chars().collect();
    let mut c = Compound::default();
    let mut i = 0;

    let ident = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && (chars[*i].is_alphanumeric() || chars[*i] == '-' || chars[*i] == '_') {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    if chars[0] == '*' {
        c.tag = Some("*".to_string());
        i = 1;
    } else if chars[0].is_alphabetic() {
        c.tag = Some(ident(&mut i));
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                c.id = Some(ident(&mut i));
            }
            '.' => {
                i += 1;
                c.classes.push(ident(&mut i));
            }
            '[' => {
                let close = chars[i..].iter().position(|ch| *ch == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                let attr = match inner.split_once('=') {
                    Some((name, value)) => (
                        name.trim().to_string(),
                        Some(value.trim().trim_matches(|q| q == '"' || q == '\'').to_string()),
                    ),
                    None => (inner.trim().to_string(), None),
                };
                c.attrs.push(attr);
                i = close + 1;
            }
            _ => {
                log::debug!("unsupported selector syntax: {}", s);
                return None;
            }
        }
    }
    Some(c)
}

impl Dom for MemoryDom {
    fn document(&self) -> NodeId {
        DOCUMENT
    }

    fn query(&self, selector: &str) -> Option<NodeId> {
        self.query_within(DOCUMENT, selector)
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| self.matches(*n, selector))
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(DOCUMENT)
            .into_iter()
            .find(|n| self.nodes[n.0].attrs.get("id").map(String::as_str) == Some(id))
    }

    fn query_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.matches(*n, selector))
            .collect()
    }

    fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if self.matches(n, selector) {
                return Some(n);
            }
            cur = self.nodes[n.0].parent;
        }
        None
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.nodes[n.0].parent;
        }
        false
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    fn active_element(&self) -> Option<NodeId> {
        self.focused
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes[node.0].attrs.get(name).cloned()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.attribute_writes += 1;
        self.nodes[node.0].attrs.insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.attribute_writes += 1;
        self.nodes[node.0].attrs.remove(name);
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node.0].classes().any(|c| c == class)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        self.attribute_writes += 1;
        if self.has_class(node, class) {
            return;
        }
        let attrs = &mut self.nodes[node.0].attrs;
        let updated = match attrs.get("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        attrs.insert("class".to_string(), updated);
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        self.attribute_writes += 1;
        let attrs = &mut self.nodes[node.0].attrs;
        if let Some(existing) = attrs.get("class") {
            let updated: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
            let updated = updated.join(" ");
            attrs.insert("class".to_string(), updated);
        }
    }

    fn value(&self, node: NodeId) -> String {
        self.nodes[node.0].value.clone()
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        self.nodes[node.0].value = value.to_string();
    }

    fn text(&self, node: NodeId) -> String {
        let mut out = self.nodes[node.0].text.clone();
        for child in &self.nodes[node.0].children {
            out.push_str(&self.text(*child));
        }
        out
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        self.clear_children(node);
        let n = &mut self.nodes[node.0];
        n.text = text.to_string();
        n.inner_html = None;
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        self.clear_children(node);
        let n = &mut self.nodes[node.0];
        n.text.clear();
        n.inner_html = Some(html.to_string());
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(tag)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, None);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.attach(parent, child, reference);
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
        if let Some(f) = self.focused {
            if !self.is_attached(f) {
                self.focused = None;
            }
        }
    }

    fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
        self.focus_log.push(node);
    }

    fn scroll_into_view(&mut self, node: NodeId, smooth: bool) {
        self.scrolled_into_view.push((node, smooth));
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_string());
    }

    fn open_tab(&mut self, url: &str) -> bool {
        if self.block_popups {
            return false;
        }
        self.opened_tabs.push(url.to_string());
        true
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn add_listener(&mut self, node: NodeId, kind: EventKind, options: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.handle());
        self.listeners.insert(id, Listener { node, kind, options });
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.handle());
        self.timers.insert(id, delay);
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn request_animation_frame(&mut self) -> FrameId {
        let id = FrameId(self.handle());
        self.frames.insert(id);
        id
    }

    fn cancel_animation_frame(&mut self, id: FrameId) {
        self.frames.remove(&id);
    }

    fn fetch(&mut self, url: &str) -> RequestId {
        let id = RequestId(self.handle());
        self.requests.insert(id, url.to_string());
        id
    }

    fn observe_intersection(&mut self, node: NodeId, root_margin: &str) -> ObserverId {
        let id = ObserverId(self.handle());
        self.observers.insert(id, (node, root_margin.to_string()));
        id
    }

    fn disconnect_observer(&mut self, id: ObserverId) {
        self.observers.remove(&id);
    }
}
