//! Browser backend. Node handles are interned `web_sys::Node`s, found again
//! through a `data-folio-node` stamp on each element. Every
//! listener, timer, frame, fetch and observer callback funnels into the
//! shared [`App`], which hands the event to the [`Page`].
//!
//! A DOM call made during a dispatch (focus, for instance) can fire another
//! event synchronously. The app is already borrowed at that point, so such
//! events are queued and delivered once the running dispatch returns; they
//! can no longer prevent their default action.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use js_sys::{Array, Promise};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    AddEventListenerOptions, Document, Element, EventTarget, HtmlElement,
    HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, KeyboardEvent, Node, Response, ScrollBehavior,
    ScrollIntoViewOptions, Window,
};

use super::{
    Dom, Event, EventKind, FetchResponse, FrameId, ListenerId, ListenerOptions, NodeId,
    ObserverId, RequestId, TimerId,
};
use crate::config::Config;
use crate::page::Page;

const DOCUMENT: NodeId = NodeId(0);
const HANDLE_ATTR: &str = "data-folio-node";

type Backlog = Rc<RefCell<VecDeque<Pending>>>;

enum Pending {
    Dom {
        listener: ListenerId,
        kind: EventKind,
        event: web_sys::Event,
    },
    Ready(Event),
}

struct App {
    dom: WebDom,
    page: Option<Page>,
}

impl App {
    fn dispatch(&mut self, item: Pending) {
        let App { dom, page } = self;
        let Some(page) = page.as_mut() else {
            return;
        };
        match item {
            Pending::Dom { listener, kind, event } => {
                let target = event
                    .target()
                    .and_then(|t| t.dyn_into::<Node>().ok())
                    .map(|n| dom.intern(n))
                    .unwrap_or(DOCUMENT);
                let key = event.dyn_ref::<KeyboardEvent>().map(|k| k.key());
                let outcome = page.handle(
                    dom,
                    &Event::Dom {
                        listener,
                        kind,
                        target,
                        key,
                    },
                );
                if outcome.prevent_default {
                    event.prevent_default();
                }
            }
            Pending::Ready(event) => {
                match &event {
                    Event::Timer(id) => {
                        dom.timers.remove(id);
                    }
                    Event::AnimationFrame(id) => {
                        dom.frames.remove(id);
                    }
                    _ => {}
                }
                page.handle(dom, &event);
            }
        }
    }

    fn drain(&mut self) {
        loop {
            let next = self.dom.backlog.borrow_mut().pop_front();
            match next {
                Some(item) => self.dispatch(item),
                None => break,
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(page) = self.page.take() {
            page.teardown(&mut self.dom);
        }
    }
}

fn deliver(app: &Weak<RefCell<App>>, backlog: &Backlog, item: Pending) {
    let Some(app) = app.upgrade() else {
        return;
    };
    let Ok(mut guard) = app.try_borrow_mut() else {
        backlog.borrow_mut().push_back(item);
        return;
    };
    guard.dispatch(item);
    guard.drain();
}

/// `Dom` over the live document.
pub struct WebDom {
    window: Window,
    document: Document,
    /// Live handles only; removed nodes are forgotten.
    nodes: RefCell<HashMap<usize, Node>>,
    next_node: Cell<usize>,
    listeners: HashMap<ListenerId, (EventTarget, EventKind, Closure<dyn FnMut(web_sys::Event)>)>,
    timers: HashMap<TimerId, i32>,
    frames: HashMap<FrameId, i32>,
    observers: HashMap<ObserverId, (IntersectionObserver, Closure<dyn FnMut(Array)>)>,
    next_handle: u64,
    app: Weak<RefCell<App>>,
    backlog: Backlog,
}

impl WebDom {
    fn new(window: Window, document: Document, app: Weak<RefCell<App>>) -> Self {
        let root: Node = document.clone().into();
        WebDom {
            window,
            document,
            nodes: RefCell::new(HashMap::from([(DOCUMENT.0, root)])),
            next_node: Cell::new(1),
            listeners: HashMap::new(),
            timers: HashMap::new(),
            frames: HashMap::new(),
            observers: HashMap::new(),
            next_handle: 1,
            app,
            backlog: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    fn handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn intern(&self, node: Node) -> NodeId {
        let root: &Node = self.document.as_ref();
        if node.is_same_node(Some(root)) {
            return DOCUMENT;
        }

        let Some(el) = node.dyn_ref::<Element>().cloned() else {
            // Text and comment nodes cannot carry the stamp.
            let known = self
                .nodes
                .borrow()
                .iter()
                .find(|(_, n)| n.is_same_node(Some(&node)))
                .map(|(id, _)| *id);
            return NodeId(known.unwrap_or_else(|| self.allocate(node)));
        };

        let stamped = el
            .get_attribute(HANDLE_ATTR)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|id| {
                self.nodes
                    .borrow()
                    .get(id)
                    .map_or(false, |n| n.is_same_node(Some(&node)))
            });
        if let Some(id) = stamped {
            return NodeId(id);
        }
        let id = self.allocate(node.clone());
        let _ = el.set_attribute(HANDLE_ATTR, &id.to_string());
        NodeId(id)
    }

    fn allocate(&self, node: Node) -> usize {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        self.nodes.borrow_mut().insert(id, node);
        id
    }

    /// Drop the handles of `node`'s stamped descendants, and of `node`
    /// itself when `inclusive`.
    fn forget(&self, node: &Node, inclusive: bool) {
        let Some(el) = node.dyn_ref::<Element>() else {
            if inclusive {
                self.nodes
                    .borrow_mut()
                    .retain(|id, n| *id == DOCUMENT.0 || !n.is_same_node(Some(node)));
            }
            return;
        };
        let mut stamped = Vec::new();
        if inclusive {
            stamped.push(el.clone());
        }
        if let Ok(list) = el.query_selector_all(&format!("[{}]", HANDLE_ATTR)) {
            stamped.extend((0..list.length()).filter_map(|i| list.get(i)?.dyn_into::<Element>().ok()));
        }

        let mut nodes = self.nodes.borrow_mut();
        for el in stamped {
            let Some(id) = el.get_attribute(HANDLE_ATTR).and_then(|v| v.parse::<usize>().ok()) else {
                continue;
            };
            let el: &Node = el.as_ref();
            if id != DOCUMENT.0 && nodes.get(&id).map_or(false, |n| n.is_same_node(Some(el))) {
                nodes.remove(&id);
            }
        }
    }

    fn intern_opt(&self, node: Option<impl Into<Node>>) -> Option<NodeId> {
        node.map(|n| self.intern(n.into()))
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.borrow().get(&id.0).cloned()
    }

    fn element(&self, id: NodeId) -> Option<Element> {
        self.node(id).and_then(|n| n.dyn_into::<Element>().ok())
    }

    fn html_element(&self, id: NodeId) -> Option<HtmlElement> {
        self.node(id).and_then(|n| n.dyn_into::<HtmlElement>().ok())
    }

    fn select(&self, scope: NodeId, selector: &str) -> Option<Element> {
        let found = if scope == DOCUMENT {
            self.document.query_selector(selector)
        } else {
            self.element(scope)?.query_selector(selector)
        };
        found.unwrap_or_else(|e| {
            log::warn!("Invalid selector {}: {:?}", selector, e);
            None
        })
    }
}

fn describe(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

async fn fetch_text(request: Promise) -> Result<FetchResponse, String> {
    let value = JsFuture::from(request).await.map_err(describe)?;
    let response: Response = value.dyn_into().map_err(describe)?;
    let status = response.status();
    let text = response.text().map_err(describe)?;
    let body = JsFuture::from(text).await.map_err(describe)?;
    Ok(FetchResponse {
        status,
        body: body.as_string().unwrap_or_default(),
    })
}

impl Dom for WebDom {
    fn document(&self) -> NodeId {
        DOCUMENT
    }

    fn query(&self, selector: &str) -> Option<NodeId> {
        self.query_within(DOCUMENT, selector)
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.intern_opt(self.select(scope, selector))
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.intern_opt(self.document.get_element_by_id(id))
    }

    fn query_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let list = if scope == DOCUMENT {
            self.document.query_selector_all(selector)
        } else {
            match self.element(scope) {
                Some(el) => el.query_selector_all(selector),
                None => return Vec::new(),
            }
        };
        let Ok(list) = list else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .map(|n| self.intern(n))
            .collect()
    }

    fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let el = self.element(node)?;
        self.intern_opt(el.closest(selector).ok().flatten())
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        match (self.node(ancestor), self.node(node)) {
            (Some(a), Some(n)) => a.contains(Some(&n)),
            _ => false,
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.intern_opt(self.node(node)?.parent_node())
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.intern_opt(self.node(node)?.first_child())
    }

    fn active_element(&self) -> Option<NodeId> {
        self.intern_opt(self.document.active_element())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element(node) {
            let _ = el.set_attribute(name, value);
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element(node) {
            let _ = el.remove_attribute(name);
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .map(|el| el.class_list().contains(class))
            .unwrap_or(false)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = self.element(node) {
            let _ = el.class_list().add_1(class);
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = self.element(node) {
            let _ = el.class_list().remove_1(class);
        }
    }

    fn value(&self, node: NodeId) -> String {
        let Some(n) = self.node(node) else {
            return String::new();
        };
        if let Some(input) = n.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(area) = n.dyn_ref::<HtmlTextAreaElement>() {
            area.value()
        } else if let Some(select) = n.dyn_ref::<HtmlSelectElement>() {
            select.value()
        } else {
            String::new()
        }
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        let Some(n) = self.node(node) else {
            return;
        };
        if let Some(input) = n.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = n.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = n.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        }
    }

    fn text(&self, node: NodeId) -> String {
        self.node(node)
            .and_then(|n| n.text_content())
            .unwrap_or_default()
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node(node) {
            n.set_text_content(Some(text));
        }
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if let Some(el) = self.element(node) {
            self.forget(&el, false);
            el.set_inner_html(html);
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        match self.document.create_element(tag) {
            Ok(el) => self.intern(el.into()),
            Err(e) => {
                log::error!("Could not create <{}>: {:?}", tag, e);
                DOCUMENT
            }
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let (Some(p), Some(c)) = (self.node(parent), self.node(child)) {
            let _ = p.append_child(&c);
        }
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let reference = reference.and_then(|r| self.node(r));
        if let (Some(p), Some(c)) = (self.node(parent), self.node(child)) {
            let _ = p.insert_before(&c, reference.as_ref());
        }
    }

    fn remove(&mut self, node: NodeId) {
        if let Some(n) = self.node(node) {
            if let Some(parent) = n.parent_node() {
                let _ = parent.remove_child(&n);
            }
            self.forget(&n, true);
        }
    }

    fn focus(&mut self, node: NodeId) {
        if let Some(el) = self.html_element(node) {
            let _ = el.focus();
        }
    }

    fn scroll_into_view(&mut self, node: NodeId, smooth: bool) {
        if let Some(el) = self.element(node) {
            let options = ScrollIntoViewOptions::new();
            options.set_behavior(if smooth {
                ScrollBehavior::Smooth
            } else {
                ScrollBehavior::Auto
            });
            el.scroll_into_view_with_scroll_into_view_options(&options);
        }
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn navigate(&mut self, url: &str) {
        if let Err(e) = self.window.location().set_href(url) {
            log::error!("Navigation to {} failed: {:?}", url, e);
        }
    }

    fn open_tab(&mut self, url: &str) -> bool {
        matches!(self.window.open_with_url_and_target(url, "_blank"), Ok(Some(_)))
    }

    fn alert(&mut self, message: &str) {
        let _ = self.window.alert_with_message(message);
    }

    fn add_listener(&mut self, node: NodeId, kind: EventKind, options: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.handle());
        // Scroll fires on the window, not the document node.
        let target: EventTarget = if node == DOCUMENT && kind == EventKind::Scroll {
            self.window.clone().into()
        } else {
            match self.node(node) {
                Some(n) => n.into(),
                None => return id,
            }
        };

        let (app, backlog) = (self.app.clone(), self.backlog.clone());
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            deliver(&app, &backlog, Pending::Dom { listener: id, kind, event });
        });
        let opts = AddEventListenerOptions::new();
        opts.set_passive(options.passive);
        if let Err(e) = target.add_event_listener_with_callback_and_add_event_listener_options(
            kind.as_str(),
            closure.as_ref().unchecked_ref(),
            &opts,
        ) {
            log::error!("addEventListener({}) failed: {:?}", kind.as_str(), e);
        }
        self.listeners.insert(id, (target, kind, closure));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        if let Some((target, kind, closure)) = self.listeners.remove(&id) {
            let _ = target.remove_event_listener_with_callback(kind.as_str(), closure.as_ref().unchecked_ref());
        }
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.handle());
        let (app, backlog) = (self.app.clone(), self.backlog.clone());
        let callback = Closure::once_into_js(move || {
            deliver(&app, &backlog, Pending::Ready(Event::Timer(id)));
        });
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            Ok(handle) => {
                self.timers.insert(id, handle);
            }
            Err(e) => log::error!("setTimeout failed: {:?}", e),
        }
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            self.window.clear_timeout_with_handle(handle);
        }
    }

    fn request_animation_frame(&mut self) -> FrameId {
        let id = FrameId(self.handle());
        let (app, backlog) = (self.app.clone(), self.backlog.clone());
        let callback = Closure::once_into_js(move || {
            deliver(&app, &backlog, Pending::Ready(Event::AnimationFrame(id)));
        });
        match self.window.request_animation_frame(callback.unchecked_ref()) {
            Ok(handle) => {
                self.frames.insert(id, handle);
            }
            Err(e) => log::error!("requestAnimationFrame failed: {:?}", e),
        }
        id
    }

    fn cancel_animation_frame(&mut self, id: FrameId) {
        if let Some(handle) = self.frames.remove(&id) {
            let _ = self.window.cancel_animation_frame(handle);
        }
    }

    fn fetch(&mut self, url: &str) -> RequestId {
        let id = RequestId(self.handle());
        let request = self.window.fetch_with_str(url);
        let (app, backlog) = (self.app.clone(), self.backlog.clone());
        spawn_local(async move {
            let result = fetch_text(request).await;
            deliver(&app, &backlog, Pending::Ready(Event::Fetched { request: id, result }));
        });
        id
    }

    fn observe_intersection(&mut self, node: NodeId, root_margin: &str) -> ObserverId {
        let id = ObserverId(self.handle());
        let Some(target) = self.element(node) else {
            return id;
        };
        let (app, backlog) = (self.app.clone(), self.backlog.clone());
        let callback = Closure::<dyn FnMut(Array)>::new(move |entries: Array| {
            for entry in entries.iter() {
                if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                    let event = Event::Intersection {
                        observer: id,
                        intersecting: entry.is_intersecting(),
                    };
                    deliver(&app, &backlog, Pending::Ready(event));
                }
            }
        });
        let init = IntersectionObserverInit::new();
        init.set_root_margin(root_margin);
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                observer.observe(&target);
                self.observers.insert(id, (observer, callback));
            }
            Err(e) => log::warn!("IntersectionObserver unavailable: {:?}", e),
        }
        id
    }

    fn disconnect_observer(&mut self, id: ObserverId) {
        if let Some((observer, _callback)) = self.observers.remove(&id) {
            observer.disconnect();
        }
    }
}

// ── Console logging ─────────────────────────────────────────────────

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&msg),
            log::Level::Warn => web_sys::console::warn_1(&msg),
            log::Level::Info => web_sys::console::info_1(&msg),
            _ => web_sys::console::debug_1(&msg),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

// ── Entry point ─────────────────────────────────────────────────────

fn mount(app: &Rc<RefCell<App>>, config: Config) {
    let Ok(mut guard) = app.try_borrow_mut() else {
        log::error!("Page is busy; mount skipped");
        return;
    };
    let App { dom, page } = &mut *guard;
    *page = Some(Page::mount(dom, config));
    guard.drain();
}

/// Mount the page once the DOM is parsed and tear it down on `pagehide`.
/// `config_json` overrides the defaults (see `Config`).
#[wasm_bindgen]
pub fn boot(config_json: Option<String>) -> Result<(), JsValue> {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }

    let config = match config_json {
        Some(json) => Config::from_json_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))?,
        None => Config::default(),
    };
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let app = Rc::new_cyclic(|weak: &Weak<RefCell<App>>| {
        RefCell::new(App {
            dom: WebDom::new(window.clone(), document.clone(), weak.clone()),
            page: None,
        })
    });

    if document.ready_state() == "loading" {
        let pending = app.clone();
        let on_ready = Closure::once_into_js(move || mount(&pending, config));
        document.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())?;
    } else {
        mount(&app, config);
    }

    // The page-hide hook owns the app for the rest of the page's life.
    let on_hide = Closure::<dyn FnMut()>::new(move || match app.try_borrow_mut() {
        Ok(mut app) => app.teardown(),
        Err(_) => log::warn!("Page busy during pagehide; teardown skipped"),
    });
    window.add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref())?;
    on_hide.forget();
    Ok(())
}
