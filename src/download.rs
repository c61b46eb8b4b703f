use log::{debug, warn};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::DownloadConfig;
use crate::controller::Controller;
use crate::dom::{Dom, Event, EventKind, EventOutcome, ListenerId, ListenerOptions, NodeId, TimerId};
use crate::util::fill;

/// Shows a short confirmation next to the CV download button. The click
/// itself is left alone so the browser performs the download.
pub struct DownloadFeedback {
    config: DownloadConfig,
    bound: Option<Bound>,
}

struct Bound {
    button: NodeId,
    container: NodeId,
    listener: ListenerId,
    /// Single slot: the visible message and its hide timer.
    message: Option<(NodeId, TimerId)>,
}

impl DownloadFeedback {
    pub fn attach(dom: &mut dyn Dom, button_selector: &str, feedback_selector: &str, config: DownloadConfig) -> Self {
        let bound = match (dom.query(button_selector), dom.query(feedback_selector)) {
            (Some(button), Some(container)) => {
                if resolve_href(dom, button).is_some() {
                    let listener = dom.add_listener(button, EventKind::Click, ListenerOptions::default());
                    Some(Bound {
                        button,
                        container,
                        listener,
                        message: None,
                    })
                } else {
                    warn!("Download button {} has no usable href; download feedback disabled", button_selector);
                    None
                }
            }
            (None, _) => {
                warn!("Download button {} not found; download feedback disabled", button_selector);
                None
            }
            (_, None) => {
                warn!("Feedback container {} not found; download feedback disabled", feedback_selector);
                None
            }
        };
        DownloadFeedback { config, bound }
    }

    /// The visible confirmation node, if any.
    pub fn message_node(&self) -> Option<NodeId> {
        self.bound.as_ref().and_then(|b| b.message.map(|(node, _)| node))
    }

    fn show(&mut self, dom: &mut dyn Dom) {
        let Some(bound) = self.bound.as_mut() else {
            return;
        };

        // A newer click supersedes the current message and its timer.
        if let Some((node, timer)) = bound.message.take() {
            dom.clear_timeout(timer);
            dom.remove(node);
        }

        let file = file_name(dom, bound.button).unwrap_or_else(|| "the file".to_string());
        let text = fill(&self.config.message, &[("file", file.as_str())]);

        let node = dom.create_element("p");
        dom.set_attribute(node, "class", "download-feedback-msg");
        dom.set_attribute(node, "role", "status");
        dom.set_text(node, &text);
        dom.append_child(bound.container, node);

        let timer = dom.set_timeout(self.config.duration());
        bound.message = Some((node, timer));
        debug!("Download feedback shown for {}", file);
    }

    fn hide(&mut self, dom: &mut dyn Dom, timer: TimerId) -> bool {
        let Some(bound) = self.bound.as_mut() else {
            return false;
        };
        match bound.message {
            Some((node, pending)) if pending == timer => {
                dom.remove(node);
                bound.message = None;
                true
            }
            _ => false,
        }
    }
}

impl Controller for DownloadFeedback {
    fn name(&self) -> &'static str {
        "download-feedback"
    }

    fn is_active(&self) -> bool {
        self.bound.is_some()
    }

    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let Some(click) = self.bound.as_ref().map(|b| b.listener) else {
            return EventOutcome::IGNORED;
        };
        match event {
            Event::Dom { listener, .. } if *listener == click => {
                self.show(dom);
                EventOutcome::HANDLED
            }
            Event::Timer(timer) if self.hide(dom, *timer) => EventOutcome::HANDLED,
            _ => EventOutcome::IGNORED,
        }
    }

    fn teardown(&mut self, dom: &mut dyn Dom) {
        if let Some(bound) = self.bound.take() {
            dom.remove_listener(bound.listener);
            if let Some((node, timer)) = bound.message {
                dom.clear_timeout(timer);
                dom.remove(node);
            }
        }
    }
}

fn resolve_href(dom: &dyn Dom, button: NodeId) -> Option<Url> {
    let href = dom.attribute(button, "href")?;
    if href.trim().is_empty() {
        return None;
    }
    Url::parse(&dom.location()).ok()?.join(href.trim()).ok()
}

/// `download` attribute when set, else the last path segment of the href,
/// percent-decoded for display.
fn file_name(dom: &dyn Dom, button: NodeId) -> Option<String> {
    if let Some(name) = dom.attribute(button, "download") {
        if !name.trim().is_empty() {
            return Some(name.trim().to_string());
        }
    }
    let url = resolve_href(dom, button)?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
}
