use log::{debug, warn};

use crate::config::HeaderConfig;
use crate::controller::Controller;
use crate::dom::{Dom, Event, EventKind, EventOutcome, FrameId, ListenerId, ListenerOptions, NodeId, ObserverId};

struct Bound {
    header: NodeId,
    scroll: ListenerId,
    observer: Option<ObserverId>,
    /// At most one frame is ever requested per burst of scroll events.
    frame: Option<FrameId>,
    scrolled: bool,
    contrast: bool,
}

/// Presentation-only header styling: a "scrolled" class past a vertical
/// offset, and a contrast class while a watched section is on screen.
pub struct HeaderEffects {
    config: HeaderConfig,
    bound: Option<Bound>,
}

impl HeaderEffects {
    pub fn attach(
        dom: &mut dyn Dom,
        header_selector: &str,
        contrast_target: Option<&str>,
        config: HeaderConfig,
    ) -> Self {
        let Some(header) = dom.query(header_selector) else {
            warn!("Header {} not found; scroll styling disabled", header_selector);
            return HeaderEffects { config, bound: None };
        };

        let document = dom.document();
        let scroll = dom.add_listener(document, EventKind::Scroll, ListenerOptions { passive: true });
        let observer = contrast_target.and_then(|selector| match dom.query(selector) {
            Some(target) => Some(dom.observe_intersection(target, &config.root_margin)),
            None => {
                debug!("Contrast target {} not found; contrast styling skipped", selector);
                None
            }
        });

        let mut effects = HeaderEffects {
            config,
            bound: Some(Bound {
                header,
                scroll,
                observer,
                frame: None,
                scrolled: false,
                contrast: false,
            }),
        };
        // Pages can load already scrolled (reload, anchor links).
        effects.apply_scroll(dom);
        effects
    }

    pub fn is_scrolled(&self) -> bool {
        self.bound.as_ref().map(|b| b.scrolled).unwrap_or(false)
    }

    fn apply_scroll(&mut self, dom: &mut dyn Dom) {
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        let scrolled = dom.scroll_y() > self.config.scroll_threshold;
        if scrolled == bound.scrolled {
            return;
        }
        bound.scrolled = scrolled;
        if scrolled {
            dom.add_class(bound.header, &self.config.scrolled_class);
        } else {
            dom.remove_class(bound.header, &self.config.scrolled_class);
        }
    }
}

impl Controller for HeaderEffects {
    fn name(&self) -> &'static str {
        "header-effects"
    }

    fn is_active(&self) -> bool {
        self.bound.is_some()
    }

    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let Some(bound) = self.bound.as_mut() else {
            return EventOutcome::IGNORED;
        };
        match event {
            Event::Dom { listener, .. } if *listener == bound.scroll => {
                if bound.frame.is_none() {
                    bound.frame = Some(dom.request_animation_frame());
                }
                EventOutcome::HANDLED
            }
            Event::AnimationFrame(frame) if bound.frame == Some(*frame) => {
                bound.frame = None;
                self.apply_scroll(dom);
                EventOutcome::HANDLED
            }
            Event::Intersection { observer, intersecting } if bound.observer == Some(*observer) => {
                if bound.contrast != *intersecting {
                    bound.contrast = *intersecting;
                    if *intersecting {
                        dom.add_class(bound.header, &self.config.contrast_class);
                    } else {
                        dom.remove_class(bound.header, &self.config.contrast_class);
                    }
                }
                EventOutcome::HANDLED
            }
            _ => EventOutcome::IGNORED,
        }
    }

    fn teardown(&mut self, dom: &mut dyn Dom) {
        if let Some(bound) = self.bound.take() {
            dom.remove_listener(bound.scroll);
            if let Some(frame) = bound.frame {
                dom.cancel_animation_frame(frame);
            }
            if let Some(observer) = bound.observer {
                dom.disconnect_observer(observer);
            }
        }
    }
}
