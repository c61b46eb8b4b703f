use crate::dom::{Dom, Event, EventOutcome};

/// One independently wired piece of page behaviour. Each controller owns its
/// DOM subtree, listeners and timers; none calls into another.
pub trait Controller {
    fn name(&self) -> &'static str;

    /// `false` when a DOM anchor was missing at mount time.
    fn is_active(&self) -> bool;

    /// React to `event` if it belongs to this controller.
    /// Returns [`EventOutcome::IGNORED`] for anything it does not own.
    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome;

    /// Remove every listener, timer, observer and transient node this
    /// controller created. Calling it twice is harmless.
    fn teardown(&mut self, dom: &mut dyn Dom);
}
