pub mod mail;
pub mod rules;

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::config::{ComposeMode, ContactConfig};
use crate::controller::Controller;
use crate::dom::{Dom, Event, EventKind, EventOutcome, ListenerId, ListenerOptions, NodeId, TimerId};

use mail::MailDraft;
use rules::{validate, FormSnapshot, ValidationResult};

/// Where the form is in its submit cycle. Every handler returns to `Idle`
/// before it finishes; the intermediate states are visible in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Validating,
    Invalid,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// At least one field failed; errors are shown inline.
    Invalid(ValidationResult),
    /// The compose action was dispatched.
    Sent(MailDraft),
    /// The compose tab was blocked; the form keeps its contents.
    Blocked(MailDraft),
}

struct TrackedField {
    name: String,
    node: NodeId,
    blur: ListenerId,
    input: ListenerId,
}

struct Bound {
    form: NodeId,
    submit: ListenerId,
    /// Document order.
    fields: Vec<TrackedField>,
    /// Error display node per field, created on first failure and reused.
    error_nodes: HashMap<String, NodeId>,
    success: Option<(NodeId, TimerId)>,
}

/// Validates the contact form and hands a valid message to the visitor's
/// mail client.
pub struct ContactForm {
    config: ContactConfig,
    state: FormState,
    bound: Option<Bound>,
}

impl ContactForm {
    pub fn attach(dom: &mut dyn Dom, selector: &str, config: ContactConfig) -> Self {
        let Some(form) = dom.query(selector) else {
            warn!("Contact form {} not found; form validation disabled", selector);
            return ContactForm {
                config,
                state: FormState::Idle,
                bound: None,
            };
        };

        let mut fields: Vec<TrackedField> = Vec::new();
        for node in dom.query_all_within(form, "input, textarea, select") {
            let Some(name) = dom.attribute(node, "name") else {
                continue;
            };
            if fields.iter().any(|f| f.name == name) || !config.fields.iter().any(|r| r.name == name) {
                continue;
            }
            let blur = dom.add_listener(node, EventKind::Blur, ListenerOptions::default());
            let input = dom.add_listener(node, EventKind::Input, ListenerOptions::default());
            fields.push(TrackedField { name, node, blur, input });
        }
        for rule in &config.fields {
            if !fields.iter().any(|f| f.name == rule.name) {
                debug!("Contact form has no field '{}'; its rule is skipped", rule.name);
            }
        }

        let submit = dom.add_listener(form, EventKind::Submit, ListenerOptions::default());
        info!("Contact form mounted with {} tracked fields", fields.len());

        ContactForm {
            config,
            state: FormState::Idle,
            bound: Some(Bound {
                form,
                submit,
                fields,
                error_nodes: HashMap::new(),
                success: None,
            }),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// Node currently showing `field`'s error text, if one was ever created.
    pub fn error_node(&self, field: &str) -> Option<NodeId> {
        self.bound.as_ref()?.error_nodes.get(field).copied()
    }

    pub fn success_node(&self) -> Option<NodeId> {
        self.bound.as_ref()?.success.map(|(node, _)| node)
    }

    pub fn field_node(&self, field: &str) -> Option<NodeId> {
        self.bound
            .as_ref()?
            .fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.node)
    }

    /// Every tracked field's trimmed value, read in one pass.
    pub fn snapshot(&self, dom: &dyn Dom) -> FormSnapshot {
        let mut snapshot = FormSnapshot::new();
        if let Some(bound) = &self.bound {
            for field in &bound.fields {
                snapshot.insert(&field.name, &dom.value(field.node));
            }
        }
        snapshot
    }

    /// Run a full submit cycle. `None` when the controller is inert.
    pub fn submit(&mut self, dom: &mut dyn Dom) -> Option<SubmitOutcome> {
        self.bound.as_ref()?;
        self.transition(FormState::Validating);

        let snapshot = self.snapshot(dom);
        let result = validate(&self.config.fields, &snapshot, &self.config.messages);
        let bound = self.bound.as_mut()?;

        for field in &bound.fields {
            clear_error(dom, field, &bound.error_nodes);
        }

        if !result.is_valid() {
            self.transition(FormState::Invalid);
            let bound = self.bound.as_mut()?;
            let mut first_failing = None;
            for i in 0..bound.fields.len() {
                if let Some(msg) = result.error(&bound.fields[i].name) {
                    bound.show_error(dom, i, msg, &self.config.group_selector);
                    first_failing.get_or_insert(bound.fields[i].node);
                }
            }
            if let Some(node) = first_failing {
                dom.focus(node);
            }
            debug!("Contact form rejected: {} invalid field(s)", result.len());
            self.transition(FormState::Idle);
            return Some(SubmitOutcome::Invalid(result));
        }

        self.transition(FormState::Submitting);
        let draft = MailDraft::compose(&snapshot, &self.config);
        let dispatched = match self.config.compose {
            ComposeMode::Mailto => {
                dom.navigate(&draft.mailto_uri());
                true
            }
            ComposeMode::Gmail => dom.open_tab(&draft.gmail_uri()),
        };

        if !dispatched {
            warn!("Compose tab was blocked by the browser");
            dom.alert(&self.config.popup_blocked_message);
            self.transition(FormState::Idle);
            return Some(SubmitOutcome::Blocked(draft));
        }

        info!("Contact message composed for {}", draft.recipient);
        let bound = self.bound.as_mut()?;
        bound.show_success(dom, &self.config);
        for field in &bound.fields {
            dom.set_value(field.node, "");
        }
        self.transition(FormState::Idle);
        Some(SubmitOutcome::Sent(draft))
    }

    /// Blur: validate one field and show or clear only its error.
    fn check_field(&mut self, dom: &mut dyn Dom, index: usize) {
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        let field = &bound.fields[index];
        let Some(rule) = self.config.fields.iter().find(|r| r.name == field.name) else {
            return;
        };
        let value = dom.value(field.node);
        match rule.check(value.trim(), &self.config.messages) {
            Some(msg) => bound.show_error(dom, index, &msg, &self.config.group_selector),
            None => clear_error(dom, field, &bound.error_nodes),
        }
    }

    fn transition(&mut self, next: FormState) {
        debug!("Contact form: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl Bound {
    fn show_error(&mut self, dom: &mut dyn Dom, index: usize, msg: &str, group_selector: &str) {
        let field = &self.fields[index];
        let node = match self.error_nodes.get(&field.name) {
            Some(node) => *node,
            None => {
                let node = dom.create_element("span");
                let id = format!("{}-error", field.name);
                dom.set_attribute(node, "class", "error-msg");
                dom.set_attribute(node, "id", &id);
                dom.set_attribute(node, "role", "alert");
                let container = dom
                    .closest(field.node, group_selector)
                    .or_else(|| dom.parent(field.node))
                    .unwrap_or(self.form);
                dom.append_child(container, node);
                dom.set_attribute(field.node, "aria-describedby", &id);
                self.error_nodes.insert(field.name.clone(), node);
                node
            }
        };
        dom.add_class(field.node, "error");
        dom.set_attribute(field.node, "aria-invalid", "true");
        dom.set_text(node, msg);
        dom.remove_attribute(node, "hidden");
    }

    fn show_success(&mut self, dom: &mut dyn Dom, config: &ContactConfig) {
        if let Some((node, timer)) = self.success.take() {
            dom.clear_timeout(timer);
            dom.remove(node);
        }
        let node = dom.create_element("div");
        dom.set_attribute(node, "class", "ok-msg");
        dom.set_attribute(node, "role", "status");
        dom.set_text(node, &config.success_message);
        let first = dom.first_child(self.form);
        dom.insert_before(self.form, node, first);
        let timer = dom.set_timeout(config.success_duration());
        self.success = Some((node, timer));
    }
}

/// Hide and empty the field's error node, keeping it for reuse.
fn clear_error(dom: &mut dyn Dom, field: &TrackedField, error_nodes: &HashMap<String, NodeId>) {
    let Some(node) = error_nodes.get(&field.name) else {
        return;
    };
    dom.remove_class(field.node, "error");
    dom.remove_attribute(field.node, "aria-invalid");
    dom.set_text(*node, "");
    dom.set_attribute(*node, "hidden", "");
}

impl Controller for ContactForm {
    fn name(&self) -> &'static str {
        "contact-form"
    }

    fn is_active(&self) -> bool {
        self.bound.is_some()
    }

    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let Some(bound) = self.bound.as_ref() else {
            return EventOutcome::IGNORED;
        };
        match event {
            Event::Dom { listener, .. } if *listener == bound.submit => {
                self.submit(dom);
                EventOutcome::PREVENT_DEFAULT
            }
            Event::Dom { listener, kind, .. } => {
                let Some(index) = bound
                    .fields
                    .iter()
                    .position(|f| f.blur == *listener || f.input == *listener)
                else {
                    return EventOutcome::IGNORED;
                };
                match kind {
                    EventKind::Blur => self.check_field(dom, index),
                    _ => {
                        let bound = match self.bound.as_ref() {
                            Some(b) => b,
                            None => return EventOutcome::IGNORED,
                        };
                        clear_error(dom, &bound.fields[index], &bound.error_nodes);
                    }
                }
                EventOutcome::HANDLED
            }
            Event::Timer(timer) => match bound.success {
                Some((node, pending)) if pending == *timer => {
                    dom.remove(node);
                    if let Some(bound) = self.bound.as_mut() {
                        bound.success = None;
                    }
                    EventOutcome::HANDLED
                }
                _ => EventOutcome::IGNORED,
            },
            _ => EventOutcome::IGNORED,
        }
    }

    fn teardown(&mut self, dom: &mut dyn Dom) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        dom.remove_listener(bound.submit);
        for field in &bound.fields {
            dom.remove_listener(field.blur);
            dom.remove_listener(field.input);
            if bound.error_nodes.contains_key(&field.name) {
                dom.remove_class(field.node, "error");
                dom.remove_attribute(field.node, "aria-invalid");
                dom.remove_attribute(field.node, "aria-describedby");
            }
        }
        for node in bound.error_nodes.values() {
            dom.remove(*node);
        }
        if let Some((node, timer)) = bound.success {
            dom.clear_timeout(timer);
            dom.remove(node);
        }
        self.state = FormState::Idle;
    }
}
