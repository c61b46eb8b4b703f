#![cfg(test)]

use std::time::Duration;

use crate::config::{ComposeMode, Config};
use crate::contact::rules::{FieldKind, FieldRule};
use crate::contact::{FormState, SubmitOutcome};
use crate::controller::Controller;
use crate::dom::memory::MemoryDom;
use crate::dom::{Dom, Event, EventKind, EventOutcome, NodeId};
use crate::error::{ConfigError, LoadError};
use crate::experience::LoaderState;
use crate::page::Page;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Node handles of the stock page built by `build_dom`.
struct Nodes {
    header: NodeId,
    toggle: NodeId,
    panel: NodeId,
    about_link: NodeId,
    blog_link: NodeId,
    about: NodeId,
    contact_section: NodeId,
    download: NodeId,
    feedback: NodeId,
    form: NodeId,
    name: NodeId,
    organization: NodeId,
    email: NodeId,
    phone: NodeId,
    subject: NodeId,
    message: NodeId,
    list: NodeId,
    outside: NodeId,
}

struct Fixture {
    dom: MemoryDom,
    page: Page,
    n: Nodes,
}

fn form_group(dom: &mut MemoryDom, form: NodeId, tag: &str, name: &str) -> NodeId {
    let group = dom.element(form, "div", &[("class", "form-group")]);
    dom.element(group, "label", &[("for", name)]);
    dom.element(group, tag, &[("name", name), ("id", name)])
}

fn build_dom() -> (MemoryDom, Nodes) {
    let mut dom = MemoryDom::new("https://example.com/");
    let doc = dom.document();

    let header = dom.element(doc, "header", &[("class", "site-header")]);
    let toggle = dom.element(header, "button", &[("id", "menu-toggle")]);
    let panel = dom.element(header, "ul", &[("id", "dropdown-menu")]);
    let li = dom.element(panel, "li", &[]);
    let about_link = dom.element(li, "a", &[("href", "#about")]);
    let li = dom.element(panel, "li", &[]);
    let blog_link = dom.element(li, "a", &[("href", "/blog.html")]);

    let about = dom.element(doc, "section", &[("id", "about")]);
    let download = dom.element(
        about,
        "a",
        &[("class", "btn btn-download"), ("href", "assets/cv.pdf")],
    );
    let feedback = dom.element(about, "div", &[("id", "download-feedback")]);
    let list = dom.element(about, "div", &[("id", "experience-list")]);

    let contact_section = dom.element(doc, "section", &[("id", "contact")]);
    let form = dom.element(contact_section, "form", &[("class", "contact-form")]);
    let name = form_group(&mut dom, form, "input", "name");
    let organization = form_group(&mut dom, form, "input", "organization");
    let email = form_group(&mut dom, form, "input", "email");
    let phone = form_group(&mut dom, form, "input", "phone");
    let subject = form_group(&mut dom, form, "input", "subject");
    let message = form_group(&mut dom, form, "textarea", "message");
    dom.element(form, "button", &[("type", "submit")]);

    let outside = dom.element(doc, "input", &[("class", "outside")]);

    (
        dom,
        Nodes {
            header,
            toggle,
            panel,
            about_link,
            blog_link,
            about,
            contact_section,
            download,
            feedback,
            form,
            name,
            organization,
            email,
            phone,
            subject,
            message,
            list,
            outside,
        },
    )
}

fn fixture_with(config: Config) -> Fixture {
    init_logging();
    let (mut dom, n) = build_dom();
    let page = Page::mount(&mut dom, config);
    Fixture { dom, page, n }
}

fn fixture() -> Fixture {
    fixture_with(Config::default())
}

impl Fixture {
    fn deliver(&mut self, events: Vec<Event>) -> EventOutcome {
        let mut outcome = EventOutcome::IGNORED;
        for event in events {
            outcome = outcome.merge(self.page.handle(&mut self.dom, &event));
        }
        outcome
    }

    fn fire(&mut self, kind: EventKind, target: NodeId) -> EventOutcome {
        let events = self.dom.fire(kind, target, None);
        self.deliver(events)
    }

    fn key(&mut self, key: &str) -> EventOutcome {
        let doc = self.dom.document();
        let events = self.dom.fire(EventKind::KeyDown, doc, Some(key));
        self.deliver(events)
    }

    fn fill(&mut self, values: &[(NodeId, &str)]) {
        for (node, value) in values {
            self.dom.type_value(*node, value);
        }
    }

    fn fill_valid(&mut self) {
        let n = &self.n;
        let values = [
            (n.name, "Al"),
            (n.organization, "Acme"),
            (n.email, "al@acme.com"),
            (n.subject, "Hello there"),
            (n.message, "1234567890"),
        ];
        self.fill(&values);
    }

    fn expire_timers(&mut self) {
        for (id, _) in self.dom.pending_timers() {
            if let Some(event) = self.dom.fire_timer(id) {
                self.page.handle(&mut self.dom, &event);
            }
        }
    }

    fn respond_experience(&mut self, status: u16, body: &str) {
        let (id, _) = self.dom.pending_requests()[0].clone();
        let event = self.dom.respond(id, status, body).unwrap();
        self.page.handle(&mut self.dom, &event);
    }

    fn has_error(&self, field: NodeId) -> bool {
        self.dom.has_class(field, "error")
    }
}

// ═══════════════════════════════════════════════════════════
// Download feedback
// ═══════════════════════════════════════════════════════════

#[test]
fn download_click_shows_feedback_without_blocking_download() {
    let mut f = fixture();
    let outcome = f.fire(EventKind::Click, f.n.download);

    assert!(outcome.handled);
    assert!(!outcome.prevent_default);
    let msg = f.page.download.message_node().unwrap();
    assert_eq!(f.dom.parent(msg), Some(f.n.feedback));
    assert_eq!(f.dom.attribute(msg, "role").as_deref(), Some("status"));
    assert!(f.dom.text(msg).contains("cv.pdf"));
    assert_eq!(f.dom.pending_timers().len(), 1);
    assert_eq!(f.dom.pending_timers()[0].1, Duration::from_millis(4000));
}

#[test]
fn download_feedback_prefers_download_attribute_for_file_name() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.set_attribute(n.download, "download", "jane-doe-cv.pdf");
    let mut page = Page::mount(&mut dom, Config::default());
    for event in dom.fire(EventKind::Click, n.download, None) {
        page.handle(&mut dom, &event);
    }
    let msg = page.download.message_node().unwrap();
    assert!(dom.text(msg).contains("jane-doe-cv.pdf"));
}

#[test]
fn download_second_click_supersedes_message() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.download);
    let first = f.page.download.message_node().unwrap();
    let first_timer = f.dom.pending_timers()[0].0;

    f.fire(EventKind::Click, f.n.download);
    let second = f.page.download.message_node().unwrap();

    assert_ne!(first, second);
    assert!(!f.dom.is_attached(first));
    assert_eq!(f.dom.children(f.n.feedback), vec![second]);
    assert_eq!(f.dom.pending_timers().len(), 1);
    assert!(f.dom.fire_timer(first_timer).is_none());
}

#[test]
fn download_message_hides_after_timeout() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.download);
    let msg = f.page.download.message_node().unwrap();
    f.expire_timers();
    assert!(!f.dom.is_attached(msg));
    assert!(f.page.download.message_node().is_none());
    assert!(f.dom.children(f.n.feedback).is_empty());
}

#[test]
fn download_without_feedback_container_is_inert() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.remove(n.feedback);
    let mut page = Page::mount(&mut dom, Config::default());
    assert!(!page.download.is_active());
    assert!(dom.listeners().iter().all(|l| l.node != n.download));
    for event in dom.fire(EventKind::Click, n.download, None) {
        page.handle(&mut dom, &event);
    }
    assert!(dom.pending_timers().is_empty());
}

#[test]
fn download_without_href_is_inert() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.remove_attribute(n.download, "href");
    let page = Page::mount(&mut dom, Config::default());
    assert!(!page.download.is_active());
}

#[test]
fn download_feedback_names_file_with_spaces_and_accents() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.set_attribute(n.download, "href", "assets/currículum vitae.pdf");
    let mut page = Page::mount(&mut dom, Config::default());
    for event in dom.fire(EventKind::Click, n.download, None) {
        page.handle(&mut dom, &event);
    }
    let msg = page.download.message_node().unwrap();
    let text = dom.text(msg);
    assert!(text.contains("currículum vitae.pdf"), "got {:?}", text);
    assert!(!text.contains('%'));
}

// ═══════════════════════════════════════════════════════════
// Contact form
// ═══════════════════════════════════════════════════════════

#[test]
fn contact_valid_submit_opens_mail_client() {
    let mut f = fixture();
    f.fill_valid();
    let outcome = f.fire(EventKind::Submit, f.n.form);

    assert!(outcome.prevent_default);
    assert_eq!(f.dom.navigations.len(), 1);
    let uri = &f.dom.navigations[0];
    assert!(uri.starts_with("mailto:contact@example.com?subject="));
    assert!(uri.contains("Hello%20there"));
    assert!(uri.contains("Not%20provided"));
    assert_eq!(f.page.contact.state(), FormState::Idle);
}

#[test]
fn contact_draft_contains_every_field_and_phone_placeholder() {
    let mut f = fixture();
    f.fill_valid();
    let outcome = f.page.contact.submit(&mut f.dom).unwrap();
    let SubmitOutcome::Sent(draft) = outcome else {
        panic!("expected Sent");
    };
    assert_eq!(draft.recipient, "contact@example.com");
    assert_eq!(draft.subject, "Contact: Hello there");
    for part in [
        "Name: Al",
        "Company: Acme",
        "Email: al@acme.com",
        "Phone: Not provided",
        "1234567890",
    ] {
        assert!(draft.body.contains(part), "body is missing {:?}", part);
    }
}

#[test]
fn contact_success_clears_fields_and_shows_transient_message() {
    let mut f = fixture();
    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);

    for node in [f.n.name, f.n.organization, f.n.email, f.n.subject, f.n.message] {
        assert_eq!(f.dom.value(node), "");
    }
    let ok = f.page.contact.success_node().unwrap();
    assert_eq!(f.dom.first_child(f.n.form), Some(ok));
    assert!(f.dom.has_class(ok, "ok-msg"));

    f.expire_timers();
    assert!(!f.dom.is_attached(ok));
    assert!(f.page.contact.success_node().is_none());
}

#[test]
fn contact_short_message_yields_single_min_length_error() {
    let mut f = fixture();
    f.fill_valid();
    f.fill(&[(f.n.message, "short")]);
    let outcome = f.page.contact.submit(&mut f.dom).unwrap();

    let SubmitOutcome::Invalid(result) = outcome else {
        panic!("expected Invalid");
    };
    assert_eq!(result.len(), 1);
    assert_eq!(result.error("message"), Some("Must be at least 10 characters"));

    let err = f.page.contact.error_node("message").unwrap();
    assert_eq!(f.dom.text(err), "Must be at least 10 characters");
    assert_eq!(f.dom.attribute(err, "hidden"), None);
    assert!(f.has_error(f.n.message));
    for node in [f.n.name, f.n.organization, f.n.email, f.n.phone, f.n.subject] {
        assert!(!f.has_error(node));
    }
    assert!(f.dom.navigations.is_empty());
    assert_eq!(f.dom.active_element(), Some(f.n.message));
}

#[test]
fn contact_empty_required_field_reports_only_that_field() {
    let mut f = fixture();
    f.fill_valid();
    f.fill(&[(f.n.organization, "   ")]);
    let SubmitOutcome::Invalid(result) = f.page.contact.submit(&mut f.dom).unwrap() else {
        panic!("expected Invalid");
    };
    let errors: Vec<(&str, &str)> = result.iter().collect();
    assert_eq!(errors, vec![("organization", "This field is required")]);
}

#[test]
fn contact_focuses_first_failing_field_in_document_order() {
    let mut f = fixture();
    f.fill_valid();
    f.fill(&[(f.n.subject, "Hi"), (f.n.name, "")]);
    f.fire(EventKind::Submit, f.n.form);
    assert_eq!(f.dom.active_element(), Some(f.n.name));
    assert!(f.has_error(f.n.subject));
}

#[test]
fn contact_error_node_is_attached_inside_group_with_aria_links() {
    let mut f = fixture();
    f.fill(&[(f.n.email, "nope")]);
    f.fire(EventKind::Blur, f.n.email);

    let err = f.page.contact.error_node("email").unwrap();
    let group = f.dom.parent(f.n.email).unwrap();
    assert_eq!(f.dom.parent(err), Some(group));
    assert_eq!(f.dom.attribute(err, "id").as_deref(), Some("email-error"));
    assert_eq!(f.dom.attribute(f.n.email, "aria-describedby").as_deref(), Some("email-error"));
    assert_eq!(f.dom.attribute(f.n.email, "aria-invalid").as_deref(), Some("true"));
    assert_eq!(f.dom.text(err), "Please enter a valid email address");
}

#[test]
fn contact_blur_validates_only_that_field() {
    let mut f = fixture();
    f.fill(&[(f.n.email, "al@acme")]);
    f.fire(EventKind::Blur, f.n.email);

    assert!(f.has_error(f.n.email));
    assert!(f.page.contact.error_node("name").is_none());
    assert!(!f.has_error(f.n.name));
}

#[test]
fn contact_blur_on_empty_optional_phone_shows_nothing() {
    let mut f = fixture();
    f.fire(EventKind::Blur, f.n.phone);
    assert!(!f.has_error(f.n.phone));

    f.fill(&[(f.n.phone, "12-34")]);
    f.fire(EventKind::Blur, f.n.phone);
    assert!(f.has_error(f.n.phone));
    let err = f.page.contact.error_node("phone").unwrap();
    assert_eq!(f.dom.text(err), "Please enter a valid phone number");
}

#[test]
fn contact_input_clears_error_without_revalidating() {
    let mut f = fixture();
    f.fill(&[(f.n.email, "bad")]);
    f.fire(EventKind::Blur, f.n.email);
    let err = f.page.contact.error_node("email").unwrap();

    f.fill(&[(f.n.email, "still bad")]);
    f.fire(EventKind::Input, f.n.email);

    assert!(!f.has_error(f.n.email));
    assert_eq!(f.dom.attribute(f.n.email, "aria-invalid"), None);
    assert_eq!(f.dom.text(err), "");
    assert!(f.dom.attribute(err, "hidden").is_some());
    assert!(f.dom.is_attached(err));
}

#[test]
fn contact_error_round_trip_reuses_node() {
    let mut f = fixture();
    f.fill(&[(f.n.name, "A")]);
    f.fire(EventKind::Blur, f.n.name);
    let err = f.page.contact.error_node("name").unwrap();
    assert_eq!(f.dom.text(err), "Must be at least 2 characters");

    f.fill(&[(f.n.name, "Ada")]);
    f.fire(EventKind::Blur, f.n.name);
    assert!(!f.has_error(f.n.name));
    assert!(f.dom.attribute(err, "hidden").is_some());

    f.fill(&[(f.n.name, "")]);
    f.fire(EventKind::Blur, f.n.name);
    assert_eq!(f.page.contact.error_node("name"), Some(err));
    assert_eq!(f.dom.text(err), "This field is required");
    let group = f.dom.parent(f.n.name).unwrap();
    let error_nodes = f
        .dom
        .children(group)
        .into_iter()
        .filter(|c| f.dom.has_class(*c, "error-msg"))
        .count();
    assert_eq!(error_nodes, 1);
}

#[test]
fn contact_resubmit_clears_previous_errors() {
    let mut f = fixture();
    f.fire(EventKind::Submit, f.n.form);
    assert!(f.has_error(f.n.name));

    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);
    for node in [f.n.name, f.n.organization, f.n.email, f.n.subject, f.n.message] {
        assert!(!f.has_error(node));
    }
    assert_eq!(f.dom.navigations.len(), 1);
}

#[test]
fn contact_gmail_mode_opens_tab() {
    let mut config = Config::default();
    config.contact.compose = ComposeMode::Gmail;
    let mut f = fixture_with(config);
    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);

    assert!(f.dom.navigations.is_empty());
    assert_eq!(f.dom.opened_tabs.len(), 1);
    assert!(f.dom.opened_tabs[0].starts_with("https://mail.google.com/mail/?view=cm"));
    assert!(f.dom.opened_tabs[0].contains("su=Contact%3A%20Hello%20there"));
}

#[test]
fn contact_blocked_tab_shows_notice_and_keeps_form() {
    let mut config = Config::default();
    config.contact.compose = ComposeMode::Gmail;
    let mut f = fixture_with(config);
    f.dom.block_popups = true;
    f.fill_valid();
    let outcome = f.page.contact.submit(&mut f.dom).unwrap();

    assert!(matches!(outcome, SubmitOutcome::Blocked(_)));
    assert_eq!(f.dom.alerts.len(), 1);
    assert!(f.dom.alerts[0].contains("pop-ups"));
    assert_eq!(f.dom.value(f.n.name), "Al");
    assert!(f.page.contact.success_node().is_none());
}

#[test]
fn contact_rules_for_absent_fields_are_skipped() {
    init_logging();
    let (mut dom, n) = build_dom();
    let org_group = dom.parent(n.organization).unwrap();
    dom.remove(org_group);
    let mut page = Page::mount(&mut dom, Config::default());

    for (node, value) in [
        (n.name, "Al"),
        (n.email, "al@acme.com"),
        (n.subject, "Hello there"),
        (n.message, "1234567890"),
    ] {
        dom.type_value(node, value);
    }
    let outcome = page.contact.submit(&mut dom).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Sent(_)));
    assert!(page.contact.field_node("organization").is_none());
}

#[test]
fn contact_second_success_replaces_banner_and_timer() {
    let mut f = fixture();
    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);
    let first = f.page.contact.success_node().unwrap();
    let first_timer = f.dom.pending_timers()[0].0;

    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);
    let second = f.page.contact.success_node().unwrap();

    assert_ne!(first, second);
    assert!(!f.dom.is_attached(first));
    assert_eq!(f.dom.first_child(f.n.form), Some(second));
    assert_eq!(f.dom.query_all_within(f.n.form, ".ok-msg"), vec![second]);
    assert_eq!(f.dom.pending_timers().len(), 1);
    assert!(f.dom.fire_timer(first_timer).is_none());
    assert_eq!(f.dom.navigations.len(), 2);
}

#[test]
fn contact_tracks_select_controls() {
    init_logging();
    let (mut dom, n) = build_dom();
    let topic = form_group(&mut dom, n.form, "select", "topic");
    let mut config = Config::default();
    config.contact.fields.push(FieldRule::new("topic", true, FieldKind::Text));
    let mut page = Page::mount(&mut dom, config);
    assert_eq!(page.contact.field_node("topic"), Some(topic));

    for (node, value) in [
        (n.name, "Al"),
        (n.organization, "Acme"),
        (n.email, "al@acme.com"),
        (n.subject, "Hello there"),
        (n.message, "1234567890"),
    ] {
        dom.type_value(node, value);
    }
    let SubmitOutcome::Invalid(result) = page.contact.submit(&mut dom).unwrap() else {
        panic!("expected Invalid");
    };
    assert_eq!(result.len(), 1);
    assert!(result.error("topic").is_some());

    dom.type_value(topic, "hiring");
    let outcome = page.contact.submit(&mut dom).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Sent(_)));
}

#[test]
fn contact_missing_form_is_inert() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.remove(n.form);
    let mut page = Page::mount(&mut dom, Config::default());
    assert!(!page.contact.is_active());
    assert!(page.contact.submit(&mut dom).is_none());
}

// ═══════════════════════════════════════════════════════════
// Experience list
// ═══════════════════════════════════════════════════════════

#[test]
fn experience_fetches_once_and_shows_loading_state() {
    let f = fixture();
    let requests = f.dom.pending_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, "assets/data/experience.json");
    assert!(f.dom.inner_html(f.n.list).contains("experience-loading"));
    assert_eq!(f.dom.attribute(f.n.list, "aria-busy").as_deref(), Some("true"));
    assert!(matches!(f.page.experience.state(), LoaderState::Loading(_)));
}

#[test]
fn experience_renders_entries() {
    let mut f = fixture();
    f.respond_experience(
        200,
        r#"{"experiences":[
            {"company":"Acme","position":"Engineer","year":"2020 - 2023",
             "responsibilities":["Built things","Fixed things"]},
            {"company":"Globex","position":"Lead","year":2024,"responsibilities":["Led"]}
        ]}"#,
    );

    let html = f.dom.inner_html(f.n.list);
    assert_eq!(f.page.experience.state(), &LoaderState::Ready(2));
    assert_eq!(html.matches("class=\"experience-item\"").count(), 2);
    assert!(html.contains("<h3 class=\"job-title\">Acme</h3>"));
    assert!(html.contains("<li>Fixed things</li>"));
    assert!(html.contains("<span class=\"job-year\">2024</span>"));
    assert_eq!(f.dom.attribute(f.n.list, "aria-busy"), None);
    assert!(f.dom.pending_requests().is_empty());
}

#[test]
fn experience_escapes_markup_and_uses_placeholders() {
    let mut f = fixture();
    f.respond_experience(
        200,
        r#"{"experiences":[{"company":"<script>alert(1)</script>","responsibilities":"n/a"}]}"#,
    );
    let html = f.dom.inner_html(f.n.list);
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(html.contains("Position not specified"));
    assert!(html.contains("Date not specified"));
    assert!(html.contains("<li class=\"placeholder\">No details available</li>"));
}

#[test]
fn experience_empty_array_shows_empty_state() {
    let mut f = fixture();
    f.respond_experience(200, r#"{"experiences": []}"#);
    let html = f.dom.inner_html(f.n.list);
    assert_eq!(f.page.experience.state(), &LoaderState::Empty);
    assert!(html.contains("experience-empty"));
    assert!(html.contains("No experience entries to show yet."));
    assert!(!html.contains("experience-error"));
}

#[test]
fn experience_404_shows_error_state() {
    let mut f = fixture();
    f.respond_experience(404, "Not Found");
    let html = f.dom.inner_html(f.n.list);
    assert_eq!(f.page.experience.state(), &LoaderState::Failed(LoadError::Status(404)));
    assert!(html.contains("experience-error"));
    assert!(html.contains("role=\"alert\""));
    assert!(f.dom.pending_requests().is_empty());
}

#[test]
fn experience_missing_array_is_malformed() {
    let mut f = fixture();
    f.respond_experience(200, r#"{"jobs": []}"#);
    assert!(matches!(f.page.experience.state(), LoaderState::Failed(LoadError::Malformed(_))));

    let mut f = fixture();
    f.respond_experience(200, r#"{"experiences": {"company": "Acme"}}"#);
    assert!(matches!(f.page.experience.state(), LoaderState::Failed(LoadError::Malformed(_))));

    let mut f = fixture();
    f.respond_experience(200, "<html>oops</html>");
    assert!(matches!(f.page.experience.state(), LoaderState::Failed(LoadError::Malformed(_))));
}

#[test]
fn experience_network_failure_shows_error_state() {
    let mut f = fixture();
    let (id, _) = f.dom.pending_requests()[0].clone();
    let event = f.dom.fail_request(id, "connection reset").unwrap();
    let outcome = f.page.handle(&mut f.dom, &event);

    assert!(outcome.handled);
    assert_eq!(
        f.page.experience.state(),
        &LoaderState::Failed(LoadError::Network("connection reset".to_string()))
    );
    assert!(f.dom.inner_html(f.n.list).contains("Experience could not be loaded"));
}

#[test]
fn experience_response_after_teardown_is_ignored() {
    let mut f = fixture();
    let (id, _) = f.dom.pending_requests()[0].clone();
    f.page.experience.teardown(&mut f.dom);
    let event = f.dom.respond(id, 200, r#"{"experiences": []}"#).unwrap();
    let outcome = f.page.handle(&mut f.dom, &event);
    assert!(!outcome.handled);
    assert!(f.dom.inner_html(f.n.list).contains("experience-loading"));
}

// ═══════════════════════════════════════════════════════════
// Navigation menu
// ═══════════════════════════════════════════════════════════

fn assert_menu_consistent(f: &Fixture) {
    let open = f.page.menu.is_open();
    assert_eq!(f.dom.has_class(f.n.panel, "open"), open);
    assert_eq!(
        f.dom.attribute(f.n.panel, "aria-hidden").as_deref(),
        Some(if open { "false" } else { "true" })
    );
    assert_eq!(
        f.dom.attribute(f.n.toggle, "aria-expanded").as_deref(),
        Some(if open { "true" } else { "false" })
    );
    assert_eq!(f.dom.attribute(f.n.panel, "inert").is_some(), !open);
}

#[test]
fn menu_starts_closed() {
    let f = fixture();
    assert!(!f.page.menu.is_open());
    assert_menu_consistent(&f);
    assert_eq!(f.dom.attribute(f.n.toggle, "aria-controls").as_deref(), Some("dropdown-menu"));
}

#[test]
fn menu_toggle_opens_and_closes_with_focus_return() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    assert!(f.page.menu.is_open());
    assert_menu_consistent(&f);

    f.fire(EventKind::Click, f.n.toggle);
    assert!(!f.page.menu.is_open());
    assert_menu_consistent(&f);
    assert_eq!(f.dom.active_element(), Some(f.n.toggle));
}

#[test]
fn menu_escape_closes_only_when_open() {
    let mut f = fixture();
    assert!(!f.key("Escape").handled);

    f.fire(EventKind::Click, f.n.toggle);
    assert!(f.key("Escape").handled);
    assert!(!f.page.menu.is_open());
    assert_menu_consistent(&f);

    f.fire(EventKind::Click, f.n.toggle);
    f.key("Enter");
    assert!(f.page.menu.is_open());
}

#[test]
fn menu_outside_click_closes_without_stealing_focus() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    f.dom.focus(f.n.outside);
    f.fire(EventKind::Click, f.n.outside);

    assert!(!f.page.menu.is_open());
    assert_menu_consistent(&f);
    assert_eq!(f.dom.active_element(), Some(f.n.outside));
}

#[test]
fn menu_outside_click_restores_focus_from_inside_menu() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    f.dom.focus(f.n.blog_link);
    f.fire(EventKind::Click, f.n.header);
    assert!(!f.page.menu.is_open());
    assert_eq!(f.dom.active_element(), Some(f.n.toggle));
}

#[test]
fn menu_in_page_link_scrolls_smoothly_and_closes() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    let outcome = f.fire(EventKind::Click, f.n.about_link);

    assert!(outcome.prevent_default);
    assert_eq!(f.dom.scrolled_into_view, vec![(f.n.about, true)]);
    assert!(!f.page.menu.is_open());
    assert_menu_consistent(&f);
    assert_eq!(f.dom.active_element(), Some(f.n.toggle));
}

#[test]
fn menu_external_link_closes_without_preventing_navigation() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    let outcome = f.fire(EventKind::Click, f.n.blog_link);

    assert!(!outcome.prevent_default);
    assert!(f.dom.scrolled_into_view.is_empty());
    assert!(!f.page.menu.is_open());
}

#[test]
fn menu_in_page_link_finds_ids_that_are_not_plain_selectors() {
    init_logging();
    let (mut dom, n) = build_dom();
    let doc = dom.document();
    let mut links = Vec::new();
    for id in ["sobre-mí", "2024", "v1.2:notes"] {
        let section = dom.element(doc, "section", &[("id", id)]);
        let li = dom.element(n.panel, "li", &[]);
        let href = format!("#{}", id);
        let link = dom.element(li, "a", &[("href", href.as_str())]);
        links.push((link, section));
    }
    let mut page = Page::mount(&mut dom, Config::default());

    for (link, section) in links {
        for event in dom.fire(EventKind::Click, n.toggle, None) {
            page.handle(&mut dom, &event);
        }
        assert!(page.menu.is_open());
        let mut outcome = EventOutcome::IGNORED;
        for event in dom.fire(EventKind::Click, link, None) {
            outcome = outcome.merge(page.handle(&mut dom, &event));
        }
        assert!(outcome.prevent_default);
        assert_eq!(dom.scrolled_into_view.last(), Some(&(section, true)));
        assert!(!page.menu.is_open());
    }
}

#[test]
fn menu_in_page_link_without_target_closes_and_lets_browser_handle_it() {
    init_logging();
    let (mut dom, n) = build_dom();
    let li = dom.element(n.panel, "li", &[]);
    let dangling = dom.element(li, "a", &[("href", "#nowhere")]);
    let mut page = Page::mount(&mut dom, Config::default());

    for event in dom.fire(EventKind::Click, n.toggle, None) {
        page.handle(&mut dom, &event);
    }
    let mut outcome = EventOutcome::IGNORED;
    for event in dom.fire(EventKind::Click, dangling, None) {
        outcome = outcome.merge(page.handle(&mut dom, &event));
    }

    assert!(outcome.handled);
    assert!(!outcome.prevent_default);
    assert!(dom.scrolled_into_view.is_empty());
    assert!(!page.menu.is_open());
    assert_eq!(dom.active_element(), Some(n.toggle));
}

#[test]
fn menu_close_when_closed_is_a_no_op() {
    let mut f = fixture();
    let writes = f.dom.attribute_writes;
    let focus_calls = f.dom.focus_log.len();

    f.page.menu.close(&mut f.dom, crate::menu::CloseReason::Escape);
    f.key("Escape");
    f.fire(EventKind::Click, f.n.outside);

    assert_eq!(f.dom.attribute_writes, writes);
    assert_eq!(f.dom.focus_log.len(), focus_calls);
}

#[test]
fn menu_missing_panel_is_inert() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.remove(n.panel);
    let mut page = Page::mount(&mut dom, Config::default());
    assert!(!page.menu.is_active());
    for event in dom.fire(EventKind::Click, n.toggle, None) {
        page.handle(&mut dom, &event);
    }
    assert!(!page.menu.is_open());
    assert_eq!(dom.attribute(n.toggle, "aria-expanded"), None);
}

// ═══════════════════════════════════════════════════════════
// Header effects
// ═══════════════════════════════════════════════════════════

#[test]
fn header_scroll_is_throttled_to_one_frame() {
    let mut f = fixture();
    let doc = f.dom.document();
    f.dom.set_scroll_y(120.0);
    for _ in 0..3 {
        f.fire(EventKind::Scroll, doc);
    }
    assert_eq!(f.dom.pending_frames().len(), 1);
    assert!(!f.dom.has_class(f.n.header, "scrolled"));

    let frames = f.dom.run_frames();
    f.deliver(frames);
    assert!(f.dom.has_class(f.n.header, "scrolled"));
    assert!(f.page.header.is_scrolled());

    f.dom.set_scroll_y(10.0);
    f.fire(EventKind::Scroll, doc);
    let frames = f.dom.run_frames();
    f.deliver(frames);
    assert!(!f.dom.has_class(f.n.header, "scrolled"));
}

#[test]
fn header_scroll_listener_is_passive() {
    let f = fixture();
    let doc = f.dom.document();
    let scroll = f
        .dom
        .listeners()
        .into_iter()
        .find(|l| l.kind == EventKind::Scroll && l.node == doc)
        .unwrap();
    assert!(scroll.options.passive);
}

#[test]
fn header_applies_scrolled_class_when_loaded_mid_page() {
    init_logging();
    let (mut dom, n) = build_dom();
    dom.set_scroll_y(400.0);
    let page = Page::mount(&mut dom, Config::default());
    assert!(page.header.is_scrolled());
    assert!(dom.has_class(n.header, "scrolled"));
}

#[test]
fn header_contrast_follows_contact_section_visibility() {
    let mut f = fixture();
    assert_eq!(f.dom.observer_count(), 1);

    let events = f.dom.intersect(f.n.contact_section, true);
    f.deliver(events);
    assert!(f.dom.has_class(f.n.header, "header-contrast"));

    let events = f.dom.intersect(f.n.contact_section, false);
    f.deliver(events);
    assert!(!f.dom.has_class(f.n.header, "header-contrast"));
}

// ═══════════════════════════════════════════════════════════
// Page bootstrap and teardown
// ═══════════════════════════════════════════════════════════

#[test]
fn page_teardown_releases_listeners_timers_and_observers() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.download);
    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);
    f.fill(&[(f.n.email, "x")]);
    f.fire(EventKind::Blur, f.n.email);
    let doc = f.dom.document();
    f.fire(EventKind::Scroll, doc);
    assert!(!f.dom.pending_timers().is_empty());
    assert!(!f.dom.pending_frames().is_empty());

    let Fixture { mut dom, page, n } = f;
    page.teardown(&mut dom);

    assert!(dom.listeners().is_empty());
    assert!(dom.pending_timers().is_empty());
    assert!(dom.pending_frames().is_empty());
    assert_eq!(dom.observer_count(), 0);
    assert!(dom.children(n.feedback).is_empty());
    assert!(!dom.has_class(n.email, "error"));
    assert!(dom.query_within(n.form, ".error-msg").is_none());
    assert!(dom.query_within(n.form, ".ok-msg").is_none());
}

#[test]
fn page_remount_after_teardown_does_not_duplicate_nodes() {
    let mut f = fixture();
    f.fire(EventKind::Blur, f.n.name);
    let Fixture { mut dom, page, n } = f;
    page.teardown(&mut dom);

    let mut page = Page::mount(&mut dom, Config::default());
    for event in dom.fire(EventKind::Blur, n.name, None) {
        page.handle(&mut dom, &event);
    }
    assert_eq!(dom.query_all_within(n.form, ".error-msg").len(), 1);
}

#[test]
fn page_with_no_anchors_is_fully_inert() {
    init_logging();
    let mut dom = MemoryDom::default();
    let mut page = Page::mount(&mut dom, Config::default());

    assert!(!page.download.is_active());
    assert!(!page.contact.is_active());
    assert!(!page.experience.is_active());
    assert!(!page.menu.is_active());
    assert!(!page.header.is_active());
    assert!(dom.listeners().is_empty());
    assert!(dom.pending_requests().is_empty());

    let doc = dom.document();
    for event in dom.fire(EventKind::Click, doc, None) {
        assert!(!page.handle(&mut dom, &event).handled);
    }
}

#[test]
fn page_controllers_work_independently() {
    let mut f = fixture();
    f.fire(EventKind::Click, f.n.toggle);
    f.respond_experience(404, "");
    f.fill_valid();
    f.fire(EventKind::Submit, f.n.form);

    assert!(f.page.menu.is_open());
    assert_eq!(f.dom.navigations.len(), 1);
    assert!(matches!(f.page.experience.state(), LoaderState::Failed(_)));
}

// ═══════════════════════════════════════════════════════════
// Config
// ═══════════════════════════════════════════════════════════

#[test]
fn config_defaults_match_stock_page() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.contact.fields.len(), 6);
    assert_eq!(config.header.scroll_threshold, 50.0);
    assert_eq!(config.download.duration_ms, 4000);
}

#[test]
fn config_from_toml_overrides_sections() {
    let config = Config::from_toml_str(
        r##"
        [contact]
        recipient = "me@portfolio.dev"
        compose = "gmail"

        [header]
        scroll_threshold = 100

        [selectors]
        contrast_target = "#footer"
        "##,
    )
    .unwrap();
    assert_eq!(config.contact.recipient, "me@portfolio.dev");
    assert_eq!(config.contact.compose, ComposeMode::Gmail);
    assert_eq!(config.header.scroll_threshold, 100.0);
    assert_eq!(config.selectors.contrast_target.as_deref(), Some("#footer"));
    assert_eq!(config.contact.subject_prefix, "Contact: ");
    assert_eq!(config.selectors.contact_form, ".contact-form");
}

#[test]
fn config_from_json_with_custom_rules() {
    let config = Config::from_json_str(
        r#"{"contact": {"fields": [
            {"name": "email", "required": true, "kind": "email"},
            {"name": "message", "required": true, "min": 20}
        ]}}"#,
    )
    .unwrap();
    assert_eq!(config.contact.fields.len(), 2);
    assert_eq!(config.contact.fields[1].min, Some(20));
}

#[test]
fn config_rejects_bad_values() {
    let err = Config::from_toml_str("[contact]\nrecipient = \"nobody\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRecipient(_)));

    let err = Config::from_json_str(
        r#"{"contact": {"fields": [{"name": "name", "min": 10, "max": 2}]}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvertedBounds { .. }));

    let err = Config::from_json_str(
        r#"{"contact": {"fields": [{"name": "name"}, {"name": "name"}]}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateField(_)));

    assert!(matches!(
        Config::from_toml_str("[header\n").unwrap_err(),
        ConfigError::Toml(_)
    ));
}
