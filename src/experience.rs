use log::{debug, error, warn};
use serde_json::Value;

use crate::config::{ExperienceConfig, Placeholders};
use crate::controller::Controller;
use crate::dom::{Dom, Event, EventOutcome, FetchResponse, NodeId, RequestId};
use crate::error::LoadError;
use crate::util::html_escape;

/// One entry of professional history. Attributes the document leaves out
/// are `None` and rendered with placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experience {
    pub company: Option<String>,
    pub position: Option<String>,
    pub year: Option<String>,
    /// `None` when absent or not an array.
    pub responsibilities: Option<Vec<String>>,
}

impl Experience {
    /// Lenient read of one entry. `year` may be a string or a number.
    pub fn from_value(v: &Value) -> Self {
        let text = |key: &str| -> Option<String> {
            match v.get(key)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };
        let responsibilities = v.get("responsibilities").and_then(|r| r.as_array()).map(|arr| {
            arr.iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        });
        Experience {
            company: text("company"),
            position: text("position"),
            year: text("year"),
            responsibilities,
        }
    }
}

/// Check status and shape of the experience document. A missing or
/// non-array `experiences` field is malformed; an empty array is valid.
pub fn parse_response(response: &FetchResponse) -> Result<Vec<Experience>, LoadError> {
    if !response.is_success() {
        return Err(LoadError::Status(response.status));
    }
    let doc: Value =
        serde_json::from_str(&response.body).map_err(|e| LoadError::Malformed(e.to_string()))?;
    let entries = doc
        .get("experiences")
        .ok_or_else(|| LoadError::Malformed("missing \"experiences\"".to_string()))?
        .as_array()
        .ok_or_else(|| LoadError::Malformed("\"experiences\" is not an array".to_string()))?;
    Ok(entries.iter().map(Experience::from_value).collect())
}

pub fn render_entry(exp: &Experience, placeholders: &Placeholders) -> String {
    let or = |v: &Option<String>, def: &str| html_escape(v.as_deref().unwrap_or(def));

    let items: Vec<String> = match &exp.responsibilities {
        Some(list) if !list.is_empty() => list.iter().map(|r| format!("<li>{}</li>", html_escape(r))).collect(),
        _ => vec![format!(
            "<li class=\"placeholder\">{}</li>",
            html_escape(&placeholders.responsibility)
        )],
    };

    format!(
        "<div class=\"experience-item\">\
        <div class=\"experience-left\">\
        <h3 class=\"job-title\">{company}</h3>\
        <p class=\"job-position\">{position}</p>\
        <span class=\"job-year\">{year}</span>\
        </div>\
        <div class=\"experience-right\">\
        <ul class=\"job-responsibilities\">{items}</ul>\
        </div></div>",
        company = or(&exp.company, &placeholders.company),
        position = or(&exp.position, &placeholders.position),
        year = or(&exp.year, &placeholders.year),
        items = items.join(""),
    )
}

pub fn render_entries(entries: &[Experience], placeholders: &Placeholders) -> String {
    entries.iter().map(|e| render_entry(e, placeholders)).collect()
}

fn status_html(kind: &str, role: &str, message: &str) -> String {
    format!(
        "<p class=\"experience-status experience-{}\" role=\"{}\">{}</p>",
        kind,
        role,
        html_escape(message)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    /// Container missing, or torn down.
    Inert,
    Loading(RequestId),
    Ready(usize),
    Empty,
    Failed(LoadError),
}

/// Fetches the experience document once and renders it into its container.
pub struct ExperienceLoader {
    config: ExperienceConfig,
    container: Option<NodeId>,
    state: LoaderState,
}

impl ExperienceLoader {
    /// Starts the single fetch immediately when the container exists.
    pub fn attach(dom: &mut dyn Dom, selector: &str, config: ExperienceConfig) -> Self {
        let Some(container) = dom.query(selector) else {
            warn!("Experience container {} not found; experience list disabled", selector);
            return ExperienceLoader {
                config,
                container: None,
                state: LoaderState::Inert,
            };
        };

        dom.set_attribute(container, "aria-busy", "true");
        dom.set_inner_html(container, &status_html("loading", "status", &config.loading_message));
        let request = dom.fetch(&config.data_url);
        debug!("Fetching experience data from {}", config.data_url);

        ExperienceLoader {
            config,
            container: Some(container),
            state: LoaderState::Loading(request),
        }
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    fn complete(&mut self, dom: &mut dyn Dom, container: NodeId, result: &Result<FetchResponse, String>) {
        let parsed = match result {
            Ok(response) => parse_response(response),
            Err(reason) => Err(LoadError::Network(reason.clone())),
        };

        dom.remove_attribute(container, "aria-busy");
        self.state = match parsed {
            Ok(entries) if entries.is_empty() => {
                dom.set_inner_html(container, &status_html("empty", "status", &self.config.empty_message));
                LoaderState::Empty
            }
            Ok(entries) => {
                dom.set_inner_html(container, &render_entries(&entries, &self.config.placeholders));
                debug!("Rendered {} experience entries", entries.len());
                LoaderState::Ready(entries.len())
            }
            Err(e) => {
                error!("Error loading experiences: {}", e);
                dom.set_inner_html(container, &status_html("error", "alert", &self.config.error_message));
                LoaderState::Failed(e)
            }
        };
    }
}

impl Controller for ExperienceLoader {
    fn name(&self) -> &'static str {
        "experience-loader"
    }

    fn is_active(&self) -> bool {
        self.container.is_some()
    }

    fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let (Some(container), LoaderState::Loading(pending)) = (self.container, &self.state) else {
            return EventOutcome::IGNORED;
        };
        match event {
            Event::Fetched { request, result } if request == pending => {
                self.complete(dom, container, result);
                EventOutcome::HANDLED
            }
            _ => EventOutcome::IGNORED,
        }
    }

    /// A fetch still in flight is ignored when it lands.
    fn teardown(&mut self, _dom: &mut dyn Dom) {
        self.container = None;
        self.state = LoaderState::Inert;
    }
}
