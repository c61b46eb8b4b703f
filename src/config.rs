use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::contact::rules::{FieldKind, FieldRule};
use crate::error::ConfigError;
use crate::util::is_email;

/// Site-wide settings for every controller. Every field has a default, so an
/// empty TOML file or `{}` JSON blob yields the stock portfolio page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selectors: Selectors,
    pub download: DownloadConfig,
    pub contact: ContactConfig,
    pub experience: ExperienceConfig,
    pub header: HeaderConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_email(&self.contact.recipient) {
            return Err(ConfigError::InvalidRecipient(self.contact.recipient.clone()));
        }
        let mut seen = HashSet::new();
        for rule in &self.contact.fields {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateField(rule.name.clone()));
            }
            if let (Some(min), Some(max)) = (rule.min, rule.max) {
                if min > max {
                    return Err(ConfigError::InvertedBounds {
                        field: rule.name.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }
}

/// DOM anchors, as CSS selectors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub download_button: String,
    pub download_feedback: String,
    pub contact_form: String,
    pub experience_list: String,
    pub menu_toggle: String,
    pub menu_panel: String,
    pub header: String,
    pub contrast_target: Option<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Selectors {
            download_button: ".btn-download".to_string(),
            download_feedback: "#download-feedback".to_string(),
            contact_form: ".contact-form".to_string(),
            experience_list: "#experience-list".to_string(),
            menu_toggle: "#menu-toggle".to_string(),
            menu_panel: "#dropdown-menu".to_string(),
            header: "header".to_string(),
            contrast_target: Some("#contact".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// `{file}` is replaced with the downloaded file's name.
    pub message: String,
    pub duration_ms: u64,
}

impl DownloadConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            message: "Your download of {file} has started. Thanks for your interest!".to_string(),
            duration_ms: 4000,
        }
    }
}

/// How a valid contact form reaches the visitor's mail client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeMode {
    /// Full navigation to a `mailto:` URI.
    #[default]
    Mailto,
    /// Gmail web compose view in a new tab.
    Gmail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub recipient: String,
    pub subject_prefix: String,
    pub compose: ComposeMode,
    pub phone_placeholder: String,
    pub success_message: String,
    pub success_duration_ms: u64,
    pub popup_blocked_message: String,
    /// Container an error node is attached to; falls back to the field's parent.
    pub group_selector: String,
    pub messages: ValidationMessages,
    /// Tracked fields and their rules. Order here is irrelevant; error focus
    /// follows document order.
    pub fields: Vec<FieldRule>,
}

impl ContactConfig {
    pub fn success_duration(&self) -> Duration {
        Duration::from_millis(self.success_duration_ms)
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        ContactConfig {
            recipient: "contact@example.com".to_string(),
            subject_prefix: "Contact: ".to_string(),
            compose: ComposeMode::Mailto,
            phone_placeholder: "Not provided".to_string(),
            success_message: "Your mail app is opening with the message ready to send.".to_string(),
            success_duration_ms: 4000,
            popup_blocked_message:
                "Your browser blocked the compose window. Please allow pop-ups for this site and try again."
                    .to_string(),
            group_selector: ".form-group".to_string(),
            messages: ValidationMessages::default(),
            fields: default_fields(),
        }
    }
}

fn default_fields() -> Vec<FieldRule> {
    vec![
        FieldRule::text("name", true, Some(2), Some(50)),
        FieldRule::text("organization", true, Some(2), Some(100)),
        FieldRule::new("email", true, FieldKind::Email),
        FieldRule::new("phone", false, FieldKind::Phone),
        FieldRule::text("subject", true, Some(5), Some(100)),
        FieldRule::text("message", true, Some(10), Some(1000)),
    ]
}

/// Inline error texts. `{min}` and `{max}` are filled from the field rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationMessages {
    pub required: String,
    pub email: String,
    pub phone: String,
    pub min_length: String,
    pub max_length: String,
}

impl Default for ValidationMessages {
    fn default() -> Self {
        ValidationMessages {
            required: "This field is required".to_string(),
            email: "Please enter a valid email address".to_string(),
            phone: "Please enter a valid phone number".to_string(),
            min_length: "Must be at least {min} characters".to_string(),
            max_length: "Must be at most {max} characters".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    pub data_url: String,
    pub loading_message: String,
    pub empty_message: String,
    pub error_message: String,
    pub placeholders: Placeholders,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        ExperienceConfig {
            data_url: "assets/data/experience.json".to_string(),
            loading_message: "Loading experience…".to_string(),
            empty_message: "No experience entries to show yet.".to_string(),
            error_message: "Experience could not be loaded. Please try again later.".to_string(),
            placeholders: Placeholders::default(),
        }
    }
}

/// Text shown for attributes an experience entry leaves out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    pub company: String,
    pub position: String,
    pub year: String,
    pub responsibility: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Placeholders {
            company: "Company not specified".to_string(),
            position: "Position not specified".to_string(),
            year: "Date not specified".to_string(),
            responsibility: "No details available".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub scrolled_class: String,
    /// Vertical offset in px past which the header counts as scrolled.
    pub scroll_threshold: f64,
    pub contrast_class: String,
    pub root_margin: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        HeaderConfig {
            scrolled_class: "scrolled".to_string(),
            scroll_threshold: 50.0,
            contrast_class: "header-contrast".to_string(),
            root_margin: "-80px 0px 0px 0px".to_string(),
        }
    }
}
