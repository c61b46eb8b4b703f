use crate::config::ContactConfig;
use crate::util::encode_uri_component;

use super::rules::FormSnapshot;

/// A prefilled message for the visitor's mail client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDraft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl MailDraft {
    pub fn compose(snapshot: &FormSnapshot, config: &ContactConfig) -> Self {
        let phone = match snapshot.get("phone") {
            "" => config.phone_placeholder.as_str(),
            p => p,
        };

        let body = format!(
            "Hello,\n\n\
             I'm getting in touch through the contact form on your website.\n\n\
             CONTACT DETAILS\n\
             ---------------\n\
             Name: {}\n\
             Company: {}\n\
             Email: {}\n\
             Phone: {}\n\n\
             MESSAGE\n\
             -------\n\
             {}\n\n\
             Best regards.",
            snapshot.get("name"),
            snapshot.get("organization"),
            snapshot.get("email"),
            phone,
            snapshot.get("message"),
        );

        MailDraft {
            recipient: config.recipient.clone(),
            subject: format!("{}{}", config.subject_prefix, snapshot.get("subject")),
            body,
        }
    }

    pub fn mailto_uri(&self) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            self.recipient,
            encode_uri_component(&self.subject),
            encode_uri_component(&self.body)
        )
    }

    /// Gmail web compose view with the same recipient, subject and body.
    pub fn gmail_uri(&self) -> String {
        format!(
            "https://mail.google.com/mail/?view=cm&fs=1&to={}&su={}&body={}",
            encode_uri_component(&self.recipient),
            encode_uri_component(&self.subject),
            encode_uri_component(&self.body)
        )
    }
}
