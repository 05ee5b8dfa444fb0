use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{ContactReceipt, ContactSubmission};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    behavior::{ActivationGuard, PageBehavior, PageContext},
    fetcher::ContactSender,
    lock,
    markup::{self, escape_html, Tag},
};

pub const SENT_MESSAGE: &str = "Message sent! I’ll get back to you soon.";
pub const FAILED_MESSAGE: &str = "Sorry, something went wrong sending your message.";
const SENDING_LABEL: &str = "Sending...";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormStatus {
    #[default]
    Idle,
    Sending,
    Sent,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("{0}")]
    Invalid(String),
    #[error("contact submission failed: {0}")]
    Rejected(String),
    #[error("contact form is not shown")]
    NoForm,
}

fn is_contact_form(tag: &Tag) -> bool {
    (tag.name == "form" && tag.attr("id") == Some("contact-form"))
        || tag.attr("data-contact-form").is_some()
}

fn is_submit(tag: &Tag) -> bool {
    (tag.name == "button" || tag.name == "input") && tag.attr("type") == Some("submit")
}

pub fn find_form(html: &str) -> Option<Tag> {
    markup::start_tags(html).into_iter().find(is_contact_form)
}

/// Toggles the form's loading state: `is-loading` on the form and a disabled
/// submit control labelled "Sending...".
pub fn set_sending(html: &str, sending: bool) -> String {
    let (marked, _) = markup::rewrite_tags(html, |tag| {
        if is_contact_form(tag) {
            tag.toggle_class("is-loading", sending);
            return true;
        }
        if !is_submit(tag) {
            return false;
        }
        if tag.attr("data-original-text").is_none() {
            let original = match tag.name.as_str() {
                "input" => tag.attr("value").unwrap_or_default().to_string(),
                _ => markup::leaf_text(html, tag).trim().to_string(),
            };
            tag.set_attr("data-original-text", &original);
        }
        if sending {
            tag.set_attr("disabled", "");
        } else {
            tag.remove_attr("disabled");
        }
        if tag.name == "input" {
            let label = match sending {
                true => SENDING_LABEL.to_string(),
                false => tag.attr("data-original-text").unwrap_or_default().to_string(),
            };
            tag.set_attr("value", &label);
        }
        true
    });

    let (labelled, _) = markup::rewrite_text(&marked, |tag| {
        if tag.name != "button" || !is_submit(tag) {
            return None;
        }
        match sending {
            true => Some(SENDING_LABEL.to_string()),
            false => tag.attr("data-original-text").map(str::to_string),
        }
    });
    labelled
}

/// Writes `text` into the form's message element, creating it if needed.
pub fn show_message(html: &str, text: &str) -> Option<String> {
    let (rewritten, count) = markup::rewrite_text(html, |tag| {
        tag.attr("data-form-message").map(|_| text.to_string())
    });
    if count > 0 {
        return Some(rewritten);
    }
    let form = find_form(html)?;
    markup::append_child(
        html,
        &form,
        &format!("<div data-form-message>{}</div>", escape_html(text)),
    )
}

pub fn reset_fields(html: &str) -> String {
    let (cleared, _) = markup::rewrite_tags(html, |tag| {
        let resettable = tag.name == "input"
            && !matches!(tag.attr("type"), Some("submit" | "hidden" | "button"))
            && tag.attr("value").is_some();
        if resettable {
            tag.remove_attr("value");
        }
        resettable
    });
    let (cleared, _) = markup::rewrite_text(&cleared, |tag| {
        (tag.name == "textarea").then(String::new)
    });
    cleared
}

/// Contact page: binds to `form#contact-form` (or `[data-contact-form]`) and
/// submits through the contact endpoint. Outcomes are shown inside the form.
pub struct ContactBehavior {
    guard: ActivationGuard,
    sender: Arc<dyn ContactSender>,
    status: Mutex<FormStatus>,
    context: Mutex<Option<PageContext>>,
}

impl ContactBehavior {
    pub fn new(sender: Arc<dyn ContactSender>) -> Self {
        Self {
            guard: ActivationGuard::default(),
            sender,
            status: Mutex::new(FormStatus::Idle),
            context: Mutex::new(None),
        }
    }

    pub fn status(&self) -> FormStatus {
        lock(&self.status).clone()
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.context)
            .as_ref()
            .is_some_and(PageContext::is_current)
    }

    fn set_status(&self, status: FormStatus) {
        *lock(&self.status) = status;
    }

    pub async fn submit(&self, submission: ContactSubmission) -> Result<ContactReceipt, ContactError> {
        let context = lock(&self.context)
            .clone()
            .filter(PageContext::is_current)
            .ok_or(ContactError::NoForm)?;

        if let Err(err) = submission.validate() {
            context.update_viewport(|html| show_message(html, &err.message));
            self.set_status(FormStatus::Failed(err.message.clone()));
            return Err(ContactError::Invalid(err.message));
        }

        self.set_status(FormStatus::Sending);
        context.update_viewport(|html| {
            let sending = set_sending(html, true);
            Some(show_message(&sending, "").unwrap_or(sending))
        });

        let outcome = self.sender.submit(&submission).await;

        let (status, message, result) = match outcome {
            Ok(receipt) => {
                info!(id = %receipt.submission_id, "contact message delivered");
                (FormStatus::Sent, SENT_MESSAGE, Ok(receipt))
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(error = %reason, "contact submit failed");
                (
                    FormStatus::Failed(reason.clone()),
                    FAILED_MESSAGE,
                    Err(ContactError::Rejected(reason)),
                )
            }
        };
        let sent = result.is_ok();
        context.update_viewport(|html| {
            let mut html = set_sending(html, false);
            if sent {
                html = reset_fields(&html);
            }
            Some(show_message(&html, message).unwrap_or(html))
        });
        self.set_status(status);
        result
    }
}

#[async_trait]
impl PageBehavior for ContactBehavior {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        let bound = find_form(&context.viewport()).is_some();
        *lock(&self.context) = bound.then(|| context.clone());
        self.set_status(FormStatus::Idle);
        debug!(generation = context.generation, bound, "contact initialized");
        Ok(())
    }
}
