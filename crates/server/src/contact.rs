use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use shared::{
    error::ApiException,
    protocol::{ContactReceipt, ContactSubmission},
};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSubmission {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub submission: ContactSubmission,
}

/// In-memory contact intake. Messages live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct ContactInbox {
    entries: Mutex<Vec<StoredSubmission>>,
}

impl ContactInbox {
    pub fn accept(&self, submission: ContactSubmission) -> Result<ContactReceipt, ApiException> {
        submission.validate()?;
        let stored = StoredSubmission {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            submission,
        };
        let receipt = ContactReceipt {
            submission_id: stored.id,
            received_at: stored.received_at,
        };
        info!(id = %stored.id, "contact message received");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stored);
        Ok(receipt)
    }

    pub fn messages(&self) -> Vec<StoredSubmission> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn accepted_messages_are_kept_with_their_receipt_id() {
        let inbox = ContactInbox::default();
        let receipt = inbox
            .accept(ContactSubmission {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                message: "Hi".into(),
            })
            .expect("accepted");

        let messages = inbox.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, receipt.submission_id);

        let err = inbox
            .accept(ContactSubmission {
                name: String::new(),
                email: "ada@example.com".into(),
                message: "Hi".into(),
            })
            .expect_err("missing name");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(inbox.len(), 1);
    }
}
