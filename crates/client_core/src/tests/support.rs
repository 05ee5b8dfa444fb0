use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::protocol::{ContactReceipt, ContactSubmission};

use crate::{
    fetcher::{ContactSender, FetchError, ResourceFetcher},
    lock,
};

/// Serves fixed bodies by locator and records every request.
#[derive(Default)]
pub(crate) struct StaticSite {
    bodies: Mutex<HashMap<String, Result<String, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticSite {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with(self: Arc<Self>, locator: &str, body: &str) -> Arc<Self> {
        lock(&self.bodies).insert(locator.to_string(), Ok(body.to_string()));
        self
    }

    pub(crate) fn failing(self: Arc<Self>, locator: &str, status: u16) -> Arc<Self> {
        lock(&self.bodies).insert(
            locator.to_string(),
            Err(FetchError::Status {
                locator: locator.to_string(),
                status,
            }),
        );
        self
    }

    pub(crate) fn calls_for(&self, locator: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == locator).count()
    }
}

#[async_trait]
impl ResourceFetcher for StaticSite {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        lock(&self.calls).push(locator.to_string());
        lock(&self.bodies)
            .get(locator)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    locator: locator.to_string(),
                    status: 404,
                })
            })
    }
}

/// Contact endpoint double: accepts or rejects every submission.
#[derive(Default)]
pub(crate) struct RecordingInbox {
    pub(crate) received: Mutex<Vec<ContactSubmission>>,
    pub(crate) reject_with: Option<String>,
}

#[async_trait]
impl ContactSender for RecordingInbox {
    async fn submit(&self, submission: &ContactSubmission) -> Result<ContactReceipt> {
        if let Some(reason) = &self.reject_with {
            return Err(anyhow!(reason.clone()));
        }
        lock(&self.received).push(submission.clone());
        Ok(ContactReceipt {
            submission_id: uuid::Uuid::new_v4(),
            received_at: chrono::Utc::now(),
        })
    }
}
