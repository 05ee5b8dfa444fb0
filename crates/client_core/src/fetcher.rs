use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable, Aborted};
use reqwest::Client;
use shared::{
    error::ApiError,
    protocol::{ContactReceipt, ContactSubmission},
};
use thiserror::Error;
use tracing::debug;

use crate::{config::ClientConfig, lock};

const CONTACT_ROUTE: &str = "contact";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error while fetching {locator}: {message}")]
    Network { locator: String, message: String },
    #[error("failed to load {locator} (HTTP {status})")]
    Status { locator: String, status: u16 },
    #[error("request for {locator} was superseded")]
    Cancelled { locator: String },
}

impl FetchError {
    pub fn network(locator: &str, message: impl ToString) -> Self {
        FetchError::Network {
            locator: locator.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError>;
}

#[async_trait]
pub trait ContactSender: Send + Sync {
    async fn submit(&self, submission: &ContactSubmission) -> Result<ContactReceipt>;
}

pub struct HttpFetcher {
    http: Client,
    config: ClientConfig,
}

impl HttpFetcher {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        let url = self
            .config
            .resolve(locator)
            .map_err(|err| FetchError::network(locator, err))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::network(locator, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: locator.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|err| FetchError::network(locator, err))
    }
}

#[async_trait]
impl ContactSender for HttpFetcher {
    async fn submit(&self, submission: &ContactSubmission) -> Result<ContactReceipt> {
        let url = self.config.resolve(CONTACT_ROUTE)?;
        let response = self
            .http
            .post(url)
            .json(submission)
            .send()
            .await
            .context("failed to reach contact endpoint")?;
        if !response.status().is_success() {
            let status = response.status();
            return match response.json::<ApiError>().await {
                Ok(api_error) => Err(anyhow!("{} (HTTP {status})", api_error.message)),
                Err(_) => Err(anyhow!("contact submission rejected (HTTP {status})")),
            };
        }
        Ok(response.json().await?)
    }
}

/// Ownership token for one request on a [`FetchChannel`]. Tokens are issued
/// in increasing order; only the most recently issued one may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

struct InFlightRequest {
    token: RequestToken,
    locator: String,
    abort: AbortHandle,
}

#[derive(Default)]
struct ChannelSlot {
    latest: u64,
    in_flight: Option<InFlightRequest>,
}

/// A logical request channel: issuing a new token cancels whatever the
/// previous token still has outstanding, and a cancelled request settles as
/// [`FetchError::Cancelled`] instead of delivering its response.
pub struct FetchChannel {
    fetcher: Arc<dyn ResourceFetcher>,
    slot: Mutex<ChannelSlot>,
}

impl FetchChannel {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            slot: Mutex::new(ChannelSlot::default()),
        }
    }

    pub fn issue(&self) -> RequestToken {
        let mut slot = lock(&self.slot);
        slot.latest += 1;
        if let Some(previous) = slot.in_flight.take() {
            previous.abort.abort();
            debug!(locator = %previous.locator, "cancelled superseded request");
        }
        RequestToken(slot.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        lock(&self.slot).latest == token.0
    }

    pub fn has_in_flight(&self) -> bool {
        lock(&self.slot).in_flight.is_some()
    }

    /// Invalidates the current token. Returns whether a request was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.latest += 1;
        match slot.in_flight.take() {
            Some(pending) => {
                pending.abort.abort();
                debug!(locator = %pending.locator, "cancelled pending request");
                true
            }
            None => false,
        }
    }

    pub async fn fetch(&self, token: RequestToken, locator: &str) -> Result<String, FetchError> {
        let (abort, registration) = AbortHandle::new_pair();
        {
            let mut slot = lock(&self.slot);
            if slot.latest != token.0 {
                return Err(FetchError::Cancelled {
                    locator: locator.to_string(),
                });
            }
            if let Some(previous) = slot.in_flight.replace(InFlightRequest {
                token,
                locator: locator.to_string(),
                abort,
            }) {
                previous.abort.abort();
            }
        }

        let outcome = Abortable::new(self.fetcher.fetch_text(locator), registration).await;

        {
            let mut slot = lock(&self.slot);
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|pending| pending.token == token)
            {
                slot.in_flight = None;
            }
        }

        match outcome {
            Ok(result) => result,
            Err(Aborted) => Err(FetchError::Cancelled {
                locator: locator.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "tests/fetcher_tests.rs"]
mod tests;
