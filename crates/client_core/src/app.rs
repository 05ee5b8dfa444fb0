use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{bail, Result};
use shared::domain::PageKey;
use tracing::{error, info};

use crate::{
    components::{Component, Footer, Header, TemplateCache, UiEvent},
    fetcher::{ContactSender, ResourceFetcher},
    links::ClickOutcome,
    markup::escape_html,
    pages::{portfolio_registry, PageBehaviors},
    router::{NavigateOptions, NavigationOutcome, Router},
    routes::RouteTable,
    shell::ShellDocument,
    state::{StatePatch, StateStore},
};

/// Wires the shell widgets, page behaviors and router into one application.
pub struct PortfolioApp {
    state: StateStore,
    shell: Arc<dyn ShellDocument>,
    header: Header,
    footer: Footer,
    router: Arc<Router>,
    behaviors: PageBehaviors,
    initialized: AtomicBool,
}

impl PortfolioApp {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        contact: Arc<dyn ContactSender>,
        shell: Arc<dyn ShellDocument>,
        state: StateStore,
    ) -> Self {
        let templates = TemplateCache::default();
        let (registry, behaviors) = portfolio_registry(contact);
        let router = Router::new(
            Arc::new(RouteTable::portfolio()),
            Arc::clone(&fetcher),
            Arc::clone(&shell),
            state.clone(),
            registry,
        );
        Self {
            header: Header::new(
                Arc::clone(&fetcher),
                templates.clone(),
                Arc::clone(&shell),
                state.clone(),
            ),
            footer: Footer::new(fetcher, templates, Arc::clone(&shell)),
            router,
            behaviors,
            state,
            shell,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn behaviors(&self) -> &PageBehaviors {
        &self.behaviors
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Renders the header and footer, then shows the page the fragment names.
    /// On failure the error is published to the state store and replaces the
    /// main viewport.
    pub async fn init(&self) -> Result<NavigationOutcome> {
        info!("initializing portfolio application");
        self.state
            .set(StatePatch::new().loading(true).ready(false).error(None));

        match self.start().await {
            Ok(outcome) => {
                self.initialized.store(true, Ordering::Release);
                self.state.set(StatePatch::new().loading(false).ready(true));
                info!(page = %self.router.current_page(), "portfolio application ready");
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "application failed to initialize");
                self.state.set(
                    StatePatch::new()
                        .loading(false)
                        .ready(false)
                        .error(Some(err.to_string())),
                );
                self.shell.set_viewport(&app_error_notice(&err.to_string()));
                Err(err)
            }
        }
    }

    async fn start(&self) -> Result<NavigationOutcome> {
        if self.shell.viewport().is_none() {
            bail!("main viewport is not mounted");
        }
        self.header.render().await?;
        self.header.attach_event_listeners();
        self.footer.render().await?;
        Ok(self.router.init().await)
    }

    pub async fn navigate_to(&self, page: PageKey) -> NavigationOutcome {
        self.router
            .navigate_to(page, NavigateOptions::update_url())
            .await
    }

    pub fn handle_link_click(&self, href: &str) -> ClickOutcome {
        self.router.handle_link_click(href)
    }

    pub fn handle_event(&self, event: &UiEvent) -> bool {
        self.header.handle_event(event)
    }

    pub fn destroy(&self) {
        self.router.destroy();
        self.header.destroy();
        self.footer.destroy();
        self.initialized.store(false, Ordering::Release);
    }
}

pub fn app_error_notice(message: &str) -> String {
    format!(
        "<div class=\"app-error\"><h2>Application Error</h2><p>Something went wrong while loading the portfolio.</p><p class=\"app-error-detail\">{}</p></div>",
        escape_html(message)
    )
}
