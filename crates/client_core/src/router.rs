use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use futures::future::{BoxFuture, FutureExt};
use shared::domain::PageKey;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    behavior::{ActivatedScripts, BehaviorRegistry, PageContext, RenderTracker},
    fetcher::{FetchChannel, RequestToken, ResourceFetcher},
    links::{ClickOutcome, LinkInterceptor},
    lock,
    markup::escape_html,
    routes::RouteTable,
    shell::ShellDocument,
    state::{StatePatch, StateStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub update_url: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self { update_url: true }
    }
}

impl NavigateOptions {
    pub fn update_url() -> Self {
        Self::default()
    }

    /// The fragment already names the target, so it must not be set again.
    pub fn from_fragment() -> Self {
        Self { update_url: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Navigating,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Already on the page with a matching fragment.
    Unchanged,
    /// The fragment was changed; the fragment listener finishes the load.
    UrlUpdated(PageKey),
    Active(PageKey),
    /// A newer navigation took over before this one could finish.
    Superseded,
    /// The page failed and a navigation to the default page was started.
    FellBack { from: PageKey },
    /// The default page itself failed; the terminal notice is showing.
    Failed(PageKey),
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    page: PageKey,
    token: RequestToken,
}

enum Begin {
    Unchanged,
    UrlUpdated(PageKey),
    Proceed(Ticket),
}

/// Page lifecycle controller. Owns the current page, the main viewport and
/// the single in-flight content request; the URL fragment is the source of
/// truth for which page is shown.
pub struct Router {
    routes: Arc<RouteTable>,
    channel: FetchChannel,
    fetcher: Arc<dyn ResourceFetcher>,
    shell: Arc<dyn ShellDocument>,
    state: StateStore,
    behaviors: BehaviorRegistry,
    scripts: ActivatedScripts,
    renders: Arc<RenderTracker>,
    links: LinkInterceptor,
    // Serializes transitions: begin, inject and publish never interleave.
    transition: Mutex<()>,
    current: Mutex<PageKey>,
    phase: watch::Sender<Phase>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

type TransitionGuard<'a> = MutexGuard<'a, ()>;

impl Router {
    pub fn new(
        routes: Arc<RouteTable>,
        fetcher: Arc<dyn ResourceFetcher>,
        shell: Arc<dyn ShellDocument>,
        state: StateStore,
        behaviors: BehaviorRegistry,
    ) -> Arc<Self> {
        let (phase, _) = watch::channel(Phase::Idle);
        Arc::new(Self {
            current: Mutex::new(routes.default_page()),
            links: LinkInterceptor::new(Arc::clone(&routes)),
            channel: FetchChannel::new(Arc::clone(&fetcher)),
            routes,
            fetcher,
            shell,
            state,
            behaviors,
            scripts: ActivatedScripts::default(),
            renders: Arc::new(RenderTracker::new()),
            transition: Mutex::new(()),
            phase,
            listener: Mutex::new(None),
        })
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn shell(&self) -> &Arc<dyn ShellDocument> {
        &self.shell
    }

    pub fn current_page(&self) -> PageKey {
        *lock(&self.current)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn activated_pages(&self) -> BTreeSet<PageKey> {
        self.scripts.pages()
    }

    pub fn render_generation(&self, page: PageKey) -> u64 {
        self.renders.generation(page)
    }

    /// Subscribes to fragment changes and loads the page the fragment names.
    pub async fn init(self: &Arc<Self>) -> NavigationOutcome {
        self.start_listener();
        let page = self.page_for_fragment(&self.shell.fragment());
        let outcome = self.navigate_to(page, NavigateOptions::from_fragment()).await;
        info!(page = %self.current_page(), "router initialized");
        outcome
    }

    pub fn destroy(&self) {
        if let Some(listener) = lock(&self.listener).take() {
            listener.abort();
        }
        let _guard = lock(&self.transition);
        self.channel.cancel();
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Navigating {
                *phase = Phase::Idle;
                true
            } else {
                false
            }
        });
        debug!("router destroyed");
    }

    /// Navigates to a raw page key. Unknown keys fall back to the default page.
    pub async fn navigate(self: &Arc<Self>, raw: &str, options: NavigateOptions) -> NavigationOutcome {
        let page = match self.routes.lookup(raw) {
            Some(page) => page,
            None => {
                let fallback = self.routes.default_page();
                warn!(requested = raw, %fallback, "unknown page requested; using default page");
                fallback
            }
        };
        self.navigate_to(page, options).await
    }

    pub async fn navigate_to(self: &Arc<Self>, page: PageKey, options: NavigateOptions) -> NavigationOutcome {
        let page = if self.routes.contains(page) {
            page
        } else {
            warn!(requested = %page, "page has no content; using default page");
            self.routes.default_page()
        };
        let begun = {
            let guard = lock(&self.transition);
            self.begin(&guard, page, options)
        };
        self.drive(begun).await
    }

    /// Link interception entry point. Known in-app targets start a
    /// navigation and must not reach the browser's default handling.
    pub fn handle_link_click(self: &Arc<Self>, href: &str) -> ClickOutcome {
        let outcome = self.links.intercept(href);
        if let ClickOutcome::Navigate(page) = outcome {
            let begun = {
                let guard = lock(&self.transition);
                self.begin(&guard, page, NavigateOptions::update_url())
            };
            self.spawn_completion(begun);
        }
        outcome
    }

    /// Waits until no navigation is in progress and returns the final phase.
    pub async fn settled(&self) -> Phase {
        let mut phases = self.phase.subscribe();
        let settled = match phases.wait_for(|phase| *phase != Phase::Navigating).await {
            Ok(phase) => *phase,
            Err(_) => Phase::Idle,
        };
        settled
    }

    fn page_for_fragment(&self, fragment: &str) -> PageKey {
        let raw = fragment.trim().trim_start_matches('#');
        self.routes
            .lookup(raw)
            .unwrap_or_else(|| self.routes.default_page())
    }

    fn start_listener(self: &Arc<Self>) {
        let mut changes = self.shell.subscribe_fragment();
        let router: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let fragment = match changes.recv().await {
                    Ok(fragment) => fragment,
                    Err(RecvError::Lagged(skipped)) => {
                        let Some(router) = router.upgrade() else { break };
                        warn!(skipped, "fragment listener lagged; resyncing with current fragment");
                        router.shell.fragment()
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(router) = router.upgrade() else { break };
                router.on_fragment_change(&fragment);
            }
        });
        if let Some(previous) = lock(&self.listener).replace(handle) {
            previous.abort();
        }
    }

    fn on_fragment_change(self: &Arc<Self>, fragment: &str) {
        let page = self.page_for_fragment(fragment);
        debug!(%fragment, %page, "fragment changed");
        let begun = {
            let guard = lock(&self.transition);
            self.begin(&guard, page, NavigateOptions::from_fragment())
        };
        self.spawn_completion(begun);
    }

    fn spawn_completion(self: &Arc<Self>, begun: Begin) {
        if let Begin::Proceed(ticket) = begun {
            tokio::spawn(Arc::clone(self).complete(ticket));
        }
    }

    // Synchronous half of a transition: dedup, publish intent, reconcile the
    // URL and take ownership of the request channel.
    fn begin(&self, _guard: &TransitionGuard<'_>, page: PageKey, options: NavigateOptions) -> Begin {
        let target = page.fragment();
        let fragment_matches = self.shell.fragment() == target;
        {
            let mut current = lock(&self.current);
            if *current == page && options.update_url && fragment_matches {
                return Begin::Unchanged;
            }
            *current = page;
        }

        let token = self.channel.issue();
        self.phase.send_replace(Phase::Navigating);
        self.state
            .set(StatePatch::new().route(page).loading(true).error(None));

        if options.update_url && !fragment_matches {
            self.shell.set_fragment(&target);
            return Begin::UrlUpdated(page);
        }
        Begin::Proceed(Ticket { page, token })
    }

    async fn drive(self: &Arc<Self>, begun: Begin) -> NavigationOutcome {
        match begun {
            Begin::Unchanged => {
                debug!(page = %self.current_page(), "already on page");
                NavigationOutcome::Unchanged
            }
            Begin::UrlUpdated(page) => NavigationOutcome::UrlUpdated(page),
            Begin::Proceed(ticket) => Arc::clone(self).complete(ticket).await,
        }
    }

    // Boxed because a failed page re-enters through the default-page fallback.
    fn complete(self: Arc<Self>, ticket: Ticket) -> BoxFuture<'static, NavigationOutcome> {
        async move {
            let Some(locator) = self.routes.resolve(ticket.page).map(str::to_string) else {
                return self
                    .fail(ticket, format!("no content resource for {}", ticket.page))
                    .await;
            };
            match self.channel.fetch(ticket.token, &locator).await {
                Ok(html) => self.finish(ticket, &html).await,
                Err(err) if err.is_cancelled() => {
                    debug!(page = %ticket.page, %locator, "navigation superseded");
                    NavigationOutcome::Superseded
                }
                Err(err) => self.fail(ticket, err.to_string()).await,
            }
        }
        .boxed()
    }

    async fn finish(self: &Arc<Self>, ticket: Ticket, html: &str) -> NavigationOutcome {
        let Ticket { page, token } = ticket;
        let generation = {
            let _guard = lock(&self.transition);
            if !self.channel.is_current(token) {
                debug!(%page, "discarding content of superseded navigation");
                return NavigationOutcome::Superseded;
            }
            let generation = self.renders.inject(self.shell.as_ref(), page, html);
            self.shell.mark_active_nav(page);
            generation
        };

        self.activate_behavior(page, generation).await;

        {
            let _guard = lock(&self.transition);
            if !self.channel.is_current(token) {
                return NavigationOutcome::Superseded;
            }
            self.state.set(StatePatch::new().loading(false).ready(true));
            self.phase.send_replace(Phase::Active);
        }
        info!(%page, generation, "navigated");
        NavigationOutcome::Active(page)
    }

    async fn activate_behavior(&self, page: PageKey, generation: u64) {
        if self.routes.script_for(page).is_none() {
            return;
        }
        let Some(behavior) = self.scripts.resident(&self.behaviors, page).await else {
            return;
        };
        let context = PageContext::new(
            page,
            generation,
            Arc::clone(&self.shell),
            self.state.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.renders),
        );
        if !context.is_current() {
            debug!(%page, generation, "skipping activation for replaced content");
            return;
        }
        if let Err(err) = behavior.activate(&context).await {
            let message = format!("{err:#}");
            warn!(%page, error = %message, "page behavior activation failed");
        }
    }

    async fn fail(self: &Arc<Self>, ticket: Ticket, message: String) -> NavigationOutcome {
        let home = self.routes.default_page();
        let fallback = {
            let guard = lock(&self.transition);
            if !self.channel.is_current(ticket.token) {
                return NavigationOutcome::Superseded;
            }
            error!(page = %ticket.page, error = %message, "navigation failed");
            self.state.set(
                StatePatch::new()
                    .loading(false)
                    .ready(false)
                    .error(Some(message)),
            );
            if ticket.page == home {
                self.renders
                    .replace_detached(self.shell.as_ref(), &failure_notice(ticket.page));
                self.phase.send_replace(Phase::Failed);
                return NavigationOutcome::Failed(ticket.page);
            }
            self.begin(&guard, home, NavigateOptions::update_url())
        };

        self.drive(fallback).await;
        NavigationOutcome::FellBack { from: ticket.page }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(listener) = listener.take() {
            listener.abort();
        }
    }
}

/// Inline notice shown when even the default page cannot be loaded.
pub fn failure_notice(page: PageKey) -> String {
    format!(
        "<div class=\"container page-error\">\n  <h2>Page Not Found</h2>\n  <p>Could not load <strong>{}</strong>.</p>\n  <a href=\"{}\">Return Home</a>\n</div>",
        escape_html(page.as_str()),
        PageKey::DEFAULT.fragment(),
    )
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
