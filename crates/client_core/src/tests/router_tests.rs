use super::*;
use crate::{
    behavior::{ActivationGuard, PageBehavior},
    fetcher::FetchError,
    markup::rewrite_text,
    shell::{HeadlessShell, NavLink, Region},
    state::AppSnapshot,
};
use anyhow::Result;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::Notify;

const HEADER: &str = r##"<nav>
  <a class="nav-link" href="#home">Home</a>
  <a class="nav-link" href="#projects">Projects</a>
  <a class="nav-link" href="#about">About</a>
</nav>"##;

fn page_html(page: PageKey) -> String {
    format!("<section data-page=\"{page}\"><h1>{page}</h1></section>")
}

#[derive(Default)]
struct FakeSite {
    pages: Mutex<HashMap<String, Result<String, FetchError>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSite {
    fn portfolio() -> Arc<Self> {
        let site = Arc::new(Self::default());
        for page in PageKey::ALL {
            site.serve(&crate::routes::content_locator(page), &page_html(page));
        }
        site
    }

    fn serve(&self, locator: &str, html: &str) {
        lock(&self.pages).insert(locator.to_string(), Ok(html.to_string()));
    }

    fn fail(&self, locator: &str, status: u16) {
        lock(&self.pages).insert(
            locator.to_string(),
            Err(FetchError::Status {
                locator: locator.to_string(),
                status,
            }),
        );
    }

    fn gate(&self, locator: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(locator.to_string(), Arc::clone(&gate));
        gate
    }

    fn calls_for(&self, locator: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == locator).count()
    }

    fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl ResourceFetcher for FakeSite {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        lock(&self.calls).push(locator.to_string());
        let gate = lock(&self.gates).get(locator).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.pages)
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

struct Harness {
    router: Arc<Router>,
    shell: Arc<HeadlessShell>,
    state: StateStore,
}

impl Harness {
    fn new(site: &Arc<FakeSite>, routes: RouteTable, behaviors: BehaviorRegistry) -> Self {
        let shell = Arc::new(HeadlessShell::new());
        shell.set_region(Region::Header, HEADER);
        let state = StateStore::default();
        let router = Router::new(
            Arc::new(routes),
            site.clone(),
            shell.clone(),
            state.clone(),
            behaviors,
        );
        Self {
            router,
            shell,
            state,
        }
    }

    fn portfolio(site: &Arc<FakeSite>) -> Self {
        Self::new(site, RouteTable::portfolio(), BehaviorRegistry::new())
    }

    async fn settle(&self) -> Phase {
        tokio::time::timeout(Duration::from_secs(2), self.router.settled())
            .await
            .expect("router settled")
    }

    async fn visit(&self, raw: &str) -> Phase {
        self.router.navigate(raw, NavigateOptions::update_url()).await;
        self.settle().await
    }

    fn viewport(&self) -> String {
        self.shell.viewport().unwrap_or_default()
    }
}

async fn wait_for_call(site: &FakeSite, locator: &str) {
    for _ in 0..200 {
        if site.calls_for(locator) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no fetch issued for {locator}");
}

#[tokio::test]
async fn init_loads_page_named_by_fragment_without_touching_it() {
    let site = FakeSite::portfolio();
    let harness = Harness::portfolio(&site);
    harness.shell.set_fragment("#about");

    let outcome = harness.router.init().await;

    assert_eq!(outcome, NavigationOutcome::Active(PageKey::About));
    assert_eq!(harness.shell.fragment(), "#about");
    assert_eq!(harness.viewport(), page_html(PageKey::About));
    assert_eq!(harness.router.phase(), Phase::Active);
}

#[tokio::test]
async fn every_known_key_ends_on_its_fragment() {
    let site = FakeSite::portfolio();
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    for page in [
        PageKey::Projects,
        PageKey::Creative,
        PageKey::About,
        PageKey::Contact,
        PageKey::Home,
    ] {
        assert_eq!(harness.visit(page.as_str()).await, Phase::Active);
        assert_eq!(harness.router.current_page(), page);
        assert_eq!(harness.shell.fragment(), page.fragment());
        assert_eq!(harness.viewport(), page_html(page));

        let snapshot = harness.state.snapshot();
        assert_eq!(snapshot.route, page);
        assert!(!snapshot.loading);
        assert!(snapshot.ready);
        assert_eq!(snapshot.error, None);
    }
}

#[tokio::test]
async fn unknown_key_behaves_like_home() {
    let site = FakeSite::portfolio();

    let bogus = Harness::portfolio(&site);
    bogus.router.init().await;
    bogus.visit("projects").await;
    bogus.visit("xyz").await;

    let direct = Harness::portfolio(&site);
    direct.router.init().await;
    direct.visit("projects").await;
    direct.visit("home").await;

    assert_eq!(bogus.router.current_page(), PageKey::Home);
    assert_eq!(bogus.shell.fragment(), direct.shell.fragment());
    assert_eq!(bogus.viewport(), direct.viewport());
    assert_eq!(bogus.state.snapshot(), direct.state.snapshot());
}

#[tokio::test]
async fn repeated_navigation_to_current_page_fetches_nothing() {
    let site = FakeSite::portfolio();
    let harness = Harness::portfolio(&site);
    harness.router.init().await;
    harness.visit("about").await;
    let before = site.total_calls();

    let outcome = harness
        .router
        .navigate("about", NavigateOptions::update_url())
        .await;

    assert_eq!(outcome, NavigationOutcome::Unchanged);
    assert_eq!(site.total_calls(), before);
    assert_eq!(harness.router.render_generation(PageKey::About), 1);
}

#[tokio::test]
async fn newer_navigation_supersedes_a_slow_one() {
    let site = FakeSite::portfolio();
    let projects_gate = site.gate("pages/projects.html");
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    let slow = tokio::spawn({
        let router = Arc::clone(&harness.router);
        async move {
            router
                .navigate_to(PageKey::Projects, NavigateOptions::from_fragment())
                .await
        }
    });
    wait_for_call(&site, "pages/projects.html").await;

    let outcome = harness
        .router
        .navigate_to(PageKey::About, NavigateOptions::from_fragment())
        .await;
    assert_eq!(outcome, NavigationOutcome::Active(PageKey::About));

    projects_gate.notify_one();
    assert_eq!(slow.await.expect("join"), NavigationOutcome::Superseded);

    assert_eq!(harness.viewport(), page_html(PageKey::About));
    assert_eq!(harness.router.render_generation(PageKey::Projects), 0);
    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.route, PageKey::About);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn fragment_changes_supersede_each_other() {
    let site = FakeSite::portfolio();
    let creative_gate = site.gate("pages/creative.html");
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    harness.shell.set_fragment("#creative");
    wait_for_call(&site, "pages/creative.html").await;
    harness.shell.set_fragment("#contact");

    assert_eq!(harness.settle().await, Phase::Active);
    creative_gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(harness.router.current_page(), PageKey::Contact);
    assert_eq!(harness.viewport(), page_html(PageKey::Contact));
}

#[tokio::test]
async fn failed_page_falls_back_to_home_and_clears_error() {
    let site = FakeSite::portfolio();
    site.fail("pages/creative.html", 500);
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let _subscription = harness.state.subscribe(move |next: &AppSnapshot, _| {
        if let Some(error) = &next.error {
            lock(&sink).push(error.clone());
        }
    });

    assert_eq!(harness.visit("creative").await, Phase::Active);

    assert_eq!(harness.router.current_page(), PageKey::Home);
    assert_eq!(harness.shell.fragment(), "#home");
    assert_eq!(harness.viewport(), page_html(PageKey::Home));
    let snapshot = harness.state.snapshot();
    assert!(snapshot.ready);
    assert_eq!(snapshot.error, None);
    assert_eq!(
        lock(&errors).clone(),
        vec!["failed to load pages/creative.html (HTTP 500)".to_string()]
    );
}

#[tokio::test]
async fn home_failure_renders_terminal_notice() {
    let site = FakeSite::portfolio();
    site.fail("pages/home.html", 503);
    let harness = Harness::portfolio(&site);

    let outcome = harness.router.init().await;

    assert_eq!(outcome, NavigationOutcome::Failed(PageKey::Home));
    assert_eq!(harness.router.phase(), Phase::Failed);
    assert_eq!(site.calls_for("pages/home.html"), 1);
    let snapshot = harness.state.snapshot();
    assert!(!snapshot.ready);
    assert!(!snapshot.loading);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("failed to load pages/home.html (HTTP 503)")
    );
    let viewport = harness.viewport();
    assert!(viewport.contains("Page Not Found"));
    assert!(viewport.contains("Could not load <strong>home</strong>."));
    assert!(viewport.contains("href=\"#home\""));
}

#[tokio::test]
async fn fallback_stops_after_one_hop() {
    let site = FakeSite::portfolio();
    site.fail("pages/contact.html", 500);
    let harness = Harness::portfolio(&site);
    harness.router.init().await;
    site.fail("pages/home.html", 500);

    assert_eq!(harness.visit("contact").await, Phase::Failed);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(site.calls_for("pages/contact.html"), 1);
    assert_eq!(site.calls_for("pages/home.html"), 2);
    assert!(harness.viewport().contains("Could not load <strong>home</strong>."));
    assert!(!harness.state.snapshot().ready);
}

struct MetricCounter {
    guard: ActivationGuard,
    initialized: AtomicUsize,
}

#[async_trait]
impl PageBehavior for MetricCounter {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        self.initialized.fetch_add(1, Ordering::SeqCst);
        context.update_viewport(|html| {
            let (counted, metrics) =
                rewrite_text(html, |tag| tag.attr("data-metric").map(str::to_string));
            (metrics > 0).then_some(counted)
        });
        Ok(())
    }
}

#[tokio::test]
async fn behavior_loads_once_but_reinitializes_per_injection() {
    let site = FakeSite::portfolio();
    site.serve(
        "pages/home.html",
        r#"<section data-page="home"><span data-metric="7">0</span></section>"#,
    );
    let counter = Arc::new(MetricCounter {
        guard: ActivationGuard::default(),
        initialized: AtomicUsize::new(0),
    });
    let loads = Arc::new(AtomicUsize::new(0));

    let mut behaviors = BehaviorRegistry::new();
    {
        let counter = Arc::clone(&counter);
        let loads = Arc::clone(&loads);
        behaviors.register(PageKey::Home, move || {
            loads.fetch_add(1, Ordering::SeqCst);
            let behavior = Arc::clone(&counter);
            async move { Ok::<Arc<dyn PageBehavior>, anyhow::Error>(behavior) }.boxed()
        });
    }
    let harness = Harness::new(&site, RouteTable::portfolio(), behaviors);

    harness.router.init().await;
    assert!(harness.viewport().contains(">7</span>"));

    harness.visit("about").await;
    harness.visit("home").await;

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(counter.initialized.load(Ordering::SeqCst), 2);
    assert_eq!(harness.router.render_generation(PageKey::Home), 2);
    assert!(harness.viewport().contains(">7</span>"));
    assert!(harness.router.activated_pages().contains(&PageKey::Home));
}

#[tokio::test]
async fn behavior_load_failure_does_not_fail_navigation() {
    let site = FakeSite::portfolio();
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut behaviors = BehaviorRegistry::new();
    {
        let attempts = Arc::clone(&attempts);
        behaviors.register(PageKey::About, move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<Arc<dyn PageBehavior>, _>(anyhow::anyhow!("script blocked")) }.boxed()
        });
    }
    let harness = Harness::new(&site, RouteTable::portfolio(), behaviors);
    harness.router.init().await;

    assert_eq!(harness.visit("about").await, Phase::Active);
    assert_eq!(harness.state.snapshot().error, None);
    harness.visit("home").await;
    harness.visit("about").await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(harness.router.activated_pages().contains(&PageKey::About));
}

#[tokio::test]
async fn two_page_table_example_scenario() {
    let site = FakeSite::portfolio();
    let routes = RouteTable::builder()
        .page(PageKey::Home, "pages/home.html")
        .page(PageKey::Projects, "pages/projects.html")
        .build()
        .expect("routes");
    let harness = Harness::new(&site, routes, BehaviorRegistry::new());
    harness.router.init().await;

    harness.visit("projects").await;
    assert_eq!(harness.shell.fragment(), "#projects");
    assert_eq!(harness.viewport(), page_html(PageKey::Projects));
    assert_eq!(
        harness.shell.nav_links(),
        vec![
            NavLink {
                href: "#home".into(),
                active: false
            },
            NavLink {
                href: "#projects".into(),
                active: true
            },
            NavLink {
                href: "#about".into(),
                active: false
            },
        ]
    );

    harness.visit("bogus").await;
    assert_eq!(harness.shell.fragment(), "#home");
    assert_eq!(harness.viewport(), page_html(PageKey::Home));
    assert!(harness.router.activated_pages().is_empty());
}

#[tokio::test]
async fn link_clicks_navigate_only_for_known_pages() {
    let site = FakeSite::portfolio();
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    assert_eq!(
        harness.router.handle_link_click("#contact"),
        ClickOutcome::Navigate(PageKey::Contact)
    );
    assert_eq!(harness.settle().await, Phase::Active);
    assert_eq!(harness.router.current_page(), PageKey::Contact);

    let calls = site.total_calls();
    assert_eq!(
        harness.router.handle_link_click("https://github.com"),
        ClickOutcome::PassThrough
    );
    assert_eq!(harness.router.handle_link_click("#"), ClickOutcome::PassThrough);
    assert_eq!(site.total_calls(), calls);
}

#[tokio::test]
async fn destroy_stops_following_the_fragment() {
    let site = FakeSite::portfolio();
    let harness = Harness::portfolio(&site);
    harness.router.init().await;

    harness.router.destroy();
    harness.shell.set_fragment("#about");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(harness.router.current_page(), PageKey::Home);
    assert_eq!(harness.viewport(), page_html(PageKey::Home));
}

#[test]
fn failure_notice_escapes_the_page_key() {
    let notice = failure_notice(PageKey::Contact);
    assert!(notice.contains("<h2>Page Not Found</h2>"));
    assert!(notice.contains("Could not load <strong>contact</strong>."));
}
