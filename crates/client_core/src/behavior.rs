use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use shared::domain::PageKey;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{fetcher::ResourceFetcher, lock, shell::ShellDocument, state::StateStore};

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("no behavior registered for page {0}")]
    NotRegistered(PageKey),
    #[error("failed to load behavior for page {page}: {message}")]
    Load { page: PageKey, message: String },
}

/// Everything a page behavior may touch while binding to freshly injected
/// content. `generation` increases every time content for `page` is injected.
#[derive(Clone)]
pub struct PageContext {
    pub page: PageKey,
    pub generation: u64,
    pub state: StateStore,
    pub fetcher: Arc<dyn ResourceFetcher>,
    shell: Arc<dyn ShellDocument>,
    renders: Arc<RenderTracker>,
}

impl PageContext {
    pub fn new(
        page: PageKey,
        generation: u64,
        shell: Arc<dyn ShellDocument>,
        state: StateStore,
        fetcher: Arc<dyn ResourceFetcher>,
        renders: Arc<RenderTracker>,
    ) -> Self {
        Self {
            page,
            generation,
            state,
            fetcher,
            shell,
            renders,
        }
    }

    pub fn shell(&self) -> &Arc<dyn ShellDocument> {
        &self.shell
    }

    pub fn viewport(&self) -> String {
        self.shell.viewport().unwrap_or_default()
    }

    /// Whether the viewport still shows the content this context was built for.
    pub fn is_current(&self) -> bool {
        self.renders.is_current(self.page, self.generation)
    }

    /// Rewrites the viewport if it still holds this context's render.
    /// Returns `false` when newer content has replaced it or `edit` declined.
    pub fn update_viewport<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&str) -> Option<String>,
    {
        self.renders
            .update(self.shell.as_ref(), self.page, self.generation, edit)
    }
}

#[async_trait]
pub trait PageBehavior: Send + Sync {
    async fn activate(&self, context: &PageContext) -> Result<()>;
}

pub type BehaviorLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn PageBehavior>>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    loaders: HashMap<PageKey, BehaviorLoader>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, page: PageKey, loader: F) -> &mut Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<dyn PageBehavior>>> + Send + Sync + 'static,
    {
        self.loaders.insert(page, Arc::new(loader));
        self
    }

    pub fn register_behavior(&mut self, page: PageKey, behavior: Arc<dyn PageBehavior>) -> &mut Self {
        self.register(page, move || {
            let behavior = Arc::clone(&behavior);
            async move { Ok::<_, anyhow::Error>(behavior) }.boxed()
        })
    }

    pub fn contains(&self, page: PageKey) -> bool {
        self.loaders.contains_key(&page)
    }

    pub async fn load(&self, page: PageKey) -> Result<Arc<dyn PageBehavior>, BehaviorError> {
        let loader = self
            .loaders
            .get(&page)
            .ok_or(BehaviorError::NotRegistered(page))?;
        loader().await.map_err(|err| BehaviorError::Load {
            page,
            message: format!("{err:#}"),
        })
    }
}

type ResidentSlot = Arc<OnceCell<Option<Arc<dyn PageBehavior>>>>;

/// Pages whose behavior has been loaded this session. A page enters the set
/// on its first load attempt, successful or not, and is never loaded again.
#[derive(Default)]
pub struct ActivatedScripts {
    slots: Mutex<HashMap<PageKey, ResidentSlot>>,
}

impl ActivatedScripts {
    pub async fn resident(
        &self,
        registry: &BehaviorRegistry,
        page: PageKey,
    ) -> Option<Arc<dyn PageBehavior>> {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(page).or_default())
        };
        slot.get_or_init(|| async {
            match registry.load(page).await {
                Ok(behavior) => {
                    debug!(%page, "page behavior loaded");
                    Some(behavior)
                }
                Err(err) => {
                    warn!(%page, error = %err, "page behavior failed to load; not retrying");
                    None
                }
            }
        })
        .await
        .clone()
    }

    pub fn contains(&self, page: PageKey) -> bool {
        lock(&self.slots)
            .get(&page)
            .is_some_and(|slot| slot.initialized())
    }

    pub fn pages(&self) -> BTreeSet<PageKey> {
        lock(&self.slots)
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(page, _)| *page)
            .collect()
    }
}

#[derive(Default)]
struct RenderState {
    current: Option<(PageKey, u64)>,
    generations: HashMap<PageKey, u64>,
}

/// Owns the main viewport on behalf of the router: every injection bumps
/// the page's render generation under the same lock behaviors use to edit
/// the viewport, so a behavior can never write over newer content.
#[derive(Default)]
pub struct RenderTracker {
    state: Mutex<RenderState>,
}

impl RenderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, shell: &dyn ShellDocument, page: PageKey, html: &str) -> u64 {
        let mut state = lock(&self.state);
        if !shell.set_viewport(html) {
            warn!(%page, "main viewport is not mounted; content not injected");
        }
        let generation = state.generations.entry(page).or_default();
        *generation += 1;
        let generation = *generation;
        state.current = Some((page, generation));
        generation
    }

    /// Replaces the viewport with markup that belongs to no page render.
    pub fn replace_detached(&self, shell: &dyn ShellDocument, html: &str) -> bool {
        let mut state = lock(&self.state);
        state.current = None;
        shell.set_viewport(html)
    }

    pub fn update<F>(&self, shell: &dyn ShellDocument, page: PageKey, generation: u64, edit: F) -> bool
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let state = lock(&self.state);
        if state.current != Some((page, generation)) {
            return false;
        }
        let Some(current) = shell.viewport() else {
            return false;
        };
        match edit(&current) {
            Some(next) => shell.set_viewport(&next),
            None => false,
        }
    }

    pub fn is_current(&self, page: PageKey, generation: u64) -> bool {
        lock(&self.state).current == Some((page, generation))
    }

    pub fn current(&self) -> Option<(PageKey, u64)> {
        lock(&self.state).current
    }

    pub fn generation(&self, page: PageKey) -> u64 {
        lock(&self.state)
            .generations
            .get(&page)
            .copied()
            .unwrap_or_default()
    }
}

/// Per-behavior idempotency: `begin` succeeds once per render generation.
#[derive(Debug, Default)]
pub struct ActivationGuard {
    last: AtomicU64,
}

impl ActivationGuard {
    pub fn begin(&self, generation: u64) -> bool {
        self.last.swap(generation, Ordering::AcqRel) != generation
    }

    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::HeadlessShell;
    use std::sync::atomic::AtomicUsize;

    struct Noop;

    #[async_trait]
    impl PageBehavior for Noop {
        async fn activate(&self, _context: &PageContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn activation_guard_fires_once_per_generation() {
        let guard = ActivationGuard::default();
        assert!(guard.begin(1));
        assert!(!guard.begin(1));
        assert!(guard.begin(2));
        assert_eq!(guard.last(), 2);
    }

    #[tokio::test]
    async fn failed_loads_are_recorded_and_never_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut registry = BehaviorRegistry::new();
        let counter = Arc::clone(&attempts);
        registry.register(PageKey::About, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<Arc<dyn PageBehavior>, _>(anyhow::anyhow!("script missing")) }.boxed()
        });
        registry.register_behavior(PageKey::Home, Arc::new(Noop));

        let scripts = ActivatedScripts::default();
        assert!(scripts.resident(&registry, PageKey::About).await.is_none());
        assert!(scripts.resident(&registry, PageKey::About).await.is_none());
        assert!(scripts.resident(&registry, PageKey::Home).await.is_some());
        assert!(scripts.resident(&registry, PageKey::Contact).await.is_none());

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            scripts.pages().into_iter().collect::<Vec<_>>(),
            vec![PageKey::Home, PageKey::About, PageKey::Contact]
        );
    }

    #[test]
    fn stale_render_cannot_edit_the_viewport() {
        let shell = HeadlessShell::new();
        let renders = RenderTracker::new();
        let first = renders.inject(&shell, PageKey::Home, "<p>one</p>");
        let second = renders.inject(&shell, PageKey::Home, "<p>two</p>");
        assert_eq!((first, second), (1, 2));

        assert!(!renders.update(&shell, PageKey::Home, first, |_| Some("stale".into())));
        assert!(renders.update(&shell, PageKey::Home, second, |html| Some(html.replace("two", "2"))));
        assert_eq!(shell.viewport().as_deref(), Some("<p>2</p>"));

        renders.replace_detached(&shell, "<p>notice</p>");
        assert_eq!(renders.current(), None);
        assert_eq!(renders.generation(PageKey::Home), 2);
    }
}
