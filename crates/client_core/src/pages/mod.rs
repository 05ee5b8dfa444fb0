//! Built-in page behaviors and the registry that wires them to page keys.

use std::sync::Arc;

use futures::future::FutureExt;
use shared::domain::PageKey;

use crate::{
    behavior::{BehaviorRegistry, PageBehavior},
    fetcher::ContactSender,
};

pub mod about;
pub mod contact;
pub mod creative;
pub mod home;
pub mod projects;

pub use about::AboutBehavior;
pub use contact::{ContactBehavior, ContactError, FormStatus};
pub use creative::CreativeBehavior;
pub use home::HomeBehavior;
pub use projects::{CatalogError, Chip, ProjectCatalog, ProjectsBehavior, SortKey};

/// Handles to the behaviors the registry hands out, for callers that drive
/// page widgets directly (the CLI, tests).
#[derive(Clone)]
pub struct PageBehaviors {
    pub home: Arc<HomeBehavior>,
    pub projects: Arc<ProjectsBehavior>,
    pub creative: Arc<CreativeBehavior>,
    pub about: Arc<AboutBehavior>,
    pub contact: Arc<ContactBehavior>,
}

impl PageBehaviors {
    pub fn new(contact: Arc<dyn ContactSender>) -> Self {
        Self {
            home: Arc::new(HomeBehavior::new()),
            projects: Arc::new(ProjectsBehavior::new()),
            creative: Arc::new(CreativeBehavior::new()),
            about: Arc::new(AboutBehavior::new()),
            contact: Arc::new(ContactBehavior::new(contact)),
        }
    }

    pub fn registry(&self) -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        register(&mut registry, PageKey::Home, Arc::clone(&self.home));
        register(&mut registry, PageKey::Projects, Arc::clone(&self.projects));
        register(&mut registry, PageKey::Creative, Arc::clone(&self.creative));
        register(&mut registry, PageKey::About, Arc::clone(&self.about));
        register(&mut registry, PageKey::Contact, Arc::clone(&self.contact));
        registry
    }
}

fn register<B>(registry: &mut BehaviorRegistry, page: PageKey, behavior: Arc<B>)
where
    B: PageBehavior + 'static,
{
    registry.register(page, move || {
        let behavior: Arc<dyn PageBehavior> = behavior.clone();
        async move { Ok::<_, anyhow::Error>(behavior) }.boxed()
    });
}

pub fn portfolio_registry(contact: Arc<dyn ContactSender>) -> (BehaviorRegistry, PageBehaviors) {
    let behaviors = PageBehaviors::new(contact);
    (behaviors.registry(), behaviors)
}

/// Whole-number rendering with thousands separators, e.g. `12,500`.
pub fn format_count(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if rounded < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        behavior::{PageContext, RenderTracker},
        shell::HeadlessShell,
        state::StateStore,
        test_support::{RecordingInbox, StaticSite},
    };

    pub(crate) fn context_with_renders(
        page: PageKey,
        html: &str,
        site: Arc<StaticSite>,
    ) -> (PageContext, Arc<HeadlessShell>, Arc<RenderTracker>) {
        let shell = Arc::new(HeadlessShell::new());
        let renders = Arc::new(RenderTracker::new());
        let generation = renders.inject(shell.as_ref(), page, html);
        let context = PageContext::new(
            page,
            generation,
            shell.clone(),
            StateStore::default(),
            site,
            Arc::clone(&renders),
        );
        (context, shell, renders)
    }

    pub(crate) fn context_with_site(
        page: PageKey,
        html: &str,
        site: Arc<StaticSite>,
    ) -> (PageContext, Arc<HeadlessShell>) {
        let (context, shell, _) = context_with_renders(page, html, site);
        (context, shell)
    }

    pub(crate) fn context_for(page: PageKey, html: &str) -> (PageContext, Arc<HeadlessShell>) {
        context_with_site(page, html, StaticSite::new())
    }

    #[test]
    fn format_count_groups_thousands() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.4), "999");
        assert_eq!(format_count(1500.0), "1,500");
        assert_eq!(format_count(1234567.0), "1,234,567");
        assert_eq!(format_count(-2500.0), "-2,500");
    }

    #[tokio::test]
    async fn registry_covers_every_page() {
        let (registry, handles) = portfolio_registry(Arc::new(RecordingInbox::default()));
        for page in PageKey::ALL {
            assert!(registry.contains(page), "{page} has no behavior");
        }
        assert!(registry.load(PageKey::Projects).await.is_ok());
        assert_eq!(handles.home.initializations(), 0);
    }
}
