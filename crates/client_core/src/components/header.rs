use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use super::{Component, NavMenu, TemplateCache, TemplateLoader, UiEvent};
use crate::{
    fetcher::ResourceFetcher,
    shell::{Region, ShellDocument},
    state::StateStore,
};

pub const HEADER_TEMPLATE: &str = "components/header.html";

pub struct Header {
    shell: Arc<dyn ShellDocument>,
    templates: TemplateLoader,
    navigation: NavMenu,
}

impl Header {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: TemplateCache,
        shell: Arc<dyn ShellDocument>,
        state: StateStore,
    ) -> Self {
        Self {
            navigation: NavMenu::new(Arc::clone(&shell), state),
            templates: TemplateLoader::new(fetcher, cache),
            shell,
        }
    }

    pub fn navigation(&self) -> &NavMenu {
        &self.navigation
    }
}

#[async_trait]
impl Component for Header {
    fn name(&self) -> &'static str {
        "header"
    }

    async fn render(&self) -> Result<()> {
        let template = self.templates.load(HEADER_TEMPLATE).await;
        if template.is_empty() {
            return Ok(());
        }
        if !self.shell.set_region(Region::Header, &template) {
            warn!("header region not mounted");
            return Ok(());
        }
        self.navigation.render().await
    }

    fn handle_event(&self, event: &UiEvent) -> bool {
        self.navigation.handle_event(event)
    }

    fn destroy(&self) {
        self.navigation.destroy();
        self.templates.cancel();
    }
}
