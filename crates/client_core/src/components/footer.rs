use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Local};
use tracing::warn;

use super::{Component, TemplateCache, TemplateLoader};
use crate::{
    fetcher::ResourceFetcher,
    markup,
    shell::{Region, ShellDocument},
};

pub const FOOTER_TEMPLATE: &str = "components/footer.html";
const YEAR_ELEMENT_ID: &str = "footer-year";

pub struct Footer {
    shell: Arc<dyn ShellDocument>,
    templates: TemplateLoader,
}

impl Footer {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: TemplateCache,
        shell: Arc<dyn ShellDocument>,
    ) -> Self {
        Self {
            shell,
            templates: TemplateLoader::new(fetcher, cache),
        }
    }
}

#[async_trait]
impl Component for Footer {
    fn name(&self) -> &'static str {
        "footer"
    }

    async fn render(&self) -> Result<()> {
        let template = self.templates.load(FOOTER_TEMPLATE).await;
        if template.is_empty() {
            return Ok(());
        }
        let year = Local::now().year().to_string();
        let html = markup::set_element_text(&template, YEAR_ELEMENT_ID, &year).unwrap_or(template);
        if !self.shell.set_region(Region::Footer, &html) {
            warn!("footer region not mounted");
        }
        Ok(())
    }

    fn destroy(&self) {
        self.templates.cancel();
    }
}
