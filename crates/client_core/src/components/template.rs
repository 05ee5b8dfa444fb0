use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::error;

use crate::{
    fetcher::{FetchChannel, ResourceFetcher},
    lock,
};

pub const COMPONENT_ERROR_HTML: &str =
    "<div class=\"component-error\">Error loading component</div>";

/// Template cache shared by every component of one application.
#[derive(Clone, Default)]
pub struct TemplateCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl TemplateCache {
    pub fn get(&self, locator: &str) -> Option<String> {
        lock(&self.entries).get(locator).cloned()
    }

    pub fn insert(&self, locator: &str, html: &str) {
        lock(&self.entries).insert(locator.to_string(), html.to_string());
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-component template fetch helper. A newer load cancels the previous
/// one; a cancelled load yields an empty template and a failed load yields
/// an inline error block.
pub struct TemplateLoader {
    channel: FetchChannel,
    cache: TemplateCache,
}

impl TemplateLoader {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, cache: TemplateCache) -> Self {
        Self {
            channel: FetchChannel::new(fetcher),
            cache,
        }
    }

    pub async fn load(&self, locator: &str) -> String {
        self.load_with(locator, true).await
    }

    pub async fn load_with(&self, locator: &str, use_cache: bool) -> String {
        if use_cache {
            if let Some(cached) = self.cache.get(locator) {
                return cached;
            }
        }

        let token = self.channel.issue();
        match self.channel.fetch(token, locator).await {
            Ok(html) => {
                if use_cache {
                    self.cache.insert(locator, &html);
                }
                html
            }
            Err(err) if err.is_cancelled() => String::new(),
            Err(err) => {
                error!(%locator, error = %err, "failed to load component template");
                COMPONENT_ERROR_HTML.to_string()
            }
        }
    }

    pub fn cancel(&self) -> bool {
        self.channel.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticSite;

    #[tokio::test]
    async fn cached_templates_are_fetched_once() {
        let site = StaticSite::new().with("components/header.html", "<header></header>");
        let cache = TemplateCache::default();
        let loader = TemplateLoader::new(site.clone(), cache.clone());

        assert_eq!(loader.load("components/header.html").await, "<header></header>");
        assert_eq!(loader.load("components/header.html").await, "<header></header>");
        assert_eq!(site.calls_for("components/header.html"), 1);

        loader.load_with("components/header.html", false).await;
        assert_eq!(site.calls_for("components/header.html"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_templates_render_an_error_block_and_are_not_cached() {
        let site = StaticSite::new().failing("components/footer.html", 500);
        let cache = TemplateCache::default();
        let loader = TemplateLoader::new(site, cache.clone());

        assert_eq!(loader.load("components/footer.html").await, COMPONENT_ERROR_HTML);
        assert!(cache.is_empty());
    }
}
