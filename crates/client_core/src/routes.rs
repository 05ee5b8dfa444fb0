use std::collections::BTreeMap;

use shared::domain::PageKey;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTableError {
    #[error("route table has no content for the default page {0}")]
    MissingDefault(PageKey),
    #[error("behavior script registered for {0} which has no content resource")]
    ScriptWithoutContent(PageKey),
}

/// Static page key → resource mapping. Built once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    content: BTreeMap<PageKey, String>,
    scripts: BTreeMap<PageKey, String>,
}

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    content: BTreeMap<PageKey, String>,
    scripts: BTreeMap<PageKey, String>,
}

impl RouteTableBuilder {
    pub fn page(mut self, key: PageKey, locator: impl Into<String>) -> Self {
        self.content.insert(key, locator.into());
        self
    }

    pub fn script(mut self, key: PageKey, locator: impl Into<String>) -> Self {
        self.scripts.insert(key, locator.into());
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        if !self.content.contains_key(&PageKey::DEFAULT) {
            return Err(RouteTableError::MissingDefault(PageKey::DEFAULT));
        }
        if let Some(orphan) = self
            .scripts
            .keys()
            .find(|key| !self.content.contains_key(key))
        {
            return Err(RouteTableError::ScriptWithoutContent(*orphan));
        }
        Ok(RouteTable {
            content: self.content,
            scripts: self.scripts,
        })
    }
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// The five portfolio pages with their fragments and page scripts.
    pub fn portfolio() -> Self {
        let mut content = BTreeMap::new();
        let mut scripts = BTreeMap::new();
        for key in PageKey::ALL {
            content.insert(key, content_locator(key));
            scripts.insert(key, script_locator(key));
        }
        Self { content, scripts }
    }

    pub fn resolve(&self, key: PageKey) -> Option<&str> {
        self.content.get(&key).map(String::as_str)
    }

    pub fn script_for(&self, key: PageKey) -> Option<&str> {
        self.scripts.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: PageKey) -> bool {
        self.content.contains_key(&key)
    }

    /// Parses a raw key and checks it against this table. Keys that parse
    /// but have no content here are unknown too.
    pub fn lookup(&self, raw: &str) -> Option<PageKey> {
        raw.parse::<PageKey>()
            .ok()
            .filter(|key| self.contains(*key))
    }

    pub fn default_page(&self) -> PageKey {
        PageKey::DEFAULT
    }

    pub fn pages(&self) -> impl Iterator<Item = PageKey> + '_ {
        self.content.keys().copied()
    }
}

pub fn content_locator(key: PageKey) -> String {
    format!("pages/{key}.html")
}

pub fn script_locator(key: PageKey) -> String {
    format!("js/pages/{key}.js")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portfolio_table_maps_every_page_to_fragment_and_script() {
        let routes = RouteTable::portfolio();
        assert_eq!(routes.resolve(PageKey::Home), Some("pages/home.html"));
        assert_eq!(routes.resolve(PageKey::Creative), Some("pages/creative.html"));
        assert_eq!(routes.script_for(PageKey::Contact), Some("js/pages/contact.js"));
        assert_eq!(routes.pages().count(), 5);
    }

    #[test]
    fn lookup_treats_keys_missing_from_table_as_unknown() {
        let routes = RouteTable::builder()
            .page(PageKey::Home, "pages/home.html")
            .page(PageKey::Projects, "pages/projects.html")
            .build()
            .expect("routes");
        assert_eq!(routes.lookup("projects"), Some(PageKey::Projects));
        assert_eq!(routes.lookup("about"), None);
        assert_eq!(routes.lookup("bogus"), None);
        assert_eq!(routes.script_for(PageKey::Projects), None);
    }

    #[test]
    fn builder_requires_default_page_and_content_for_scripts() {
        let err = RouteTable::builder()
            .page(PageKey::About, "pages/about.html")
            .build()
            .expect_err("missing home");
        assert_eq!(err, RouteTableError::MissingDefault(PageKey::Home));

        let err = RouteTable::builder()
            .page(PageKey::Home, "pages/home.html")
            .script(PageKey::About, "js/pages/about.js")
            .build()
            .expect_err("orphan script");
        assert_eq!(err, RouteTableError::ScriptWithoutContent(PageKey::About));
    }
}
