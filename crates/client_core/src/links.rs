use std::sync::Arc;

use shared::domain::PageKey;

use crate::routes::RouteTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click targets a known page and must become an in-app navigation.
    Navigate(PageKey),
    /// External, empty or unknown targets keep their default behavior.
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct LinkInterceptor {
    routes: Arc<RouteTable>,
}

impl LinkInterceptor {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    pub fn intercept(&self, href: &str) -> ClickOutcome {
        let Some(raw) = href.trim().strip_prefix('#') else {
            return ClickOutcome::PassThrough;
        };
        if raw.is_empty() {
            return ClickOutcome::PassThrough;
        }
        match self.routes.lookup(raw) {
            Some(key) => ClickOutcome::Navigate(key),
            None => ClickOutcome::PassThrough,
        }
    }

    /// Hrefs in `html` that would be intercepted, in document order.
    pub fn internal_targets(&self, html: &str) -> Vec<PageKey> {
        crate::markup::start_tags(html)
            .into_iter()
            .filter_map(|tag| tag.attr("href").map(|href| self.intercept(href)))
            .filter_map(|outcome| match outcome {
                ClickOutcome::Navigate(key) => Some(key),
                ClickOutcome::PassThrough => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor() -> LinkInterceptor {
        LinkInterceptor::new(Arc::new(RouteTable::portfolio()))
    }

    #[test]
    fn known_fragments_become_navigations() {
        let links = interceptor();
        assert_eq!(links.intercept("#about"), ClickOutcome::Navigate(PageKey::About));
        assert_eq!(links.intercept(" #home "), ClickOutcome::Navigate(PageKey::Home));
    }

    #[test]
    fn external_empty_and_unknown_targets_pass_through() {
        let links = interceptor();
        assert_eq!(links.intercept("https://example.com"), ClickOutcome::PassThrough);
        assert_eq!(links.intercept("#"), ClickOutcome::PassThrough);
        assert_eq!(links.intercept("#blog"), ClickOutcome::PassThrough);
        assert_eq!(links.intercept("projects"), ClickOutcome::PassThrough);
    }

    #[test]
    fn internal_targets_scans_markup() {
        let html = r##"<a href="#projects">P</a><a href="mailto:me@example.com">M</a><a href="#contact">C</a>"##;
        assert_eq!(
            interceptor().internal_targets(html),
            vec![PageKey::Projects, PageKey::Contact]
        );
    }
}
