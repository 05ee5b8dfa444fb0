//! The document the router renders into: header/main/footer regions, the
//! navigation links and the URL fragment.

use std::sync::Mutex;

use shared::domain::PageKey;
use tokio::sync::broadcast;

use crate::{lock, markup};

const NAV_LINK_CLASS: &str = "nav-link";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Header,
    Main,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub href: String,
    pub active: bool,
}

pub trait ShellDocument: Send + Sync {
    /// `None` when the region is not mounted in this document.
    fn region(&self, region: Region) -> Option<String>;
    /// Returns `false` when the region is not mounted.
    fn set_region(&self, region: Region, html: &str) -> bool;
    fn nav_links(&self) -> Vec<NavLink>;
    fn mark_active_nav(&self, page: PageKey);
    fn fragment(&self) -> String;
    fn set_fragment(&self, fragment: &str);
    fn subscribe_fragment(&self) -> broadcast::Receiver<String>;

    fn viewport(&self) -> Option<String> {
        self.region(Region::Main)
    }

    fn set_viewport(&self, html: &str) -> bool {
        self.set_region(Region::Main, html)
    }
}

struct Document {
    header: Option<String>,
    main: Option<String>,
    footer: Option<String>,
    fragment: String,
    active_page: Option<PageKey>,
}

impl Document {
    fn slot(&mut self, region: Region) -> &mut Option<String> {
        match region {
            Region::Header => &mut self.header,
            Region::Main => &mut self.main,
            Region::Footer => &mut self.footer,
        }
    }
}

/// In-memory document used by the CLI shell and tests. Navigation links are
/// read from the `nav-link` anchors of the header markup.
pub struct HeadlessShell {
    document: Mutex<Document>,
    fragments: broadcast::Sender<String>,
}

impl Default for HeadlessShell {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessShell {
    pub fn new() -> Self {
        let (fragments, _) = broadcast::channel(64);
        Self {
            document: Mutex::new(Document {
                header: Some(String::new()),
                main: Some(String::new()),
                footer: Some(String::new()),
                fragment: String::new(),
                active_page: None,
            }),
            fragments,
        }
    }

    pub fn with_fragment(self, fragment: &str) -> Self {
        lock(&self.document).fragment = normalize_fragment(fragment);
        self
    }

    pub fn without_region(self, region: Region) -> Self {
        *lock(&self.document).slot(region) = None;
        self
    }

    pub fn active_page(&self) -> Option<PageKey> {
        lock(&self.document).active_page
    }
}

impl ShellDocument for HeadlessShell {
    fn region(&self, region: Region) -> Option<String> {
        lock(&self.document).slot(region).clone()
    }

    fn set_region(&self, region: Region, html: &str) -> bool {
        let mut document = lock(&self.document);
        match document.slot(region) {
            Some(content) => {
                *content = html.to_string();
                true
            }
            None => false,
        }
    }

    fn nav_links(&self) -> Vec<NavLink> {
        let document = lock(&self.document);
        let Some(header) = document.header.as_deref() else {
            return Vec::new();
        };
        let active_href = document.active_page.map(PageKey::fragment);
        markup::start_tags(header)
            .into_iter()
            .filter(|tag| tag.name == "a" && tag.has_class(NAV_LINK_CLASS))
            .filter_map(|tag| tag.attr("href").map(str::to_string))
            .map(|href| NavLink {
                active: active_href.as_deref() == Some(href.as_str()),
                href,
            })
            .collect()
    }

    fn mark_active_nav(&self, page: PageKey) {
        lock(&self.document).active_page = Some(page);
    }

    fn fragment(&self) -> String {
        lock(&self.document).fragment.clone()
    }

    fn set_fragment(&self, fragment: &str) {
        let fragment = normalize_fragment(fragment);
        {
            let mut document = lock(&self.document);
            if document.fragment == fragment {
                return;
            }
            document.fragment = fragment.clone();
        }
        // No receivers just means nobody is routing yet.
        let _ = self.fragments.send(fragment);
    }

    fn subscribe_fragment(&self) -> broadcast::Receiver<String> {
        self.fragments.subscribe()
    }
}

fn normalize_fragment(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("#{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_fragment_notifies_only_on_change() {
        let shell = HeadlessShell::new();
        let mut changes = shell.subscribe_fragment();

        shell.set_fragment("projects");
        shell.set_fragment("#projects");
        shell.set_fragment("#about");

        assert_eq!(changes.recv().await.expect("first"), "#projects");
        assert_eq!(changes.recv().await.expect("second"), "#about");
        assert!(changes.try_recv().is_err());
        assert_eq!(shell.fragment(), "#about");
    }

    #[test]
    fn nav_links_follow_active_page() {
        let shell = HeadlessShell::new();
        shell.set_region(
            Region::Header,
            r##"<nav><a class="nav-link" href="#home">Home</a>
               <a class="brand" href="#home">Me</a>
               <a class="nav-link" href="#projects">Projects</a></nav>"##,
        );
        shell.mark_active_nav(PageKey::Projects);

        let links = shell.nav_links();
        assert_eq!(
            links,
            vec![
                NavLink {
                    href: "#home".into(),
                    active: false
                },
                NavLink {
                    href: "#projects".into(),
                    active: true
                },
            ]
        );
    }

    #[test]
    fn unmounted_regions_reject_writes() {
        let shell = HeadlessShell::new().without_region(Region::Main);
        assert!(!shell.set_viewport("<p>hi</p>"));
        assert_eq!(shell.viewport(), None);
    }
}
