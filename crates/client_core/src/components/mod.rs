//! Shell widgets outside the main viewport.

use anyhow::Result;
use async_trait::async_trait;

pub mod footer;
pub mod header;
pub mod navigation;
pub mod template;

pub use footer::Footer;
pub use header::Header;
pub use navigation::NavMenu;
pub use template::{TemplateCache, TemplateLoader, COMPONENT_ERROR_HTML};

/// Pixel width above which the mobile menu no longer applies.
pub const MOBILE_BREAKPOINT: u32 = 768;

/// Document events a component may react to once its listeners are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Click on the mobile menu toggle button.
    MenuToggle,
    /// Click anywhere else. `inside_menu` is true for clicks within the menu.
    Click { inside_menu: bool },
    KeyDown(String),
    Resize { width: u32 },
}

#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self) -> Result<()>;

    fn attach_event_listeners(&self) {}

    /// Returns whether the event changed anything.
    fn handle_event(&self, _event: &UiEvent) -> bool {
        false
    }

    fn destroy(&self);
}
