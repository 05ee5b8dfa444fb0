use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Component, UiEvent, MOBILE_BREAKPOINT};
use crate::{
    markup,
    shell::{Region, ShellDocument},
    state::{StatePatch, StateStore},
};

const TOGGLE_CLASS: &str = "nav-toggle";
const MENU_CLASS: &str = "nav-menu";

/// Mobile navigation menu inside the header. Only open/close state lives
/// here; active links belong to the router.
pub struct NavMenu {
    shell: Arc<dyn ShellDocument>,
    state: StateStore,
    attached: AtomicBool,
}

impl NavMenu {
    pub fn new(shell: Arc<dyn ShellDocument>, state: StateStore) -> Self {
        Self {
            shell,
            state,
            attached: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.snapshot().mobile_menu_open
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn toggle(&self) -> bool {
        let open = !self.is_open();
        self.state.set(StatePatch::new().mobile_menu_open(open));
        open
    }

    pub fn close(&self) -> bool {
        self.state.set(StatePatch::new().mobile_menu_open(false))
    }

    fn has_controls(&self) -> bool {
        let Some(header) = self.shell.region(Region::Header) else {
            return false;
        };
        let tags = markup::start_tags(&header);
        let has = |class: &str| tags.iter().any(|tag| tag.has_class(class));
        has(TOGGLE_CLASS) && has(MENU_CLASS)
    }
}

#[async_trait]
impl Component for NavMenu {
    fn name(&self) -> &'static str {
        "navigation"
    }

    async fn render(&self) -> Result<()> {
        self.attach_event_listeners();
        Ok(())
    }

    fn attach_event_listeners(&self) {
        if !self.has_controls() {
            warn!(".nav-toggle or .nav-menu not found in header; mobile menu disabled");
            return;
        }
        self.close();
        self.attached.store(true, Ordering::Release);
    }

    fn handle_event(&self, event: &UiEvent) -> bool {
        if !self.is_attached() {
            return false;
        }
        match event {
            UiEvent::MenuToggle => {
                let open = self.toggle();
                debug!(open, "mobile menu toggled");
                true
            }
            UiEvent::KeyDown(key) if key == "Escape" && self.is_open() => self.close(),
            UiEvent::Click { inside_menu: false } if self.is_open() => self.close(),
            UiEvent::Resize { width } if *width > MOBILE_BREAKPOINT && self.is_open() => self.close(),
            _ => false,
        }
    }

    fn destroy(&self) {
        self.attached.store(false, Ordering::Release);
    }
}
