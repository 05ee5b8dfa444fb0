use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::{
    behavior::{ActivationGuard, PageBehavior, PageContext},
    lock,
    markup::{self, Tag},
};

pub const SHOW_ALL: &str = "all";

fn filter_key(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        SHOW_ALL.to_string()
    } else {
        key
    }
}

fn is_filter_button(tag: &Tag) -> bool {
    tag.has_class("filter-btn") && tag.attr("data-filter").is_some()
}

fn is_work_item(tag: &Tag) -> bool {
    tag.has_class("work-item") && tag.attr("data-category").is_some()
}

/// Filter keys offered by the page, in document order.
pub fn filter_buttons(html: &str) -> Vec<String> {
    markup::start_tags(html)
        .iter()
        .filter(|tag| is_filter_button(tag))
        .filter_map(|tag| tag.attr("data-filter").map(filter_key))
        .collect()
}

/// Categories of the work items currently shown.
pub fn visible_categories(html: &str) -> Vec<String> {
    markup::start_tags(html)
        .iter()
        .filter(|tag| is_work_item(tag) && tag.attr("hidden").is_none())
        .filter_map(|tag| tag.attr("data-category").map(filter_key))
        .collect()
}

/// Shows the items whose category equals `filter` (or all of them) and marks
/// the matching button as selected.
pub fn apply_filter(html: &str, filter: &str) -> String {
    let key = filter_key(filter);
    let (rewritten, _) = markup::rewrite_tags(html, |tag| {
        if is_filter_button(tag) {
            let selected = tag.attr("data-filter").map(filter_key).as_deref() == Some(key.as_str());
            tag.toggle_class("active", selected);
            return true;
        }
        if is_work_item(tag) {
            let category = tag.attr("data-category").map(filter_key).unwrap_or_default();
            let show = key == SHOW_ALL || category == key;
            tag.toggle_class("is-hidden", !show);
            if show {
                tag.remove_attr("hidden");
            } else {
                tag.set_attr("hidden", "");
            }
            return true;
        }
        false
    });
    rewritten
}

/// Creative works page: category filter over the works grid.
#[derive(Default)]
pub struct CreativeBehavior {
    guard: ActivationGuard,
    active: Mutex<Option<String>>,
    context: Mutex<Option<PageContext>>,
}

impl CreativeBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_filter(&self) -> Option<String> {
        lock(&self.active).clone()
    }

    /// Applies `filter` to the rendered page. Returns `false` when the page is
    /// not shown or offers no such filter.
    pub fn select(&self, filter: &str) -> bool {
        let Some(context) = lock(&self.context).clone() else {
            return false;
        };
        let key = filter_key(filter);
        let applied = context.update_viewport(|html| {
            filter_buttons(html)
                .contains(&key)
                .then(|| apply_filter(html, &key))
        });
        if applied {
            *lock(&self.active) = Some(key);
        }
        applied
    }
}

#[async_trait]
impl PageBehavior for CreativeBehavior {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        *lock(&self.context) = Some(context.clone());

        let html = context.viewport();
        let buttons = filter_buttons(&html);
        let has_items = markup::start_tags(&html).iter().any(is_work_item);
        if buttons.is_empty() || !has_items {
            *lock(&self.active) = None;
            return Ok(());
        }

        let default = buttons
            .iter()
            .find(|key| *key == SHOW_ALL)
            .unwrap_or(&buttons[0])
            .clone();
        if context.update_viewport(|html| Some(apply_filter(html, &default))) {
            debug!(filter = %default, "creative filters bound");
            *lock(&self.active) = Some(default);
        }
        Ok(())
    }
}
